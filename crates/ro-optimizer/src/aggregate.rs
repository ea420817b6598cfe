//! Background merging and per-signal significance ranking.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use ro_types::{
    config_error, validation_error, CountKind, CountRecord, CountTable, RoResult, Sentinel,
    SignificanceEntry, SignificanceRecord, YieldPair,
};

use crate::significance::SignificanceInputs;

/// Knobs for turning count tables into ranked significances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificanceConfig {
    /// Yields below this (signal or background) are not worth ranking.
    pub insignificance_threshold: f64,

    /// Relative systematic uncertainty on the background.
    pub relative_bkg_uncertainty: f64,

    /// Relative statistical uncertainty the raw background must reach.
    pub bkg_stat_uncertainty: f64,

    /// Which count kind orders the ranked output.
    pub rank_by: CountKind,

    /// How many entries per signal to keep.
    pub max_hashes: usize,

    /// Integrated luminosity in fb⁻¹; scaled yields are multiplied by
    /// `luminosity * 1000`.
    pub luminosity: f64,
}

impl Default for SignificanceConfig {
    fn default() -> Self {
        Self {
            insignificance_threshold: 0.5,
            relative_bkg_uncertainty: 0.3,
            bkg_stat_uncertainty: 0.3,
            rank_by: CountKind::Scaled,
            max_hashes: 25,
            luminosity: 1.0,
        }
    }
}

impl SignificanceConfig {
    pub fn with_insignificance_threshold(mut self, threshold: f64) -> Self {
        self.insignificance_threshold = threshold;
        self
    }

    pub fn with_uncertainties(mut self, relative: f64, stat: f64) -> Self {
        self.relative_bkg_uncertainty = relative;
        self.bkg_stat_uncertainty = stat;
        self
    }

    pub fn with_rank_by(mut self, kind: CountKind) -> Self {
        self.rank_by = kind;
        self
    }

    pub fn with_max_hashes(mut self, n: usize) -> Self {
        self.max_hashes = n;
        self
    }

    pub fn with_luminosity(mut self, luminosity: f64) -> Self {
        self.luminosity = luminosity;
        self
    }

    pub fn validate(&self) -> RoResult<()> {
        if !(self.relative_bkg_uncertainty > 0.0) {
            return Err(validation_error!(
                "relative background uncertainty must be positive, got {}",
                self.relative_bkg_uncertainty
            ));
        }
        if !(self.bkg_stat_uncertainty > 0.0) {
            return Err(validation_error!(
                "background statistical uncertainty must be positive, got {}",
                self.bkg_stat_uncertainty
            ));
        }
        if !(self.luminosity > 0.0 && self.luminosity.is_finite()) {
            return Err(validation_error!("luminosity must be positive, got {}", self.luminosity));
        }
        if self.max_hashes == 0 {
            return Err(validation_error!("max hashes must be at least 1"));
        }
        if !self.insignificance_threshold.is_finite() {
            return Err(validation_error!(
                "insignificance threshold must be finite, got {}",
                self.insignificance_threshold
            ));
        }
        Ok(())
    }

    pub fn inputs(&self) -> SignificanceInputs {
        SignificanceInputs {
            insignificance_threshold: self.insignificance_threshold,
            relative_bkg_uncertainty: self.relative_bkg_uncertainty,
            bkg_stat_uncertainty: self.bkg_stat_uncertainty,
        }
    }

    /// Factor applied to yields of `kind` before computing significance.
    pub fn yield_factor(&self, kind: CountKind) -> f64 {
        match kind {
            CountKind::Scaled => self.luminosity * 1000.0,
            CountKind::Raw | CountKind::Weighted => 1.0,
        }
    }
}

/// Extra multipliers for the scaled counts of some backgrounds, keyed by
/// sample id or by group name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackgroundRescale {
    pub factors: BTreeMap<String, f64>,
    /// Sample id → group name.
    pub groups: BTreeMap<String, String>,
}

impl BackgroundRescale {
    pub fn new(factors: BTreeMap<String, f64>) -> Self {
        Self {
            factors,
            groups: BTreeMap::new(),
        }
    }

    pub fn with_groups(mut self, groups: BTreeMap<String, String>) -> Self {
        self.groups = groups;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Every factor must name a known background sample or a group some
    /// known sample belongs to.
    pub fn validate<S: AsRef<str>>(&self, samples: &[S]) -> RoResult<()> {
        let known: BTreeSet<&str> = samples.iter().map(AsRef::as_ref).collect();
        let known_groups: BTreeSet<&str> = self
            .groups
            .iter()
            .filter(|(sample, _)| known.contains(sample.as_str()))
            .map(|(_, group)| group.as_str())
            .collect();

        for (key, factor) in &self.factors {
            if !factor.is_finite() {
                return Err(validation_error!("rescale factor for {key} must be finite, got {factor}"));
            }
            if known.contains(key.as_str()) || known_groups.contains(key.as_str()) {
                continue;
            }
            if self.groups.is_empty() {
                return Err(config_error!(
                    "rescale key {key} is not a background sample; group rescales need a sample-to-group map"
                ));
            }
            return Err(config_error!("rescale key {key} matches no background sample or group"));
        }
        Ok(())
    }

    /// Combined multiplier for one sample: its own factor times its
    /// group's factor.
    pub fn factor(&self, sample: &str) -> f64 {
        let own = self.factors.get(sample).copied().unwrap_or(1.0);
        let group = self
            .groups
            .get(sample)
            .and_then(|g| self.factors.get(g))
            .copied()
            .unwrap_or(1.0);
        own * group
    }
}

/// Sum background tables hash by hash; each count kind is summed
/// independently. A hash missing from a table contributes zero.
pub fn merge_backgrounds<'a, I>(tables: I) -> CountTable
where
    I: IntoIterator<Item = &'a CountTable>,
{
    let mut merged = CountTable::new();
    for table in tables {
        for (hash, record) in table {
            *merged.entry(hash.clone()).or_default() += *record;
        }
    }
    merged
}

/// [`merge_backgrounds`] with the scaled counts of each sample multiplied
/// by its rescale factor first.
pub fn merge_rescaled(backgrounds: &[(String, CountTable)], rescale: &BackgroundRescale) -> CountTable {
    let mut merged = CountTable::new();
    for (sample, table) in backgrounds {
        let factor = rescale.factor(sample);
        if factor != 1.0 {
            info!(sample = %sample, factor, "Rescaling background");
        }
        for (hash, record) in table {
            let mut record = *record;
            record.scaled *= factor;
            *merged.entry(hash.clone()).or_default() += record;
        }
    }
    merged
}

/// Descending rank order for significances: real values by value, then
/// sentinels (-1 before -2 before -3), then `NaN`.
pub fn rank_order(a: f64, b: f64) -> Ordering {
    fn class(v: f64) -> u8 {
        if v.is_nan() {
            0
        } else if Sentinel::classify(v).is_some() {
            1
        } else {
            2
        }
    }
    class(b)
        .cmp(&class(a))
        .then_with(|| b.partial_cmp(&a).unwrap_or(Ordering::Equal))
}

/// Significance of every cut of one signal against the merged background,
/// best first, truncated to `config.max_hashes`.
pub fn rank_signal(
    signal: &CountTable,
    background: &CountTable,
    config: &SignificanceConfig,
) -> Vec<SignificanceEntry> {
    let inputs = config.inputs();
    let mut missing_background = 0usize;

    let mut entries: Vec<SignificanceEntry> = signal
        .iter()
        .map(|(hash, sig)| {
            let bkg = background.get(hash).copied().unwrap_or_else(|| {
                missing_background += 1;
                CountRecord::default()
            });
            let mut significances = [0.0; 3];
            let mut yields = [YieldPair::default(); 3];
            for (i, kind) in CountKind::ALL.iter().enumerate() {
                let factor = config.yield_factor(*kind);
                let pair = YieldPair {
                    sig: sig.get(*kind) * factor,
                    bkg: bkg.get(*kind) * factor,
                };
                significances[i] = inputs.evaluate(pair.sig, pair.bkg, bkg.raw);
                yields[i] = pair;
            }
            SignificanceEntry {
                hash: hash.clone(),
                significance_raw: significances[0],
                significance_weighted: significances[1],
                significance_scaled: significances[2],
                yield_raw: yields[0],
                yield_weighted: yields[1],
                yield_scaled: yields[2],
            }
        })
        .collect();

    if missing_background > 0 {
        debug!(missing_background, "Cuts absent from background, treated as zero");
    }

    let kind = config.rank_by;
    entries.sort_by(|a, b| {
        rank_order(a.significance(kind), b.significance(kind)).then_with(|| a.hash.cmp(&b.hash))
    });
    entries.truncate(config.max_hashes);
    entries
}

/// Ranked results for one signal sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSignal {
    pub sample: String,
    pub entries: Vec<SignificanceEntry>,
}

impl RankedSignal {
    pub fn records(&self, kind: CountKind) -> Vec<SignificanceRecord> {
        self.entries.iter().map(|e| e.record(kind)).collect()
    }

    pub fn best(&self) -> Option<&SignificanceEntry> {
        self.entries.first()
    }
}

/// Merges backgrounds once, then ranks every signal against them.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    config: SignificanceConfig,
    rescale: BackgroundRescale,
}

impl Aggregator {
    pub fn new(config: SignificanceConfig) -> Self {
        Self {
            config,
            rescale: BackgroundRescale::default(),
        }
    }

    pub fn with_rescale(mut self, rescale: BackgroundRescale) -> Self {
        self.rescale = rescale;
        self
    }

    pub fn config(&self) -> &SignificanceConfig {
        &self.config
    }

    pub fn aggregate(
        &self,
        backgrounds: &[(String, CountTable)],
        signals: &[(String, CountTable)],
    ) -> RoResult<Vec<RankedSignal>> {
        self.config.validate()?;
        let background_ids: Vec<&str> = backgrounds.iter().map(|(id, _)| id.as_str()).collect();
        self.rescale.validate(&background_ids)?;

        if backgrounds.is_empty() {
            warn!("No background tables; every cut will be background-insignificant");
        }
        let merged = merge_rescaled(backgrounds, &self.rescale);
        info!(
            backgrounds = backgrounds.len(),
            hashes = merged.len(),
            "Merged background tables"
        );

        Ok(signals
            .iter()
            .map(|(sample, table)| {
                let entries = rank_signal(table, &merged, &self.config);
                if let Some(best) = entries.first() {
                    info!(
                        sample = %sample,
                        hash = %best.hash,
                        significance = best.significance(self.config.rank_by),
                        "Ranked signal"
                    );
                }
                RankedSignal {
                    sample: sample.clone(),
                    entries,
                }
            })
            .collect())
    }
}
