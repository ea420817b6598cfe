//! The `summary` pipeline: best cut per signal of one `optimize` run.

use serde::Serialize;
use tracing::{info, warn};

use ro_data::{ensure_absent, read_significances, write_json, ResultStore};
use ro_types::{CutHash, RoResult};

use crate::config::SummaryConfig;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryEntry {
    pub sample: String,
    pub hash: CutHash,
    pub significance: f64,
    pub signal: f64,
    pub bkgd: f64,
    /// `signal / bkgd`, or -1 without background.
    pub ratio: f64,
}

fn ratio(signal: f64, bkgd: f64) -> f64 {
    if bkgd == 0.0 {
        -1.0
    } else {
        signal / bkgd
    }
}

/// Run `summary`.
pub fn run_summary(config: &SummaryConfig) -> RoResult<Vec<SummaryEntry>> {
    ensure_absent(&config.output, config.overwrite)?;

    let store = ResultStore::open(&config.search_dir);
    let manifest = store.read_manifest()?;
    let kind = manifest.rank_by;

    let mut entries = Vec::with_capacity(manifest.signals.len());
    for sample in &manifest.signals {
        let path = store.significance_path(sample, &manifest.background_hash);
        let ranked = read_significances(&path)?;
        let Some(best) = ranked.first() else {
            warn!(sample = %sample, "No ranked cuts for sample");
            continue;
        };
        let yields = best.yields(kind);
        entries.push(SummaryEntry {
            sample: sample.clone(),
            hash: best.hash.clone(),
            significance: best.significance(kind),
            signal: yields.sig,
            bkgd: yields.bkg,
            ratio: ratio(yields.sig, yields.bkg),
        });
    }
    entries.sort_by(|a, b| a.sample.cmp(&b.sample));

    write_json(&config.output, &entries)?;
    info!(
        samples = entries.len(),
        rank_by = %kind,
        output = %config.output.display(),
        "Wrote summary"
    );
    Ok(entries)
}
