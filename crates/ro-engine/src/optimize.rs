//! The `optimize` pipeline: merge backgrounds, rank every signal.

use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

use ro_data::{ensure_absent, read_json, read_metadata, resolve_sample_ids, ResultStore, RunManifest};
use ro_optimizer::{sample_set_hash, Aggregator, BackgroundRescale, RankedSignal};
use ro_types::{CountTable, RoResult};

use crate::config::OptimizeConfig;

/// Outcome of an `optimize` run.
#[derive(Debug, Clone)]
pub struct OptimizeRun {
    pub output_dir: PathBuf,
    pub background_hash: String,
    pub ranked: Vec<RankedSignal>,
}

fn load_tables(store: &ResultStore, ids: &[String]) -> RoResult<Vec<(String, CountTable)>> {
    ids.iter()
        .map(|id| {
            let table = store.read_count_table(id)?;
            debug!(sample = %id, hashes = table.len(), "Loaded count table");
            Ok((id.clone(), table))
        })
        .collect()
}

fn load_rescale(config: &OptimizeConfig) -> RoResult<BackgroundRescale> {
    let Some(path) = &config.rescale else {
        return Ok(BackgroundRescale::default());
    };
    let factors: BTreeMap<String, f64> = read_json(path)?;
    let mut rescale = BackgroundRescale::new(factors);
    if let Some(groups) = &config.sample_groups {
        let groups: BTreeMap<String, String> = read_json(groups)?;
        rescale = rescale.with_groups(groups);
    }
    Ok(rescale)
}

/// Run `optimize`.
pub fn run_optimize(config: &OptimizeConfig) -> RoResult<OptimizeRun> {
    config.validate()?;
    ensure_absent(&config.output_dir, config.overwrite)?;

    let mut significance = config.significance.clone();
    if let Some(luminosity) = config.luminosity {
        significance = significance.with_luminosity(luminosity);
    } else if let Some(path) = &config.metadata {
        significance = significance.with_luminosity(read_metadata(path)?.luminosity);
    }
    let aggregator = Aggregator::new(significance).with_rescale(load_rescale(config)?);

    let mut background_ids = resolve_sample_ids(&config.search_dir, &config.backgrounds)?;
    background_ids.sort();
    background_ids.dedup();
    let signal_ids = resolve_sample_ids(&config.search_dir, &config.signals)?;

    let search = ResultStore::open(&config.search_dir);
    let backgrounds = load_tables(&search, &background_ids)?;
    let signals = load_tables(&search, &signal_ids)?;

    let ranked = aggregator.aggregate(&backgrounds, &signals)?;

    let background_hash = sample_set_hash(&background_ids);
    let store = ResultStore::create(&config.output_dir, config.overwrite)?;
    store.write_background_set(&background_hash, &background_ids)?;
    for signal in &ranked {
        let path = store.write_significances(&signal.sample, &background_hash, &signal.entries)?;
        debug!(sample = %signal.sample, path = %path.display(), "Wrote ranked significances");
    }
    let manifest = RunManifest::new(background_ids, signal_ids, background_hash.clone())
        .with_rank_by(aggregator.config().rank_by);
    store.write_manifest(&manifest)?;

    info!(
        signals = ranked.len(),
        background_hash = %background_hash,
        run_id = %manifest.run_id,
        output = %store.root().display(),
        "Optimize run finished"
    );

    Ok(OptimizeRun {
        output_dir: store.root().to_path_buf(),
        background_hash,
        ranked,
    })
}
