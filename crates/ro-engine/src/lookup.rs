//! The `hash` pipeline: write out the cuts behind a set of hashes.

use serde::Deserialize;
use std::path::PathBuf;
use tracing::{info, warn};

use ro_data::{read_json, read_supercuts, ResultStore};
use ro_optimizer::{reverse_lookup, CutGrid, LookupResult};
use ro_types::{validation_error, CutHash, RoResult};

use crate::config::HashConfig;

/// Any JSON record carrying a `hash` field; ranked files and summaries both
/// qualify.
#[derive(Deserialize)]
struct HashedRecord {
    hash: CutHash,
}

#[derive(Debug, Clone)]
pub struct HashRun {
    pub output_dir: PathBuf,
    pub lookup: LookupResult,
}

fn requested_hashes(config: &HashConfig) -> RoResult<Vec<CutHash>> {
    if !config.from_files {
        return Ok(config.hashes.iter().map(|h| CutHash::from(h.as_str())).collect());
    }
    let mut hashes = Vec::new();
    for file in &config.hashes {
        let records: Vec<HashedRecord> = read_json(file)?;
        hashes.extend(records.into_iter().map(|r| r.hash));
    }
    Ok(hashes)
}

/// Run `hash`.
pub fn run_hash(config: &HashConfig) -> RoResult<HashRun> {
    let hashes = requested_hashes(config)?;
    if hashes.is_empty() {
        return Err(validation_error!("no hashes to look up"));
    }
    let supercuts = read_supercuts(&config.supercuts)?;
    let grid = CutGrid::new(&supercuts)?;
    let store = ResultStore::create(&config.output_dir, config.overwrite)?;

    let lookup = reverse_lookup(&grid, hashes);
    for (hash, cut) in &lookup.resolved {
        store.write_lookup(hash.as_str(), cut)?;
    }
    if !lookup.is_complete() {
        warn!(
            unresolved = lookup.unresolved.len(),
            "Some hashes did not resolve; were they produced with different supercuts?"
        );
    }
    info!(
        resolved = lookup.resolved.len(),
        checked = lookup.checked,
        output = %store.root().display(),
        "Hash lookup finished"
    );

    Ok(HashRun {
        output_dir: store.root().to_path_buf(),
        lookup,
    })
}
