//! Recovering the cut combination behind a hash.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

use ro_types::{CutHash, ResolvedCut};

use crate::grid::CutGrid;
use crate::hash::cut_hash;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupResult {
    pub resolved: BTreeMap<CutHash, Vec<ResolvedCut>>,
    pub unresolved: BTreeSet<CutHash>,
    /// How many combinations were hashed before stopping.
    pub checked: usize,
}

impl LookupResult {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Walk `grid` until every requested hash is found or the grid is
/// exhausted. Hashes the grid cannot produce end up in `unresolved` with a
/// warning.
pub fn reverse_lookup<I>(grid: &CutGrid<'_>, hashes: I) -> LookupResult
where
    I: IntoIterator<Item = CutHash>,
{
    let mut pending: BTreeSet<CutHash> = hashes.into_iter().collect();
    let mut result = LookupResult::default();
    if pending.is_empty() {
        return result;
    }

    info!(
        hashes = pending.len(),
        combinations = grid.len(),
        "Looking up cut hashes"
    );

    for cut in grid.iter() {
        result.checked += 1;
        let hash = cut_hash(&cut);
        if pending.remove(&hash) {
            result.resolved.insert(hash, cut.to_resolved());
            if pending.is_empty() {
                break;
            }
        }
    }

    for hash in &pending {
        warn!(hash = %hash, "Hash not produced by these supercuts");
    }
    result.unresolved = pending;
    result
}
