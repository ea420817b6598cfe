//! Deterministic identifiers for cut combinations and background sets.
//!
//! A cut is hashed from a canonical JSON form: one object per dimension, in
//! dimension order, with keys `fixed`, `pivot`, `selections` in that
//! (alphabetical) order. Pivots are rendered through
//! [`format_pivot`] so that a value and its round-tripped reading hash the
//! same. The digest is SHA-256, hex encoded.

use serde::Serialize;
use sha2::{Digest, Sha256};

use ro_types::{format_pivot, CutAssignment, CutHash, ResolvedCut};

#[derive(Serialize)]
struct CanonicalPoint<'a> {
    fixed: bool,
    pivot: Vec<String>,
    selections: &'a str,
}

fn digest<T: Serialize>(value: &T) -> String {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}

fn canonical_pivot(pivot: &[f64]) -> Vec<String> {
    pivot.iter().map(|&v| format_pivot(v)).collect()
}

/// Hash of one concrete cut combination.
pub fn cut_hash(cut: &CutAssignment<'_>) -> CutHash {
    let canonical: Vec<CanonicalPoint<'_>> = cut
        .points()
        .iter()
        .map(|p| CanonicalPoint {
            fixed: p.fixed,
            pivot: canonical_pivot(&p.pivot),
            selections: p.template.as_str(),
        })
        .collect();
    CutHash::new(digest(&canonical))
}

/// Hash of a persisted cut. Agrees with [`cut_hash`] for the assignment it
/// was resolved from.
pub fn resolved_hash(cut: &[ResolvedCut]) -> CutHash {
    let canonical: Vec<CanonicalPoint<'_>> = cut
        .iter()
        .map(|p| CanonicalPoint {
            fixed: p.fixed,
            pivot: canonical_pivot(&p.pivot),
            selections: &p.selections,
        })
        .collect();
    CutHash::new(digest(&canonical))
}

/// Order-independent hash of a set of sample ids.
pub fn sample_set_hash<S: AsRef<str>>(ids: &[S]) -> String {
    let mut sorted: Vec<&str> = ids.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    sorted.dedup();
    digest(&sorted)
}
