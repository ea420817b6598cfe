//! Concrete cut combinations produced while walking the grid.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::template::SelectionTemplate;

/// Hex digest identifying one concrete cut combination.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CutHash(String);

impl CutHash {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CutHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CutHash {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A dimension bound to one concrete pivot tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct CutPoint<'a> {
    pub template: &'a SelectionTemplate,
    pub pivot: Vec<f64>,
    pub fixed: bool,
}

impl CutPoint<'_> {
    pub fn selection(&self) -> String {
        self.template.render(&self.pivot)
    }
}

/// One point of the grid: a pivot tuple for every dimension, in dimension
/// order. Borrows the templates of the grid it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct CutAssignment<'a> {
    points: Vec<CutPoint<'a>>,
}

impl<'a> CutAssignment<'a> {
    pub fn new(points: Vec<CutPoint<'a>>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[CutPoint<'a>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Owned, serializable copy for reporting.
    pub fn to_resolved(&self) -> Vec<ResolvedCut> {
        self.points
            .iter()
            .map(|p| ResolvedCut {
                fixed: p.fixed,
                pivot: p.pivot.clone(),
                selections: p.template.as_str().to_string(),
            })
            .collect()
    }
}

/// Persisted form of one resolved dimension of a cut.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedCut {
    pub fixed: bool,
    pub pivot: Vec<f64>,
    pub selections: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_copy_keeps_order_and_flags() {
        let a = SelectionTemplate::parse("met > {0}").unwrap();
        let b = SelectionTemplate::parse("nJets >= {0}").unwrap();
        let cut = CutAssignment::new(vec![
            CutPoint { template: &a, pivot: vec![200.0], fixed: false },
            CutPoint { template: &b, pivot: vec![4.0], fixed: true },
        ]);
        assert_eq!(cut.len(), 2);
        assert_eq!(cut.points()[0].selection(), "met > 200");

        let resolved = cut.to_resolved();
        assert_eq!(resolved[1].selections, "nJets >= {0}");
        assert!(resolved[1].fixed);
        assert_eq!(resolved[0].pivot, vec![200.0]);
    }

    #[test]
    fn hash_is_transparent_in_json() {
        let h = CutHash::new("abc123");
        assert_eq!(serde_json::to_string(&h).unwrap(), "\"abc123\"");
        assert_eq!(h.to_string(), "abc123");
    }
}
