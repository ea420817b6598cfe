//! Per-sample count records keyed by cut hash.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, AddAssign};

use crate::cut::CutHash;

/// Which flavour of count a yield or significance refers to.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CountKind {
    /// Number of events passing, unweighted.
    Raw,
    /// Sum of event weights passing.
    Weighted,
    /// Weighted sum normalized by the sample's scale factor.
    #[default]
    Scaled,
}

impl CountKind {
    pub const ALL: [CountKind; 3] = [CountKind::Raw, CountKind::Weighted, CountKind::Scaled];

    pub fn as_str(&self) -> &'static str {
        match self {
            CountKind::Raw => "raw",
            CountKind::Weighted => "weighted",
            CountKind::Scaled => "scaled",
        }
    }
}

impl fmt::Display for CountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CountKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(CountKind::Raw),
            "weighted" => Ok(CountKind::Weighted),
            "scaled" => Ok(CountKind::Scaled),
            other => Err(format!("unknown count kind `{other}` (raw, weighted, scaled)")),
        }
    }
}

/// Counts for one cut in one sample group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CountRecord {
    pub raw: f64,
    pub weighted: f64,
    #[serde(default)]
    pub scaled: f64,
}

impl CountRecord {
    pub fn new(raw: f64, weighted: f64, scale_factor: f64) -> Self {
        Self {
            raw,
            weighted,
            scaled: weighted * scale_factor,
        }
    }

    pub fn get(&self, kind: CountKind) -> f64 {
        match kind {
            CountKind::Raw => self.raw,
            CountKind::Weighted => self.weighted,
            CountKind::Scaled => self.scaled,
        }
    }

    pub fn get_mut(&mut self, kind: CountKind) -> &mut f64 {
        match kind {
            CountKind::Raw => &mut self.raw,
            CountKind::Weighted => &mut self.weighted,
            CountKind::Scaled => &mut self.scaled,
        }
    }
}

impl Add for CountRecord {
    type Output = CountRecord;

    fn add(self, rhs: CountRecord) -> CountRecord {
        CountRecord {
            raw: self.raw + rhs.raw,
            weighted: self.weighted + rhs.weighted,
            scaled: self.scaled + rhs.scaled,
        }
    }
}

impl AddAssign for CountRecord {
    fn add_assign(&mut self, rhs: CountRecord) {
        *self = *self + rhs;
    }
}

/// Every cut's counts for one sample group; ordered so persisted files
/// are byte-stable.
pub type CountTable = BTreeMap<CutHash, CountRecord>;
