//! Significance results and the sentinel values for statistical edge cases.

use serde::{Deserialize, Deserializer, Serialize};

use crate::counts::CountKind;
use crate::cut::CutHash;

/// Reasons a significance could not be computed. Carried as ordinary
/// negative floats so they sort together with real values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    SignalInsignificant,
    BackgroundInsignificant,
    BackgroundUnreliable,
}

impl Sentinel {
    pub fn value(&self) -> f64 {
        match self {
            Sentinel::SignalInsignificant => -1.0,
            Sentinel::BackgroundInsignificant => -2.0,
            Sentinel::BackgroundUnreliable => -3.0,
        }
    }

    pub fn classify(value: f64) -> Option<Sentinel> {
        if value == -1.0 {
            Some(Sentinel::SignalInsignificant)
        } else if value == -2.0 {
            Some(Sentinel::BackgroundInsignificant)
        } else if value == -3.0 {
            Some(Sentinel::BackgroundUnreliable)
        } else {
            None
        }
    }
}

/// JSON has no NaN; serde_json writes it as `null`, so read `null` back
/// as NaN.
fn nan_from_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// Signal and merged background yield for one cut.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct YieldPair {
    #[serde(deserialize_with = "nan_from_null")]
    pub sig: f64,
    #[serde(deserialize_with = "nan_from_null")]
    pub bkg: f64,
}

/// Significance of one cut for one signal sample, for a single count kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificanceRecord {
    pub hash: CutHash,
    pub significance: f64,
    pub signal_yield: f64,
    pub background_yield: f64,
}

/// One row of a ranked significance file: every count kind side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificanceEntry {
    pub hash: CutHash,
    #[serde(deserialize_with = "nan_from_null")]
    pub significance_raw: f64,
    #[serde(deserialize_with = "nan_from_null")]
    pub significance_weighted: f64,
    #[serde(deserialize_with = "nan_from_null")]
    pub significance_scaled: f64,
    pub yield_raw: YieldPair,
    pub yield_weighted: YieldPair,
    pub yield_scaled: YieldPair,
}

impl SignificanceEntry {
    pub fn significance(&self, kind: CountKind) -> f64 {
        match kind {
            CountKind::Raw => self.significance_raw,
            CountKind::Weighted => self.significance_weighted,
            CountKind::Scaled => self.significance_scaled,
        }
    }

    pub fn yields(&self, kind: CountKind) -> YieldPair {
        match kind {
            CountKind::Raw => self.yield_raw,
            CountKind::Weighted => self.yield_weighted,
            CountKind::Scaled => self.yield_scaled,
        }
    }

    pub fn record(&self, kind: CountKind) -> SignificanceRecord {
        let yields = self.yields(kind);
        SignificanceRecord {
            hash: self.hash.clone(),
            significance: self.significance(kind),
            signal_yield: yields.sig,
            background_yield: yields.bkg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_round_trip_through_floats() {
        for s in [
            Sentinel::SignalInsignificant,
            Sentinel::BackgroundInsignificant,
            Sentinel::BackgroundUnreliable,
        ] {
            assert_eq!(Sentinel::classify(s.value()), Some(s));
        }
        assert_eq!(Sentinel::classify(2.3), None);
        assert_eq!(Sentinel::classify(-1.5), None);
    }

    #[test]
    fn entry_projects_per_kind() {
        let entry = SignificanceEntry {
            hash: CutHash::new("h"),
            significance_raw: 1.0,
            significance_weighted: 2.0,
            significance_scaled: 3.0,
            yield_raw: YieldPair { sig: 10.0, bkg: 100.0 },
            yield_weighted: YieldPair { sig: 5.0, bkg: 50.0 },
            yield_scaled: YieldPair { sig: 2.0, bkg: 20.0 },
        };
        let rec = entry.record(CountKind::Weighted);
        assert_eq!(rec.significance, 2.0);
        assert_eq!(rec.signal_yield, 5.0);
        assert_eq!(rec.background_yield, 50.0);

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["yield_scaled"]["bkg"], 20.0);
        assert_eq!(json["significance_raw"], 1.0);
    }

    #[test]
    fn nan_significance_survives_json() {
        let entry = SignificanceEntry {
            hash: CutHash::new("h"),
            significance_raw: f64::NAN,
            significance_weighted: -2.0,
            significance_scaled: 0.5,
            yield_raw: YieldPair::default(),
            yield_weighted: YieldPair::default(),
            yield_scaled: YieldPair::default(),
        };
        let text = serde_json::to_string(&entry).unwrap();
        assert!(text.contains("\"significance_raw\":null"));

        let back: SignificanceEntry = serde_json::from_str(&text).unwrap();
        assert!(back.significance_raw.is_nan());
        assert_eq!(back.significance_weighted, -2.0);
    }
}
