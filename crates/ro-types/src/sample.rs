//! Sample groups and their normalization metadata.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One dataset and its backing files; the unit of parallel dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleGroup {
    pub id: String,
    pub files: Vec<PathBuf>,
    /// Name of the event table inside each file.
    pub tree_name: String,
}

impl SampleGroup {
    pub fn new(id: impl Into<String>, files: Vec<PathBuf>, tree_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            files,
            tree_name: tree_name.into(),
        }
    }
}

/// Normalization inputs for one sample. Fields are optional on disk so a
/// missing one can be reported against the sample that lacks it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleMetadata {
    #[serde(default, alias = "cross section", skip_serializing_if = "Option::is_none")]
    pub cross_section: Option<f64>,
    #[serde(default, alias = "filter efficiency", skip_serializing_if = "Option::is_none")]
    pub filter_efficiency: Option<f64>,
    #[serde(default, alias = "k-factor", skip_serializing_if = "Option::is_none")]
    pub k_factor: Option<f64>,
    #[serde(default, alias = "num events", skip_serializing_if = "Option::is_none")]
    pub num_processed_events: Option<f64>,
}

impl SampleMetadata {
    pub fn new(cross_section: f64, filter_efficiency: f64, k_factor: f64, num_processed_events: f64) -> Self {
        Self {
            cross_section: Some(cross_section),
            filter_efficiency: Some(filter_efficiency),
            k_factor: Some(k_factor),
            num_processed_events: Some(num_processed_events),
        }
    }
}

fn default_luminosity() -> f64 {
    1.0
}

/// Sample id → metadata, plus the integrated luminosity (fb⁻¹) the
/// scaled yields are quoted for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataTable {
    #[serde(default = "default_luminosity")]
    pub luminosity: f64,
    #[serde(default)]
    pub samples: BTreeMap<String, SampleMetadata>,
}

impl MetadataTable {
    pub fn new(luminosity: f64) -> Self {
        Self {
            luminosity,
            samples: BTreeMap::new(),
        }
    }

    pub fn with_sample(mut self, id: impl Into<String>, metadata: SampleMetadata) -> Self {
        self.samples.insert(id.into(), metadata);
        self
    }

    pub fn get(&self, id: &str) -> Option<&SampleMetadata> {
        self.samples.get(id)
    }
}

impl Default for MetadataTable {
    fn default() -> Self {
        Self::new(default_luminosity())
    }
}
