//! Run configuration for every pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use ro_optimizer::SignificanceConfig;
use ro_types::{validation_error, RoResult};

pub const DEFAULT_TREE: &str = "oTree";
pub const DEFAULT_EVENT_WEIGHT: &str = "event_weight";

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Settings for `cut`: evaluate the grid against every sample group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutConfig {
    /// Event file patterns; files are grouped by sample id.
    pub files: Vec<String>,
    pub supercuts: PathBuf,
    pub tree_name: String,
    /// Per-event weight expression.
    pub event_weight: String,
    /// Sample metadata for scale factors; without it every sample scales by 1.
    pub metadata: Option<PathBuf>,
    pub num_workers: usize,
    pub output_dir: PathBuf,
    pub overwrite: bool,
}

impl Default for CutConfig {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            supercuts: PathBuf::from("supercuts.json"),
            tree_name: DEFAULT_TREE.to_string(),
            event_weight: DEFAULT_EVENT_WEIGHT.to_string(),
            metadata: None,
            num_workers: default_workers(),
            output_dir: PathBuf::from("cuts"),
            overwrite: false,
        }
    }
}

impl CutConfig {
    pub fn new(files: Vec<String>, supercuts: impl Into<PathBuf>) -> Self {
        Self {
            files,
            supercuts: supercuts.into(),
            ..Default::default()
        }
    }

    pub fn with_tree_name(mut self, tree_name: &str) -> Self {
        self.tree_name = tree_name.to_string();
        self
    }

    pub fn with_event_weight(mut self, expression: &str) -> Self {
        self.event_weight = expression.to_string();
        self
    }

    pub fn with_metadata(mut self, path: impl Into<PathBuf>) -> Self {
        self.metadata = Some(path.into());
        self
    }

    pub fn with_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn with_output(mut self, dir: impl Into<PathBuf>, overwrite: bool) -> Self {
        self.output_dir = dir.into();
        self.overwrite = overwrite;
        self
    }

    pub fn validate(&self) -> RoResult<()> {
        if self.files.is_empty() {
            return Err(validation_error!("no event files given"));
        }
        if self.num_workers == 0 {
            return Err(validation_error!("worker count must be at least 1"));
        }
        if self.event_weight.trim().is_empty() {
            return Err(validation_error!("event weight expression is empty"));
        }
        Ok(())
    }
}

/// Settings for `optimize`: merge backgrounds and rank every signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeConfig {
    pub signals: Vec<String>,
    pub backgrounds: Vec<String>,
    /// Directory holding the `<sample>.json` count tables.
    pub search_dir: PathBuf,
    pub significance: SignificanceConfig,
    /// Supplies the luminosity when `luminosity` is not set.
    pub metadata: Option<PathBuf>,
    pub luminosity: Option<f64>,
    /// `sample id or group → factor`.
    pub rescale: Option<PathBuf>,
    /// `sample id → group`.
    pub sample_groups: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub overwrite: bool,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            signals: Vec::new(),
            backgrounds: Vec::new(),
            search_dir: PathBuf::from("cuts"),
            significance: SignificanceConfig::default(),
            metadata: None,
            luminosity: None,
            rescale: None,
            sample_groups: None,
            output_dir: PathBuf::from("significances"),
            overwrite: false,
        }
    }
}

impl OptimizeConfig {
    pub fn new(signals: Vec<String>, backgrounds: Vec<String>) -> Self {
        Self {
            signals,
            backgrounds,
            ..Default::default()
        }
    }

    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dir = dir.into();
        self
    }

    pub fn with_significance(mut self, significance: SignificanceConfig) -> Self {
        self.significance = significance;
        self
    }

    pub fn with_luminosity(mut self, luminosity: f64) -> Self {
        self.luminosity = Some(luminosity);
        self
    }

    pub fn with_rescale(mut self, rescale: impl Into<PathBuf>, groups: Option<PathBuf>) -> Self {
        self.rescale = Some(rescale.into());
        self.sample_groups = groups;
        self
    }

    pub fn with_output(mut self, dir: impl Into<PathBuf>, overwrite: bool) -> Self {
        self.output_dir = dir.into();
        self.overwrite = overwrite;
        self
    }

    pub fn validate(&self) -> RoResult<()> {
        if self.signals.is_empty() {
            return Err(validation_error!("no signal samples given"));
        }
        if self.backgrounds.is_empty() {
            return Err(validation_error!("no background samples given"));
        }
        self.significance.validate()
    }
}

/// Settings for `hash`: recover the cuts behind hashes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashConfig {
    /// Hashes, or files listing them when `from_files` is set.
    pub hashes: Vec<String>,
    pub from_files: bool,
    pub supercuts: PathBuf,
    pub output_dir: PathBuf,
    pub overwrite: bool,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            hashes: Vec::new(),
            from_files: false,
            supercuts: PathBuf::from("supercuts.json"),
            output_dir: PathBuf::from("outputHash"),
            overwrite: false,
        }
    }
}

impl HashConfig {
    pub fn new(hashes: Vec<String>, supercuts: impl Into<PathBuf>) -> Self {
        Self {
            hashes,
            supercuts: supercuts.into(),
            ..Default::default()
        }
    }

    pub fn reading_files(mut self) -> Self {
        self.from_files = true;
        self
    }

    pub fn with_output(mut self, dir: impl Into<PathBuf>, overwrite: bool) -> Self {
        self.output_dir = dir.into();
        self.overwrite = overwrite;
        self
    }
}

/// Settings for `generate`: derive a supercut template from one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateConfig {
    pub file: PathBuf,
    pub tree_name: String,
    /// Columns it references are left out of the template.
    pub event_weight: String,
    /// Glob patterns of columns to give a fixed pivot.
    pub fixed: Vec<String>,
    /// Glob patterns of columns to leave out.
    pub skip: Vec<String>,
    pub output: PathBuf,
    pub overwrite: bool,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::new(),
            tree_name: DEFAULT_TREE.to_string(),
            event_weight: DEFAULT_EVENT_WEIGHT.to_string(),
            fixed: Vec::new(),
            skip: Vec::new(),
            output: PathBuf::from("supercuts.json"),
            overwrite: false,
        }
    }
}

impl GenerateConfig {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            ..Default::default()
        }
    }

    pub fn with_fixed(mut self, patterns: Vec<String>) -> Self {
        self.fixed = patterns;
        self
    }

    pub fn with_skip(mut self, patterns: Vec<String>) -> Self {
        self.skip = patterns;
        self
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>, overwrite: bool) -> Self {
        self.output = path.into();
        self.overwrite = overwrite;
        self
    }
}

/// Settings for `summary`: best cut per signal of one optimize run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryConfig {
    pub search_dir: PathBuf,
    pub output: PathBuf,
    pub overwrite: bool,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            search_dir: PathBuf::from("significances"),
            output: PathBuf::from("summary.json"),
            overwrite: false,
        }
    }
}
