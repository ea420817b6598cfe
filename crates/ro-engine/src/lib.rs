// root-optimize run orchestration
// Each pipeline reads its inputs, runs the optimizer and persists results.

pub mod config;
pub mod cut;
pub mod generate;
pub mod lookup;
pub mod optimize;
pub mod summary;

pub use config::{CutConfig, GenerateConfig, HashConfig, OptimizeConfig, SummaryConfig};
pub use cut::{run_cut, CutRun};
pub use generate::run_generate;
pub use lookup::{run_hash, HashRun};
pub use optimize::{run_optimize, OptimizeRun};
pub use summary::{run_summary, SummaryEntry};
