//! # ro-optimizer
//!
//! Cut-grid search for root-optimize.
//!
//! Enumerates every combination of a supercut set, hashes each one, counts
//! how many events pass in each sample group (in parallel, one group per
//! worker), and ranks cuts by expected significance of signal over the
//! merged background.

mod aggregate;
mod dispatch;
mod grid;
mod hash;
mod lookup;
mod scale;
mod selection;
mod significance;

pub use aggregate::{
    merge_backgrounds, merge_rescaled, rank_order, rank_signal, Aggregator, BackgroundRescale,
    RankedSignal, SignificanceConfig,
};
pub use dispatch::{DispatchReport, Dispatcher, ProgressEvent, SampleOutcome, WorkerAllocation};
pub use grid::{CutGrid, CutIter};
pub use hash::{cut_hash, resolved_hash, sample_set_hash};
pub use lookup::{reverse_lookup, LookupResult};
pub use scale::{scale_factor, scale_factors};
pub use selection::{selection_expression, SelectionEvaluator};
pub use significance::{binomial_exp_z, SignificanceInputs};
