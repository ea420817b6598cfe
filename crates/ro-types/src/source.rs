//! The seam to whatever evaluates string expressions over event columns.

use crate::errors::EvaluationError;

/// A read-only collection of events with named columns.
///
/// Implementations evaluate an expression once per event. Comparisons and
/// boolean operators yield `1.0` / `0.0`, so a product of a weight and a
/// selection is the weight where the selection passes and zero elsewhere.
pub trait EventSource {
    /// Human-readable identity used in error messages and logs.
    fn name(&self) -> &str;

    fn num_events(&self) -> usize;

    fn has_column(&self, column: &str) -> bool;

    fn column_names(&self) -> Vec<String>;

    /// Evaluate `expression` for every event.
    fn evaluate(&self, expression: &str) -> Result<Vec<f64>, EvaluationError>;
}
