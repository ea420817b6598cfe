use thiserror::Error;

/// Main error type for root-optimize
#[derive(Error, Debug)]
pub enum RoError {
    #[error("Supercut error: {0}")]
    Supercut(#[from] SupercutError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl RoError {
    /// Configuration errors abort a run before any evaluation starts.
    ///
    /// Everything else is either a per-sample evaluation failure (isolated
    /// at the worker boundary) or an I/O failure at a pipeline seam.
    pub fn is_configuration(&self) -> bool {
        match self {
            RoError::Supercut(_) | RoError::Config(_) | RoError::Validation(_) => true,
            RoError::Data(e) => e.is_configuration(),
            _ => false,
        }
    }
}

/// Errors raised while loading or validating a supercut specification
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SupercutError {
    #[error("Found more than one supercut definition on {selections}")]
    DuplicateSelection { selections: String },

    #[error("Supercut {selections} must specify exactly one of `pivot` or `grid`")]
    AmbiguousKind { selections: String },

    #[error("Supercut {selections}: grid axis {axis} ({start}, {stop}, {step}) is empty")]
    EmptyAxis {
        selections: String,
        axis: usize,
        start: f64,
        stop: f64,
        step: f64,
    },

    #[error("Supercut {selections}: grid axis {axis} ({start}, {stop}, {step}) has more than {max} values")]
    AxisTooLong {
        selections: String,
        axis: usize,
        start: f64,
        stop: f64,
        step: f64,
        max: usize,
    },

    #[error("Supercut {selections}: grid axis {axis} must have exactly 3 entries, got {len}")]
    MalformedAxis {
        selections: String,
        axis: usize,
        len: usize,
    },

    #[error("Supercut {selections}: placeholder {{{index}}} exceeds pivot arity {arity}")]
    PlaceholderOutOfRange {
        selections: String,
        index: usize,
        arity: usize,
    },

    #[error("Supercut {selections}: malformed template: {message}")]
    MalformedTemplate { selections: String, message: String },

    #[error("Cut grid has no combinations")]
    EmptyGrid,

    #[error("Cut grid size overflows usize")]
    GridOverflow,
}

/// Errors around sample metadata, persisted tables and output locations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Missing metadata field `{field}` for sample {sample}")]
    MissingMetadataField { sample: String, field: String },

    #[error("Sample {sample} has {num_events} processed events; cannot scale")]
    ZeroProcessedEvents { sample: String, num_events: f64 },

    #[error("Output already exists: {path}")]
    OutputExists { path: String },

    #[error("Input not found: {path}")]
    InputNotFound { path: String },

    #[error("No files matched pattern {pattern}")]
    NoMatches { pattern: String },

    #[error("Invalid data format in {path}: {message}")]
    InvalidFormat { path: String, message: String },

    #[error("Data loading failed: {message}")]
    LoadingFailed { message: String },
}

impl DataError {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DataError::MissingMetadataField { .. }
                | DataError::ZeroProcessedEvents { .. }
                | DataError::OutputExists { .. }
                | DataError::NoMatches { .. }
        )
    }
}

/// Per-sample evaluation errors, caught at the worker boundary
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Columns {columns:?} not found in {source_name}")]
    MissingColumns {
        source_name: String,
        columns: Vec<String>,
    },

    #[error("Expression error in `{expression}`: {message}")]
    Expression { expression: String, message: String },

    #[error("Column {column} has {actual} rows, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Worker panicked: {message}")]
    Panicked { message: String },
}

/// Result type alias for root-optimize operations
pub type RoResult<T> = Result<T, RoError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::RoError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::RoError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::RoError::Config(format!($($arg)*))
    };
}
