//! Error types for the microarray-eda library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum EdaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid expression value '{value}' at row {row}, column {col}")]
    InvalidValue {
        value: String,
        row: usize,
        col: usize,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Validation failed: {0}")]
    Validation(ValidationFailure),

    #[error("Missing column '{0}' in metadata")]
    MissingColumn(String),

    #[error("Formula parse error: {0}")]
    FormulaParse(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Dataset source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The specific correspondence invariant violated by a validation run.
///
/// Each variant names which expression/metadata invariant failed, so
/// callers can report the failure precisely instead of continuing on
/// mismatched tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    /// Expression column count differs from metadata row count.
    SampleCount { expression: usize, metadata: usize },
    /// Sample identifiers disagree at a position.
    SampleIdMismatch {
        index: usize,
        expression: String,
        metadata: String,
    },
    /// A sample identifier occurs more than once.
    DuplicateSampleId(String),
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationFailure::SampleCount {
                expression,
                metadata,
            } => write!(
                f,
                "expression has {} sample columns but metadata has {} rows",
                expression, metadata
            ),
            ValidationFailure::SampleIdMismatch {
                index,
                expression,
                metadata,
            } => write!(
                f,
                "sample id mismatch at position {}: expression '{}' vs metadata '{}'",
                index, expression, metadata
            ),
            ValidationFailure::DuplicateSampleId(id) => {
                write!(f, "duplicate sample id '{}'", id)
            }
        }
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, EdaError>;
