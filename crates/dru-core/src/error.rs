//! Error types for the DRU core crate.

use thiserror::Error;

/// Errors produced while encoding, building, evaluating or training a
/// data re-uploading classifier.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DruError {
    /// Malformed input: zero widths, empty feature vectors, labels out of range.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Angle-row, qubit-slot or tensor shapes do not line up.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Unknown or unsupported configuration value.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An operation that averages over samples received none.
    #[error("{0} is empty")]
    EmptyDataset(&'static str),

    /// A loss, gradient or eigenvalue came out NaN or infinite.
    #[error("Numerical instability in {context}: got {value}")]
    NumericalInstability {
        /// Where the non-finite value appeared.
        context: String,
        /// The offending value.
        value: f64,
    },

    /// File-system failure while persisting or loading.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON/YAML (de)serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for DruError {
    fn from(e: serde_json::Error) -> Self {
        DruError::Serialization(e.to_string())
    }
}

impl From<serde_yaml_ng::Error> for DruError {
    fn from(e: serde_yaml_ng::Error) -> Self {
        DruError::Serialization(e.to_string())
    }
}

/// Result type for DRU operations.
pub type DruResult<T> = Result<T, DruError>;

/// Return `value` if it is finite, otherwise a [`DruError::NumericalInstability`].
pub(crate) fn ensure_finite(value: f64, context: impl Into<String>) -> DruResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DruError::NumericalInstability {
            context: context.into(),
            value,
        })
    }
}
