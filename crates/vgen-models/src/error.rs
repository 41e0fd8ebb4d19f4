//! Model validation errors.

use thiserror::Error;

use crate::timestamp::TimestampError;

/// Result type for model construction.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised when building model values from untrusted input.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("Invalid interval: start {start} must be finite and <= end {end}")]
    InvalidInterval { start: f64, end: f64 },

    #[error("Invalid clip reference: {0}")]
    InvalidClipReference(String),

    #[error("Invalid duration value: {0}")]
    InvalidDuration(String),

    #[error("Timestamp error: {0}")]
    Timestamp(#[from] TimestampError),
}
