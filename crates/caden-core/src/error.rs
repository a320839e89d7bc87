//! Error types for caden-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Value out of fixed-point range: {0}")]
    OutOfRange(String),

    #[error("Invalid stream key: {0}")]
    InvalidStreamKey(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
