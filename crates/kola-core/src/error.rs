//! Error types for kola-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid order id: {0}")]
    InvalidOrderId(String),

    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("Scientific notation is not supported: {0}")]
    UnsupportedNotation(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),

    #[error("Invalid signing key: {0}")]
    InvalidKey(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
