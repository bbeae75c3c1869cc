//! REST error taxonomy.

use serde_json::Value;
use thiserror::Error;

/// Copyable classification of a [`RestError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Timeout,
    Connection,
    InsufficientBalance,
    InvalidOrdStatus,
    InvalidOrderId,
    InvalidOrderQty,
    InvalidOrder,
    Unauthorized,
    Closed,
    MaxRetries,
    InvalidArgument,
    Http,
    Decode,
}

#[derive(Debug, Error)]
pub enum RestError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Insufficient available balance: {0}")]
    InsufficientBalance(String),

    #[error("Invalid ordStatus: {0}")]
    InvalidOrdStatus(String),

    #[error("Invalid orderID: {0}")]
    InvalidOrderId(String),

    #[error("Invalid orderQty: {0}")]
    InvalidOrderQty(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Unauthorized, client closed: {0}")]
    Unauthorized(String),

    #[error("Client is closed")]
    Closed,

    #[error("Max retries ({retries}) exceeded for {verb} {path}: {cause}")]
    MaxRetries {
        verb: &'static str,
        path: String,
        retries: u32,
        payload: Option<Value>,
        cause: Box<RestError>,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Connection(_) => ErrorKind::Connection,
            Self::InsufficientBalance(_) => ErrorKind::InsufficientBalance,
            Self::InvalidOrdStatus(_) => ErrorKind::InvalidOrdStatus,
            Self::InvalidOrderId(_) => ErrorKind::InvalidOrderId,
            Self::InvalidOrderQty(_) => ErrorKind::InvalidOrderQty,
            Self::InvalidOrder(_) => ErrorKind::InvalidOrder,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Closed => ErrorKind::Closed,
            Self::MaxRetries { .. } => ErrorKind::MaxRetries,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Http { .. } => ErrorKind::Http,
            Self::Json(_) => ErrorKind::Decode,
        }
    }

    /// Transport failures the client retries on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connection(_))
    }

    /// Payload of the request that exhausted its retries.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            Self::MaxRetries { payload, .. } => payload.as_ref(),
            _ => None,
        }
    }
}

pub type RestResult<T> = Result<T, RestError>;
