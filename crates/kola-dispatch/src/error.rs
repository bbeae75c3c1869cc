//! Dispatcher error types.

use kola_rest::RestError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("REST error: {0}")]
    Rest(#[from] RestError),

    #[error("Missing field {field} for {ord_type}")]
    MissingField {
        field: &'static str,
        ord_type: String,
    },

    #[error("No market price available for {0}")]
    NoMarketPrice(String),

    #[error("Invalid request: {0}")]
    InvalidAction(String),

    #[error("Dispatcher channel closed")]
    ChannelClosed,
}

pub type DispatchResult<T> = Result<T, DispatchError>;
