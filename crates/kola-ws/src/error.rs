//! Websocket and mirror error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("Message parse error: {0}")]
    ParseError(String),

    #[error("Subscription error: {0}")]
    SubscriptionError(String),

    #[error("Rejected by server: status={status}, error={error}")]
    Rejected { status: u16, error: String },

    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Instrument not found: {0}")]
    InstrumentNotFound(String),

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WsError {
    /// Errors that end the connection loop instead of triggering a reconnect.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SubscriptionError(_) | Self::Rejected { .. })
    }
}

pub type WsResult<T> = Result<T, WsError>;
