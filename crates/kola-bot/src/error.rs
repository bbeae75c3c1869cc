//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] kola_ws::WsError),

    #[error("REST error: {0}")]
    Rest(#[from] kola_rest::RestError),

    #[error("Condition error: {0}")]
    Condition(#[from] kola_condition::ConditionError),

    #[error("Order error: {0}")]
    Orders(#[from] kola_orders::OrdersError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] kola_telemetry::TelemetryError),

    #[error("No {0} available")]
    MissingMarketData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Shutdown requested")]
    Shutdown,
}

pub type AppResult<T> = Result<T, AppError>;
