//! Prometheus metrics and structured logging for kola.
//!
//! - Structured logging with tracing (JSON in production)
//! - Process-wide counters for dispatch, validation, retries and reconnects

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
