//! Conditional order bot.
//!
//! Wires the kola crates into a runnable service:
//! - `config`: TOML configuration with environment overrides
//! - `campaign`: scheduled trials of conditional orders
//! - `app`: websocket mirror, gateway, dispatcher and campaign tasks

pub mod app;
pub mod campaign;
pub mod config;
pub mod error;

pub use app::Application;
pub use campaign::{Campaign, CampaignConfig, CampaignSummary};
pub use config::{AppConfig, RestSection, WsConfig};
pub use error::{AppError, AppResult};
