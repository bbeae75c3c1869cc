//! Application configuration.

use crate::campaign::CampaignConfig;
use crate::error::{AppError, AppResult};
use kola_core::Credentials;
use kola_dispatch::DispatcherConfig;
use kola_orders::AttemptConfig;
use kola_rest::{RestConfig, RetryPolicy, LIVE_URL, MAX_PREFIX_LEN, TESTNET_URL};
use kola_trail::TrailConfig;
use kola_ws::{ConnectionConfig, DEFAULT_MAX_TABLE_LEN};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Environment variables overriding the configured credentials.
pub const API_KEY_ENV: &str = "KOLA_API_KEY";
pub const API_SECRET_ENV: &str = "KOLA_API_SECRET";

/// Longest client order id the exchange accepts.
const MAX_CL_ORD_ID_LEN: usize = 36;
/// `-<role>O` plus the opaque suffix.
const CL_ORD_ID_SUFFIX_LEN: usize = 15;

fn default_symbol() -> String {
    "XBTUSD".to_string()
}

fn default_prefix() -> String {
    "mlk_".to_string()
}

// ============================================================================
// [rest]
// ============================================================================

fn default_timeout_ms() -> u64 {
    12_000
}

fn default_single_pause_ms() -> u64 {
    1_500
}

fn default_bulk_pause_ms() -> u64 {
    300
}

fn default_expires_ttl_secs() -> i64 {
    60
}

/// REST settings. Endpoint, symbol and prefix come from the top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestSection {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_single_pause_ms")]
    pub single_pause_ms: u64,
    #[serde(default = "default_bulk_pause_ms")]
    pub bulk_pause_ms: u64,
    /// Validity of a request signature.
    #[serde(default = "default_expires_ttl_secs")]
    pub expires_ttl_secs: i64,
}

impl Default for RestSection {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            single_pause_ms: default_single_pause_ms(),
            bulk_pause_ms: default_bulk_pause_ms(),
            expires_ttl_secs: default_expires_ttl_secs(),
        }
    }
}

// ============================================================================
// [websocket]
// ============================================================================

fn default_max_table_len() -> usize {
    DEFAULT_MAX_TABLE_LEN
}

fn default_reconnect_base_delay_ms() -> u64 {
    1_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    60_000
}

fn default_heartbeat_interval_ms() -> u64 {
    5_000
}

fn default_ready_poll_ms() -> u64 {
    100
}

fn default_ready_timeout_ms() -> u64 {
    30_000
}

/// WebSocket configuration subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsConfig {
    /// Rows kept per mirrored table, the order table excepted.
    #[serde(default = "default_max_table_len")]
    pub max_table_len: usize,
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_ready_poll_ms")]
    pub ready_poll_ms: u64,
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            max_table_len: default_max_table_len(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            ready_poll_ms: default_ready_poll_ms(),
            ready_timeout_ms: default_ready_timeout_ms(),
        }
    }
}

// ============================================================================
// AppConfig
// ============================================================================

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Trade on the live exchange instead of the testnet.
    #[serde(default)]
    pub live: bool,
    /// Route orders to an in-memory gateway instead of the exchange.
    #[serde(default)]
    pub dry_run: bool,
    /// REST endpoint override, mostly for local test servers.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Prefix of every client order id the bot mints.
    #[serde(default = "default_prefix")]
    pub order_id_prefix: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default)]
    pub rest: RestSection,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub websocket: WsConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub trail: TrailConfig,
    #[serde(default)]
    pub attempt: AttemptConfig,
    #[serde(default)]
    pub campaigns: Vec<CampaignConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            live: false,
            dry_run: false,
            base_url: None,
            symbol: default_symbol(),
            order_id_prefix: default_prefix(),
            api_key: None,
            api_secret: None,
            rest: RestSection::default(),
            retry: RetryPolicy::default(),
            websocket: WsConfig::default(),
            dispatcher: DispatcherConfig::default(),
            trail: TrailConfig::default(),
            attempt: AttemptConfig::default(),
            campaigns: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.symbol.is_empty() {
            return Err(AppError::Config("symbol must not be empty".to_string()));
        }
        if self.order_id_prefix.is_empty() || self.order_id_prefix.len() > MAX_PREFIX_LEN {
            return Err(AppError::Config(format!(
                "order_id_prefix must have 1 to {MAX_PREFIX_LEN} characters, got {:?}",
                self.order_id_prefix
            )));
        }
        self.trail
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let max_name = MAX_CL_ORD_ID_LEN - CL_ORD_ID_SUFFIX_LEN - self.order_id_prefix.len();
        let mut names = HashSet::new();
        for campaign in &self.campaigns {
            campaign.validate()?;
            if campaign.name.len() > max_name {
                return Err(AppError::Config(format!(
                    "campaign name {:?} longer than {max_name} characters",
                    campaign.name
                )));
            }
            if !names.insert(campaign.name.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate campaign name {:?}",
                    campaign.name
                )));
            }
        }
        Ok(())
    }

    /// REST endpoint for the configured network.
    pub fn api_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.clone(),
            None if self.live => LIVE_URL.to_string(),
            None => TESTNET_URL.to_string(),
        }
    }

    /// Realtime endpoint derived from the REST endpoint.
    pub fn ws_url(&self) -> String {
        realtime_url(&self.api_url())
    }

    /// Credentials from the environment, else from the file.
    pub fn credentials(&self) -> Option<Credentials> {
        let key = std::env::var(API_KEY_ENV).ok().or_else(|| self.api_key.clone());
        let secret = std::env::var(API_SECRET_ENV)
            .ok()
            .or_else(|| self.api_secret.clone());
        match (key, secret) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Some(Credentials::new(key, secret))
            }
            _ => None,
        }
    }

    pub fn rest_config(&self) -> RestConfig {
        RestConfig {
            base_url: self.api_url(),
            symbol: self.symbol.clone(),
            order_id_prefix: self.order_id_prefix.clone(),
            timeout_ms: self.rest.timeout_ms,
            single_pause_ms: self.rest.single_pause_ms,
            bulk_pause_ms: self.rest.bulk_pause_ms,
            expires_ttl_secs: self.rest.expires_ttl_secs,
            retry: self.retry.clone(),
        }
    }

    pub fn connection_config(&self, credentials: Option<Credentials>) -> ConnectionConfig {
        ConnectionConfig {
            url: self.ws_url(),
            symbol: self.symbol.clone(),
            credentials,
            reconnect_base_delay_ms: self.websocket.reconnect_base_delay_ms,
            reconnect_max_delay_ms: self.websocket.reconnect_max_delay_ms,
            heartbeat_interval_ms: self.websocket.heartbeat_interval_ms,
            ready_poll_ms: self.websocket.ready_poll_ms,
            ready_timeout_ms: self.websocket.ready_timeout_ms,
            ..ConnectionConfig::default()
        }
    }

    /// Dispatcher settings with the top-level symbol and prefix.
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            symbol: self.symbol.clone(),
            order_id_prefix: self.order_id_prefix.clone(),
            ..self.dispatcher.clone()
        }
    }
}

/// `https://host/api/v1/` -> `wss://host/realtime`.
fn realtime_url(api_url: &str) -> String {
    let ws = api_url.replacen("http", "ws", 1);
    let base = match ws.find("/api/") {
        Some(idx) => &ws[..idx],
        None => ws.trim_end_matches('/'),
    };
    format!("{base}/realtime")
}

#[cfg(test)]
mod tests {
    use super::*;
    use kola_core::{OrdType, OrderSide};
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(!config.live);
        assert_eq!(config.symbol, "XBTUSD");
        assert_eq!(config.websocket.max_table_len, 1000);
        assert_eq!(config.rest.timeout_ms, 12_000);
        assert_eq!(config.retry.max_retries, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoints_follow_live_flag() {
        let mut config = AppConfig::default();
        assert_eq!(config.api_url(), TESTNET_URL);
        assert_eq!(config.ws_url(), "wss://testnet.bitmex.com/realtime");

        config.live = true;
        assert_eq!(config.api_url(), LIVE_URL);
        assert_eq!(config.ws_url(), "wss://www.bitmex.com/realtime");
    }

    #[test]
    fn test_base_url_override() {
        let config = AppConfig {
            base_url: Some("http://127.0.0.1:8080".to_string()),
            ..AppConfig::default()
        };
        assert_eq!(config.ws_url(), "ws://127.0.0.1:8080/realtime");
    }

    #[test]
    fn test_parse_sections() {
        let config = AppConfig::from_toml(
            r#"
            symbol = "ETHUSD"
            order_id_prefix = "tma_"

            [dispatcher]
            step_ms = 50

            [trail]
            tail_pct = 1.5

            [retry]
            max_retries = 5

            [[campaigns]]
            name = "entry"
            side = "Buy"
            qty = "100"
            ord_type = "Limit"
            price_low_offset = "-20"
            price_high_offset = "-10"
            trail = true
            "#,
        )
        .unwrap();

        assert_eq!(config.symbol, "ETHUSD");
        assert_eq!(config.dispatcher.step_ms, 50);
        assert_eq!(config.trail.tail_pct, 1.5);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.attempt, AttemptConfig::default());

        let campaign = &config.campaigns[0];
        assert_eq!(campaign.side, OrderSide::Buy);
        assert_eq!(campaign.ord_type, OrdType::Limit);
        assert_eq!(campaign.qty, dec!(100));
        assert_eq!(campaign.trials, 1);
        assert!(campaign.trail);

        let dispatcher = config.dispatcher_config();
        assert_eq!(dispatcher.symbol, "ETHUSD");
        assert_eq!(dispatcher.order_id_prefix, "tma_");
        assert_eq!(dispatcher.step_ms, 50);
        assert_eq!(config.rest_config().order_id_prefix, "tma_");
    }

    #[test]
    fn test_prefix_too_long_rejected() {
        let config = AppConfig {
            order_id_prefix: "abcdefghijklmn".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_duplicate_campaign_names_rejected() {
        let result = AppConfig::from_toml(
            r#"
            [[campaigns]]
            name = "entry"
            side = "Buy"
            qty = "1"
            price_low_offset = "-2"
            price_high_offset = "2"

            [[campaigns]]
            name = "entry"
            side = "Sell"
            qty = "1"
            price_low_offset = "-2"
            price_high_offset = "2"
            "#,
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_connection_config_carries_websocket_section() {
        let mut config = AppConfig::default();
        config.websocket.ready_poll_ms = 25;
        let ws = config.connection_config(None);
        assert_eq!(ws.url, "wss://testnet.bitmex.com/realtime");
        assert_eq!(ws.symbol, "XBTUSD");
        assert_eq!(ws.ready_poll_ms, 25);
        assert!(ws.credentials.is_none());
    }
}
