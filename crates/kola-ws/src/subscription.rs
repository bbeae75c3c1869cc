//! Subscription topics and readiness tracking.
//!
//! Orders may only be evaluated once every required table has received its
//! initial `partial`. Account tables are only required when authenticated.

use crate::mirror::Mirror;

/// Tables required before market data can be read.
pub const MARKET_TABLES: [&str; 3] = ["instrument", "trade", "quote"];

/// Extra tables required on an authenticated session.
pub const ACCOUNT_TABLES: [&str; 3] = ["margin", "position", "order"];

/// Ready phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyPhase {
    /// Still waiting for partials.
    NotReady,
    /// Market tables seeded.
    ReadyMarket,
    /// Market and account tables seeded.
    ReadyAccount,
}

impl ReadyPhase {
    pub fn can_observe(&self) -> bool {
        matches!(self, Self::ReadyMarket | Self::ReadyAccount)
    }

    pub fn can_trade(&self) -> bool {
        matches!(self, Self::ReadyAccount)
    }
}

impl std::fmt::Display for ReadyPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotReady => write!(f, "NOT_READY"),
            Self::ReadyMarket => write!(f, "READY_MARKET"),
            Self::ReadyAccount => write!(f, "READY_ACCOUNT"),
        }
    }
}

/// Seed flags read from the mirror.
#[derive(Debug, Clone, Default)]
pub struct ReadyState {
    pub market_ready: bool,
    pub account_ready: bool,
    pub missing: Vec<&'static str>,
}

impl ReadyState {
    pub fn observe(mirror: &Mirror, authenticated: bool) -> Self {
        let missing_market: Vec<_> = MARKET_TABLES
            .into_iter()
            .filter(|t| !mirror.is_seeded(t))
            .collect();
        let missing_account: Vec<_> = if authenticated {
            ACCOUNT_TABLES
                .into_iter()
                .filter(|t| !mirror.is_seeded(t))
                .collect()
        } else {
            Vec::new()
        };
        Self {
            market_ready: missing_market.is_empty(),
            account_ready: authenticated && missing_account.is_empty(),
            missing: missing_market.into_iter().chain(missing_account).collect(),
        }
    }

    pub fn phase(&self) -> ReadyPhase {
        match (self.market_ready, self.account_ready) {
            (true, true) => ReadyPhase::ReadyAccount,
            (true, false) => ReadyPhase::ReadyMarket,
            _ => ReadyPhase::NotReady,
        }
    }

    /// Readiness for the session kind.
    pub fn is_ready(&self, authenticated: bool) -> bool {
        self.market_ready && (!authenticated || self.account_ready)
    }
}

/// Topics to subscribe for `symbol`.
pub fn subscription_topics(symbol: &str, authenticated: bool) -> Vec<String> {
    let mut topics = vec![
        format!("quote:{symbol}"),
        format!("trade:{symbol}"),
        "instrument".to_string(),
    ];
    if authenticated {
        topics.extend([
            format!("order:{symbol}"),
            format!("execution:{symbol}"),
            "margin".to_string(),
            "position".to_string(),
        ]);
    }
    topics
}

/// `<base>?subscribe=<topics>`.
pub fn subscribe_url(base: &str, topics: &[String]) -> String {
    format!("{base}?subscribe={}", topics.join(","))
}
