//! Order-related enums and identifiers.
//!
//! Names serialize exactly as the exchange spells them (`Buy`, `StopLimit`,
//! `PartiallyFilled`, ...), so these types are used directly in request
//! payloads and in decoded execution reports.

use crate::decimal::Price;
use crate::error::CoreError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Returns 1 for buy, -1 for sell.
    pub fn sign(&self) -> Decimal {
        match self {
            Self::Buy => Decimal::ONE,
            Self::Sell => Decimal::NEGATIVE_ONE,
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, Self::Buy)
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "Buy"),
            Self::Sell => write!(f, "Sell"),
        }
    }
}

impl FromStr for OrderSide {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            other => Err(CoreError::UnknownVariant {
                kind: "side",
                value: other.to_string(),
            }),
        }
    }
}

/// Exchange order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrdType {
    Market,
    Limit,
    Stop,
    StopLimit,
    MarketIfTouched,
    LimitIfTouched,
}

impl OrdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "Market",
            Self::Limit => "Limit",
            Self::Stop => "Stop",
            Self::StopLimit => "StopLimit",
            Self::MarketIfTouched => "MarketIfTouched",
            Self::LimitIfTouched => "LimitIfTouched",
        }
    }

    /// Types that rest on the book with a limit price.
    pub fn has_limit_price(&self) -> bool {
        matches!(self, Self::Limit | Self::StopLimit | Self::LimitIfTouched)
    }

    /// Types carrying a trigger (`stopPx`).
    pub fn has_stop_price(&self) -> bool {
        matches!(
            self,
            Self::Stop | Self::StopLimit | Self::MarketIfTouched | Self::LimitIfTouched
        )
    }

    /// Stop and StopLimit trigger against the move, the touched types with it.
    pub fn is_stop(&self) -> bool {
        matches!(self, Self::Stop | Self::StopLimit)
    }
}

impl fmt::Display for OrdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrdType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Market" => Ok(Self::Market),
            "Limit" => Ok(Self::Limit),
            "Stop" => Ok(Self::Stop),
            "StopLimit" => Ok(Self::StopLimit),
            "MarketIfTouched" | "MIT" => Ok(Self::MarketIfTouched),
            "LimitIfTouched" | "LIT" => Ok(Self::LimitIfTouched),
            other => Err(CoreError::UnknownVariant {
                kind: "ordType",
                value: other.to_string(),
            }),
        }
    }
}

/// Exchange-reported order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrdStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    PendingNew,
    PendingCancel,
    Expired,
    Untriggered,
    Triggered,
    #[serde(other)]
    Unknown,
}

impl OrdStatus {
    /// Short code used in hook references (`N`, `C`, `F`, `P`).
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'N' => Some(Self::New),
            'C' => Some(Self::Canceled),
            'F' => Some(Self::Filled),
            'P' => Some(Self::PartiallyFilled),
            _ => None,
        }
    }
}

impl fmt::Display for OrdStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Kind of execution report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecType {
    New,
    Trade,
    Canceled,
    Replaced,
    Restated,
    TriggeredOrActivatedBySystem,
    Funding,
    Settlement,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ExecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Named price a condition or a default can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PriceType {
    LastPrice,
    MarkPrice,
    IndexPrice,
    BidPrice,
    AskPrice,
    MidPrice,
    LastMidPrice,
}

impl PriceType {
    pub const ALL: [Self; 7] = [
        Self::LastPrice,
        Self::MarkPrice,
        Self::IndexPrice,
        Self::BidPrice,
        Self::AskPrice,
        Self::MidPrice,
        Self::LastMidPrice,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LastPrice => "lastPrice",
            Self::MarkPrice => "markPrice",
            Self::IndexPrice => "indexPrice",
            Self::BidPrice => "bidPrice",
            Self::AskPrice => "askPrice",
            Self::MidPrice => "midPrice",
            Self::LastMidPrice => "lastMidPrice",
        }
    }

    /// Execution instruction selecting this trigger price, when the exchange has one.
    pub fn exec_inst(&self) -> Option<&'static str> {
        match self {
            Self::LastPrice => Some("LastPrice"),
            Self::MarkPrice => Some("MarkPrice"),
            Self::IndexPrice => Some("IndexPrice"),
            _ => None,
        }
    }

    /// Trigger price type named by an `execInst` string (`LastPrice` when absent).
    pub fn from_exec_inst(exec_inst: &str) -> Self {
        exec_inst
            .split(',')
            .find_map(|inst| match inst.trim() {
                "MarkPrice" => Some(Self::MarkPrice),
                "IndexPrice" => Some(Self::IndexPrice),
                "LastPrice" => Some(Self::LastPrice),
                _ => None,
            })
            .unwrap_or(Self::LastPrice)
    }

    /// Side of the book a taker on `side` would hit.
    pub fn execution_for(side: OrderSide) -> Self {
        match side {
            OrderSide::Buy => Self::AskPrice,
            OrderSide::Sell => Self::BidPrice,
        }
    }
}

impl fmt::Display for PriceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lastPrice" | "LastPrice" => Ok(Self::LastPrice),
            "markPrice" | "MarkPrice" => Ok(Self::MarkPrice),
            "indexPrice" | "IndexPrice" => Ok(Self::IndexPrice),
            "bidPrice" | "BidPrice" => Ok(Self::BidPrice),
            "askPrice" | "AskPrice" => Ok(Self::AskPrice),
            "midPrice" | "MidPrice" => Ok(Self::MidPrice),
            "lastMidPrice" | "LastMidPrice" => Ok(Self::LastMidPrice),
            other => Err(CoreError::UnknownVariant {
                kind: "priceType",
                value: other.to_string(),
            }),
        }
    }
}

/// Remove price-type instructions from a comma separated `execInst`.
///
/// With `keep_triggers` the exchange trigger instructions survive and only
/// the local `lastMidPrice` pseudo instruction is dropped.
pub fn strip_price_exec_inst(exec_inst: &str, keep_triggers: bool) -> String {
    exec_inst
        .split(',')
        .map(str::trim)
        .filter(|inst| !inst.is_empty())
        .filter(|inst| !inst.eq_ignore_ascii_case("lastMidPrice"))
        .filter(|inst| keep_triggers || !inst.contains("Price"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Default trigger for stop-like orders: `delta` beyond the price, against the side.
pub fn stop_price_default(price: Price, side: OrderSide, delta: Decimal) -> Price {
    match side {
        OrderSide::Buy => Price::new(price.inner() + delta),
        OrderSide::Sell => Price::new(price.inner() - delta),
    }
}

/// Bound of a `[low, high]` price window an order on `side` should rest at.
///
/// Limit and touched orders wait for the favourable bound, stops for the
/// adverse one.
pub fn trigger_price_for_window(
    low: Price,
    high: Price,
    side: OrderSide,
    ord_type: OrdType,
) -> Price {
    match (ord_type.is_stop(), side) {
        (false, OrderSide::Buy) | (true, OrderSide::Sell) => high,
        (false, OrderSide::Sell) | (true, OrderSide::Buy) => low,
    }
}

/// Which leg of a trial an order belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegRole {
    /// Primary leg (`P`).
    #[serde(rename = "P")]
    Primary,
    /// Secondary leg, the trailing stop (`S`).
    #[serde(rename = "S")]
    Secondary,
}

impl LegRole {
    pub fn letter(&self) -> char {
        match self {
            Self::Primary => 'P',
            Self::Secondary => 'S',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'P' => Some(Self::Primary),
            'S' => Some(Self::Secondary),
            _ => None,
        }
    }
}

/// Abbreviation shared by every client order id a named leg produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceKey {
    pub name: String,
    pub role: LegRole,
}

impl SourceKey {
    pub fn new(name: impl Into<String>, role: LegRole) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.role.letter())
    }
}

impl FromStr for SourceKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidOrderId(s.to_string());
        let (name, role) = s.rsplit_once('-').ok_or_else(invalid)?;
        let mut chars = role.chars();
        let role = match (chars.next(), chars.next()) {
            (Some(c), None) => LegRole::from_letter(c).ok_or_else(invalid)?,
            _ => return Err(invalid()),
        };
        if name.is_empty() {
            return Err(invalid());
        }
        Ok(Self::new(name, role))
    }
}

const OPAQUE_LEN: usize = 12;

/// Structured client order id: `<prefix><name>-<role>O<opaque>`.
///
/// The `<name>-<role>` part is the [`SourceKey`] hook predicates look for
/// in the execution history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientOrderId(String);

impl ClientOrderId {
    /// Create a fresh id for the leg `name`/`role`.
    pub fn generate(prefix: &str, name: &str, role: LegRole) -> Self {
        let opaque = Uuid::new_v4().simple().to_string();
        Self(format!(
            "{prefix}{name}-{}O{}",
            role.letter(),
            &opaque[..OPAQUE_LEN]
        ))
    }

    /// Wrap an id received from the exchange.
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the source key, `None` for ids not minted under `prefix`.
    pub fn source_key(&self, prefix: &str) -> Option<SourceKey> {
        source_key_of(&self.0, prefix)
    }
}

/// Decode the source key of a raw client order id string.
pub fn source_key_of(cl_ord_id: &str, prefix: &str) -> Option<SourceKey> {
    let body = cl_ord_id.strip_prefix(prefix)?;
    let marker = body.rfind('-')?;
    let (name, rest) = body.split_at(marker);
    let mut chars = rest[1..].chars();
    let role = LegRole::from_letter(chars.next()?)?;
    if chars.next()? != 'O' || name.is_empty() {
        return None;
    }
    Some(SourceKey::new(name, role))
}

/// Split ids into (own client order ids, exchange order ids).
pub fn split_ids<'a, I>(prefix: &str, ids: I) -> (Vec<String>, Vec<String>)
where
    I: IntoIterator<Item = &'a str>,
{
    ids.into_iter()
        .map(str::to_string)
        .partition(|id| id.starts_with(prefix))
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ClientOrderId {
    fn from(s: String) -> Self {
        Self::from_string(s)
    }
}

impl AsRef<str> for ClientOrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_side_opposite() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.opposite(), OrderSide::Buy);
        assert_eq!(OrderSide::Sell.sign(), dec!(-1));
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&OrderSide::Buy).unwrap(), "\"Buy\"");
        assert_eq!(
            serde_json::to_string(&OrdType::LimitIfTouched).unwrap(),
            "\"LimitIfTouched\""
        );
        let status: OrdStatus = serde_json::from_str("\"DoneForDay\"").unwrap();
        assert_eq!(status, OrdStatus::Unknown);
        let price_type: PriceType = serde_json::from_str("\"lastMidPrice\"").unwrap();
        assert_eq!(price_type, PriceType::LastMidPrice);
    }

    #[test]
    fn test_client_order_id_layout() {
        let id = ClientOrderId::generate("mlk_", "lng3", LegRole::Primary);
        assert!(id.as_str().starts_with("mlk_lng3-PO"));
        assert_eq!(id.as_str().len(), "mlk_lng3-PO".len() + 12);
        assert_ne!(id, ClientOrderId::generate("mlk_", "lng3", LegRole::Primary));
    }

    #[test]
    fn test_source_key_decoding() {
        let id = ClientOrderId::generate("mlk_", "a-b", LegRole::Secondary);
        assert_eq!(
            id.source_key("mlk_"),
            Some(SourceKey::new("a-b", LegRole::Secondary))
        );
        assert_eq!(id.source_key("zz_"), None);
        assert_eq!(source_key_of("mlk_noformat", "mlk_"), None);
        assert_eq!(source_key_of("mlk_x-PX12", "mlk_"), None);
        assert_eq!(
            "lng3-P".parse::<SourceKey>().unwrap(),
            SourceKey::new("lng3", LegRole::Primary)
        );
        assert!("lng3".parse::<SourceKey>().is_err());
    }

    #[test]
    fn test_split_ids() {
        let (own, foreign) = split_ids("mlk_", ["mlk_a-PO1", "8f2c-44"]);
        assert_eq!(own, vec!["mlk_a-PO1".to_string()]);
        assert_eq!(foreign, vec!["8f2c-44".to_string()]);
    }

    #[test]
    fn test_strip_price_exec_inst() {
        assert_eq!(
            strip_price_exec_inst("LastPrice,ReduceOnly", false),
            "ReduceOnly"
        );
        assert_eq!(
            strip_price_exec_inst("MarkPrice, lastMidPrice", true),
            "MarkPrice"
        );
        assert_eq!(
            PriceType::from_exec_inst("Close,IndexPrice"),
            PriceType::IndexPrice
        );
        assert_eq!(PriceType::from_exec_inst(""), PriceType::LastPrice);
    }

    #[test]
    fn test_price_helpers() {
        let p = Price::new(dec!(100));
        assert_eq!(stop_price_default(p, OrderSide::Buy, dec!(2)).inner(), dec!(102));
        assert_eq!(stop_price_default(p, OrderSide::Sell, dec!(2)).inner(), dec!(98));

        let (low, high) = (Price::new(dec!(90)), Price::new(dec!(110)));
        assert_eq!(
            trigger_price_for_window(low, high, OrderSide::Buy, OrdType::Limit),
            high
        );
        assert_eq!(
            trigger_price_for_window(low, high, OrderSide::Sell, OrdType::Stop),
            high
        );
        assert_eq!(
            trigger_price_for_window(low, high, OrderSide::Buy, OrdType::StopLimit),
            low
        );
    }
}
