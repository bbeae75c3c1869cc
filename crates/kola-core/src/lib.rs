//! Core domain types for the kola conditional order bot.
//!
//! This crate provides fundamental types used throughout the system:
//! - `Price`, `Size`: precision-safe numeric types with half-up tick rounding
//! - `OrderSide`, `OrdType`, `OrdStatus`, `ExecType`, `PriceType`: exchange enums
//! - `ClientOrderId`, `SourceKey`: structured client order ids used by hooks
//! - `Execution`: typed execution report
//! - `Credentials`: request signing
//! - `QuoteProvider`, `ExecutionHistory`, `MarketView`: read capabilities

pub mod auth;
pub mod decimal;
pub mod error;
pub mod execution;
pub mod order;
pub mod provider;

pub use auth::{Credentials, SignedHeaders};
pub use decimal::{decimal_from_json, parse_fixed, round_half_up, tick_log, Price, Size};
pub use error::{CoreError, Result};
pub use execution::{Execution, STOP_TRIGGERED};
pub use order::{
    source_key_of, split_ids, stop_price_default, strip_price_exec_inst,
    trigger_price_for_window, ClientOrderId, ExecType, LegRole, OrdStatus, OrdType, OrderSide,
    PriceType, SourceKey,
};
pub use provider::{
    DynMarketView, ExecutionHistory, MarketView, OpenOrderSource, QuoteProvider, StaticMarket,
};
