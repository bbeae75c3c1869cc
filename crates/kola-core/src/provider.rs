//! Read capabilities the order logic needs from market state.
//!
//! The live implementation is the websocket mirror. [`StaticMarket`] is an
//! in-memory implementation for tests and dry runs.

use crate::decimal::Price;
use crate::execution::Execution;
use crate::order::{OrderSide, PriceType};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

/// Named price lookups plus account figures.
pub trait QuoteProvider: Send + Sync {
    /// Current value of `price_type`. `side` only matters for execution-side lookups.
    fn price(&self, price_type: PriceType, side: Option<OrderSide>) -> Option<Price>;

    /// Instrument tick size.
    fn tick_size(&self) -> Option<Price>;

    /// Available balance in the account currency.
    fn balance(&self) -> Option<Decimal>;

    /// Current leverage on the traded symbol.
    fn leverage(&self) -> Option<Decimal>;

    /// Price a taker on `side` would get right now.
    fn execution_price(&self, side: OrderSide) -> Option<Price> {
        self.price(PriceType::execution_for(side), Some(side))
    }
}

/// Execution reports for our own orders, oldest first.
pub trait ExecutionHistory: Send + Sync {
    fn executions(&self) -> Vec<Execution>;
}

/// Client order ids of our orders still resting on the book.
pub trait OpenOrderSource: Send + Sync {
    fn open_order_ids(&self) -> Vec<String>;
}

/// Everything the condition engine and dispatcher read.
pub trait MarketView: QuoteProvider + ExecutionHistory {}

impl<T: QuoteProvider + ExecutionHistory + ?Sized> MarketView for T {}

pub type DynMarketView = Arc<dyn MarketView>;

/// Settable in-memory market.
#[derive(Debug, Default)]
pub struct StaticMarket {
    prices: RwLock<HashMap<PriceType, Price>>,
    executions: RwLock<Vec<Execution>>,
    tick: RwLock<Option<Price>>,
    balance: RwLock<Option<Decimal>>,
}

impl StaticMarket {
    #[must_use]
    pub fn new(tick: Price) -> Self {
        Self {
            tick: RwLock::new(Some(tick)),
            ..Self::default()
        }
    }

    pub fn set_price(&self, price_type: PriceType, price: Price) {
        self.prices.write().insert(price_type, price);
    }

    /// Set every price type to the same value.
    pub fn set_all_prices(&self, price: Price) {
        let mut prices = self.prices.write();
        for pt in PriceType::ALL {
            prices.insert(pt, price);
        }
    }

    pub fn clear_price(&self, price_type: PriceType) {
        self.prices.write().remove(&price_type);
    }

    pub fn push_execution(&self, execution: Execution) {
        let mut executions = self.executions.write();
        executions.push(execution);
        executions.sort_by_key(|e| e.transact_time);
    }

    pub fn set_balance(&self, balance: Decimal) {
        *self.balance.write() = Some(balance);
    }
}

impl QuoteProvider for StaticMarket {
    fn price(&self, price_type: PriceType, _side: Option<OrderSide>) -> Option<Price> {
        self.prices.read().get(&price_type).copied()
    }

    fn tick_size(&self) -> Option<Price> {
        *self.tick.read()
    }

    fn balance(&self) -> Option<Decimal> {
        *self.balance.read()
    }

    fn leverage(&self) -> Option<Decimal> {
        None
    }
}

impl ExecutionHistory for StaticMarket {
    fn executions(&self) -> Vec<Execution> {
        self.executions.read().clone()
    }
}
