//! Local mirror of the exchange tables.
//!
//! The connection task is the only writer. Readers take point-in-time copies
//! under a short read lock.

use crate::error::{WsError, WsResult};
use crate::message::{DataFrame, Record};
use crate::table::{field_str, MirrorTable, ORDER_TABLE};
use kola_core::{
    decimal_from_json, round_half_up, tick_log, Execution, ExecutionHistory, OpenOrderSource,
    OrderSide, Price, PriceType, QuoteProvider,
};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

/// Default cap for non-order tables.
pub const DEFAULT_MAX_TABLE_LEN: usize = 1000;

/// Instrument figures used for pricing.
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    pub symbol: String,
    pub tick_size: Price,
    /// Decimals of the tick size.
    pub tick_log: u32,
    pub last_price: Option<Price>,
    pub mark_price: Option<Price>,
    pub index_price: Option<Price>,
}

/// Best bid/ask snapshot, rounded to the tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ticker {
    pub last: Price,
    pub buy: Price,
    pub sell: Price,
    pub mid: Price,
}

/// Net position on the symbol.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Position {
    pub symbol: String,
    pub current_qty: Decimal,
    pub avg_entry_price: Option<Price>,
    pub leverage: Option<Decimal>,
    pub is_open: bool,
}

pub struct Mirror {
    symbol: String,
    order_prefix: String,
    max_table_len: usize,
    tables: RwLock<HashMap<String, MirrorTable>>,
}

impl Mirror {
    #[must_use]
    pub fn new(symbol: impl Into<String>, order_prefix: impl Into<String>, max_table_len: usize) -> Self {
        Self {
            symbol: symbol.into(),
            order_prefix: order_prefix.into(),
            max_table_len,
            tables: RwLock::new(HashMap::new()),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn apply(&self, frame: DataFrame) {
        let mut tables = self.tables.write();
        let table = tables
            .entry(frame.table.clone())
            .or_insert_with(|| MirrorTable::new(frame.table.clone(), self.max_table_len));
        table.apply(frame.action, frame.data, frame.keys);
    }

    /// Drop every image, used before reconnecting.
    pub fn reset(&self) {
        for table in self.tables.write().values_mut() {
            table.reset();
        }
        debug!("Mirror reset");
    }

    pub fn is_seeded(&self, table: &str) -> bool {
        self.tables.read().get(table).is_some_and(MirrorTable::is_seeded)
    }

    /// Copy of a table's rows.
    pub fn records(&self, table: &str) -> Vec<Record> {
        self.tables
            .read()
            .get(table)
            .map(|t| t.records().to_vec())
            .unwrap_or_default()
    }

    pub fn table_len(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, MirrorTable::len)
    }

    fn symbol_record(&self, table: &str, symbol: &str) -> Option<Record> {
        self.tables.read().get(table).and_then(|t| {
            t.records()
                .iter()
                .rev()
                .find(|r| field_str(r, "symbol") == Some(symbol))
                .cloned()
        })
    }

    /// Instrument by symbol.
    pub fn instrument(&self, symbol: &str) -> WsResult<Instrument> {
        let record = self
            .symbol_record("instrument", symbol)
            .ok_or_else(|| WsError::InstrumentNotFound(symbol.to_string()))?;
        let tick_size = price_field(&record, "tickSize")
            .ok_or_else(|| WsError::InstrumentNotFound(format!("{symbol}: no tickSize")))?;
        Ok(Instrument {
            symbol: symbol.to_string(),
            tick_log: tick_log(tick_size.inner()),
            tick_size,
            last_price: price_field(&record, "lastPrice"),
            mark_price: price_field(&record, "markPrice"),
            index_price: price_field(&record, "indicativeSettlePrice"),
        })
    }

    /// Best bid/ask for the mirrored symbol.
    ///
    /// Index symbols (leading `.`) only have a mark price. A missing book
    /// side falls back to the last traded price.
    pub fn ticker(&self) -> WsResult<Ticker> {
        let instrument = self.instrument(&self.symbol)?;
        let tick = instrument.tick_size;
        let missing = || WsError::NotReady(format!("no price for {}", self.symbol));

        if self.symbol.starts_with('.') {
            let mark = instrument.mark_price.ok_or_else(missing)?.round_half_up(tick);
            return Ok(Ticker {
                last: mark,
                buy: mark,
                sell: mark,
                mid: mark,
            });
        }

        let last = instrument.last_price.ok_or_else(missing)?;
        let quote = self.symbol_record("quote", &self.symbol);
        let bid = quote.as_ref().and_then(|q| price_field(q, "bidPrice")).unwrap_or(last);
        let ask = quote.as_ref().and_then(|q| price_field(q, "askPrice")).unwrap_or(last);
        let mid = Price::new((bid.inner() + ask.inner()) / Decimal::TWO);

        Ok(Ticker {
            last: last.round_half_up(tick),
            buy: bid.round_half_up(tick),
            sell: ask.round_half_up(tick),
            mid: mid.round_half_up(tick),
        })
    }

    /// Latest margin row.
    pub fn funds(&self) -> Option<Record> {
        self.records("margin").pop()
    }

    /// Our orders still working, newest last.
    pub fn open_orders(&self) -> Vec<Record> {
        self.records(ORDER_TABLE)
            .into_iter()
            .filter(|r| {
                field_str(r, "clOrdID").is_some_and(|id| id.starts_with(&self.order_prefix))
            })
            .filter(|r| {
                r.get("leavesQty")
                    .and_then(decimal_from_json)
                    .is_some_and(|q| q > Decimal::ZERO)
            })
            .collect()
    }

    /// Our execution reports ordered by transaction time.
    pub fn exec_orders(&self) -> Vec<Execution> {
        let mut executions: Vec<Execution> = self
            .records("execution")
            .iter()
            .filter(|r| {
                field_str(r, "clOrdID").is_some_and(|id| id.starts_with(&self.order_prefix))
            })
            .filter_map(Execution::from_record)
            .collect();
        executions.sort_by_key(|e| e.transact_time);
        executions
    }

    /// Position on the symbol, a flat stub when none is mirrored.
    pub fn position(&self, symbol: &str) -> Position {
        match self.symbol_record("position", symbol) {
            Some(record) => Position {
                symbol: symbol.to_string(),
                current_qty: record
                    .get("currentQty")
                    .and_then(decimal_from_json)
                    .unwrap_or_default(),
                avg_entry_price: price_field(&record, "avgEntryPrice"),
                leverage: record.get("leverage").and_then(decimal_from_json),
                is_open: record
                    .get("isOpen")
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false),
            },
            None => Position {
                symbol: symbol.to_string(),
                ..Position::default()
            },
        }
    }
}

fn price_field(record: &Record, key: &str) -> Option<Price> {
    record.get(key).and_then(decimal_from_json).map(Price::new)
}

impl QuoteProvider for Mirror {
    fn price(&self, price_type: PriceType, _side: Option<OrderSide>) -> Option<Price> {
        let instrument = self.instrument(&self.symbol).ok()?;
        let tick = instrument.tick_size;
        match price_type {
            PriceType::LastPrice => instrument.last_price,
            PriceType::MarkPrice => instrument.mark_price,
            PriceType::IndexPrice => instrument.index_price,
            PriceType::BidPrice => self.ticker().ok().map(|t| t.buy),
            PriceType::AskPrice => self.ticker().ok().map(|t| t.sell),
            PriceType::MidPrice => self.ticker().ok().map(|t| t.mid),
            PriceType::LastMidPrice => self.ticker().ok().map(|t| {
                Price::new(round_half_up(
                    (t.last.inner() + t.mid.inner()) / Decimal::TWO,
                    tick.inner(),
                ))
            }),
        }
    }

    fn tick_size(&self) -> Option<Price> {
        self.instrument(&self.symbol).ok().map(|i| i.tick_size)
    }

    fn balance(&self) -> Option<Decimal> {
        self.funds()
            .and_then(|m| m.get("availableMargin").and_then(decimal_from_json))
    }

    fn leverage(&self) -> Option<Decimal> {
        self.position(&self.symbol).leverage
    }
}

impl ExecutionHistory for Mirror {
    fn executions(&self) -> Vec<Execution> {
        self.exec_orders()
    }
}

impl OpenOrderSource for Mirror {
    fn open_order_ids(&self) -> Vec<String> {
        self.open_orders()
            .iter()
            .filter_map(|r| field_str(r, "clOrdID").map(str::to_string))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::TableAction;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};

    fn frame(table: &str, action: TableAction, data: Value, keys: &[&str]) -> DataFrame {
        DataFrame {
            table: table.to_string(),
            action,
            data: data
                .as_array()
                .unwrap()
                .iter()
                .map(|v| v.as_object().cloned().unwrap())
                .collect(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn seeded_mirror() -> Mirror {
        let mirror = Mirror::new("XBTUSD", "mlk_", 100);
        mirror.apply(frame(
            "instrument",
            TableAction::Partial,
            json!([{"symbol": "XBTUSD", "tickSize": 0.5, "lastPrice": 9500.3,
                    "markPrice": 9499.9, "indicativeSettlePrice": 9498}]),
            &["symbol"],
        ));
        mirror.apply(frame(
            "quote",
            TableAction::Partial,
            json!([{"symbol": "XBTUSD", "bidPrice": 9500, "askPrice": 9501}]),
            &[],
        ));
        mirror
    }

    #[test]
    fn test_instrument_not_found() {
        let mirror = seeded_mirror();
        assert!(matches!(
            mirror.instrument("ETHUSD"),
            Err(WsError::InstrumentNotFound(_))
        ));
        let instrument = mirror.instrument("XBTUSD").unwrap();
        assert_eq!(instrument.tick_log, 1);
    }

    #[test]
    fn test_ticker_rounds_to_tick() {
        let ticker = seeded_mirror().ticker().unwrap();
        assert_eq!(ticker.last, Price::new(dec!(9500.5)));
        assert_eq!(ticker.buy, Price::new(dec!(9500)));
        assert_eq!(ticker.sell, Price::new(dec!(9501)));
        assert_eq!(ticker.mid, Price::new(dec!(9500.5)));
    }

    #[test]
    fn test_ticker_falls_back_to_last() {
        let mirror = seeded_mirror();
        mirror.apply(frame(
            "quote",
            TableAction::Partial,
            json!([{"symbol": "XBTUSD", "bidPrice": 9500, "askPrice": null}]),
            &[],
        ));
        let ticker = mirror.ticker().unwrap();
        assert_eq!(ticker.sell, Price::new(dec!(9500.5)));
    }

    #[test]
    fn test_position_stub_when_missing() {
        let position = seeded_mirror().position("XBTUSD");
        assert_eq!(position.current_qty, Decimal::ZERO);
        assert!(!position.is_open);
    }

    #[test]
    fn test_prefix_filters() {
        let mirror = seeded_mirror();
        mirror.apply(frame(
            "order",
            TableAction::Partial,
            json!([
                {"orderID": "1", "clOrdID": "mlk_a-PO1", "leavesQty": 10},
                {"orderID": "2", "clOrdID": "other", "leavesQty": 10},
                {"orderID": "3", "clOrdID": "mlk_b-SO2", "leavesQty": 0}
            ]),
            &["orderID"],
        ));
        mirror.apply(frame(
            "execution",
            TableAction::Partial,
            json!([
                {"orderID": "1", "clOrdID": "mlk_a-PO1", "execType": "New", "ordStatus": "New",
                 "side": "Buy", "transactTime": "2026-01-01T00:00:02Z"},
                {"orderID": "9", "clOrdID": "", "execType": "Funding", "ordStatus": "Filled",
                 "transactTime": "2026-01-01T00:00:01Z"},
                {"orderID": "1", "clOrdID": "mlk_a-PO1", "execType": "Trade", "ordStatus": "Filled",
                 "side": "Buy", "transactTime": "2026-01-01T00:00:01Z"}
            ]),
            &["execID"],
        ));

        assert_eq!(mirror.open_order_ids(), vec!["mlk_a-PO1".to_string()]);
        let execs = mirror.executions();
        assert_eq!(execs.len(), 2);
        assert!(execs[0].transact_time < execs[1].transact_time);
    }

    #[test]
    fn test_quote_provider_prices() {
        let mirror = seeded_mirror();
        assert_eq!(
            mirror.price(PriceType::MarkPrice, None),
            Some(Price::new(dec!(9499.9)))
        );
        assert_eq!(
            mirror.execution_price(OrderSide::Buy),
            Some(Price::new(dec!(9501)))
        );
        assert_eq!(mirror.tick_size(), Some(Price::new(dec!(0.5))));
    }

    #[test]
    fn test_reset_clears_readiness() {
        let mirror = seeded_mirror();
        assert!(mirror.is_seeded("instrument"));
        mirror.reset();
        assert!(!mirror.is_seeded("instrument"));
    }
}
