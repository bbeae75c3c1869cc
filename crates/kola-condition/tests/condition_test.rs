//! Condition evaluation against a mocked market view.

use chrono::{Duration, Utc};
use kola_condition::{hook, price_window, time_window, Condition, HookSpec, Operator, Predicate};
use kola_core::{
    ExecType, Execution, ExecutionHistory, OrdStatus, OrderSide, Price, PriceType, QuoteProvider,
};
use mockall::mock;
use mockall::predicate::eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

mock! {
    pub Market {}

    impl QuoteProvider for Market {
        fn price(&self, price_type: PriceType, side: Option<OrderSide>) -> Option<Price>;
        fn tick_size(&self) -> Option<Price>;
        fn balance(&self) -> Option<Decimal>;
        fn leverage(&self) -> Option<Decimal>;
    }

    impl ExecutionHistory for Market {
        fn executions(&self) -> Vec<Execution>;
    }
}

fn filled(cl_ord_id: &str, minutes_ago: i64) -> Execution {
    Execution {
        order_id: format!("ex-{cl_ord_id}"),
        cl_ord_id: cl_ord_id.to_string(),
        side: Some(OrderSide::Buy),
        order_qty: Some(dec!(100)),
        price: Some(dec!(9500)),
        stop_px: None,
        exec_type: ExecType::Trade,
        ord_type: None,
        exec_inst: String::new(),
        ord_status: OrdStatus::Filled,
        triggered: String::new(),
        transact_time: Utc::now() - Duration::minutes(minutes_ago),
    }
}

#[test]
fn test_price_condition_reads_only_its_price_type() {
    let mut market = MockMarket::new();
    market
        .expect_price()
        .with(eq(PriceType::MarkPrice), eq(None))
        .times(2)
        .returning(|_, _| Some(Price::new(dec!(99.5))));
    market.expect_executions().never();

    let mut below = Condition::new(
        "mlk_",
        vec![Predicate::Price {
            price_type: PriceType::MarkPrice,
            op: Operator::Lt,
            value: Price::new(dec!(100)),
        }],
    );
    assert!(below.evaluate(&market, Utc::now()));

    let mut above = Condition::new(
        "mlk_",
        vec![Predicate::Price {
            price_type: PriceType::MarkPrice,
            op: Operator::Gt,
            value: Price::new(dec!(100)),
        }],
    );
    assert!(!above.evaluate(&market, Utc::now()));
}

#[test]
fn test_expired_window_times_out_while_price_holds() {
    let mut market = MockMarket::new();
    market
        .expect_price()
        .returning(|_, _| Some(Price::new(dec!(100))));

    let now = Utc::now();
    let mut predicates = time_window(now - Duration::minutes(5), now - Duration::seconds(1));
    predicates.extend(price_window(
        PriceType::LastPrice,
        Price::new(dec!(90)),
        Price::new(dec!(110)),
    ));
    let mut condition = Condition::new("mlk_", predicates);

    assert!(!condition.evaluate(&market, now));
    assert!(condition.timed_out(now));
}

#[test]
fn test_parsed_hook_resolves_latest_source_order() {
    let mut market = MockMarket::new();
    market.expect_executions().returning(|| {
        vec![
            filled("mlk_entry-PO00000000000a", 3),
            filled("mlk_entry-PO00000000000b", 1),
            filled("foreign-order", 0),
        ]
    });

    let spec: HookSpec = "entry-P_F".parse().expect("hook spec");
    let mut condition = Condition::new("mlk_", hook(spec.source, spec.target));

    assert!(condition.evaluate(&market, Utc::now()));
    assert!(condition.is_hooked());
    assert_eq!(condition.hooked_id(), Some("mlk_entry-PO00000000000b"));

    condition.exclude_ids(["mlk_entry-PO00000000000b"]);
    assert!(condition.evaluate(&market, Utc::now()));
    assert_eq!(
        condition.hooked_id(),
        Some("mlk_entry-PO00000000000b"),
        "the first hooked id sticks"
    );
}

#[test]
fn test_rebase_rounds_to_tick() {
    let mut market = MockMarket::new();
    market
        .expect_tick_size()
        .returning(|| Some(Price::new(dec!(0.5))));
    let mut calls = 0;
    market.expect_price().returning(move |_, _| {
        calls += 1;
        // First capture at 100, every later read at 100.3.
        if calls <= PriceType::ALL.len() {
            Some(Price::new(dec!(100)))
        } else {
            Some(Price::new(dec!(100.3)))
        }
    });

    let now = Utc::now();
    let mut condition = Condition::anchored(
        "mlk_",
        price_window(PriceType::LastPrice, Price::new(dec!(99)), Price::new(dec!(102))),
        &market,
        now,
    );
    let rebased = condition.rebase(&market, now).expect("rebase");
    assert_eq!(
        rebased.price,
        Some((
            PriceType::LastPrice,
            Price::new(dec!(99.5)),
            Price::new(dec!(102.5))
        ))
    );
}
