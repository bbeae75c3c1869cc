//! Trailing stop behaviour along synthetic price paths.

use chrono::{Duration, Utc};
use kola_core::{OrderSide, Price};
use kola_trail::{TrailConfig, TrailPricer};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn fast_config() -> TrailConfig {
    TrailConfig {
        time_bin_secs: 10,
        update_pause_ms: 1_000,
        ..TrailConfig::default()
    }
}

fn new_pricer(head: OrderSide, start: Decimal) -> TrailPricer {
    TrailPricer::new(
        head,
        Price::new(start),
        Price::new(start),
        Price::new(dec!(0.5)),
        &fast_config(),
        Utc::now(),
    )
    .expect("pricer")
}

#[test]
fn test_stop_is_monotonic_on_rising_path() {
    let mut pricer = new_pricer(OrderSide::Buy, dec!(10000));
    let t0 = pricer.init().at;
    let mut stops = vec![pricer.stop_tail()];

    for step in 1..=120i64 {
        let price = Price::new(dec!(10000) + Decimal::from(step) * dec!(2.5));
        pricer.update_to(price, price, t0 + Duration::seconds(step));
        stops.push(pricer.stop_tail());
    }

    assert!(stops.windows(2).all(|w| w[1] >= w[0]));
    assert!(stops[stops.len() - 1] > stops[0]);
}

#[test]
fn test_stop_is_monotonic_on_falling_path_for_sell_head() {
    let mut pricer = new_pricer(OrderSide::Sell, dec!(10000));
    let t0 = pricer.init().at;
    let mut stops = vec![pricer.stop_tail()];

    for step in 1..=120i64 {
        let price = Price::new(dec!(10000) - Decimal::from(step) * dec!(2.5));
        pricer.update_to(price, price, t0 + Duration::seconds(step));
        stops.push(pricer.stop_tail());
    }

    assert!(stops.windows(2).all(|w| w[1] <= w[0]));
    assert!(stops[stops.len() - 1] < stops[0]);
}

#[test]
fn test_volatility_spike_tightens_then_relaxes() {
    let config = fast_config();
    let mut pricer = new_pricer(OrderSide::Buy, dec!(100));
    let t0 = pricer.init().at;
    let mut at = 0i64;
    let mut feed = |pricer: &mut TrailPricer, price: Decimal, steps: i64| {
        for _ in 0..steps {
            at += 1;
            pricer.update_to(Price::new(price), Price::new(price), t0 + Duration::seconds(at));
        }
    };

    feed(&mut pricer, dec!(100), 25);
    let calm = pricer.scale();

    feed(&mut pricer, dec!(110), 1);
    let spiked = pricer.scale();
    assert!(spiked < calm);
    assert!(spiked >= config.min_flex);

    feed(&mut pricer, dec!(110), 25);
    let recovered = pricer.scale();
    assert!(recovered > spiked);
    assert!((recovered - calm).abs() < 1e-9);
}

#[test]
fn test_extreme_spike_floors_scale_at_min_flex() {
    let config = fast_config();
    let mut pricer = new_pricer(OrderSide::Buy, dec!(100));
    let t0 = pricer.init().at;
    for at in 1..=25i64 {
        let calm = Price::new(dec!(100));
        pricer.update_to(calm, calm, t0 + Duration::seconds(at));
    }
    assert!(pricer.scale() > config.min_flex);

    let spike = Price::new(dec!(200));
    pricer.update_to(spike, spike, t0 + Duration::seconds(26));

    assert!((pricer.scale() - config.min_flex).abs() < 1e-9);
}

#[test]
fn test_exit_follows_the_ratcheted_stop() {
    let mut pricer = new_pricer(OrderSide::Buy, dec!(10000));
    let t0 = pricer.init().at;
    let high = Price::new(dec!(10200));
    pricer.update_to(high, high, t0 + Duration::seconds(1));

    let stop = pricer.stop_tail();
    assert!(!pricer.exit_crossed(high));
    assert!(pricer.exit_crossed(stop));
}
