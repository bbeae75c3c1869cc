//! Ratcheting trailing stop.
//!
//! Three tails hang behind the reference price:
//! - `ref_tail`: fixed `tail_pct` away from the reference price
//! - `flex_tail`: the same offset scaled down when recent variation is high
//! - `stop_tail`: the live trigger, only ever moved in the favourable direction
//!
//! `head` is the direction that is favourable: for a `Buy` head the tails
//! sit below the price and ratchet up, for a `Sell` head they sit above and
//! ratchet down.

use crate::config::TrailConfig;
use crate::error::{TrailError, TrailResult};
use crate::histogram::VariationHistogram;
use chrono::{DateTime, Duration, Utc};
use kola_core::{OrderSide, Price};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::fmt;
use tracing::debug;

/// One pricing snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailSample {
    pub at: DateTime<Utc>,
    pub price: Price,
    pub ref_price: Price,
    pub stop_tail: Price,
    pub ref_tail: Price,
    pub flex_tail: Price,
    /// Scale applied to the flexible tail, in `[min_flex, 1]`.
    pub scale: f64,
    /// Variation (percent) the scale was derived from.
    pub variation: f64,
}

#[derive(Debug, Clone)]
pub struct TrailPricer {
    head: OrderSide,
    tick: Price,
    tail_pct: Decimal,
    min_flex: f64,
    time_bin: Duration,
    histogram: VariationHistogram,
    capacity: usize,
    /// Newest first: index 0 is `current`, index 1 is `previous`.
    ring: VecDeque<TrailSample>,
    init: TrailSample,
}

impl TrailPricer {
    pub fn new(
        head: OrderSide,
        price: Price,
        ref_price: Price,
        tick: Price,
        config: &TrailConfig,
        at: DateTime<Utc>,
    ) -> TrailResult<Self> {
        config.validate()?;
        if !tick.is_positive() {
            return Err(TrailError::InvalidPrice(format!("tick size {tick}")));
        }
        if !ref_price.is_positive() {
            return Err(TrailError::InvalidPrice(format!("reference price {ref_price}")));
        }
        let tail_pct = Decimal::from_f64(config.tail_pct)
            .ok_or_else(|| TrailError::InvalidConfig(format!("tail_pct {}", config.tail_pct)))?;
        let time_bin = Duration::seconds(
            i64::try_from(config.time_bin_secs)
                .map_err(|_| TrailError::InvalidConfig("time_bin_secs too large".to_string()))?,
        );

        let mut pricer = Self {
            head,
            tick,
            tail_pct,
            min_flex: config.min_flex,
            time_bin,
            histogram: VariationHistogram::new(config.max_variation, config.histogram_points),
            capacity: config.ring_capacity(),
            ring: VecDeque::new(),
            init: TrailSample {
                at,
                price,
                ref_price,
                stop_tail: ref_price,
                ref_tail: ref_price,
                flex_tail: ref_price,
                scale: 1.0,
                variation: 0.0,
            },
        };

        let ref_tail = pricer.ref_tail_for(ref_price);
        let scale = pricer.histogram.scale(0.0, pricer.min_flex);
        pricer.init = TrailSample {
            stop_tail: ref_tail,
            ref_tail,
            flex_tail: pricer.flex_tail_for(ref_price, ref_tail, scale),
            scale,
            ..pricer.init
        };
        pricer.ring.push_front(pricer.init);
        Ok(pricer)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn head(&self) -> OrderSide {
        self.head
    }

    /// Side of the protective stop order.
    pub fn trailing_side(&self) -> OrderSide {
        self.head.opposite()
    }

    pub fn current(&self) -> &TrailSample {
        self.ring.front().unwrap_or(&self.init)
    }

    pub fn previous(&self) -> &TrailSample {
        self.ring.get(1).unwrap_or_else(|| self.current())
    }

    pub fn init(&self) -> &TrailSample {
        &self.init
    }

    pub fn stop_tail(&self) -> Price {
        self.current().stop_tail
    }

    pub fn ref_tail(&self) -> Price {
        self.current().ref_tail
    }

    pub fn flex_tail(&self) -> Price {
        self.current().flex_tail
    }

    pub fn scale(&self) -> f64 {
        self.current().scale
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// The stop moved on the last update.
    pub fn is_new_stop_tail(&self) -> bool {
        self.current().stop_tail != self.previous().stop_tail
    }

    /// `price` has reached the stop from the favourable side.
    pub fn exit_crossed(&self, price: Price) -> bool {
        match self.head {
            OrderSide::Buy => price <= self.stop_tail(),
            OrderSide::Sell => price >= self.stop_tail(),
        }
    }

    // ========================================================================
    // Update
    // ========================================================================

    /// Record a new sample. Returns true when the stop tail moved.
    pub fn update_to(&mut self, price: Price, ref_price: Price, at: DateTime<Utc>) -> bool {
        let carried_stop = self.stop_tail();

        let ref_tail = self.ref_tail_for(ref_price);
        let variation = self.variation_with(ref_price, at);
        let scale = self.histogram.scale(variation, self.min_flex);
        let flex_tail = self.flex_tail_for(ref_price, ref_tail, scale);

        let mut sample = TrailSample {
            at,
            price,
            ref_price,
            stop_tail: carried_stop,
            ref_tail,
            flex_tail,
            scale,
            variation,
        };
        if self.further(flex_tail, carried_stop) && self.further(ref_price, self.init.ref_price) {
            debug!(from = %carried_stop, to = %flex_tail, scale, "New stop tail");
            sample.stop_tail = flex_tail;
        }

        self.ring.push_front(sample);
        self.ring.truncate(self.capacity);
        self.is_new_stop_tail()
    }

    /// Percent change between the mean reference price of `(at - bin, at]`
    /// and that of `(at - 2 bin, at - bin]`; zero while either window is empty.
    pub fn variation(&self, at: DateTime<Utc>) -> f64 {
        window_variation(self.samples(), at, self.time_bin)
    }

    fn variation_with(&self, ref_price: Price, at: DateTime<Utc>) -> f64 {
        let pending = TrailSample {
            at,
            ref_price,
            ..*self.current()
        };
        window_variation(
            std::iter::once(&pending).chain(self.samples()),
            at,
            self.time_bin,
        )
    }

    /// Ring samples plus the pinned initial one when it has been rotated out.
    fn samples(&self) -> impl Iterator<Item = &TrailSample> {
        let rotated_out = self.ring.back() != Some(&self.init);
        self.ring
            .iter()
            .chain(std::iter::once(&self.init).filter(move |_| rotated_out))
    }

    /// `a` is strictly further in the favourable direction than `b`.
    fn further(&self, a: Price, b: Price) -> bool {
        match self.head {
            OrderSide::Buy => a > b,
            OrderSide::Sell => a < b,
        }
    }

    fn ref_tail_for(&self, ref_price: Price) -> Price {
        let thickness = ref_price.inner() * self.tail_pct / Decimal::ONE_HUNDRED;
        let tail = ref_price.inner() - self.head.sign() * thickness;
        Price::new(tail).round_half_up(self.tick)
    }

    fn flex_tail_for(&self, ref_price: Price, ref_tail: Price, scale: f64) -> Price {
        let scale = Decimal::from_f64(scale).unwrap_or(Decimal::ONE);
        let offset = Price::new((ref_tail.inner() - ref_price.inner()) * scale)
            .round_half_up(self.tick);
        (ref_price + offset).round_half_up(self.tick)
    }
}

fn window_variation<'a>(
    samples: impl Iterator<Item = &'a TrailSample>,
    at: DateTime<Utc>,
    bin: Duration,
) -> f64 {
    let one_bin_ago = at - bin;
    let two_bins_ago = at - bin - bin;
    let (mut current, mut previous) = ((0.0, 0usize), (0.0, 0usize));
    for sample in samples {
        if sample.at > one_bin_ago && sample.at <= at {
            current.0 += sample.ref_price.to_f64();
            current.1 += 1;
        } else if sample.at > two_bins_ago && sample.at <= one_bin_ago {
            previous.0 += sample.ref_price.to_f64();
            previous.1 += 1;
        }
    }
    if current.1 == 0 || previous.1 == 0 {
        return 0.0;
    }
    let mean_current = current.0 / current.1 as f64;
    let mean_previous = previous.0 / previous.1 as f64;
    if mean_previous == 0.0 {
        return 0.0;
    }
    (mean_current - mean_previous) / mean_previous * 100.0
}

impl fmt::Display for TrailPricer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.current();
        write!(
            f,
            "head={} price={} ref={} stop={} refTail={} flexTail={} scale={:.4} var={:.4}% init_ref={}",
            self.head,
            c.price,
            c.ref_price,
            c.stop_tail,
            c.ref_tail,
            c.flex_tail,
            c.scale,
            c.variation,
            self.init.ref_price
        )
    }
}
