//! Hook-gated attempt.
//!
//! Sits in `AwaitingHook` until every hook predicate of its condition holds.
//! The condition's windows were written relative to the market at creation;
//! when the hook fires they are moved onto the market at that instant and
//! the order's own price follows the new window.

use crate::attempt::OrderAttempt;
use crate::error::OrdersResult;
use crate::state::{AttemptOutcome, AttemptState, EndReason, StopHandle};
use chrono::Utc;
use kola_condition::Rebased;
use kola_core::{OrderSide, Price};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct HookedAttempt {
    inner: OrderAttempt,
}

impl HookedAttempt {
    /// Wrap `inner`, capturing the condition reference now if it has none.
    #[must_use]
    pub fn new(mut inner: OrderAttempt) -> Self {
        if inner.condition().reference().is_none() {
            let view = Arc::clone(inner.view());
            inner.condition_mut().capture_reference(view.as_ref(), Utc::now());
        }
        Self { inner }
    }

    pub fn inner(&self) -> &OrderAttempt {
        &self.inner
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.inner.stop_handle()
    }

    pub fn cl_ord_id(&self) -> &str {
        self.inner.cl_ord_id()
    }

    pub async fn run(&mut self) -> OrdersResult<AttemptOutcome> {
        self.inner.enter(AttemptState::AwaitingHook);
        let stop = self.inner.stop_handle();
        let view = Arc::clone(self.inner.view());
        let poll = self.inner.config().poll();

        loop {
            if stop.is_stopped() {
                return Ok(self.inner.finish(EndReason::Stop, None));
            }
            if self.inner.deadline_passed() {
                info!(cl_ord_id = self.cl_ord_id(), "Hook never fired");
                return Ok(self.inner.finish(EndReason::TimedOut, None));
            }
            if self.inner.condition_mut().evaluate_hooks(view.as_ref()) {
                break;
            }
            stop.pause(poll).await;
        }

        self.on_hooked();
        self.inner.run().await
    }

    fn on_hooked(&mut self) {
        let view = Arc::clone(self.inner.view());
        info!(
            cl_ord_id = self.cl_ord_id(),
            hooked_id = self.inner.condition().hooked_id().unwrap_or_default(),
            "Hook fired"
        );

        let rebased = match self.inner.condition_mut().rebase(view.as_ref(), Utc::now()) {
            Ok(rebased) => rebased,
            Err(e) => {
                warn!(cl_ord_id = self.cl_ord_id(), error = %e, "Could not rebase condition");
                Rebased::default()
            }
        };
        if let Some((_, low, high)) = rebased.price {
            self.anchor(low, high);
        }
        self.inner.restart_clock();
    }

    /// Move the order onto the rebased window: buys rest at the low bound,
    /// sells at the high bound. A stop keeps its offset from the price.
    fn anchor(&mut self, low: Price, high: Price) {
        let intent = self.inner.intent_mut();
        let anchor = match intent.side {
            OrderSide::Buy => low,
            OrderSide::Sell => high,
        };
        match (intent.price, intent.stop_px) {
            (Some(price), stop_px) => {
                intent.price = Some(anchor);
                intent.stop_px = stop_px.map(|stop| anchor + (stop - price));
            }
            (None, Some(_)) => intent.stop_px = Some(anchor),
            (None, None) => {}
        }
        debug!(cl_ord_id = %intent.cl_ord_id, intent = %intent, "Anchored to window");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AttemptConfig;
    use kola_condition::{hook, price_window, Condition, HookTarget};
    use kola_core::{
        ClientOrderId, LegRole, OrdStatus, OrdType, PriceType, Size, SourceKey, StaticMarket,
    };
    use kola_dispatch::{Dispatcher, DispatcherConfig, OrderIntent, RecordingGateway};
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn attempt(market: Arc<StaticMarket>, timeout_secs: u64) -> (HookedAttempt, CancellationToken) {
        let gateway = Arc::new(RecordingGateway::new());
        let shutdown = CancellationToken::new();
        let (dispatcher, handle) = Dispatcher::new(
            DispatcherConfig::default(),
            gateway as _,
            Arc::clone(&market) as _,
            shutdown.clone(),
        );
        tokio::spawn(dispatcher.run());

        let mut predicates = hook(
            SourceKey::new("entry", LegRole::Primary),
            HookTarget::Status(OrdStatus::Filled),
        );
        predicates.extend(price_window(
            PriceType::LastPrice,
            Price::new(dec!(90)),
            Price::new(dec!(110)),
        ));
        let intent = OrderIntent::new(
            OrderSide::Sell,
            Size::new(dec!(50)),
            OrdType::StopLimit,
            ClientOrderId::generate("mlk_", "exit", LegRole::Primary),
        )
        .with_price(Price::new(dec!(110)))
        .with_stop_px(Price::new(dec!(108)));
        let config = AttemptConfig {
            poll_ms: 10,
            timeout_secs,
            cancel_timeout_secs: 1,
        };
        let condition = Condition::new("mlk_", predicates);
        let inner = OrderAttempt::new(intent, condition, handle, market as _, config);
        (HookedAttempt::new(inner), shutdown)
    }

    #[tokio::test]
    async fn test_anchor_follows_side() {
        let market = Arc::new(StaticMarket::new(Price::new(dec!(0.5))));
        market.set_all_prices(Price::new(dec!(100)));
        let (mut hooked, shutdown) = attempt(market, 60);

        hooked.anchor(Price::new(dec!(140)), Price::new(dec!(160)));

        let intent = hooked.inner().intent();
        assert_eq!(intent.price, Some(Price::new(dec!(160))));
        assert_eq!(intent.stop_px, Some(Price::new(dec!(158))));
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_unfired_hook_times_out_without_cancel() {
        let market = Arc::new(StaticMarket::new(Price::new(dec!(0.5))));
        market.set_all_prices(Price::new(dec!(100)));
        let (mut hooked, shutdown) = attempt(market, 0);

        let outcome = hooked.run().await.unwrap();

        assert_eq!(outcome.reason, EndReason::TimedOut);
        assert!(outcome.hooked_id.is_none());
        assert_eq!(
            hooked.inner().history(),
            &[AttemptState::Created, AttemptState::AwaitingHook, AttemptState::Finalized]
        );
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_stop_while_awaiting_hook() {
        let market = Arc::new(StaticMarket::new(Price::new(dec!(0.5))));
        market.set_all_prices(Price::new(dec!(100)));
        let (mut hooked, shutdown) = attempt(market, 60);
        let stop = hooked.stop_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            stop.stop();
        });

        let outcome = hooked.run().await.unwrap();
        assert_eq!(outcome.reason, EndReason::Stop);
        shutdown.cancel();
    }
}
