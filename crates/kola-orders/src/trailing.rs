//! Trailing stop composed around a main leg.
//!
//! The main leg runs first. Unless it timed out or was stopped, a
//! protective stop is placed on the opposite side at the pricer's stop tail
//! and amended every time the tail ratchets. The stop ends when the reference price crosses it,
//! when an amendment fails, or when stopped.

use crate::attempt::OrderAttempt;
use crate::error::{OrdersError, OrdersResult};
use crate::hooked::HookedAttempt;
use crate::state::{AttemptOutcome, EndReason, StopHandle};
use chrono::Utc;
use kola_condition::{Condition, Operator, Predicate};
use kola_core::{ClientOrderId, LegRole, OrdType, OrderSide, Price, PriceType};
use kola_dispatch::{DispatchHandle, OrderIntent, OrderRequest, ValidationRecord};
use kola_telemetry::Metrics;
use kola_trail::{TrailConfig, TrailPricer};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// The leg a trailing stop protects.
pub enum MainLeg {
    Plain(OrderAttempt),
    HookGated(HookedAttempt),
}

impl MainLeg {
    fn attempt(&self) -> &OrderAttempt {
        match self {
            Self::Plain(attempt) => attempt,
            Self::HookGated(hooked) => hooked.inner(),
        }
    }

    async fn run(&mut self) -> OrdersResult<AttemptOutcome> {
        match self {
            Self::Plain(attempt) => attempt.run().await,
            Self::HookGated(hooked) => hooked.run().await,
        }
    }
}

pub struct TrailingStop {
    main: MainLeg,
    intent: OrderIntent,
    ref_price_type: PriceType,
    config: TrailConfig,
    dispatch: DispatchHandle,
    stop: StopHandle,
}

impl TrailingStop {
    /// Trail `main` with a stop of `ord_type`, following `ref_price_type`.
    ///
    /// The exchange trigger is the reference price type when the exchange
    /// can trigger on it, else the last price.
    pub fn new(
        main: MainLeg,
        ord_type: OrdType,
        ref_price_type: PriceType,
        config: TrailConfig,
    ) -> OrdersResult<Self> {
        config.validate()?;
        let leg = main.attempt();
        let dispatch = leg.dispatch().clone();
        let name = leg
            .intent()
            .cl_ord_id
            .source_key(dispatch.prefix())
            .map_or_else(|| "trail".to_string(), |key| key.name);
        let trigger = ref_price_type.exec_inst().unwrap_or("LastPrice");

        let intent = OrderIntent::new(
            leg.intent().side.opposite(),
            leg.intent().qty,
            ord_type,
            ClientOrderId::generate(dispatch.prefix(), &name, LegRole::Secondary),
        )
        .with_exec_inst(trigger);
        let stop = leg.stop_handle();

        Ok(Self {
            main,
            intent,
            ref_price_type,
            config,
            dispatch,
            stop,
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Client order id of the protective stop.
    pub fn cl_ord_id(&self) -> &str {
        self.intent.cl_ord_id.as_str()
    }

    pub fn main_cl_ord_id(&self) -> &str {
        self.main.attempt().cl_ord_id()
    }

    pub async fn run(&mut self) -> OrdersResult<AttemptOutcome> {
        let main = self.main.run().await?;
        if main.reason == EndReason::TimedOut {
            info!(main = %main.cl_ord_id, "Main leg timed out, no trailing stop");
            return Ok(self.outcome(EndReason::TrailAbandoned, None, main));
        }
        if self.stop.is_stopped() {
            return Ok(self.outcome(EndReason::Stop, None, main));
        }
        if !main.validated() {
            warn!(
                main = %main.cl_ord_id,
                reason = %main.reason,
                "Main leg did not validate, placing the trailing stop anyway"
            );
        }

        let view = Arc::clone(self.main.attempt().view());
        let tick = view
            .tick_size()
            .ok_or_else(|| OrdersError::MissingMarketData("tick size".to_string()))?;
        let (price, ref_price) = self.prices()?;
        let head = self.intent.side.opposite();
        let mut pricer = TrailPricer::new(head, price, ref_price, tick, &self.config, Utc::now())?;

        let record = self.place(pricer.stop_tail()).await?;
        if !record.success {
            warn!(cl_ord_id = self.cl_ord_id(), "Trailing stop not accepted");
            return Ok(self.outcome(EndReason::FailedValidation, Some(record), main));
        }
        let mut order_id = record.order_id();
        let mut exit = Condition::new(
            self.dispatch.prefix(),
            vec![Predicate::Price {
                price_type: self.ref_price_type,
                op: exit_operator(self.intent.side),
                value: pricer.stop_tail(),
            }],
        );
        let mut last_record = Some(record);
        let mut logged = Instant::now();
        info!(cl_ord_id = self.cl_ord_id(), pricer = %pricer, "Trailing");

        loop {
            if self.stop.is_stopped() {
                return Ok(self.outcome(EndReason::Stop, last_record, main));
            }

            if let Ok((price, ref_price)) = self.prices() {
                if pricer.update_to(price, ref_price, Utc::now()) {
                    let new_stop = pricer.stop_tail();
                    exit.set_price_value(self.ref_price_type, new_stop);
                    let record = self.amend(order_id.clone(), new_stop).await?;
                    if !record.success {
                        warn!(cl_ord_id = self.cl_ord_id(), stop = %new_stop, "Stop amendment failed");
                        return Ok(self.outcome(EndReason::FailedValidation, Some(record), main));
                    }
                    order_id = record.order_id().or(order_id);
                    last_record = Some(record);
                }
            }

            if exit.evaluate(view.as_ref(), Utc::now()) {
                info!(cl_ord_id = self.cl_ord_id(), stop = %pricer.stop_tail(), "Price crossed the stop");
                return Ok(self.outcome(EndReason::TrailExit, last_record, main));
            }

            if logged.elapsed() >= self.config.log_pause() {
                info!(cl_ord_id = self.cl_ord_id(), pricer = %pricer, "Trail state");
                logged = Instant::now();
            }
            self.stop
                .pause(self.config.jittered_pause(rand::random::<f64>()))
                .await;
        }
    }

    /// Last price and reference price.
    fn prices(&self) -> OrdersResult<(Price, Price)> {
        let view = self.main.attempt().view();
        let price = view
            .price(PriceType::LastPrice, None)
            .ok_or_else(|| OrdersError::MissingMarketData(PriceType::LastPrice.to_string()))?;
        let ref_price = view
            .price(self.ref_price_type, None)
            .ok_or_else(|| OrdersError::MissingMarketData(self.ref_price_type.to_string()))?;
        Ok((price, ref_price))
    }

    /// Place the stop at `stop`. Limit types rest at it and let the
    /// dispatcher derive the trigger.
    async fn place(&mut self, stop: Price) -> OrdersResult<ValidationRecord> {
        self.set_stop(stop);
        debug!(intent = %self.intent, "Placing trailing stop");
        let request = OrderRequest::place(self.intent.clone()).trailing();
        Ok(self.dispatch.submit(request).await?)
    }

    fn set_stop(&mut self, stop: Price) {
        if self.intent.ord_type.has_limit_price() {
            self.intent.price = Some(stop);
        } else {
            self.intent.stop_px = Some(stop);
        }
    }

    async fn amend(&mut self, order_id: Option<String>, stop: Price) -> OrdersResult<ValidationRecord> {
        Metrics::trail_amend();
        debug!(cl_ord_id = self.cl_ord_id(), stop = %stop, "Amending trailing stop");
        let request = OrderRequest::amend(self.intent.clone(), order_id, stop).trailing();
        let record = self.dispatch.submit(request).await?;
        if record.success {
            self.set_stop(stop);
        }
        Ok(record)
    }

    fn outcome(
        &self,
        reason: EndReason,
        record: Option<ValidationRecord>,
        main: AttemptOutcome,
    ) -> AttemptOutcome {
        info!(cl_ord_id = self.cl_ord_id(), reason = %reason, "Trailing stop finished");
        AttemptOutcome {
            cl_ord_id: self.cl_ord_id().to_string(),
            reason,
            record,
            hooked_id: None,
            main: Some(Box::new(main)),
        }
    }
}

/// A sell stop exits when the reference drops below it, a buy stop when it rises above.
fn exit_operator(trailing_side: OrderSide) -> Operator {
    match trailing_side {
        OrderSide::Sell => Operator::Lt,
        OrderSide::Buy => Operator::Gt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_operator_by_side() {
        assert_eq!(exit_operator(OrderSide::Sell), Operator::Lt);
        assert_eq!(exit_operator(OrderSide::Buy), Operator::Gt);
    }
}
