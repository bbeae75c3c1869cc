//! Trial scheduler.
//!
//! A campaign relaunches the same order shape up to `trials` times inside an
//! absolute time window measured from launch. Each trial builds one
//! [`OrderMachine`]: a plain attempt, a hook-gated one when a hook is
//! configured, wrapped in a trailing stop when `trail` is set.

use crate::error::{AppError, AppResult};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use kola_condition::{hook, price_window, time_window, Condition, HookSpec};
use kola_core::{
    trigger_price_for_window, ClientOrderId, DynMarketView, LegRole, OrdType, OrderSide, Price,
    PriceType, Size,
};
use kola_dispatch::{DispatchHandle, OrderIntent};
use kola_orders::{
    AttemptConfig, EndReason, HookedAttempt, MainLeg, OrderAttempt, OrderMachine, StopHandle,
    TrailingStop,
};
use kola_trail::TrailConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

fn default_trials() -> u32 {
    1
}

fn default_end_offset_minutes() -> i64 {
    60
}

fn default_ord_type() -> OrdType {
    OrdType::Limit
}

fn default_trail_ord_type() -> OrdType {
    OrdType::Stop
}

fn default_price_type() -> PriceType {
    PriceType::LastPrice
}

/// One `[[campaigns]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Leg name, also what other campaigns hook onto (`<name>-P_F`).
    pub name: String,
    #[serde(default = "default_trials")]
    pub trials: u32,
    /// Window start, minutes from launch.
    #[serde(default)]
    pub start_offset_minutes: i64,
    #[serde(default = "default_end_offset_minutes")]
    pub end_offset_minutes: i64,
    pub side: OrderSide,
    pub qty: Decimal,
    #[serde(default = "default_ord_type")]
    pub ord_type: OrdType,
    /// Price the window is measured on.
    #[serde(default = "default_price_type")]
    pub price_type: PriceType,
    /// Window bounds as offsets from the price when the trial starts.
    pub price_low_offset: Decimal,
    pub price_high_offset: Decimal,
    /// `<source>_<letter>` with N, C, F, P or T.
    #[serde(default)]
    pub hook: Option<String>,
    #[serde(default)]
    pub trail: bool,
    #[serde(default = "default_trail_ord_type")]
    pub trail_ord_type: OrdType,
    #[serde(default = "default_price_type")]
    pub trail_price_type: PriceType,
    #[serde(default)]
    pub pause_minutes: u64,
    /// Attempt lifetime. Defaults to the window length split over the trials.
    #[serde(default)]
    pub timeout_minutes: Option<u64>,
}

impl CampaignConfig {
    pub fn validate(&self) -> AppResult<()> {
        let invalid = |msg: String| Err(AppError::Config(format!("campaign {:?}: {msg}", self.name)));
        if self.name.is_empty() || !self.name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return invalid("name must be non-empty ASCII alphanumerics".to_string());
        }
        if self.trials == 0 {
            return invalid("trials must be at least 1".to_string());
        }
        if self.end_offset_minutes <= self.start_offset_minutes {
            return invalid("end_offset_minutes must exceed start_offset_minutes".to_string());
        }
        if self.qty <= Decimal::ZERO {
            return invalid(format!("qty must be positive, got {}", self.qty));
        }
        if self.price_low_offset >= self.price_high_offset {
            return invalid("price_low_offset must be below price_high_offset".to_string());
        }
        if self.trail && self.trail_ord_type == OrdType::Market {
            return invalid("a trailing stop cannot be a Market order".to_string());
        }
        self.hook_spec()?;
        Ok(())
    }

    pub fn hook_spec(&self) -> AppResult<Option<HookSpec>> {
        self.hook
            .as_deref()
            .map(|h| h.parse::<HookSpec>().map_err(AppError::from))
            .transpose()
    }

    /// Absolute window for a campaign launched at `launched`.
    pub fn window(&self, launched: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            launched + ChronoDuration::minutes(self.start_offset_minutes),
            launched + ChronoDuration::minutes(self.end_offset_minutes),
        )
    }

    /// `base` with this campaign's attempt lifetime.
    pub fn attempt_config(&self, base: &AttemptConfig) -> AttemptConfig {
        let timeout_secs = match self.timeout_minutes {
            Some(minutes) => minutes * 60,
            None => {
                let span = (self.end_offset_minutes - self.start_offset_minutes).max(0) as u64;
                span * 60 / u64::from(self.trials.max(1))
            }
        };
        AttemptConfig {
            timeout_secs,
            ..base.clone()
        }
    }

    pub fn pause(&self) -> Duration {
        Duration::from_secs(self.pause_minutes * 60)
    }
}

/// How a campaign ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignSummary {
    pub name: String,
    /// End reason of every trial run, in order.
    pub reasons: Vec<EndReason>,
    /// Source ids that fired this campaign's hook.
    pub hooked_ids: HashSet<String>,
}

impl CampaignSummary {
    pub fn trials_run(&self) -> usize {
        self.reasons.len()
    }
}

pub struct Campaign {
    config: CampaignConfig,
    hook: Option<HookSpec>,
    dispatch: DispatchHandle,
    view: DynMarketView,
    attempt: AttemptConfig,
    trail: TrailConfig,
    shutdown: CancellationToken,
    launched: DateTime<Utc>,
    hooked_ids: HashSet<String>,
}

impl Campaign {
    /// Build a campaign launched now. Trials stop with `shutdown`.
    pub fn new(
        config: CampaignConfig,
        dispatch: DispatchHandle,
        view: DynMarketView,
        attempt: &AttemptConfig,
        trail: TrailConfig,
        shutdown: CancellationToken,
    ) -> AppResult<Self> {
        config.validate()?;
        let hook = config.hook_spec()?;
        let attempt = config.attempt_config(attempt);
        Ok(Self {
            config,
            hook,
            dispatch,
            view,
            attempt,
            trail,
            shutdown,
            launched: Utc::now(),
            hooked_ids: HashSet::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Run trials until the count, the window or shutdown ends the campaign.
    pub async fn run(mut self) -> AppResult<CampaignSummary> {
        let (_, end) = self.config.window(self.launched);
        let mut reasons = Vec::new();
        info!(
            campaign = self.name(),
            trials = self.config.trials,
            end = %end,
            "Campaign started"
        );

        for trial in 1..=self.config.trials {
            if self.shutdown.is_cancelled() {
                break;
            }
            if Utc::now() >= end {
                info!(campaign = self.name(), "Campaign window closed");
                break;
            }

            let mut machine = self.build_trial()?;
            info!(
                campaign = self.name(),
                trial,
                of = self.config.trials,
                kind = %machine.kind(),
                cl_ord_id = machine.cl_ord_id(),
                "Trial started"
            );
            let outcome = machine.run().await?;
            let primary = outcome.primary().reason;
            info!(
                campaign = self.name(),
                trial,
                reason = %outcome.reason,
                primary = %primary,
                "Trial finished"
            );
            reasons.push(outcome.reason);

            if let Some(id) = outcome.hooked_id() {
                self.hooked_ids.insert(id.to_string());
                debug!(campaign = self.name(), hooked_ids = ?self.hooked_ids, "Hooked ids");
            }

            let last = trial == self.config.trials;
            if primary == EndReason::Stop || last {
                continue;
            }
            if primary != EndReason::TimedOut && !self.config.pause().is_zero() {
                info!(
                    campaign = self.name(),
                    minutes = self.config.pause_minutes,
                    "Pausing before next trial"
                );
                tokio::select! {
                    _ = self.shutdown.cancelled() => {}
                    _ = tokio::time::sleep(self.config.pause()) => {}
                }
            }
        }

        info!(campaign = self.name(), trials_run = reasons.len(), "Campaign finished");
        Ok(CampaignSummary {
            name: self.config.name,
            reasons,
            hooked_ids: self.hooked_ids,
        })
    }

    /// Build the machine for the next trial, priced on the market now.
    fn build_trial(&self) -> AppResult<OrderMachine> {
        let config = &self.config;
        let prefix = self.dispatch.prefix().to_string();
        let now = Utc::now();
        let (low, high) = self.price_bounds()?;
        let (start, end) = config.window(self.launched);

        let mut predicates = time_window(start, end);
        predicates.extend(price_window(config.price_type, low, high));
        if let Some(spec) = &self.hook {
            predicates.extend(hook(spec.source.clone(), spec.target));
        }
        let mut condition = Condition::anchored(&prefix, predicates, self.view.as_ref(), now);
        condition.exclude_ids(self.hooked_ids.iter().cloned());

        let intent = self.intent(&prefix, low, high);
        let stop = StopHandle::child_of(&self.shutdown);
        let attempt = OrderAttempt::new(
            intent,
            condition,
            self.dispatch.clone(),
            self.view.clone(),
            self.attempt.clone(),
        )
        .with_stop_handle(stop);

        let main = if self.hook.is_some() {
            MainLeg::HookGated(HookedAttempt::new(attempt))
        } else {
            MainLeg::Plain(attempt)
        };
        if !config.trail {
            return Ok(match main {
                MainLeg::Plain(attempt) => OrderMachine::from(attempt),
                MainLeg::HookGated(hooked) => OrderMachine::from(hooked),
            });
        }
        let trailing = TrailingStop::new(
            main,
            config.trail_ord_type,
            config.trail_price_type,
            self.trail.clone(),
        )?;
        Ok(OrderMachine::from(trailing))
    }

    /// Window bounds around the current price, rounded to the tick.
    fn price_bounds(&self) -> AppResult<(Price, Price)> {
        let price_type = self.config.price_type;
        let reference = self
            .view
            .price(price_type, None)
            .ok_or_else(|| AppError::MissingMarketData(price_type.to_string()))?;
        let tick = self.view.tick_size().unwrap_or(Price::ZERO);
        let low = Price::new(reference.inner() + self.config.price_low_offset).round_half_up(tick);
        let high = Price::new(reference.inner() + self.config.price_high_offset).round_half_up(tick);
        Ok((low, high))
    }

    /// The order rests on the window bound the market reaches first.
    fn intent(&self, prefix: &str, low: Price, high: Price) -> OrderIntent {
        let config = &self.config;
        let intent = OrderIntent::new(
            config.side,
            Size::new(config.qty),
            config.ord_type,
            ClientOrderId::generate(prefix, &config.name, LegRole::Primary),
        );
        let intent = match config.price_type.exec_inst() {
            Some(trigger) if config.ord_type.has_stop_price() => intent.with_exec_inst(trigger),
            _ => intent,
        };
        let bound = trigger_price_for_window(low, high, config.side, config.ord_type);
        if config.ord_type.has_limit_price() {
            intent.with_price(bound)
        } else if config.ord_type.has_stop_price() {
            intent.with_stop_px(bound)
        } else {
            if config.ord_type != OrdType::Market {
                warn!(ord_type = %config.ord_type, "Order type carries no price");
            }
            intent
        }
    }
}
