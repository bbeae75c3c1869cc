//! Conjunction of predicates owned by one order attempt.
//!
//! A condition is evaluated against a [`MarketView`] and a clock. Hook
//! predicates look the source order up in the execution history; the first
//! id that satisfies a hook is remembered for the life of the condition.
//!
//! Symmetric time or price windows can be re-anchored with
//! [`Condition::rebase`]: every bound keeps its offset from the reference
//! captured at creation and is moved onto a fresh reference.

use crate::error::{ConditionError, ConditionResult};
use crate::predicate::{Genre, HookTarget, Operator, Predicate, PredicateValue};
use chrono::{DateTime, Duration, Utc};
use kola_core::{source_key_of, Execution, MarketView, Price, PriceType, SourceKey};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, info, warn};

/// Market snapshot a condition's relative bounds are measured from.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub time: DateTime<Utc>,
    pub prices: HashMap<PriceType, Price>,
}

impl Reference {
    pub fn capture(view: &dyn MarketView, now: DateTime<Utc>) -> Self {
        let prices = PriceType::ALL
            .into_iter()
            .filter_map(|pt| view.price(pt, None).map(|p| (pt, p)))
            .collect();
        Self { time: now, prices }
    }
}

/// New absolute bounds after a rebase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rebased {
    pub time: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub price: Option<(PriceType, Price, Price)>,
}

#[derive(Debug, Clone)]
pub struct Condition {
    prefix: String,
    predicates: Vec<Predicate>,
    hooked_id: Option<String>,
    excluded: HashSet<String>,
    reference: Option<Reference>,
}

impl Condition {
    /// `prefix` is the client order id prefix hook sources are decoded with.
    pub fn new(prefix: impl Into<String>, predicates: Vec<Predicate>) -> Self {
        Self {
            prefix: prefix.into(),
            predicates,
            hooked_id: None,
            excluded: HashSet::new(),
            reference: None,
        }
    }

    /// Same, with the reference captured right away.
    pub fn anchored(
        prefix: impl Into<String>,
        predicates: Vec<Predicate>,
        view: &dyn MarketView,
        now: DateTime<Utc>,
    ) -> Self {
        let mut condition = Self::new(prefix, predicates);
        condition.capture_reference(view, now);
        condition
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn add(&mut self, predicates: impl IntoIterator<Item = Predicate>) {
        self.predicates.extend(predicates);
    }

    pub fn reference(&self) -> Option<&Reference> {
        self.reference.as_ref()
    }

    pub fn capture_reference(&mut self, view: &dyn MarketView, now: DateTime<Utc>) {
        self.reference = Some(Reference::capture(view, now));
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    /// AND over every predicate, vacuously true.
    ///
    /// Every predicate is evaluated, so a satisfied hook is recorded even
    /// when another predicate is still false.
    pub fn evaluate(&mut self, view: &dyn MarketView, now: DateTime<Utc>) -> bool {
        let executions = self.needs_history().then(|| view.executions());
        let results: Vec<bool> = (0..self.predicates.len())
            .map(|i| self.evaluate_at(i, view, executions.as_deref(), now))
            .collect();
        results.into_iter().all(|ok| ok)
    }

    /// AND over the hook predicates only, false without hooks.
    pub fn evaluate_hooks(&mut self, view: &dyn MarketView) -> bool {
        if !self.has_hook() {
            return false;
        }
        let executions = view.executions();
        let hooks: Vec<usize> = self
            .predicates
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_hook())
            .map(|(i, _)| i)
            .collect();
        let results: Vec<bool> = hooks
            .into_iter()
            .map(|i| self.evaluate_at(i, view, Some(&executions), Utc::now()))
            .collect();
        results.into_iter().all(|ok| ok)
    }

    /// True once an upper time bound has passed, whatever the other predicates say.
    pub fn timed_out(&self, now: DateTime<Utc>) -> bool {
        self.predicates.iter().any(|p| match p {
            Predicate::Time {
                op: Operator::Lt,
                value,
            } => !Operator::Lt.apply(&now, value),
            _ => false,
        })
    }

    pub fn has_hook(&self) -> bool {
        self.predicates.iter().any(Predicate::is_hook)
    }

    /// A hook has been satisfied at least once.
    pub fn is_hooked(&self) -> bool {
        self.hooked_id.is_some()
    }

    pub fn hooked_id(&self) -> Option<&str> {
        self.hooked_id.as_deref()
    }

    pub fn excluded_ids(&self) -> &HashSet<String> {
        &self.excluded
    }

    /// Replace the ids hooks must ignore.
    pub fn set_excluded<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded = ids.into_iter().map(Into::into).collect();
        debug!(excluded = ?self.excluded, "Hook exclusions set");
    }

    pub fn exclude_ids<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded.extend(ids.into_iter().map(Into::into));
    }

    fn needs_history(&self) -> bool {
        self.has_hook()
    }

    fn evaluate_at(
        &mut self,
        index: usize,
        view: &dyn MarketView,
        executions: Option<&[Execution]>,
        now: DateTime<Utc>,
    ) -> bool {
        match &self.predicates[index] {
            Predicate::Price {
                price_type,
                op,
                value,
            } => match view.price(*price_type, None) {
                Some(current) => op.apply(&current, value),
                None => {
                    debug!(price_type = %price_type, "No price yet, predicate false");
                    false
                }
            },
            Predicate::Time { op, value } => op.apply(&now, value),
            Predicate::Hook { source, target } => {
                let (source, target) = (source.clone(), *target);
                // Once hooked, later status changes of the source do not unhook.
                let hooked_here = self
                    .hooked_id
                    .as_deref()
                    .and_then(|id| source_key_of(id, &self.prefix))
                    .is_some_and(|key| key == source);
                if hooked_here {
                    return true;
                }
                let Some(executions) = executions else {
                    return false;
                };
                match resolve_hook(&self.prefix, &self.excluded, &source, target, executions) {
                    Some((id, true)) => {
                        if self.hooked_id.is_none() {
                            info!(source = %source, hooked_id = %id, "Hooked to source order");
                            self.hooked_id = Some(id);
                        }
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    // ========================================================================
    // Bounds and rebasing
    // ========================================================================

    /// `(low, high)` of the two time predicates.
    pub fn time_bounds(&self) -> ConditionResult<(DateTime<Utc>, DateTime<Utc>)> {
        let mut values: Vec<DateTime<Utc>> = self
            .predicates
            .iter()
            .filter_map(|p| match p {
                Predicate::Time { value, .. } => Some(*value),
                _ => None,
            })
            .collect();
        two_bounds(&mut values, Genre::Time)
    }

    /// `(low, high)` of the two predicates on `price_type`.
    pub fn price_bounds(&self, price_type: PriceType) -> ConditionResult<(Price, Price)> {
        let mut values = self.price_values(price_type);
        two_bounds(&mut values, Genre::Price(price_type))
    }

    /// Price type of the price predicates, `None` without price predicates.
    pub fn price_type(&self) -> Option<PriceType> {
        self.predicates.iter().find_map(|p| match p {
            Predicate::Price { price_type, .. } => Some(*price_type),
            _ => None,
        })
    }

    /// Time bounds as offsets from the reference time.
    pub fn relative_time_bounds(&self) -> ConditionResult<(Duration, Duration, DateTime<Utc>)> {
        let (low, high) = self.time_bounds()?;
        let reference = self
            .reference
            .as_ref()
            .ok_or_else(|| ConditionError::NoReference("time".to_string()))?;
        Ok((low - reference.time, high - reference.time, reference.time))
    }

    /// Price bounds as offsets from the reference price of `price_type`.
    pub fn relative_price_bounds(
        &self,
        price_type: PriceType,
    ) -> ConditionResult<(Decimal, Decimal, Price)> {
        let (low, high) = self.price_bounds(price_type)?;
        let reference = self.reference_price(price_type)?;
        Ok((
            low.inner() - reference.inner(),
            high.inner() - reference.inner(),
            reference,
        ))
    }

    /// Move every time and price bound onto a fresh reference, keeping offsets.
    ///
    /// New prices are rounded to the instrument tick when one is known.
    pub fn rebase(&mut self, view: &dyn MarketView, now: DateTime<Utc>) -> ConditionResult<Rebased> {
        let old = self
            .reference
            .clone()
            .ok_or_else(|| ConditionError::NoReference("rebase".to_string()))?;
        let new = Reference::capture(view, now);
        let tick = view.tick_size();
        let time_shift = new.time - old.time;

        let mut shifts = HashMap::new();
        for predicate in &self.predicates {
            if let Predicate::Price { price_type, .. } = predicate {
                let (Some(old_ref), Some(new_ref)) =
                    (old.prices.get(price_type), new.prices.get(price_type))
                else {
                    return Err(ConditionError::NoReference(price_type.to_string()));
                };
                shifts.insert(*price_type, new_ref.inner() - old_ref.inner());
            }
        }

        for predicate in &mut self.predicates {
            match predicate {
                Predicate::Time { value, .. } => *value = *value + time_shift,
                Predicate::Price {
                    price_type, value, ..
                } => {
                    let shift = shifts.get(price_type).copied().unwrap_or_default();
                    let moved = Price::new(value.inner() + shift);
                    *value = match tick {
                        Some(tick) => moved.round_half_up(tick),
                        None => moved,
                    };
                }
                Predicate::Hook { .. } => {}
            }
        }
        self.reference = Some(new);

        let rebased = Rebased {
            time: self.time_bounds().ok(),
            price: self
                .price_type()
                .and_then(|pt| self.price_bounds(pt).ok().map(|(l, h)| (pt, l, h))),
        };
        info!(time = ?rebased.time, price = ?rebased.price, "Condition rebased");
        Ok(rebased)
    }

    // ========================================================================
    // Updates
    // ========================================================================

    /// Retarget every predicate on `price_type`.
    pub fn set_price_value(&mut self, price_type: PriceType, new: Price) {
        for predicate in &mut self.predicates {
            if let Predicate::Price {
                price_type: pt,
                value,
                ..
            } = predicate
            {
                if *pt == price_type {
                    *value = new;
                }
            }
        }
    }

    /// Update the single predicate of `genre` with operator `op`.
    ///
    /// Returns `Ok(false)` when no predicate matches.
    pub fn update_value(
        &mut self,
        genre: Genre,
        op: Operator,
        value: PredicateValue,
    ) -> ConditionResult<bool> {
        let mut matching = self
            .predicates
            .iter_mut()
            .filter(|p| p.genre() == genre && p.op() == Some(op))
            .collect::<Vec<_>>();
        match matching.len() {
            0 => {
                warn!(genre = %genre, op = %op, "No predicate to update");
                Ok(false)
            }
            1 => {
                matching[0].set_value(value)?;
                Ok(true)
            }
            found => Err(ConditionError::AmbiguousUpdate {
                genre: genre.to_string(),
                op: op.to_string(),
                found,
            }),
        }
    }

    fn price_values(&self, price_type: PriceType) -> Vec<Price> {
        self.predicates
            .iter()
            .filter_map(|p| match p {
                Predicate::Price {
                    price_type: pt,
                    value,
                    ..
                } if *pt == price_type => Some(*value),
                _ => None,
            })
            .collect()
    }

    fn reference_price(&self, price_type: PriceType) -> ConditionResult<Price> {
        self.reference
            .as_ref()
            .and_then(|r| r.prices.get(&price_type).copied())
            .ok_or_else(|| ConditionError::NoReference(price_type.to_string()))
    }
}

fn two_bounds<T: Ord + Copy>(values: &mut [T], genre: Genre) -> ConditionResult<(T, T)> {
    if values.len() != 2 {
        return Err(ConditionError::MissingBounds {
            genre: genre.to_string(),
            found: values.len(),
        });
    }
    values.sort();
    Ok((values[0], values[1]))
}

/// Latest non-excluded order of `source` and whether its last report reached `target`.
pub(crate) fn resolve_hook(
    prefix: &str,
    excluded: &HashSet<String>,
    source: &SourceKey,
    target: HookTarget,
    executions: &[Execution],
) -> Option<(String, bool)> {
    let mut candidate: Option<&Execution> = None;
    for execution in executions {
        if excluded.contains(&execution.cl_ord_id) {
            continue;
        }
        if source_key_of(&execution.cl_ord_id, prefix).as_ref() != Some(source) {
            continue;
        }
        if candidate.map_or(true, |c| execution.transact_time >= c.transact_time) {
            candidate = Some(execution);
        }
    }
    let id = candidate?.cl_ord_id.clone();

    let latest = executions
        .iter()
        .filter(|e| e.cl_ord_id == id)
        .max_by_key(|e| e.transact_time)?;
    Some((id, target.matches(latest)))
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.predicates.is_empty() {
            return f.write_str("always");
        }
        let parts: Vec<String> = self.predicates.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join(" & "))?;
        if let Some(id) = &self.hooked_id {
            write!(f, " (hooked to {id})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{hook, price_window, time_window};
    use kola_core::{ExecType, LegRole, OrdStatus, StaticMarket};
    use rust_decimal_macros::dec;

    const PREFIX: &str = "mlk_";

    fn market(last: Decimal) -> StaticMarket {
        let market = StaticMarket::new(Price::new(dec!(0.5)));
        market.set_all_prices(Price::new(last));
        market
    }

    fn execution(cl_ord_id: &str, status: OrdStatus, at: DateTime<Utc>) -> Execution {
        Execution {
            order_id: format!("ex-{cl_ord_id}"),
            cl_ord_id: cl_ord_id.to_string(),
            side: None,
            order_qty: None,
            price: None,
            stop_px: None,
            exec_type: ExecType::Trade,
            ord_type: None,
            exec_inst: String::new(),
            ord_status: status,
            triggered: String::new(),
            transact_time: at,
        }
    }

    #[test]
    fn test_empty_condition_is_true() {
        let mut condition = Condition::new(PREFIX, vec![]);
        assert!(condition.evaluate(&market(dec!(100)), Utc::now()));
        assert!(!condition.timed_out(Utc::now()));
        assert_eq!(condition.to_string(), "always");
    }

    #[test]
    fn test_price_predicate_follows_market() {
        let view = market(dec!(99));
        let mut condition = Condition::new(
            PREFIX,
            vec![Predicate::Price {
                price_type: PriceType::LastPrice,
                op: Operator::Lt,
                value: Price::new(dec!(100)),
            }],
        );
        assert!(condition.evaluate(&view, Utc::now()));
        view.set_price(PriceType::LastPrice, Price::new(dec!(100)));
        assert!(!condition.evaluate(&view, Utc::now()));
    }

    #[test]
    fn test_missing_price_is_false() {
        let view = StaticMarket::new(Price::new(dec!(0.5)));
        let mut condition = Condition::new(
            PREFIX,
            price_window(PriceType::MarkPrice, Price::new(dec!(1)), Price::new(dec!(2))),
        );
        assert!(!condition.evaluate(&view, Utc::now()));
    }

    #[test]
    fn test_timed_out_ignores_price_predicates() {
        let now = Utc::now();
        let mut predicates = time_window(now - Duration::minutes(10), now - Duration::seconds(1));
        predicates.extend(price_window(
            PriceType::LastPrice,
            Price::new(dec!(90)),
            Price::new(dec!(110)),
        ));
        let condition = Condition::new(PREFIX, predicates);
        assert!(condition.timed_out(now));

        let condition = Condition::new(PREFIX, time_window(now, now + Duration::minutes(1)));
        assert!(!condition.timed_out(now));
    }

    #[test]
    fn test_hook_picks_latest_candidate_and_sticks() {
        let t0 = Utc::now() - Duration::minutes(5);
        let view = market(dec!(100));
        view.push_execution(execution("mlk_entry-PO000000000001", OrdStatus::Filled, t0));
        view.push_execution(execution(
            "mlk_entry-PO000000000002",
            OrdStatus::Filled,
            t0 + Duration::minutes(1),
        ));
        view.push_execution(execution("mlk_other-PO000000000003", OrdStatus::Filled, t0));

        let source = SourceKey::new("entry", LegRole::Primary);
        let mut condition = Condition::new(
            PREFIX,
            hook(source, HookTarget::Status(OrdStatus::Filled)),
        );
        assert!(!condition.is_hooked());
        assert!(condition.evaluate(&view, Utc::now()));
        assert_eq!(condition.hooked_id(), Some("mlk_entry-PO000000000002"));

        assert!(condition.evaluate(&view, Utc::now()));
        assert_eq!(condition.hooked_id(), Some("mlk_entry-PO000000000002"));
    }

    #[test]
    fn test_hook_uses_latest_status_and_exclusions() {
        let t0 = Utc::now() - Duration::minutes(5);
        let view = market(dec!(100));
        view.push_execution(execution("mlk_entry-PO000000000001", OrdStatus::New, t0));
        view.push_execution(execution(
            "mlk_entry-PO000000000001",
            OrdStatus::Canceled,
            t0 + Duration::seconds(5),
        ));

        let source = SourceKey::new("entry", LegRole::Primary);
        let mut filled = Condition::new(
            PREFIX,
            hook(source.clone(), HookTarget::Status(OrdStatus::Filled)),
        );
        assert!(!filled.evaluate(&view, Utc::now()));

        let mut canceled = Condition::new(
            PREFIX,
            hook(source, HookTarget::Status(OrdStatus::Canceled)),
        );
        canceled.set_excluded(["mlk_entry-PO000000000001"]);
        assert!(!canceled.evaluate(&view, Utc::now()));
        canceled.set_excluded(Vec::<String>::new());
        assert!(canceled.evaluate_hooks(&view));
    }

    #[test]
    fn test_triggered_hook_reads_marker() {
        let view = market(dec!(100));
        let mut stop = execution("mlk_exit-SO000000000001", OrdStatus::New, Utc::now());
        stop.triggered = kola_core::STOP_TRIGGERED.to_string();
        view.push_execution(stop);

        let mut condition = Condition::new(
            PREFIX,
            hook(SourceKey::new("exit", LegRole::Secondary), HookTarget::Triggered),
        );
        assert!(condition.evaluate(&view, Utc::now()));
    }

    #[test]
    fn test_relative_bounds_and_rebase() {
        let t0 = Utc::now();
        let view = market(dec!(100));
        let mut predicates = time_window(t0 + Duration::seconds(10), t0 + Duration::seconds(70));
        predicates.extend(price_window(
            PriceType::LastPrice,
            Price::new(dec!(95)),
            Price::new(dec!(110)),
        ));
        let mut condition = Condition::anchored(PREFIX, predicates, &view, t0);

        let (low, high, reference) = condition.relative_price_bounds(PriceType::LastPrice).unwrap();
        assert_eq!((low, high), (dec!(-5), dec!(10)));
        assert_eq!(reference, Price::new(dec!(100)));

        let (low, high, _) = condition.relative_time_bounds().unwrap();
        assert_eq!((low, high), (Duration::seconds(10), Duration::seconds(70)));

        view.set_all_prices(Price::new(dec!(200)));
        let t1 = t0 + Duration::minutes(30);
        let rebased = condition.rebase(&view, t1).unwrap();

        assert_eq!(
            rebased.price,
            Some((PriceType::LastPrice, Price::new(dec!(195)), Price::new(dec!(210))))
        );
        assert_eq!(
            rebased.time,
            Some((t1 + Duration::seconds(10), t1 + Duration::seconds(70)))
        );
    }

    #[test]
    fn test_rebase_needs_reference() {
        let mut condition = Condition::new(PREFIX, vec![]);
        assert!(matches!(
            condition.rebase(&market(dec!(1)), Utc::now()),
            Err(ConditionError::NoReference(_))
        ));
    }

    #[test]
    fn test_updates() {
        let mut condition = Condition::new(
            PREFIX,
            price_window(PriceType::LastPrice, Price::new(dec!(90)), Price::new(dec!(110))),
        );
        let updated = condition
            .update_value(
                Genre::Price(PriceType::LastPrice),
                Operator::Lt,
                PredicateValue::Price(Price::new(dec!(120))),
            )
            .unwrap();
        assert!(updated);
        assert_eq!(
            condition.price_bounds(PriceType::LastPrice).unwrap(),
            (Price::new(dec!(90)), Price::new(dec!(120)))
        );

        assert!(!condition
            .update_value(Genre::Time, Operator::Lt, PredicateValue::Time(Utc::now()))
            .unwrap());

        condition.set_price_value(PriceType::LastPrice, Price::new(dec!(100)));
        assert_eq!(
            condition.price_bounds(PriceType::LastPrice).unwrap(),
            (Price::new(dec!(100)), Price::new(dec!(100)))
        );
        assert!(matches!(
            condition.update_value(
                Genre::Price(PriceType::LastPrice),
                Operator::Gt,
                PredicateValue::Time(Utc::now())
            ),
            Err(ConditionError::ValueMismatch(_))
        ));
    }

    #[test]
    fn test_hook_stays_satisfied_after_source_moves_on() {
        let t0 = Utc::now() - Duration::minutes(5);
        let view = market(dec!(100));
        view.push_execution(execution("mlk_entry-PO000000000001", OrdStatus::New, t0));

        let mut condition = Condition::new(
            PREFIX,
            hook(
                SourceKey::new("entry", LegRole::Primary),
                HookTarget::Status(OrdStatus::New),
            ),
        );
        assert!(condition.evaluate(&view, Utc::now()));

        view.push_execution(execution(
            "mlk_entry-PO000000000001",
            OrdStatus::Filled,
            t0 + Duration::minutes(1),
        ));
        assert!(condition.evaluate(&view, Utc::now()));
    }
}
