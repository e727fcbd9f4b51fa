//! The per-token cycle state machine, separated from task plumbing so the
//! transition rules can be exercised without time or channels.
//!
//! Invariants maintained here:
//! - `buy_count <= cycle_buys` and `sell_count <= cycle_sells` at all times;
//! - counters only increase within a phase and reset together on flip;
//! - a flip only happens when the current phase's counter has reached its
//!   target, and consumes the tick that would otherwise exceed it;
//! - the check result always reflects the most recent tick, traded or not.

use chrono::{DateTime, Utc};
use flywheel_core::{CheckResult, CycleState, Phase, TokenConfig};

/// What a tick should do, decided before touching the rate limiter or the
/// executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPlan {
    /// The configured interval has not elapsed since the last trade.
    NotDue,
    /// The current phase reached its target; this tick flips instead of
    /// trading.
    Flip,
    /// Attempt one trade of the given phase.
    Trade(Phase),
}

/// Condensed executor result after the confirmation timeout has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeResult {
    Filled,
    InsufficientFunds,
    /// Timeout or chain error; retried on the next tick.
    Failed,
}

/// Decides the next action for a token.
#[must_use]
pub fn plan_tick(state: &CycleState, config: &TokenConfig, now: DateTime<Utc>) -> TickPlan {
    if let Some(last) = state.last_trade_at {
        let interval = i64::try_from(config.interval_secs).unwrap_or(i64::MAX);
        // A backwards clock jump also lands here and waits the interval out.
        if (now - last).num_seconds() < interval {
            return TickPlan::NotDue;
        }
    }
    if state.current_count() >= config.target_for(state.phase) {
        return TickPlan::Flip;
    }
    TickPlan::Trade(state.phase)
}

/// Flips the phase and resets both counters. The flip tick records
/// `balanced`: the cycle completed a full set without trading this tick.
pub fn apply_flip(state: &mut CycleState, now: DateTime<Utc>) {
    state.phase = state.phase.flipped();
    state.buy_count = 0;
    state.sell_count = 0;
    state.last_check_at = Some(now);
    state.last_check_result = Some(CheckResult::Balanced);
}

/// Records a rate-limiter denial. No counter movement, no executor contact.
pub fn apply_rate_limited(state: &mut CycleState, now: DateTime<Utc>) {
    state.last_check_at = Some(now);
    state.last_check_result = Some(CheckResult::RateLimited);
}

/// Applies the executor's outcome for the current phase. Only a fill advances
/// the counter or the last-trade timestamp.
pub fn apply_trade_result(state: &mut CycleState, result: TradeResult, now: DateTime<Utc>) {
    state.last_check_at = Some(now);
    match result {
        TradeResult::Filled => {
            match state.phase {
                Phase::Buy => state.buy_count += 1,
                Phase::Sell => state.sell_count += 1,
            }
            state.last_trade_at = Some(now);
            state.last_check_result = Some(CheckResult::Traded);
        }
        TradeResult::InsufficientFunds => {
            state.last_check_result = Some(CheckResult::InsufficientFunds);
        }
        TradeResult::Failed => {
            state.last_check_result = Some(CheckResult::Error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn config_2x2() -> TokenConfig {
        TokenConfig {
            cycle_buys: 2,
            cycle_sells: 2,
            interval_secs: 60,
            ..TokenConfig::default()
        }
    }

    /// Runs one successful tick: trades when planned, flips when due.
    fn successful_tick(state: &mut CycleState, config: &TokenConfig, now: DateTime<Utc>) {
        match plan_tick(state, config, now) {
            TickPlan::NotDue => panic!("tick unexpectedly not due"),
            TickPlan::Flip => apply_flip(state, now),
            TickPlan::Trade(_) => apply_trade_result(state, TradeResult::Filled, now),
        }
    }

    #[test]
    fn two_by_two_cycle_follows_the_documented_sequence() {
        let config = config_2x2();
        let mut state = CycleState::new(Uuid::new_v4());
        let mut now = Utc::now();

        let mut observed = Vec::new();
        for _ in 0..6 {
            now += Duration::seconds(61);
            successful_tick(&mut state, &config, now);
            observed.push((state.phase, state.current_count()));
        }

        assert_eq!(
            observed,
            vec![
                (Phase::Buy, 1),
                (Phase::Buy, 2),
                (Phase::Sell, 0),
                (Phase::Sell, 1),
                (Phase::Sell, 2),
                (Phase::Buy, 0),
            ]
        );
    }

    #[test]
    fn counters_never_exceed_cycle_sizes() {
        let config = config_2x2();
        let mut state = CycleState::new(Uuid::new_v4());
        let mut now = Utc::now();

        for _ in 0..50 {
            now += Duration::seconds(61);
            successful_tick(&mut state, &config, now);
            assert!(state.buy_count <= config.cycle_buys);
            assert!(state.sell_count <= config.cycle_sells);
        }
    }

    #[test]
    fn flip_resets_both_counters_and_records_balanced() {
        let config = config_2x2();
        let mut state = CycleState::new(Uuid::new_v4());
        state.buy_count = 2;
        let now = Utc::now();

        assert_eq!(plan_tick(&state, &config, now), TickPlan::Flip);
        apply_flip(&mut state, now);
        assert_eq!(state.phase, Phase::Sell);
        assert_eq!((state.buy_count, state.sell_count), (0, 0));
        assert_eq!(state.last_check_result, Some(CheckResult::Balanced));
    }

    #[test]
    fn flip_never_happens_below_target() {
        let config = config_2x2();
        let mut state = CycleState::new(Uuid::new_v4());
        state.buy_count = 1;
        assert_eq!(
            plan_tick(&state, &config, Utc::now()),
            TickPlan::Trade(Phase::Buy)
        );
    }

    #[test]
    fn tick_is_not_due_before_the_interval_elapses() {
        let config = config_2x2();
        let mut state = CycleState::new(Uuid::new_v4());
        let now = Utc::now();
        apply_trade_result(&mut state, TradeResult::Filled, now);

        assert_eq!(
            plan_tick(&state, &config, now + Duration::seconds(30)),
            TickPlan::NotDue
        );
        assert_eq!(
            plan_tick(&state, &config, now + Duration::seconds(60)),
            TickPlan::Trade(Phase::Buy)
        );
    }

    #[test]
    fn first_ever_tick_is_due_immediately() {
        let state = CycleState::new(Uuid::new_v4());
        assert_eq!(
            plan_tick(&state, &config_2x2(), Utc::now()),
            TickPlan::Trade(Phase::Buy)
        );
    }

    #[test]
    fn failed_trade_keeps_counters_and_next_tick_retries() {
        let config = config_2x2();
        let mut state = CycleState::new(Uuid::new_v4());
        let now = Utc::now();

        apply_trade_result(&mut state, TradeResult::Failed, now);
        assert_eq!((state.buy_count, state.sell_count), (0, 0));
        assert_eq!(state.last_check_result, Some(CheckResult::Error));
        assert!(state.last_trade_at.is_none());

        // No last_trade_at movement means the retry is due right away.
        assert_eq!(
            plan_tick(&state, &config, now + Duration::seconds(1)),
            TickPlan::Trade(Phase::Buy)
        );
    }

    #[test]
    fn insufficient_funds_is_informational_not_an_error() {
        let mut state = CycleState::new(Uuid::new_v4());
        apply_trade_result(&mut state, TradeResult::InsufficientFunds, Utc::now());
        assert_eq!(
            state.last_check_result,
            Some(CheckResult::InsufficientFunds)
        );
        assert_eq!(state.buy_count, 0);
    }

    #[test]
    fn rate_limited_tick_still_updates_the_check_result() {
        let mut state = CycleState::new(Uuid::new_v4());
        let now = Utc::now();
        apply_rate_limited(&mut state, now);
        assert_eq!(state.last_check_result, Some(CheckResult::RateLimited));
        assert_eq!(state.last_check_at, Some(now));
        assert!(state.last_trade_at.is_none());
    }
}
