//! Process-wide quota and circuit-breaker state.
//!
//! This is the one piece of deliberately shared mutable state in the core.
//! Every read-then-write — daily counter, cooldown check, failure count,
//! request spacing — happens inside `admit`, which callers invoke while
//! holding the single mutex that owns the state. Two callers can never
//! both decide "I may call the provider" against stale fields.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaLimits {
    pub daily_cap: u32,
    pub min_interval_secs: u64,
    pub cooldown_secs: u64,
    pub max_consecutive_failures: u32,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            daily_cap: 500,
            min_interval_secs: 2,
            cooldown_secs: 60,
            max_consecutive_failures: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Breaker open: too many consecutive failures.
    Disabled,
    CoolingDown,
    DailyCapReached,
    /// Minimum spacing since the last request has not elapsed. Fail-fast,
    /// callers never queue on this.
    TooSoon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Granted,
    Denied(DenyReason),
}

#[derive(Debug, Clone)]
pub struct QuotaState {
    pub requests_today: u32,
    pub daily_reset_day: NaiveDate,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub last_request_at: Option<DateTime<Utc>>,
}

impl QuotaState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            requests_today: 0,
            daily_reset_day: now.date_naive(),
            cooldown_until: None,
            consecutive_failures: 0,
            last_request_at: None,
        }
    }

    /// Decide whether a provider call may go out now, and if so, record it.
    ///
    /// Granting and recording are one step: the caller that receives
    /// `Granted` has already consumed a slot, so a concurrent caller
    /// evaluating afterwards sees the updated counters.
    pub fn admit(&mut self, limits: &QuotaLimits, now: DateTime<Utc>) -> Admission {
        if self.consecutive_failures >= limits.max_consecutive_failures {
            return Admission::Denied(DenyReason::Disabled);
        }

        let today = now.date_naive();
        if today != self.daily_reset_day {
            self.requests_today = 0;
            self.daily_reset_day = today;
        }

        if let Some(until) = self.cooldown_until {
            if now < until {
                return Admission::Denied(DenyReason::CoolingDown);
            }
            self.cooldown_until = None;
        }

        if self.requests_today >= limits.daily_cap {
            return Admission::Denied(DenyReason::DailyCapReached);
        }

        if let Some(last) = self.last_request_at {
            let spacing = ChronoDuration::seconds(limits.min_interval_secs as i64);
            if now - last < spacing {
                return Admission::Denied(DenyReason::TooSoon);
            }
        }

        self.requests_today += 1;
        self.last_request_at = Some(now);
        Admission::Granted
    }

    /// Success heals the breaker one step; intermittent success keeps the
    /// client alive under a flaky provider.
    pub fn record_success(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_sub(1);
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
    }

    /// Provider-signaled rate limiting: cool down without counting toward
    /// the hard failure limit.
    pub fn record_rate_limited(&mut self, limits: &QuotaLimits, now: DateTime<Utc>) {
        self.cooldown_until = Some(now + ChronoDuration::seconds(limits.cooldown_secs as i64));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, hour, minute, second).unwrap()
    }

    fn limits() -> QuotaLimits {
        QuotaLimits {
            daily_cap: 3,
            min_interval_secs: 10,
            cooldown_secs: 60,
            max_consecutive_failures: 2,
        }
    }

    #[test]
    fn test_daily_cap_is_enforced() {
        let limits = limits();
        let mut state = QuotaState::new(at(9, 0, 0));
        assert_eq!(state.admit(&limits, at(9, 0, 0)), Admission::Granted);
        assert_eq!(state.admit(&limits, at(9, 1, 0)), Admission::Granted);
        assert_eq!(state.admit(&limits, at(9, 2, 0)), Admission::Granted);
        assert_eq!(
            state.admit(&limits, at(9, 3, 0)),
            Admission::Denied(DenyReason::DailyCapReached)
        );
        assert_eq!(state.requests_today, 3);
    }

    #[test]
    fn test_counter_resets_exactly_once_per_day_boundary() {
        let limits = limits();
        let mut state = QuotaState::new(at(23, 0, 0));
        for minute in 0..3 {
            assert_eq!(state.admit(&limits, at(23, minute, 0)), Admission::Granted);
        }
        assert_eq!(
            state.admit(&limits, at(23, 59, 0)),
            Admission::Denied(DenyReason::DailyCapReached)
        );

        let next_day = Utc.with_ymd_and_hms(2024, 6, 16, 0, 1, 0).unwrap();
        assert_eq!(state.admit(&limits, next_day), Admission::Granted);
        assert_eq!(state.requests_today, 1);

        // A later call on the same new day must not reset again.
        let later = Utc.with_ymd_and_hms(2024, 6, 16, 8, 0, 0).unwrap();
        assert_eq!(state.admit(&limits, later), Admission::Granted);
        assert_eq!(state.requests_today, 2);
    }

    #[test]
    fn test_minimum_spacing_fails_fast() {
        let limits = limits();
        let mut state = QuotaState::new(at(9, 0, 0));
        assert_eq!(state.admit(&limits, at(9, 0, 0)), Admission::Granted);
        assert_eq!(
            state.admit(&limits, at(9, 0, 5)),
            Admission::Denied(DenyReason::TooSoon)
        );
        assert_eq!(state.admit(&limits, at(9, 0, 15)), Admission::Granted);
    }

    #[test]
    fn test_spacing_denial_does_not_consume_quota() {
        let limits = limits();
        let mut state = QuotaState::new(at(9, 0, 0));
        state.admit(&limits, at(9, 0, 0));
        state.admit(&limits, at(9, 0, 1));
        assert_eq!(state.requests_today, 1);
    }

    #[test]
    fn test_breaker_opens_and_self_heals() {
        let limits = limits();
        let mut state = QuotaState::new(at(9, 0, 0));
        state.record_failure();
        state.record_failure();
        assert_eq!(
            state.admit(&limits, at(9, 0, 0)),
            Admission::Denied(DenyReason::Disabled)
        );

        state.record_success();
        assert_eq!(state.admit(&limits, at(9, 0, 0)), Admission::Granted);
    }

    #[test]
    fn test_success_floor_is_zero() {
        let mut state = QuotaState::new(at(9, 0, 0));
        state.record_success();
        assert_eq!(state.consecutive_failures, 0);
    }

    #[test]
    fn test_rate_limit_cools_down_without_failure_count() {
        let limits = limits();
        let mut state = QuotaState::new(at(9, 0, 0));
        state.record_rate_limited(&limits, at(9, 0, 0));
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(
            state.admit(&limits, at(9, 0, 30)),
            Admission::Denied(DenyReason::CoolingDown)
        );
        assert_eq!(state.admit(&limits, at(9, 1, 30)), Admission::Granted);
    }
}
