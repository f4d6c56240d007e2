//! Per-submitter sliding submission counters with trust tiers and blocks.
//!
//! Counters roll over lazily on access — there is no background timer.
//! The decision itself must run under the store's per-map lock so that
//! concurrent submissions from one submitter cannot both pass.

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};

/// Hourly/daily submission ceilings for one trust tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimits {
    pub hourly: u32,
    pub daily: u32,
}

pub const UNTRUSTED_LIMITS: RateLimits = RateLimits {
    hourly: 3,
    daily: 10,
};

pub const TRUSTED_LIMITS: RateLimits = RateLimits {
    hourly: 10,
    daily: 50,
};

impl RateLimits {
    pub fn for_trust(trusted: bool) -> Self {
        if trusted {
            TRUSTED_LIMITS
        } else {
            UNTRUSTED_LIMITS
        }
    }
}

/// Why a submission was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    Blocked,
    HourlyLimit,
    DailyLimit,
}

impl DenyReason {
    /// The user-facing message rendered by the UI layer.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Blocked => "blocked",
            Self::HourlyLimit => "hourly limit reached",
            Self::DailyLimit => "daily limit reached",
        }
    }
}

/// Outcome of a check-and-consume call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RateLimitDecision {
    Allowed {
        remaining_hourly: u32,
        remaining_daily: u32,
    },
    Denied {
        reason: DenyReason,
        reset_at: Option<DateTime<Utc>>,
    },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Rolling counters for one submitter. Created lazily on first submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitRecord {
    pub submitter_id: String,
    pub hourly_count: u32,
    pub daily_count: u32,
    pub hour_window_start: DateTime<Utc>,
    pub day_window_start: DateTime<Utc>,
    pub is_trusted: bool,
    pub is_blocked: bool,
    pub blocked_until: Option<DateTime<Utc>>,
    pub last_submission_at: Option<DateTime<Utc>>,
}

impl RateLimitRecord {
    pub fn new(submitter_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            submitter_id: submitter_id.into(),
            hourly_count: 0,
            daily_count: 0,
            hour_window_start: hour_start(now),
            day_window_start: day_start(now),
            is_trusted: false,
            is_blocked: false,
            blocked_until: None,
            last_submission_at: None,
        }
    }

    /// Zero any counter whose window has lapsed and restamp the window.
    /// Runs before every threshold check.
    fn roll_over(&mut self, now: DateTime<Utc>) {
        let today = day_start(now);
        if self.day_window_start < today {
            self.daily_count = 0;
            self.day_window_start = today;
        }
        let this_hour = hour_start(now);
        if self.hour_window_start < this_hour {
            self.hourly_count = 0;
            self.hour_window_start = this_hour;
        }
    }

    /// Gate one submission: roll the windows, check thresholds, and on
    /// success consume one slot from both counters.
    pub fn check_and_consume(&mut self, now: DateTime<Utc>) -> RateLimitDecision {
        if self.is_blocked && self.blocked_until.is_none_or(|until| until > now) {
            return RateLimitDecision::Denied {
                reason: DenyReason::Blocked,
                reset_at: self.blocked_until,
            };
        }

        self.roll_over(now);
        let limits = RateLimits::for_trust(self.is_trusted);

        if self.hourly_count >= limits.hourly {
            return RateLimitDecision::Denied {
                reason: DenyReason::HourlyLimit,
                reset_at: Some(hour_start(now) + Duration::hours(1)),
            };
        }
        if self.daily_count >= limits.daily {
            return RateLimitDecision::Denied {
                reason: DenyReason::DailyLimit,
                reset_at: Some(day_start(now) + Duration::days(1)),
            };
        }

        self.hourly_count += 1;
        self.daily_count += 1;
        self.last_submission_at = Some(now);
        RateLimitDecision::Allowed {
            remaining_hourly: limits.hourly - self.hourly_count,
            remaining_daily: limits.daily - self.daily_count,
        }
    }
}

/// Truncate to the start of the hour containing `now`.
pub fn hour_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.duration_trunc(Duration::hours(1)).unwrap_or(now)
}

/// Truncate to midnight of the day containing `now`.
pub fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.duration_trunc(Duration::days(1)).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 7, h, m, 0).unwrap()
    }

    #[test]
    fn fourth_submission_in_an_hour_is_denied() {
        let mut rec = RateLimitRecord::new("citizen-1", at(10, 0));
        for i in 0..3 {
            let d = rec.check_and_consume(at(10, 5 + i));
            assert!(d.is_allowed(), "submission {i} should pass");
        }
        match rec.check_and_consume(at(10, 30)) {
            RateLimitDecision::Denied { reason, reset_at } => {
                assert_eq!(reason, DenyReason::HourlyLimit);
                assert_eq!(reason.message(), "hourly limit reached");
                assert_eq!(reset_at, Some(at(11, 0)));
            }
            other => panic!("expected denial, got {other:?}"),
        }
    }

    #[test]
    fn hour_boundary_resets_the_hourly_counter() {
        let mut rec = RateLimitRecord::new("citizen-1", at(10, 0));
        for i in 0..3 {
            assert!(rec.check_and_consume(at(10, 5 + i)).is_allowed());
        }
        assert!(!rec.check_and_consume(at(10, 59)).is_allowed());

        let d = rec.check_and_consume(at(11, 1));
        assert!(d.is_allowed());
        assert_eq!(rec.hourly_count, 1);
        // Daily counter keeps accumulating across the hour boundary.
        assert_eq!(rec.daily_count, 4);
    }

    #[test]
    fn daily_limit_kicks_in_after_hourly_windows_pass() {
        let mut rec = RateLimitRecord::new("citizen-1", at(0, 0));
        // 10 allowed submissions spread over hours 0..4 (3+3+3+1).
        let mut allowed = 0;
        'outer: for hour in 0..4 {
            for minute in [1, 2, 3] {
                if allowed == 10 {
                    break 'outer;
                }
                assert!(rec.check_and_consume(at(hour, minute)).is_allowed());
                allowed += 1;
            }
        }
        match rec.check_and_consume(at(5, 0)) {
            RateLimitDecision::Denied { reason, reset_at } => {
                assert_eq!(reason, DenyReason::DailyLimit);
                assert_eq!(
                    reset_at,
                    Some(Utc.with_ymd_and_hms(2025, 4, 8, 0, 0, 0).unwrap())
                );
            }
            other => panic!("expected daily denial, got {other:?}"),
        }
    }

    #[test]
    fn day_boundary_resets_the_daily_counter() {
        let mut rec = RateLimitRecord::new("citizen-1", at(23, 0));
        rec.daily_count = 10;
        rec.hourly_count = 0;
        assert!(!rec.check_and_consume(at(23, 30)).is_allowed());

        let next_day = Utc.with_ymd_and_hms(2025, 4, 8, 0, 5, 0).unwrap();
        let d = rec.check_and_consume(next_day);
        assert!(d.is_allowed());
        assert_eq!(rec.daily_count, 1);
    }

    #[test]
    fn trusted_submitters_get_higher_ceilings() {
        let mut rec = RateLimitRecord::new("inspector-9", at(9, 0));
        rec.is_trusted = true;
        for i in 0..10 {
            assert!(
                rec.check_and_consume(at(9, 1 + i)).is_allowed(),
                "trusted submission {i}"
            );
        }
        assert!(!rec.check_and_consume(at(9, 45)).is_allowed());
    }

    #[test]
    fn blocked_submitter_is_denied_with_expiry() {
        let mut rec = RateLimitRecord::new("abuser", at(9, 0));
        rec.is_blocked = true;
        rec.blocked_until = Some(at(18, 0));
        match rec.check_and_consume(at(10, 0)) {
            RateLimitDecision::Denied { reason, reset_at } => {
                assert_eq!(reason, DenyReason::Blocked);
                assert_eq!(reason.message(), "blocked");
                assert_eq!(reset_at, Some(at(18, 0)));
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn indefinite_block_never_expires() {
        let mut rec = RateLimitRecord::new("abuser", at(9, 0));
        rec.is_blocked = true;
        rec.blocked_until = None;
        assert!(!rec.check_and_consume(at(10, 0)).is_allowed());
    }

    #[test]
    fn expired_block_lets_submissions_through() {
        let mut rec = RateLimitRecord::new("reformed", at(9, 0));
        rec.is_blocked = true;
        rec.blocked_until = Some(at(9, 30));
        assert!(rec.check_and_consume(at(10, 0)).is_allowed());
    }

    #[test]
    fn remaining_counts_decrement_from_max() {
        let mut rec = RateLimitRecord::new("citizen-1", at(10, 0));
        match rec.check_and_consume(at(10, 5)) {
            RateLimitDecision::Allowed {
                remaining_hourly,
                remaining_daily,
            } => {
                assert_eq!(remaining_hourly, 2);
                assert_eq!(remaining_daily, 9);
            }
            other => panic!("expected allow, got {other:?}"),
        }
    }

    #[test]
    fn window_helpers_truncate() {
        let t = Utc.with_ymd_and_hms(2025, 4, 7, 14, 37, 22).unwrap();
        assert_eq!(hour_start(t), at(14, 0));
        assert_eq!(day_start(t), at(0, 0));
    }
}
