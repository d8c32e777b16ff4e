//! Fixed-window request limiter.
//!
//! Counters live in process memory, so every warm function instance enforces
//! its own budget. Two instances behind the same endpoint each allow
//! `max_requests` per window; this is abuse mitigation, not a global quota.
//! Concurrent checks for the same key are serialised by a mutex, but nothing
//! is shared across instances.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Budget for one caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests allowed inside one window
    pub max_requests: u32,
    /// Window length in milliseconds
    pub window_ms: i64,
}

impl RateLimitConfig {
    pub const fn per_minute(max_requests: u32) -> Self {
        Self {
            max_requests,
            window_ms: 60 * 1000,
        }
    }
}

/// Counter state for one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRecord {
    pub count: u32,
    pub reset_at: DateTime<Utc>,
}

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Budget the decision was made against, echoed in `X-RateLimit-Limit`
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, rounded up and never negative.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.reset_at - now).num_milliseconds().max(0) as u64;
        millis.div_ceil(1000)
    }
}

/// In-memory fixed-window limiter keyed by client identifier.
#[derive(Debug, Default)]
pub struct RateLimiter {
    records: Mutex<HashMap<String, RateLimitRecord>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, RateLimitRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check and count a request from `identifier`.
    pub fn check(&self, identifier: &str, config: &RateLimitConfig) -> RateLimitDecision {
        self.check_at(identifier, config, Utc::now())
    }

    /// Same as [`check`](Self::check) with an explicit clock reading.
    ///
    /// A denied request is not counted against the window: once the budget is
    /// spent the record stays at `max_requests` until it expires.
    pub fn check_at(
        &self,
        identifier: &str,
        config: &RateLimitConfig,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let mut records = self.records();

        match records.get_mut(identifier) {
            Some(record) if now <= record.reset_at => {
                if record.count >= config.max_requests {
                    return RateLimitDecision {
                        allowed: false,
                        limit: config.max_requests,
                        remaining: 0,
                        reset_at: record.reset_at,
                    };
                }

                record.count += 1;
                RateLimitDecision {
                    allowed: true,
                    limit: config.max_requests,
                    remaining: config.max_requests - record.count,
                    reset_at: record.reset_at,
                }
            }
            _ => {
                let reset_at = now + Duration::milliseconds(config.window_ms);
                records.insert(
                    identifier.to_string(),
                    RateLimitRecord { count: 1, reset_at },
                );
                RateLimitDecision {
                    allowed: config.max_requests > 0,
                    limit: config.max_requests,
                    remaining: config.max_requests.saturating_sub(1),
                    reset_at,
                }
            }
        }
    }

    /// Drop every record whose window has already closed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut records = self.records();
        let before = records.len();
        records.retain(|_, record| now <= record.reset_at);
        before - records.len()
    }

    /// Snapshot of the record held for `identifier`, if any.
    pub fn record(&self, identifier: &str) -> Option<RateLimitRecord> {
        self.records().get(identifier).copied()
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    const CONFIG: RateLimitConfig = RateLimitConfig {
        max_requests: 3,
        window_ms: 60_000,
    };

    #[test]
    fn test_remaining_decreases_within_window() {
        let limiter = RateLimiter::new();
        let now = start();

        let remaining: Vec<u32> = (0..3)
            .map(|i| {
                let decision = limiter.check_at("1.2.3.4", &CONFIG, now + Duration::seconds(i));
                assert!(decision.allowed);
                decision.remaining
            })
            .collect();

        assert_eq!(remaining, vec![2, 1, 0]);
    }

    #[test]
    fn test_request_over_budget_is_denied_with_same_reset() {
        let limiter = RateLimiter::new();
        let now = start();

        let first = limiter.check_at("ip", &CONFIG, now);
        limiter.check_at("ip", &CONFIG, now);
        limiter.check_at("ip", &CONFIG, now);
        let denied = limiter.check_at("ip", &CONFIG, now + Duration::seconds(10));

        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.reset_at, first.reset_at);
        assert_eq!(first.reset_at, now + Duration::milliseconds(60_000));
        assert_eq!(limiter.record("ip").unwrap().count, 3);
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let limiter = RateLimiter::new();
        let now = start();

        for _ in 0..4 {
            limiter.check_at("ip", &CONFIG, now);
        }

        let later = now + Duration::milliseconds(60_001);
        let decision = limiter.check_at("ip", &CONFIG, later);

        assert!(decision.allowed);
        assert_eq!(decision.remaining, 2);
        assert_eq!(decision.reset_at, later + Duration::milliseconds(60_000));
        assert_eq!(limiter.record("ip").unwrap().count, 1);
    }

    #[test]
    fn test_identifiers_are_independent() {
        let limiter = RateLimiter::new();
        let now = start();

        for _ in 0..3 {
            limiter.check_at("a", &CONFIG, now);
        }

        assert!(!limiter.check_at("a", &CONFIG, now).allowed);
        assert!(limiter.check_at("b", &CONFIG, now).allowed);
    }

    #[test]
    fn test_sweep_removes_only_expired_records() {
        let limiter = RateLimiter::new();
        let now = start();

        limiter.check_at("old", &CONFIG, now);
        limiter.check_at("fresh", &CONFIG, now + Duration::seconds(50));

        let removed = limiter.sweep_expired_at(now + Duration::seconds(61));

        assert_eq!(removed, 1);
        assert!(limiter.record("old").is_none());
        assert!(limiter.record("fresh").is_some());
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let now = start();
        let decision = RateLimitDecision {
            allowed: false,
            limit: 3,
            remaining: 0,
            reset_at: now + Duration::milliseconds(1_200),
        };

        assert_eq!(decision.retry_after_secs(now), 2);
        assert_eq!(decision.retry_after_secs(now + Duration::seconds(5)), 0);
    }
}
