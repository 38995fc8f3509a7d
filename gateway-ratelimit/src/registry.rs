//! Shared bucket table keyed by an opaque `kind:id` string (`§4.3`, `§5`).

use crate::limiter::{self, BucketState, LimitDecision, RateLimitStrategy};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

const IDLE_REAP_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

struct Bucket {
    strategy: RateLimitStrategy,
    state: Mutex<BucketState>,
    last_touched: Mutex<DateTime<Utc>>,
}

/// Concurrent table of rate-limit buckets, one per key. A per-bucket
/// [`parking_lot::Mutex`] guards mutation so two requests on different keys
/// never contend, matching the lock-per-key guarantee in `§5`.
#[derive(Default)]
pub struct LimiterRegistry {
    buckets: DashMap<String, Arc<Bucket>>,
}

impl LimiterRegistry {
    pub fn new() -> Self {
        Self { buckets: DashMap::new() }
    }

    /// Admit one hit of `cost` against `key`'s bucket, creating it with
    /// `strategy` on first use. If the bucket already exists with a
    /// different strategy (e.g. a config reload changed the route's
    /// default), it is reset to the new strategy's initial state.
    pub fn hit(&self, key: &str, strategy: RateLimitStrategy, now: DateTime<Utc>, cost: u32) -> LimitDecision {
        let bucket = self
            .buckets
            .entry(key.to_string())
            .and_modify(|b| {
                if b.strategy != strategy {
                    *b = Arc::new(Bucket {
                        strategy,
                        state: Mutex::new(BucketState::fresh(&strategy, now)),
                        last_touched: Mutex::new(now),
                    });
                }
            })
            .or_insert_with(|| {
                Arc::new(Bucket {
                    strategy,
                    state: Mutex::new(BucketState::fresh(&strategy, now)),
                    last_touched: Mutex::new(now),
                })
            })
            .clone();

        *bucket.last_touched.lock() = now;
        let mut state = bucket.state.lock();
        limiter::hit(&bucket.strategy, &mut state, now, cost)
    }

    /// Drop buckets untouched for more than 24 hours.
    pub fn cleanup(&self, now: DateTime<Utc>) {
        self.buckets.retain(|_, bucket| now - *bucket.last_touched.lock() < chrono::Duration::from_std(IDLE_REAP_AFTER).unwrap());
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(offset_secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(offset_secs)
    }

    #[test]
    fn distinct_keys_have_independent_buckets() {
        let registry = LimiterRegistry::new();
        let strategy = RateLimitStrategy::FixedWindow { window_ms: 60_000, max: 1 };
        assert!(registry.hit("api:a", strategy, t(0), 1).allowed);
        assert!(registry.hit("api:b", strategy, t(0), 1).allowed, "a different key must not share a's bucket");
        assert!(!registry.hit("api:a", strategy, t(0), 1).allowed);
    }

    #[test]
    fn idle_buckets_are_reaped() {
        let registry = LimiterRegistry::new();
        let strategy = RateLimitStrategy::FixedWindow { window_ms: 60_000, max: 1 };
        registry.hit("api:a", strategy, t(0), 1);
        assert_eq!(registry.len(), 1);
        registry.cleanup(t(25 * 60 * 60));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn strategy_change_resets_bucket() {
        let registry = LimiterRegistry::new();
        let strict = RateLimitStrategy::FixedWindow { window_ms: 60_000, max: 1 };
        let lenient = RateLimitStrategy::FixedWindow { window_ms: 60_000, max: 5 };
        registry.hit("api:a", strict, t(0), 1);
        assert!(!registry.hit("api:a", strict, t(0), 1).allowed);
        let decision = registry.hit("api:a", lenient, t(0), 1);
        assert!(decision.allowed, "reconfiguring the route resets the bucket's state");
    }
}
