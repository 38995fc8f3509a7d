//! Limiter primitives: fixed window, sliding window, token bucket (`§4.3`).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// A pluggable limiter strategy with its tunables. Matches the
/// route-to-strategy defaults table in `§4.3`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RateLimitStrategy {
    FixedWindow { window_ms: u64, max: u32 },
    SlidingWindow { window_ms: u64, max: u32 },
    TokenBucket { capacity: u32, refill_amount: u32, refill_period_ms: u64 },
}

impl RateLimitStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FixedWindow { .. } => "fixed-window",
            Self::SlidingWindow { .. } => "sliding-window",
            Self::TokenBucket { .. } => "token-bucket",
        }
    }

    fn initial_state(&self, now: DateTime<Utc>) -> BucketState {
        match self {
            Self::FixedWindow { .. } => BucketState::FixedWindow { window_start: now, count: 0 },
            Self::SlidingWindow { .. } => {
                BucketState::SlidingWindow { timestamps: VecDeque::new() }
            }
            Self::TokenBucket { capacity, .. } => {
                BucketState::TokenBucket { tokens: *capacity as f64, last_refill: now }
            }
        }
    }
}

/// Mutable state for one bucket. Lives behind a per-bucket lock in
/// [`crate::registry::LimiterRegistry`]; never shared across buckets.
#[derive(Debug, Clone)]
pub enum BucketState {
    FixedWindow { window_start: DateTime<Utc>, count: u32 },
    SlidingWindow { timestamps: VecDeque<DateTime<Utc>> },
    TokenBucket { tokens: f64, last_refill: DateTime<Utc> },
}

impl BucketState {
    pub fn fresh(strategy: &RateLimitStrategy, now: DateTime<Utc>) -> Self {
        strategy.initial_state(now)
    }
}

/// Outcome of one admission check, enough to populate `X-RateLimit-*`
/// headers or a `RateLimitError` (`§4.3`, `§4.4`).
#[derive(Debug, Clone, Serialize)]
pub struct LimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset: DateTime<Utc>,
    pub strategy_name: &'static str,
}

/// Check and (if admitted) mutate `state` in place for one hit of `cost`
/// tokens/requests against `strategy`, at time `now`.
pub fn hit(
    strategy: &RateLimitStrategy,
    state: &mut BucketState,
    now: DateTime<Utc>,
    cost: u32,
) -> LimitDecision {
    match (strategy, state) {
        (RateLimitStrategy::FixedWindow { window_ms, max }, BucketState::FixedWindow { window_start, count }) => {
            let window = ChronoDuration::milliseconds(*window_ms as i64);
            if now - *window_start >= window {
                *window_start = now;
                *count = 0;
            }
            let allowed = *count < *max;
            if allowed {
                *count += cost;
            }
            LimitDecision {
                allowed,
                limit: *max as u64,
                remaining: (*max as i64 - *count as i64).max(0) as u64,
                reset: *window_start + window,
                strategy_name: strategy.name(),
            }
        }
        (RateLimitStrategy::SlidingWindow { window_ms, max }, BucketState::SlidingWindow { timestamps }) => {
            let window = ChronoDuration::milliseconds(*window_ms as i64);
            let cutoff = now - window;
            while timestamps.front().is_some_and(|t| *t < cutoff) {
                timestamps.pop_front();
            }
            let allowed = timestamps.len() < *max as usize;
            if allowed {
                for _ in 0..cost {
                    timestamps.push_back(now);
                }
            }
            let reset = timestamps.front().copied().unwrap_or(now) + window;
            LimitDecision {
                allowed,
                limit: *max as u64,
                remaining: (*max as usize).saturating_sub(timestamps.len()) as u64,
                reset,
                strategy_name: strategy.name(),
            }
        }
        (
            RateLimitStrategy::TokenBucket { capacity, refill_amount, refill_period_ms },
            BucketState::TokenBucket { tokens, last_refill },
        ) => {
            let elapsed = (now - *last_refill).num_milliseconds().max(0) as u64;
            if *refill_period_ms > 0 {
                let periods = elapsed / *refill_period_ms;
                if periods > 0 {
                    *tokens = (*tokens + (periods * *refill_amount as u64) as f64).min(*capacity as f64);
                    *last_refill += ChronoDuration::milliseconds((periods * *refill_period_ms) as i64);
                }
            }
            let allowed = *tokens >= cost as f64;
            if allowed {
                *tokens -= cost as f64;
            }
            let periods_to_full = if *refill_amount > 0 {
                ((*capacity as f64 - *tokens) / *refill_amount as f64).ceil() as i64
            } else {
                0
            };
            let reset = *last_refill
                + ChronoDuration::milliseconds(periods_to_full.max(0) * *refill_period_ms as i64);
            LimitDecision {
                allowed,
                limit: *capacity as u64,
                remaining: tokens.floor().max(0.0) as u64,
                reset,
                strategy_name: strategy.name(),
            }
        }
        _ => unreachable!("BucketState always matches the strategy that created it"),
    }
}

/// Convenience: the `Duration` until a decision's reset instant, floored
/// at zero, for `Retry-After` headers.
pub fn retry_after(decision: &LimitDecision, now: DateTime<Utc>) -> Duration {
    (decision.reset - now).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(offset_ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + ChronoDuration::milliseconds(offset_ms)
    }

    #[test]
    fn fixed_window_admits_then_blocks() {
        let strategy = RateLimitStrategy::FixedWindow { window_ms: 1000, max: 2 };
        let mut state = BucketState::fresh(&strategy, t(0));
        assert!(hit(&strategy, &mut state, t(0), 1).allowed);
        assert!(hit(&strategy, &mut state, t(10), 1).allowed);
        assert!(!hit(&strategy, &mut state, t(20), 1).allowed);
        // after the window rolls, admits again
        assert!(hit(&strategy, &mut state, t(1001), 1).allowed);
    }

    #[test]
    fn sliding_window_evicts_old_timestamps() {
        let strategy = RateLimitStrategy::SlidingWindow { window_ms: 1000, max: 1 };
        let mut state = BucketState::fresh(&strategy, t(0));
        assert!(hit(&strategy, &mut state, t(0), 1).allowed);
        assert!(!hit(&strategy, &mut state, t(500), 1).allowed);
        assert!(hit(&strategy, &mut state, t(1001), 1).allowed);
    }

    #[test]
    fn token_bucket_burst_then_throttle() {
        let strategy =
            RateLimitStrategy::TokenBucket { capacity: 3, refill_amount: 1, refill_period_ms: 1000 };
        let mut state = BucketState::fresh(&strategy, t(0));
        assert!(hit(&strategy, &mut state, t(0), 1).allowed);
        assert!(hit(&strategy, &mut state, t(0), 1).allowed);
        assert!(hit(&strategy, &mut state, t(0), 1).allowed);
        assert!(!hit(&strategy, &mut state, t(0), 1).allowed, "burst of capacity exhausts the bucket");
        assert!(hit(&strategy, &mut state, t(1000), 1).allowed, "one refill period admits one more");
    }

    #[test]
    fn exactly_at_limit_admits_limit_plus_one_rejects() {
        let strategy = RateLimitStrategy::FixedWindow { window_ms: 60_000, max: 120 };
        let mut state = BucketState::fresh(&strategy, t(0));
        for _ in 0..120 {
            assert!(hit(&strategy, &mut state, t(0), 1).allowed);
        }
        let last = hit(&strategy, &mut state, t(0), 1);
        assert!(!last.allowed);
        assert_eq!(last.remaining, 0);
    }
}
