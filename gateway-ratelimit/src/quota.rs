//! Hourly/daily quota tracking per [`KeyInfo`] (`§3`, `§4.3`).

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use gateway_core::{GatewayError, KeyInfo, LimitDetails, UsageCounter};
use std::time::Duration;

/// Tracks request/token usage per key and checks it against the key's
/// [`gateway_core::QuotaDescriptor`]. Unrelated to the per-minute limiter
/// buckets in [`crate::registry`]; quotas are coarser and measured in
/// hourly/daily windows rather than a sliding or fixed short window.
#[derive(Debug, Default)]
pub struct QuotaTracker {
    counters: DashMap<String, UsageCounter>,
}

impl QuotaTracker {
    pub fn new() -> Self {
        Self { counters: DashMap::new() }
    }

    /// Check `key`'s current usage against its quota, then record the hit
    /// if admitted. Returns `Ok(())` when under quota, or the breached
    /// quota's [`GatewayError::QuotaExceeded`] otherwise.
    ///
    /// Token cost is unknown up front for most requests; call
    /// [`record_tokens`](Self::record_tokens) once the response completes.
    pub fn check_and_record_request(&self, key: &KeyInfo, now: DateTime<Utc>) -> Result<(), GatewayError> {
        let mut counter = self
            .counters
            .entry(key.id.clone())
            .or_insert_with(|| UsageCounter::new(key.id.clone(), now));

        // Roll the window forward before checking, independent of whether
        // this request ends up admitted — otherwise a key that breaches its
        // cap stays pinned against the same stale tally across hour/day
        // boundaries until `reap_stale` removes it a week later.
        counter.roll_windows(now);

        if let Some(max) = key.quota.requests_per_hour {
            if counter.hourly.requests >= max {
                return Err(breach(max, counter.hourly.requests, counter.hour_window.next_boundary(now)));
            }
        }
        if let Some(max) = key.quota.requests_per_day {
            if counter.daily.requests >= max {
                return Err(breach(max, counter.daily.requests, end_of_day(now)));
            }
        }
        counter.record_request(now);
        Ok(())
    }

    /// Record tokens consumed by a completed request. Does not itself
    /// reject; token quota is enforced pre-flight on the *next* request via
    /// [`check_and_record_request`](Self::check_and_record_request) reading
    /// the tallies this call updates.
    pub fn record_tokens(&self, key_id: &str, now: DateTime<Utc>, tokens: u64) {
        if let Some(mut counter) = self.counters.get_mut(key_id) {
            counter.record_tokens(now, tokens);
        }
    }

    /// Pre-flight token-quota check, run before dispatching a request whose
    /// estimated cost is known (e.g. from a token-counting heuristic).
    pub fn check_token_quota(&self, key: &KeyInfo, now: DateTime<Utc>) -> Result<(), GatewayError> {
        let Some(counter) = self.counters.get(&key.id) else { return Ok(()) };
        if let Some(max) = key.quota.tokens_per_hour {
            if counter.hourly.tokens >= max {
                return Err(breach(max, counter.hourly.tokens, counter.hour_window.next_boundary(now)));
            }
        }
        if let Some(max) = key.quota.tokens_per_day {
            if counter.daily.tokens >= max {
                return Err(breach(max, counter.daily.tokens, end_of_day(now)));
            }
        }
        Ok(())
    }

    /// Drop counters for keys untouched since before `cutoff` (`§5` idle
    /// cleanup).
    pub fn reap_stale(&self, now: DateTime<Utc>) {
        self.counters.retain(|_, counter| !counter.hour_window.is_stale(now));
    }
}

fn breach(limit: u64, used: u64, reset_time: DateTime<Utc>) -> GatewayError {
    let retry_after = (reset_time - Utc::now()).to_std().unwrap_or(Duration::ZERO);
    GatewayError::QuotaExceeded(LimitDetails { limit, used, reset_time, retry_after })
}

fn end_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    use chrono::Timelike;
    let start_of_day = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("valid midnight");
    let start_of_day = DateTime::<Utc>::from_naive_utc_and_offset(start_of_day, Utc);
    start_of_day + chrono::Duration::days(1) - chrono::Duration::nanoseconds(now.nanosecond() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use gateway_core::QuotaDescriptor;

    fn key_with_quota(quota: QuotaDescriptor) -> KeyInfo {
        let mut k = KeyInfo::gateway("k1", "test");
        k.quota = quota;
        k
    }

    #[test]
    fn admits_under_quota_then_blocks() {
        let tracker = QuotaTracker::new();
        let key = key_with_quota(QuotaDescriptor { requests_per_hour: Some(2), ..QuotaDescriptor::unlimited() });
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert!(tracker.check_and_record_request(&key, now).is_ok());
        assert!(tracker.check_and_record_request(&key, now).is_ok());
        assert!(tracker.check_and_record_request(&key, now).is_err());
    }

    #[test]
    fn unlimited_quota_never_blocks() {
        let tracker = QuotaTracker::new();
        let key = key_with_quota(QuotaDescriptor::unlimited());
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        for _ in 0..1000 {
            assert!(tracker.check_and_record_request(&key, now).is_ok());
        }
    }

    #[test]
    fn token_quota_breach_is_reported() {
        let tracker = QuotaTracker::new();
        let key = key_with_quota(QuotaDescriptor { tokens_per_hour: Some(100), ..QuotaDescriptor::unlimited() });
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        tracker.check_and_record_request(&key, now).unwrap();
        tracker.record_tokens(&key.id, now, 150);
        assert!(tracker.check_token_quota(&key, now).is_err());
    }
}
