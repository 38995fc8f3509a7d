//! `UsageCounter` — per-(key, window) request/token aggregation (`§3`).

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Identifies an hour-granular window: a specific date and hour-of-day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HourWindow {
    pub year: i32,
    pub ordinal_day: u32,
    pub hour: u32,
}

impl HourWindow {
    pub fn containing(at: DateTime<Utc>) -> Self {
        Self { year: at.year(), ordinal_day: at.ordinal(), hour: at.hour() }
    }

    /// A window is reaped once it is more than 7 days old (`§3` invariant).
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        let now_window = Self::containing(now);
        if self.year != now_window.year {
            return true;
        }
        now_window.ordinal_day.saturating_sub(self.ordinal_day) > 7
    }

    /// Start of the *next* hour boundary, used for `reset_time` in quota
    /// errors.
    pub fn next_boundary(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let start_of_hour = now
            .date_naive()
            .and_hms_opt(now.hour(), 0, 0)
            .expect("valid hour components");
        let start_of_hour = DateTime::<Utc>::from_naive_utc_and_offset(start_of_hour, Utc);
        start_of_hour + chrono::Duration::hours(1)
    }
}

/// A single request/token tally. Monotonic within a window by construction:
/// callers only ever call `record`, never subtract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub requests: u64,
    pub tokens: u64,
}

impl Tally {
    pub fn record_request(&mut self) {
        self.requests += 1;
    }

    pub fn record_tokens(&mut self, tokens: u64) {
        self.tokens += tokens;
    }
}

/// Per-key usage aggregation, split into an hourly tally and a daily
/// tally. Both advance independently; the daily tally is not a sum of
/// hourly tallies kept around, it accumulates directly so it survives the
/// hourly reaper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageCounter {
    pub key_id: String,
    pub hour_window: HourWindow,
    pub hourly: Tally,
    pub day_ordinal: u32,
    pub daily: Tally,
}

impl UsageCounter {
    pub fn new(key_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            key_id: key_id.into(),
            hour_window: HourWindow::containing(now),
            hourly: Tally::default(),
            day_ordinal: now.ordinal(),
            daily: Tally::default(),
        }
    }

    /// Roll the hourly/daily tallies forward if `now` has moved into a new
    /// window, then record one request (and, if known up front, its
    /// tokens). Token counts for streamed/async responses are recorded
    /// separately via [`record_tokens`](Self::record_tokens) once known.
    pub fn record_request(&mut self, now: DateTime<Utc>) {
        self.roll_windows(now);
        self.hourly.record_request();
        self.daily.record_request();
    }

    pub fn record_tokens(&mut self, now: DateTime<Utc>, tokens: u64) {
        self.roll_windows(now);
        self.hourly.record_tokens(tokens);
        self.daily.record_tokens(tokens);
    }

    /// Advance the hourly/daily tallies to `now`'s window, resetting
    /// whichever has rolled over. Safe to call even when the request is
    /// ultimately rejected — a breached key's window must still advance,
    /// otherwise it would stay pinned against a stale, already-over-cap
    /// tally until [`HourWindow::is_stale`] reaps it a week later.
    pub fn roll_windows(&mut self, now: DateTime<Utc>) {
        let current_hour = HourWindow::containing(now);
        if current_hour != self.hour_window {
            self.hour_window = current_hour;
            self.hourly = Tally::default();
        }
        if now.ordinal() != self.day_ordinal || now.year() != self.hour_window.year {
            self.day_ordinal = now.ordinal();
            self.daily = Tally::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rolls_hourly_window_forward() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2026, 1, 1, 11, 0, 1).unwrap();
        let mut counter = UsageCounter::new("k1", t0);
        counter.record_request(t0);
        assert_eq!(counter.hourly.requests, 1);
        counter.record_request(t1);
        assert_eq!(counter.hourly.requests, 1, "hourly tally resets on new hour");
        assert_eq!(counter.daily.requests, 2, "daily tally persists across hours");
    }

    #[test]
    fn rolls_daily_window_forward() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 23, 59, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2026, 1, 2, 0, 1, 0).unwrap();
        let mut counter = UsageCounter::new("k1", t0);
        counter.record_request(t0);
        counter.record_request(t1);
        assert_eq!(counter.daily.requests, 1, "daily tally resets across the day boundary");
    }

    #[test]
    fn stale_after_seven_days() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 1, 9, 0, 0, 0).unwrap();
        let window = HourWindow::containing(t0);
        assert!(window.is_stale(later));
        let not_yet = Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap();
        assert!(!window.is_stale(not_yet));
    }
}
