//! Per-session RPM/APM/idle/lifetime enforcement (`§4.1` "Limits per session").

use crate::error::RealtimeError;
use chrono::{DateTime, Utc};

/// A one-minute sliding accounting window for requests and accepted
/// audio duration, reset whenever it rolls.
#[derive(Debug, Clone)]
struct MinuteWindow {
    started_at: DateTime<Utc>,
    requests: u32,
    audio_ms: u64,
}

impl MinuteWindow {
    fn new(now: DateTime<Utc>) -> Self {
        Self { started_at: now, requests: 0, audio_ms: 0 }
    }

    fn roll_if_needed(&mut self, now: DateTime<Utc>) {
        if now - self.started_at >= chrono::Duration::minutes(1) {
            *self = Self::new(now);
        }
    }
}

/// Enforces the per-session limits in `§4.1`: RPM (requests per minute),
/// APM (audio-minutes per minute), idle timeout, and a hard session
/// lifetime ceiling.
pub struct SessionLimits {
    rpm_max: u32,
    apm_ms_max: u64,
    max_idle_seconds: u64,
    max_session_minutes: u64,
    window: MinuteWindow,
    last_activity: DateTime<Utc>,
    session_started: DateTime<Utc>,
}

impl SessionLimits {
    pub fn new(rpm_max: u32, apm_ms_max: u64, max_idle_seconds: u64, max_session_minutes: u64, now: DateTime<Utc>) -> Self {
        Self {
            rpm_max,
            apm_ms_max,
            max_idle_seconds,
            max_session_minutes,
            window: MinuteWindow::new(now),
            last_activity: now,
            session_started: now,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    /// Record one request-advancing event (commit or terminal activity
    /// end), rejecting it if the per-minute request cap is breached.
    pub fn check_and_record_request(&mut self, now: DateTime<Utc>) -> Result<(), RealtimeError> {
        self.window.roll_if_needed(now);
        if self.window.requests >= self.rpm_max {
            return Err(RealtimeError::RpmExceeded);
        }
        self.window.requests += 1;
        Ok(())
    }

    /// Record `audio_ms` of accepted audio, rejecting (without
    /// recording) if the per-minute audio cap is breached.
    pub fn check_and_record_audio(&mut self, now: DateTime<Utc>, audio_ms: u64) -> Result<(), RealtimeError> {
        self.window.roll_if_needed(now);
        if self.window.audio_ms + audio_ms > self.apm_ms_max {
            return Err(RealtimeError::ApmExceeded);
        }
        self.window.audio_ms += audio_ms;
        Ok(())
    }

    pub fn check_idle(&self, now: DateTime<Utc>) -> Result<(), RealtimeError> {
        if (now - self.last_activity).num_seconds() as u64 > self.max_idle_seconds {
            return Err(RealtimeError::IdleTimeout);
        }
        Ok(())
    }

    pub fn check_lifetime(&self, now: DateTime<Utc>) -> Result<(), RealtimeError> {
        if (now - self.session_started).num_minutes() as u64 >= self.max_session_minutes {
            return Err(RealtimeError::SessionExpired);
        }
        Ok(())
    }

    pub fn window_snapshot(&self) -> (u32, u64, DateTime<Utc>) {
        (self.window.requests, self.window.audio_ms, self.window.started_at + chrono::Duration::minutes(1))
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
    fn rpm_limit_blocks_past_cap() {
        let mut limits = SessionLimits::new(2, 60_000, 60, 15, t(0));
        assert!(limits.check_and_record_request(t(0)).is_ok());
        assert!(limits.check_and_record_request(t(0)).is_ok());
        assert!(limits.check_and_record_request(t(0)).is_err());
    }

    #[test]
    fn apm_limit_blocks_without_recording_the_rejected_frame() {
        let mut limits = SessionLimits::new(60, 1000, 60, 15, t(0));
        assert!(limits.check_and_record_audio(t(0), 600).is_ok());
        assert!(limits.check_and_record_audio(t(0), 600).is_err());
        assert!(limits.check_and_record_audio(t(0), 400).is_ok(), "only the oversized frame was rejected");
    }

    #[test]
    fn idle_timeout_fires_after_the_configured_window() {
        let limits = SessionLimits::new(60, 60_000, 60, 15, t(0));
        assert!(limits.check_idle(t(30)).is_ok());
        assert!(limits.check_idle(t(61)).is_err());
    }

    #[test]
    fn session_expires_at_the_lifetime_ceiling() {
        let limits = SessionLimits::new(60, 60_000, 60, 15, t(0));
        assert!(limits.check_lifetime(t(14 * 60)).is_ok());
        assert!(limits.check_lifetime(t(15 * 60)).is_err());
    }

    #[test]
    fn window_rolls_forward_after_a_minute() {
        let mut limits = SessionLimits::new(1, 60_000, 60, 15, t(0));
        limits.check_and_record_request(t(0)).unwrap();
        assert!(limits.check_and_record_request(t(30)).is_err());
        assert!(limits.check_and_record_request(t(61)).is_ok());
    }
}
