//! Per-session state machine (`§3` "RealtimeSession", `§4.1` "Session lifecycle").

use crate::audio::{AudioChunk, AudioFormat, BackpressureTransition, SmartAudioBuffer};
use crate::config::{RealtimeConfig, SessionUpdate};
use crate::error::RealtimeError;
use crate::events::{RateLimitWindow, ServerEvent};
use crate::limits::SessionLimits;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the caller (the axum handler driving the socket) should do in
/// response to one client message. A session never touches the socket or
/// the upstream connection directly; it only decides.
#[derive(Debug, Default)]
pub struct Outcome {
    pub emit: Vec<ServerEvent>,
    pub forward_audio: Option<Vec<u8>>,
    pub commit_upstream: bool,
    pub clear_upstream: bool,
    pub terminate: Option<RealtimeError>,
}

impl Outcome {
    fn emit_one(event: ServerEvent) -> Self {
        Self { emit: vec![event], ..Default::default() }
    }

    fn terminate_with(err: RealtimeError) -> Self {
        Self { emit: vec![ServerEvent::error(err.code(), err.to_string())], terminate: Some(err), ..Default::default() }
    }
}

/// One realtime WebSocket session's mutable state.
pub struct Session {
    pub id: SessionId,
    pub config: RealtimeConfig,
    pub format: AudioFormat,
    pub limits: SessionLimits,
    pub buffer: SmartAudioBuffer,
    configured: bool,
    turn_active: bool,
    /// Set when upstream VAD reports `speech_stopped`; cleared once the
    /// model starts responding or the fallback fires. `§4.1` server_vad:
    /// "waits (default ~1.5s) before relying on upstream end-of-speech".
    vad_fallback_deadline: Option<DateTime<Utc>>,
    reconnect_attempted: bool,
}

impl Session {
    /// Default RPM/APM caps, applied until overridden by
    /// [`with_limits`](Self::with_limits) with plan-specific values.
    const DEFAULT_RPM_MAX: u32 = 120;
    const DEFAULT_APM_MS_MAX: u64 = 10 * 60_000;

    pub fn new(id: SessionId, config: RealtimeConfig, format: AudioFormat, now: DateTime<Utc>) -> Self {
        let limits = SessionLimits::new(
            Self::DEFAULT_RPM_MAX,
            Self::DEFAULT_APM_MS_MAX,
            config.max_idle_seconds,
            config.max_session_minutes,
            now,
        );
        let buffer = SmartAudioBuffer::new(format, config.max_buffer_ms);
        Self { id, config, format, limits, buffer, configured: false, turn_active: false, vad_fallback_deadline: None, reconnect_attempted: false }
    }

    /// `§4.1` "at most one reconnect": the first upstream I/O error in a
    /// session's lifetime is eligible for a reconnect attempt; every
    /// error after that goes straight to termination.
    pub fn should_attempt_reconnect(&mut self) -> bool {
        if self.reconnect_attempted {
            false
        } else {
            self.reconnect_attempted = true;
            true
        }
    }

    pub fn with_limits(mut self, rpm_max: u32, apm_ms_max: u64, now: DateTime<Utc>) -> Self {
        self.limits = SessionLimits::new(rpm_max, apm_ms_max, self.config.max_idle_seconds, self.config.max_session_minutes, now);
        self
    }

    pub fn created_event(&self) -> ServerEvent {
        ServerEvent::SessionCreated { session_id: self.id.to_string(), model: self.config.model.clone() }
    }

    /// Handle a parsed `session.update`.
    pub fn handle_session_update(&mut self, data: SessionUpdate, now: DateTime<Utc>) -> Outcome {
        self.limits.touch(now);
        self.config.apply_update(data);
        if self.config.model.is_empty() {
            return Outcome::terminate_with(RealtimeError::InvalidSession("model is required".to_string()));
        }
        self.configured = true;
        Outcome::emit_one(ServerEvent::SessionUpdated { session_id: self.id.to_string() })
    }

    pub fn handle_audio_append(&mut self, audio: Vec<u8>, now: DateTime<Utc>) -> Outcome {
        self.limits.touch(now);
        if !self.configured {
            return Outcome::terminate_with(RealtimeError::InvalidSession("session.update required before audio".to_string()));
        }
        let duration_ms = self.format.duration_of(audio.len()).as_millis() as u64;
        if let Err(err) = self.limits.check_and_record_audio(now, duration_ms) {
            let (requests_used, audio_ms_used, window_reset) = self.limits.window_snapshot();
            return Outcome {
                emit: vec![
                    ServerEvent::error(err.code(), err.to_string()),
                    ServerEvent::RateLimitsUpdated {
                        window: RateLimitWindow {
                            requests_used,
                            requests_limit: 0,
                            audio_ms_used,
                            audio_ms_limit: 0,
                            window_reset,
                        },
                    },
                ],
                ..Default::default()
            };
        }
        Outcome { forward_audio: Some(audio), ..Default::default() }
    }

    pub fn handle_activity_start(&mut self, now: DateTime<Utc>) -> Outcome {
        self.limits.touch(now);
        if self.config.vad.is_manual() {
            self.turn_active = true;
        }
        Outcome::default()
    }

    pub fn handle_activity_end(&mut self, now: DateTime<Utc>) -> Outcome {
        self.limits.touch(now);
        if self.config.vad.is_manual() {
            self.turn_active = false;
        }
        Outcome::default()
    }

    pub fn handle_commit(&mut self, now: DateTime<Utc>) -> Outcome {
        self.limits.touch(now);
        match self.limits.check_and_record_request(now) {
            Ok(()) => Outcome { commit_upstream: true, ..Default::default() },
            Err(err) => Outcome::emit_one(ServerEvent::error(err.code(), err.to_string())),
        }
    }

    pub fn handle_clear(&mut self, now: DateTime<Utc>) -> Outcome {
        self.limits.touch(now);
        self.buffer.clear();
        Outcome { clear_upstream: true, ..Default::default() }
    }

    /// Enqueue a frame the adapter couldn't accept; returns the
    /// backpressure warning (if any) to emit.
    pub fn note_backpressure(&mut self, audio: Vec<u8>) -> Option<ServerEvent> {
        match self.buffer.enqueue(AudioChunk::new(audio)) {
            BackpressureTransition::Paused => Some(ServerEvent::warning("backpressure_paused")),
            BackpressureTransition::Resumed => Some(ServerEvent::warning("backpressure_resumed")),
            BackpressureTransition::None => None,
        }
    }

    /// Upstream VAD fired `speech_stopped` (`server_vad`/`semantic_vad`
    /// only; manual VAD frames turns itself and never reaches this). Pads
    /// the turn with `trailing_silence_ms` of silence to help the
    /// provider's own end-of-speech detection, then starts the
    /// `end_of_speech_wait_ms` fallback timer.
    pub fn note_upstream_speech_stopped(&mut self, now: DateTime<Utc>) -> Outcome {
        if self.config.vad.is_manual() {
            return Outcome::default();
        }
        self.vad_fallback_deadline = Some(now + chrono::Duration::milliseconds(self.config.end_of_speech_wait_ms as i64));
        if self.config.trailing_silence_ms == 0 {
            return Outcome::default();
        }
        let silence_bytes = (self.format.bytes_per_ms() * self.config.trailing_silence_ms as f64) as usize;
        Outcome { forward_audio: Some(vec![0u8; silence_bytes]), ..Default::default() }
    }

    /// The model started or finished responding; upstream is no longer
    /// silent, so the end-of-speech fallback no longer applies.
    pub fn note_upstream_model_progress(&mut self) {
        self.vad_fallback_deadline = None;
    }

    /// Checked every tick. If upstream hasn't produced a response within
    /// `end_of_speech_wait_ms` of `speech_stopped`, either issue the
    /// configured manual-commit fallback or just stop waiting.
    pub fn check_vad_fallback(&mut self, now: DateTime<Utc>) -> Outcome {
        let Some(deadline) = self.vad_fallback_deadline else { return Outcome::default() };
        if now < deadline {
            return Outcome::default();
        }
        self.vad_fallback_deadline = None;
        if !self.config.commit_fallback_enabled {
            return Outcome::default();
        }
        match self.limits.check_and_record_request(now) {
            Ok(()) => Outcome { commit_upstream: true, ..Default::default() },
            Err(err) => Outcome::emit_one(ServerEvent::error(err.code(), err.to_string())),
        }
    }

    pub fn check_idle(&self, now: DateTime<Utc>) -> Result<(), RealtimeError> {
        self.limits.check_idle(now)
    }

    pub fn check_lifetime(&self, now: DateTime<Utc>) -> Result<(), RealtimeError> {
        self.limits.check_lifetime(now)
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IncludeFlags;
    use chrono::TimeZone;

    fn t(offset_secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(offset_secs)
    }

    fn new_session() -> Session {
        let config = RealtimeConfig::builder("gpt-4o-transcribe", "openai").build();
        Session::new(SessionId::new(), config, AudioFormat::new(24_000), t(0))
    }

    #[test]
    fn audio_before_configuration_is_rejected() {
        let mut session = new_session();
        let outcome = session.handle_audio_append(vec![0; 100], t(0));
        assert!(outcome.terminate.is_some());
    }

    #[test]
    fn session_update_with_empty_model_terminates() {
        let mut session = new_session();
        session.config.model = "placeholder".to_string();
        let update = SessionUpdate {
            model: Some(String::new()),
            language: None,
            input_audio_transcription: None,
            response_modalities: None,
            vad: None,
            include: Some(IncludeFlags::default()),
            system_instruction: None,
            prompt: None,
        };
        let outcome = session.handle_session_update(update, t(0));
        assert!(outcome.terminate.is_some());
    }

    #[test]
    fn audio_after_configuration_forwards() {
        let mut session = new_session();
        let update = SessionUpdate {
            model: Some("gpt-4o-transcribe".to_string()),
            language: None,
            input_audio_transcription: None,
            response_modalities: None,
            vad: None,
            include: None,
            system_instruction: None,
            prompt: None,
        };
        session.handle_session_update(update, t(0));
        let outcome = session.handle_audio_append(vec![0; 100], t(1));
        assert!(outcome.forward_audio.is_some());
        assert!(outcome.terminate.is_none());
    }

    #[test]
    fn commit_without_prior_audio_is_allowed_and_advances_rpm() {
        let mut session = new_session();
        let outcome = session.handle_commit(t(0));
        assert!(outcome.commit_upstream);
    }

    #[test]
    fn reconnect_is_eligible_exactly_once() {
        let mut session = new_session();
        assert!(session.should_attempt_reconnect());
        assert!(!session.should_attempt_reconnect());
    }

    #[test]
    fn manual_vad_ignores_upstream_speech_stopped() {
        let mut session = new_session();
        assert!(session.config.vad.is_manual());
        let outcome = session.note_upstream_speech_stopped(t(0));
        assert!(outcome.forward_audio.is_none());
        let fallback = session.check_vad_fallback(t(100));
        assert!(!fallback.commit_upstream);
    }

    #[test]
    fn server_vad_speech_stopped_pads_silence_and_arms_fallback() {
        let mut session = new_session();
        session.config.vad = crate::config::VadMode::ServerVad {
            silence_duration_ms: Some(500),
            prefix_padding_ms: Some(300),
            start_sensitivity: None,
            end_sensitivity: None,
        };
        session.config.trailing_silence_ms = 1200;
        session.config.end_of_speech_wait_ms = 1500;
        session.config.commit_fallback_enabled = true;

        let outcome = session.note_upstream_speech_stopped(t(0));
        let silence = outcome.forward_audio.expect("trailing silence should be forwarded");
        let expected_bytes = (session.format.bytes_per_ms() * 1200.0) as usize;
        assert_eq!(silence.len(), expected_bytes);
        assert!(silence.iter().all(|&b| b == 0));

        // Fallback hasn't elapsed yet.
        assert!(!session.check_vad_fallback(t(1)).commit_upstream);

        // Model progress cancels the pending fallback.
        session.note_upstream_model_progress();
        assert!(!session.check_vad_fallback(t(2)).commit_upstream);
    }

    #[test]
    fn server_vad_fallback_fires_commit_after_wait_elapses() {
        let mut session = new_session();
        session.config.vad = crate::config::VadMode::ServerVad {
            silence_duration_ms: Some(500),
            prefix_padding_ms: Some(300),
            start_sensitivity: None,
            end_sensitivity: None,
        };
        session.config.trailing_silence_ms = 0;
        session.config.end_of_speech_wait_ms = 1500;
        session.config.commit_fallback_enabled = true;

        session.note_upstream_speech_stopped(t(0));
        let outcome = session.check_vad_fallback(t(2));
        assert!(outcome.commit_upstream);

        // Deadline is cleared after firing once.
        assert!(!session.check_vad_fallback(t(3)).commit_upstream);
    }

    #[test]
    fn server_vad_fallback_disabled_does_not_commit() {
        let mut session = new_session();
        session.config.vad = crate::config::VadMode::ServerVad {
            silence_duration_ms: Some(500),
            prefix_padding_ms: Some(300),
            start_sensitivity: None,
            end_sensitivity: None,
        };
        session.config.trailing_silence_ms = 0;
        session.config.end_of_speech_wait_ms = 1500;
        session.config.commit_fallback_enabled = false;

        session.note_upstream_speech_stopped(t(0));
        let outcome = session.check_vad_fallback(t(2));
        assert!(!outcome.commit_upstream);
        assert!(outcome.terminate.is_none());
    }
}
