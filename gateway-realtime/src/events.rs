//! Canonical client↔gateway event types (`§4.1` "Transport contract").

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::config::SessionUpdate;

fn serialize_audio<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}

fn deserialize_audio<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let s = String::deserialize(deserializer)?;
    STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
}

/// Messages the client sends to the gateway over the realtime WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { data: SessionUpdate },

    #[serde(rename = "input_audio.append")]
    InputAudioAppend {
        #[serde(serialize_with = "serialize_audio", deserialize_with = "deserialize_audio")]
        audio: Vec<u8>,
    },

    #[serde(rename = "input_audio.activity_start")]
    InputAudioActivityStart,

    #[serde(rename = "input_audio.activity_end")]
    InputAudioActivityEnd,

    #[serde(rename = "input_audio.commit")]
    InputAudioCommit,

    #[serde(rename = "input_audio.clear")]
    InputAudioClear,
}

/// Messages the gateway sends to the client (`§4.1`'s "Gateway→client
/// message types" list).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    #[serde(rename = "session.created")]
    SessionCreated { session_id: String, model: String },

    #[serde(rename = "session.updated")]
    SessionUpdated { session_id: String },

    #[serde(rename = "transcript.delta")]
    TranscriptDelta { text: String },

    #[serde(rename = "transcript.done")]
    TranscriptDone { text: String },

    #[serde(rename = "model.delta")]
    ModelDelta { text: String },

    #[serde(rename = "model.done")]
    ModelDone { text: String },

    SpeechStarted,
    SpeechStopped,

    #[serde(rename = "rate_limits.updated")]
    RateLimitsUpdated { window: RateLimitWindow },

    Warning { code: String, message: Option<String> },

    Error { code: String, message: String },

    #[serde(rename = "debug.upstream")]
    DebugUpstream { raw: Value },
}

/// Minute-window snapshot carried by `rate_limits.updated` (`§4.1`
/// "Limits per session" APM/RPM accounting).
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitWindow {
    pub requests_used: u32,
    pub requests_limit: u32,
    pub audio_ms_used: u64,
    pub audio_ms_limit: u64,
    pub window_reset: chrono::DateTime<chrono::Utc>,
}

impl ServerEvent {
    pub fn warning(code: impl Into<String>) -> Self {
        Self::Warning { code: code.into(), message: None }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error { code: code.into(), message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_audio_append_round_trips_base64() {
        let raw = r#"{"type":"input_audio.append","audio":"AAEC"}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        match event {
            ClientEvent::InputAudioAppend { audio } => assert_eq!(audio, vec![0, 1, 2]),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn session_created_serializes_with_type_tag() {
        let event = ServerEvent::SessionCreated { session_id: "s1".to_string(), model: "gpt-4o".to_string() };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "session.created");
        assert_eq!(json["session_id"], "s1");
    }

    #[test]
    fn bad_json_is_rejected_without_panicking() {
        let result: Result<ClientEvent, _> = serde_json::from_str("{not json");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_type_tag_is_rejected() {
        let result: Result<ClientEvent, _> = serde_json::from_str(r#"{"type":"not.a.real.type"}"#);
        assert!(result.is_err());
    }
}
