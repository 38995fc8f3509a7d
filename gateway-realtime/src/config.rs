//! Per-session configuration, parsed from `session.update` (`§4.1`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Voice-activity-detection strategy negotiated for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VadMode {
    /// The client frames turns explicitly via `activity_start`/`activity_end`/`commit`.
    Manual,
    ServerVad {
        #[serde(skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        start_sensitivity: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        end_sensitivity: Option<String>,
    },
    SemanticVad {
        #[serde(skip_serializing_if = "Option::is_none")]
        eagerness: Option<String>,
    },
}

impl Default for VadMode {
    fn default() -> Self {
        Self::Manual
    }
}

impl VadMode {
    pub fn is_manual(&self) -> bool {
        matches!(self, Self::Manual)
    }
}

/// Which optional event classes the client wants surfaced.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct IncludeFlags {
    #[serde(default)]
    pub raw_upstream: bool,
    #[serde(default)]
    pub model_output: bool,
}

/// The negotiable parts of `session.update`'s `data` payload (`§4.1`).
#[derive(Debug, Clone, Deserialize)]
pub struct SessionUpdate {
    pub model: Option<String>,
    pub language: Option<String>,
    pub input_audio_transcription: Option<Value>,
    pub response_modalities: Option<Vec<String>>,
    pub vad: Option<VadMode>,
    pub include: Option<IncludeFlags>,
    pub system_instruction: Option<String>,
    pub prompt: Option<String>,
}

/// Fully resolved session configuration, built once on accept and mutated
/// idempotently by subsequent `session.update`s.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub model: String,
    pub provider: String,
    pub language: Option<String>,
    pub input_audio_transcription: Option<Value>,
    pub response_modalities: Vec<String>,
    pub vad: VadMode,
    pub include: IncludeFlags,
    pub system_instruction: Option<String>,

    pub max_buffer_ms: u32,
    pub max_idle_seconds: u64,
    pub max_session_minutes: u64,
    pub trailing_silence_ms: u32,
    pub end_of_speech_wait_ms: u32,
    pub commit_fallback_enabled: bool,
}

impl RealtimeConfig {
    pub fn builder(model: impl Into<String>, provider: impl Into<String>) -> RealtimeConfigBuilder {
        RealtimeConfigBuilder::new(model, provider)
    }

    /// Apply a `session.update` payload. Unset fields are left unchanged,
    /// so repeated/idempotent updates only touch what they specify.
    pub fn apply_update(&mut self, update: SessionUpdate) {
        if let Some(model) = update.model {
            self.model = model;
        }
        if update.language.is_some() {
            self.language = update.language;
        }
        if update.input_audio_transcription.is_some() {
            self.input_audio_transcription = update.input_audio_transcription;
        }
        if let Some(modalities) = update.response_modalities {
            self.response_modalities = modalities;
        }
        if let Some(vad) = update.vad {
            self.vad = vad;
        }
        if let Some(include) = update.include {
            self.include = include;
        }
        if update.system_instruction.is_some() {
            self.system_instruction = update.system_instruction;
        }
    }
}

/// Builds a [`RealtimeConfig`] with the gateway's defaults (`§4.1`
/// "Limits per session", "Buffer and backpressure", "VAD modes").
pub struct RealtimeConfigBuilder {
    config: RealtimeConfig,
}

impl RealtimeConfigBuilder {
    pub fn new(model: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            config: RealtimeConfig {
                model: model.into(),
                provider: provider.into(),
                language: None,
                input_audio_transcription: None,
                response_modalities: Vec::new(),
                vad: VadMode::default(),
                include: IncludeFlags::default(),
                system_instruction: None,
                max_buffer_ms: 5000,
                max_idle_seconds: 60,
                max_session_minutes: 15,
                trailing_silence_ms: 1200,
                end_of_speech_wait_ms: 1500,
                commit_fallback_enabled: false,
            },
        }
    }

    pub fn max_buffer_ms(mut self, ms: u32) -> Self {
        self.config.max_buffer_ms = ms;
        self
    }

    pub fn max_idle_seconds(mut self, secs: u64) -> Self {
        self.config.max_idle_seconds = secs;
        self
    }

    pub fn max_session_minutes(mut self, minutes: u64) -> Self {
        self.config.max_session_minutes = minutes;
        self
    }

    pub fn vad(mut self, vad: VadMode) -> Self {
        self.config.vad = vad;
        self
    }

    pub fn commit_fallback_enabled(mut self, enabled: bool) -> Self {
        self.config.commit_fallback_enabled = enabled;
        self
    }

    pub fn build(self) -> RealtimeConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = RealtimeConfig::builder("gpt-4o-transcribe", "openai").build();
        assert_eq!(config.max_buffer_ms, 5000);
        assert_eq!(config.max_idle_seconds, 60);
        assert_eq!(config.max_session_minutes, 15);
        assert!(config.vad.is_manual());
    }

    #[test]
    fn apply_update_is_idempotent_for_unset_fields() {
        let mut config = RealtimeConfig::builder("gpt-4o-transcribe", "openai").build();
        config.apply_update(SessionUpdate {
            model: Some("gpt-4o-transcribe".to_string()),
            language: Some("en".to_string()),
            input_audio_transcription: None,
            response_modalities: None,
            vad: None,
            include: None,
            system_instruction: None,
            prompt: None,
        });
        assert_eq!(config.language.as_deref(), Some("en"));
        config.apply_update(SessionUpdate {
            model: None,
            language: None,
            input_audio_transcription: None,
            response_modalities: None,
            vad: Some(VadMode::ServerVad {
                silence_duration_ms: Some(500),
                prefix_padding_ms: None,
                start_sensitivity: None,
                end_sensitivity: None,
            }),
            include: None,
            system_instruction: None,
            prompt: None,
        });
        assert_eq!(config.language.as_deref(), Some("en"), "unset fields survive a later update");
        assert!(!config.vad.is_manual());
    }

    #[test]
    fn vad_mode_round_trips_through_json() {
        let vad = VadMode::SemanticVad { eagerness: Some("high".to_string()) };
        let json = serde_json::to_string(&vad).unwrap();
        let parsed: VadMode = serde_json::from_str(&json).unwrap();
        assert_eq!(vad, parsed);
    }
}
