//! Provider event → canonical event mapping (`§4.1` "Event normalization").

use crate::config::IncludeFlags;
use crate::events::{RateLimitWindow, ServerEvent};
use serde_json::Value;

/// A provider-specific upstream event, already parsed far enough to
/// know its kind. Adapters produce this from their own wire format;
/// [`normalize`] turns it into the canonical [`ServerEvent`] stream.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    TranscriptDelta { text: String },
    TranscriptDone { text: String },
    ModelDelta { text: String },
    ModelDone { text: String },
    SpeechStarted,
    SpeechStopped,
    RateLimitSnapshot(RateLimitWindow),
    Error { code: String, message: String },
    Other(Value),
}

/// Map one upstream event to zero or more canonical events. Returns an
/// empty vec for events the gateway intentionally drops (e.g. `Other`
/// when `include.raw_upstream` is off).
pub fn normalize(event: ProviderEvent, include: IncludeFlags) -> Vec<ServerEvent> {
    match event {
        ProviderEvent::TranscriptDelta { text } => vec![ServerEvent::TranscriptDelta { text }],
        ProviderEvent::TranscriptDone { text } => vec![ServerEvent::TranscriptDone { text }],
        ProviderEvent::ModelDelta { text } => {
            if include.model_output {
                vec![ServerEvent::ModelDelta { text }]
            } else {
                vec![]
            }
        }
        ProviderEvent::ModelDone { text } => {
            if include.model_output {
                vec![ServerEvent::ModelDone { text }]
            } else {
                vec![]
            }
        }
        ProviderEvent::SpeechStarted => vec![ServerEvent::SpeechStarted],
        ProviderEvent::SpeechStopped => vec![ServerEvent::SpeechStopped],
        ProviderEvent::RateLimitSnapshot(window) => vec![ServerEvent::RateLimitsUpdated { window }],
        ProviderEvent::Error { code, message } => vec![ServerEvent::Error { code, message }],
        ProviderEvent::Other(raw) => {
            if include.raw_upstream {
                vec![ServerEvent::DebugUpstream { raw }]
            } else {
                vec![]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn model_commentary_is_dropped_unless_included() {
        let event = ProviderEvent::ModelDelta { text: "hi".to_string() };
        assert!(normalize(event.clone(), IncludeFlags::default()).is_empty());
        let result = normalize(event, IncludeFlags { model_output: true, raw_upstream: false });
        assert!(matches!(result[0], ServerEvent::ModelDelta { .. }));
    }

    #[test]
    fn unrecognized_events_are_dropped_unless_raw_upstream_is_on() {
        let event = ProviderEvent::Other(serde_json::json!({"unknown": true}));
        assert!(normalize(event.clone(), IncludeFlags::default()).is_empty());
        let result = normalize(event, IncludeFlags { raw_upstream: true, model_output: false });
        assert!(matches!(result[0], ServerEvent::DebugUpstream { .. }));
    }

    #[test]
    fn transcript_events_always_pass_through() {
        let event = ProviderEvent::TranscriptDelta { text: "hel".to_string() };
        let result = normalize(event, IncludeFlags::default());
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn rate_limit_snapshot_passes_through_the_window() {
        let window = RateLimitWindow {
            requests_used: 1,
            requests_limit: 10,
            audio_ms_used: 100,
            audio_ms_limit: 60_000,
            window_reset: Utc::now(),
        };
        let result = normalize(ProviderEvent::RateLimitSnapshot(window), IncludeFlags::default());
        assert!(matches!(result[0], ServerEvent::RateLimitsUpdated { .. }));
    }
}
