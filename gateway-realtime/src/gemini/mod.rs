//! Gemini Live transcription adapter, behind the `gemini` feature.
//!
//! Gemini's BidiGenerateContent wire format differs from OpenAI's in
//! message shape (`serverContent` envelopes instead of flat `type` tags)
//! but both collapse to the same [`crate::normalizer::ProviderEvent`].

mod adapter;

pub use adapter::GeminiAdapter;

pub const GEMINI_LIVE_URL: &str =
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";
pub const DEFAULT_TRANSCRIBE_MODEL: &str = "models/gemini-live-2.5-flash-native-audio";
pub const SAMPLE_RATE_HZ: u32 = 16_000;
