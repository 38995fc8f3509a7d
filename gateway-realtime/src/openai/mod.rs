//! OpenAI Realtime transcription adapter, behind the `openai` feature.

mod adapter;

pub use adapter::OpenAIAdapter;

pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";
pub const DEFAULT_TRANSCRIBE_MODEL: &str = "gpt-4o-transcribe";
pub const SAMPLE_RATE_HZ: u32 = 24_000;
