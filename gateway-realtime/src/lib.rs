//! Bidirectional realtime audio transcription engine (`§2` components F-J,
//! `§4.1`).
//!
//! This crate owns the provider-agnostic session state machine, the
//! canonical client/server event wire types, and the upstream adapter
//! contract. It never touches a socket itself: `gateway-server` drives an
//! axum WebSocket handler that feeds parsed [`ClientEvent`]s into a
//! [`Session`] and forwards the resulting [`Outcome`] back to the client
//! and to a [`BoxedAdapter`].

pub mod adapter;
pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod limits;
pub mod normalizer;
pub mod registry;
pub mod session;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "gemini")]
pub mod gemini;

pub use adapter::{BoxedAdapter, UpstreamAdapter};
pub use audio::{AudioChunk, AudioFormat, BackpressureTransition, SmartAudioBuffer};
pub use config::{IncludeFlags, RealtimeConfig, RealtimeConfigBuilder, SessionUpdate, VadMode};
pub use error::{RealtimeError, Result};
pub use events::{ClientEvent, RateLimitWindow, ServerEvent};
pub use limits::SessionLimits;
pub use normalizer::{normalize, ProviderEvent};
pub use registry::SessionRegistry;
pub use session::{Outcome, Session, SessionId};
