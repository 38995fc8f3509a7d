//! Upstream adapter contract (`§2` component G).
//!
//! A provider-specific implementation of this trait owns the WebSocket
//! connection to the actual provider; the session engine only ever talks
//! to the trait object, never to a concrete provider type.

use crate::error::Result;
use crate::normalizer::ProviderEvent;
use async_trait::async_trait;

/// Bidirectional connection to an upstream realtime provider.
#[async_trait]
pub trait UpstreamAdapter: Send + Sync {
    /// Push a frame of PCM16 audio upstream. Returns `false` (a soft
    /// fail) when the adapter's outbound queue is saturated and the
    /// caller should buffer and retry rather than treat this as fatal.
    async fn append_audio_base64(&self, audio: &[u8]) -> Result<bool>;

    /// End the current turn and request a final result.
    async fn commit_audio(&self) -> Result<()>;

    /// Discard any buffered, uncommitted audio.
    async fn clear_audio(&self) -> Result<()>;

    /// Pull the next normalized upstream event, if any is ready without
    /// blocking past `§4.1`'s reconnect budget. Returns `None` when the
    /// adapter has nothing buffered right now (not end-of-stream).
    async fn poll_event(&self) -> Result<Option<ProviderEvent>>;

    /// Attempt the one-reconnect-within-budget recovery described in
    /// `§4.1` "Failure semantics", preserving any buffered uncommitted
    /// audio. Returns `Err` if the reconnect itself fails.
    async fn reconnect(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

pub type BoxedAdapter = Box<dyn UpstreamAdapter>;
