//! Cache backend errors (`§4.2` "Failure semantics").

use thiserror::Error;

/// Backend-level failure. Callers never propagate these to the HTTP/WS
/// surface: a `get` failure degrades to a miss, a `set` failure is
/// recorded and swallowed.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("health check round trip mismatch")]
    HealthCheckMismatch,
}
