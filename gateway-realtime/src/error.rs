//! Realtime error taxonomy (`§4.1` "Failure semantics", "Limits per session").

use thiserror::Error;

/// Errors the session engine can raise. Each carries the stable `code`
/// string sent to the client in an `error` event; most are non-fatal
/// (the session continues), a few terminate it — see
/// [`RealtimeError::is_fatal`].
#[derive(Debug, Error, Clone)]
pub enum RealtimeError {
    #[error("malformed client message")]
    BadJson,

    #[error("invalid session.update payload: {0}")]
    InvalidSession(String),

    #[error("upstream connection lost")]
    UpstreamClosed,

    #[error("too many concurrent sessions")]
    TooManySessions,

    #[error("audio-per-minute limit exceeded")]
    ApmExceeded,

    #[error("requests-per-minute limit exceeded")]
    RpmExceeded,

    #[error("session idle timeout")]
    IdleTimeout,

    #[error("session lifetime exceeded")]
    SessionExpired,

    #[error("upstream provider error: {message}")]
    Upstream { provider: String, message: String },
}

impl RealtimeError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadJson => "bad_json",
            Self::InvalidSession(_) => "invalid_session",
            Self::UpstreamClosed => "upstream_closed",
            Self::TooManySessions => "too_many_sessions",
            Self::ApmExceeded => "apm_exceeded",
            Self::RpmExceeded => "rpm_exceeded",
            Self::IdleTimeout => "idle_timeout",
            Self::SessionExpired => "session_expired",
            Self::Upstream { .. } => "upstream_error",
        }
    }

    /// Whether this error terminates the session, vs. just emitting an
    /// `error` event and continuing (`§4.1` "Failure semantics").
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::BadJson | Self::ApmExceeded | Self::RpmExceeded)
    }
}

pub type Result<T> = std::result::Result<T, RealtimeError>;
