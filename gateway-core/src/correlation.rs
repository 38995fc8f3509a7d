//! Correlation id assignment for request tracing.

use std::fmt;
use uuid::Uuid;

/// Request/session correlation id, echoed back via `X-Correlation-ID` on
/// HTTP and implicit in the session id on the realtime surface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a fresh correlation id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Adopt a client-supplied id (`X-Correlation-ID` / `X-Request-ID`) if
    /// it looks reasonable, otherwise generate one.
    pub fn from_header(value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() && v.len() <= 128 => Self(v.to_string()),
            _ => Self::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adopts_client_header() {
        let id = CorrelationId::from_header(Some("abc-123"));
        assert_eq!(id.as_str(), "abc-123");
    }

    #[test]
    fn rejects_empty_header() {
        let id = CorrelationId::from_header(Some(""));
        assert!(!id.as_str().is_empty());
    }

    #[test]
    fn generates_when_absent() {
        let a = CorrelationId::from_header(None);
        let b = CorrelationId::from_header(None);
        assert_ne!(a, b);
    }
}
