//! Invalidation criteria (`§4.2` "Invalidation").

use chrono::{DateTime, Utc};

/// Selects which entries `RequestCache::invalidate` removes. Several
/// fields can combine; an entry is removed if it matches all of the
/// criteria present.
#[derive(Debug, Clone, Default)]
pub struct InvalidateCriteria {
    pub model: Option<String>,
    pub provider: Option<String>,
    pub pattern: Option<String>,
    pub older_than: Option<DateTime<Utc>>,
    pub expired_only: bool,
    pub clear_all: bool,
}

impl InvalidateCriteria {
    pub fn clear_all() -> Self {
        Self { clear_all: true, ..Default::default() }
    }

    pub fn for_model(model: impl Into<String>) -> Self {
        Self { model: Some(model.into()), ..Default::default() }
    }

    pub fn for_provider(provider: impl Into<String>) -> Self {
        Self { provider: Some(provider.into()), ..Default::default() }
    }

    /// Build the glob-style key prefix this criteria implies, when the
    /// hierarchical key layout makes that cheap. Returns `None` when the
    /// criteria can't be expressed as a prefix (e.g. `older_than` alone),
    /// in which case the caller must fall back to a full scan.
    pub fn key_prefix(&self) -> Option<String> {
        match (&self.provider, &self.model) {
            (Some(provider), Some(model)) => Some(format!("llm_gateway:{provider}:{model}:")),
            (Some(provider), None) => Some(format!("llm_gateway:{provider}:")),
            (None, None) => self.pattern.clone(),
            (None, Some(_)) => None,
        }
    }
}
