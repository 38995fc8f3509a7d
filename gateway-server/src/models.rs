//! Static model catalog backing `GET /v1/models*` (`§6`).
//!
//! "Model-selection policy beyond simple capability filtering" is an
//! explicit non-goal, so this is a fixed table, not a provider-queried
//! one: no live discovery, no per-key allowlists.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Chat,
    Embeddings,
    Audio,
    Vision,
    Stt,
    Tts,
    Realtime,
}

impl Capability {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "chat" => Some(Self::Chat),
            "embeddings" => Some(Self::Embeddings),
            "audio" => Some(Self::Audio),
            "vision" => Some(Self::Vision),
            "stt" => Some(Self::Stt),
            "tts" => Some(Self::Tts),
            "realtime" => Some(Self::Realtime),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelEntry {
    pub id: &'static str,
    pub provider: &'static str,
    #[serde(rename = "type")]
    pub model_type: &'static str,
    pub capabilities: &'static [Capability],
}

const CATALOG: &[ModelEntry] = &[
    ModelEntry { id: "gpt-4o", provider: "openai", model_type: "chat", capabilities: &[Capability::Chat, Capability::Vision] },
    ModelEntry { id: "gpt-4o-mini", provider: "openai", model_type: "chat", capabilities: &[Capability::Chat, Capability::Vision] },
    ModelEntry { id: "gpt-4o-transcribe", provider: "openai", model_type: "realtime", capabilities: &[Capability::Stt, Capability::Realtime] },
    ModelEntry { id: "text-embedding-3-small", provider: "openai", model_type: "embedding", capabilities: &[Capability::Embeddings] },
    ModelEntry { id: "text-embedding-3-large", provider: "openai", model_type: "embedding", capabilities: &[Capability::Embeddings] },
    ModelEntry { id: "whisper-1", provider: "openai", model_type: "audio", capabilities: &[Capability::Stt, Capability::Audio] },
    ModelEntry { id: "tts-1", provider: "openai", model_type: "audio", capabilities: &[Capability::Tts, Capability::Audio] },
    ModelEntry { id: "gemini-1.5-pro", provider: "gemini", model_type: "chat", capabilities: &[Capability::Chat, Capability::Vision] },
    ModelEntry { id: "gemini-1.5-flash", provider: "gemini", model_type: "chat", capabilities: &[Capability::Chat, Capability::Vision] },
    ModelEntry {
        id: "models/gemini-live-2.5-flash-native-audio",
        provider: "gemini",
        model_type: "realtime",
        capabilities: &[Capability::Stt, Capability::Realtime],
    },
];

#[derive(Debug, Default)]
pub struct ModelFilter<'a> {
    pub provider: Option<&'a str>,
    pub capability: Option<&'a str>,
    pub model_type: Option<&'a str>,
    pub search: Option<&'a str>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub fn find(id: &str) -> Option<&'static ModelEntry> {
    CATALOG.iter().find(|m| m.id == id)
}

pub fn list(filter: &ModelFilter<'_>) -> Vec<&'static ModelEntry> {
    let capability = filter.capability.and_then(Capability::parse);
    let matches = CATALOG.iter().filter(|m| {
        if let Some(provider) = filter.provider {
            if !m.provider.eq_ignore_ascii_case(provider) {
                return false;
            }
        }
        if let Some(cap) = capability {
            if !m.capabilities.contains(&cap) {
                return false;
            }
        }
        if let Some(model_type) = filter.model_type {
            if !m.model_type.eq_ignore_ascii_case(model_type) {
                return false;
            }
        }
        if let Some(search) = filter.search {
            if !m.id.to_lowercase().contains(&search.to_lowercase()) {
                return false;
            }
        }
        true
    });

    let offset = filter.offset.unwrap_or(0);
    let limit = filter.limit.unwrap_or(usize::MAX);
    matches.skip(offset).take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_by_capability() {
        let results = list(&ModelFilter { capability: Some("realtime"), ..Default::default() });
        assert!(results.iter().all(|m| m.capabilities.contains(&Capability::Realtime)));
        assert!(!results.is_empty());
    }

    #[test]
    fn filters_by_provider_and_search() {
        let results = list(&ModelFilter { provider: Some("gemini"), search: Some("flash"), ..Default::default() });
        assert!(results.iter().all(|m| m.provider == "gemini" && m.id.contains("flash")));
    }

    #[test]
    fn pagination_slices_the_filtered_set() {
        let all = list(&ModelFilter::default());
        let page = list(&ModelFilter { limit: Some(2), offset: Some(1), ..Default::default() });
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, all[1].id);
    }

    #[test]
    fn find_looks_up_by_exact_id() {
        assert!(find("gpt-4o").is_some());
        assert!(find("not-a-model").is_none());
    }
}
