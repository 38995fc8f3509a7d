//! Cache key generation strategies (`§4.2` "Key generation").

use md5::{Digest as Md5Digest, Md5};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Which hashing strategy to use for a request's cache key, chosen by
/// config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheKeyStrategy {
    #[default]
    Default,
    Semantic,
    Hierarchical,
    ContentBased,
}

/// Which extra request fields get folded into the hash for the
/// [`CacheKeyStrategy::Default`] strategy. Model and message content are
/// always hashed; these toggle the rest, mirroring a real gateway's
/// response-cache key builder.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheKeyComponents {
    pub temperature: bool,
    pub tools: bool,
    pub system_prompt: bool,
}

impl CacheKeyComponents {
    pub const fn all() -> Self {
        Self { temperature: true, tools: true, system_prompt: true }
    }
}

/// One normalized conversation message, projected down to the fields that
/// matter for cache identity.
#[derive(Debug, Clone)]
pub struct NormalizedMessage {
    pub role: String,
    pub content: String,
}

/// The subset of a chat/embeddings request relevant to fingerprinting.
/// Callers build this by stripping non-deterministic fields (`stream`,
/// `user`, timestamps) from the inbound body before hashing.
#[derive(Debug, Clone, Default)]
pub struct NormalizedRequest {
    pub provider: String,
    pub model: String,
    pub messages: Vec<NormalizedMessage>,
    pub temperature: Option<f64>,
    pub tools: Option<Value>,
    pub extra_params: Option<Value>,
}

/// Which kind of request a hierarchical key path is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Chat,
    Embedding,
    Tts,
    Transcription,
    Completion,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Embedding => "embedding",
            Self::Tts => "tts",
            Self::Transcription => "transcription",
            Self::Completion => "completion",
        }
    }
}

/// Build a cache key for `req` under `strategy`, truncating SHA-256 hex
/// digests to `truncate_hex` characters (ignored for MD5-based
/// strategies, which are already short).
pub fn build_key(
    strategy: CacheKeyStrategy,
    req: &NormalizedRequest,
    request_type: RequestType,
    components: CacheKeyComponents,
    truncate_hex: usize,
) -> String {
    match strategy {
        CacheKeyStrategy::Default => default_key(req, components, truncate_hex),
        CacheKeyStrategy::Semantic => semantic_key(req),
        CacheKeyStrategy::Hierarchical => hierarchical_key(req, request_type, truncate_hex),
        CacheKeyStrategy::ContentBased => content_based_key(req),
    }
}

fn default_key(req: &NormalizedRequest, components: CacheKeyComponents, truncate_hex: usize) -> String {
    let mut hasher = Sha256::new();

    hasher.update(b"provider:");
    hasher.update(req.provider.as_bytes());
    hasher.update(b"\x00");

    hasher.update(b"model:");
    hasher.update(req.model.as_bytes());
    hasher.update(b"\x00");

    if components.temperature {
        hasher.update(b"temp:");
        hasher.update(req.temperature.unwrap_or(1.0).to_le_bytes());
        hasher.update(b"\x00");
    }

    if components.tools {
        if let Some(ref tools) = req.tools {
            hasher.update(b"tools:");
            hasher.update(tools.to_string().as_bytes());
            hasher.update(b"\x00");
        }
    }

    if components.system_prompt {
        hasher.update(b"system:");
        for msg in req.messages.iter().filter(|m| m.role == "system" || m.role == "developer") {
            hasher.update(msg.content.as_bytes());
            hasher.update(b"|");
        }
        hasher.update(b"\x00");
    }

    hasher.update(b"messages:");
    for msg in req.messages.iter().filter(|m| m.role != "system" && m.role != "developer") {
        hasher.update(msg.role.as_bytes());
        hasher.update(b":");
        hasher.update(msg.content.as_bytes());
        hasher.update(b"|");
    }

    if let Some(ref extra) = req.extra_params {
        hasher.update(b"extra:");
        hasher.update(extra.to_string().as_bytes());
    }

    let digest = hex::encode(hasher.finalize());
    let digest = &digest[..truncate_hex.min(digest.len())];
    format!("gw:response:{digest}")
}

/// Two requests whose prompts differ only in whitespace/case hash to the
/// same key.
fn semantic_key(req: &NormalizedRequest) -> String {
    let mut hasher = Md5::new();

    for msg in &req.messages {
        let collapsed = collapse_whitespace(&msg.content.to_lowercase());
        hasher.update(msg.role.as_bytes());
        hasher.update(b":");
        hasher.update(collapsed.as_bytes());
        hasher.update(b"|");
    }

    hasher.update(b"params:");
    hasher.update(req.temperature.unwrap_or(1.0).to_le_bytes());
    if let Some(ref extra) = req.extra_params {
        hasher.update(extra.to_string().as_bytes());
    }

    format!("gw:semantic:{}", hex::encode(hasher.finalize()))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `llm_gateway:{provider}:{model}:{request_type}:{content_hash}` — a
/// colon-separated path so invalidation can prefix-match it.
fn hierarchical_key(req: &NormalizedRequest, request_type: RequestType, truncate_hex: usize) -> String {
    let mut hasher = Sha256::new();
    for msg in &req.messages {
        hasher.update(msg.role.as_bytes());
        hasher.update(msg.content.as_bytes());
        hasher.update(b"|");
    }
    let digest = hex::encode(hasher.finalize());
    let digest = &digest[..truncate_hex.min(digest.len())];
    format!("llm_gateway:{}:{}:{}:{digest}", req.provider, req.model, request_type.as_str())
}

/// Per-message fingerprint `role:md5(content)[:8]` joined, then hashed.
/// Emphasizes message identity/order over semantic normalization.
fn content_based_key(req: &NormalizedRequest) -> String {
    let mut hasher = Sha256::new();
    for msg in &req.messages {
        let mut md5 = Md5::new();
        md5.update(msg.content.as_bytes());
        let content_hash = &hex::encode(md5.finalize())[..8];
        hasher.update(msg.role.as_bytes());
        hasher.update(b":");
        hasher.update(content_hash.as_bytes());
        hasher.update(b"|");
    }
    format!("gw:content:{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(content: &str) -> NormalizedRequest {
        NormalizedRequest {
            provider: "openai".into(),
            model: "gpt-4o".into(),
            messages: vec![NormalizedMessage { role: "user".into(), content: content.into() }],
            ..Default::default()
        }
    }

    #[test]
    fn default_key_is_deterministic() {
        let a = build_key(CacheKeyStrategy::Default, &req("hello"), RequestType::Chat, CacheKeyComponents::all(), 16);
        let b = build_key(CacheKeyStrategy::Default, &req("hello"), RequestType::Chat, CacheKeyComponents::all(), 16);
        assert_eq!(a, b);
    }

    #[test]
    fn default_key_changes_with_content() {
        let a = build_key(CacheKeyStrategy::Default, &req("hello"), RequestType::Chat, CacheKeyComponents::all(), 16);
        let b = build_key(CacheKeyStrategy::Default, &req("goodbye"), RequestType::Chat, CacheKeyComponents::all(), 16);
        assert_ne!(a, b);
    }

    #[test]
    fn semantic_key_ignores_whitespace_and_case() {
        let a = build_key(CacheKeyStrategy::Semantic, &req("Hello   World"), RequestType::Chat, CacheKeyComponents::all(), 16);
        let b = build_key(CacheKeyStrategy::Semantic, &req("hello world"), RequestType::Chat, CacheKeyComponents::all(), 16);
        assert_eq!(a, b);
    }

    #[test]
    fn hierarchical_key_is_prefixed_by_provider_model_type() {
        let key = build_key(CacheKeyStrategy::Hierarchical, &req("hi"), RequestType::Embedding, CacheKeyComponents::all(), 16);
        assert!(key.starts_with("llm_gateway:openai:gpt-4o:embedding:"));
    }

    #[test]
    fn content_based_key_is_order_sensitive() {
        let mut r1 = req("a");
        r1.messages.push(NormalizedMessage { role: "assistant".into(), content: "b".into() });
        let mut r2 = req("a");
        r2.messages.insert(0, NormalizedMessage { role: "assistant".into(), content: "b".into() });
        let k1 = build_key(CacheKeyStrategy::ContentBased, &r1, RequestType::Chat, CacheKeyComponents::all(), 16);
        let k2 = build_key(CacheKeyStrategy::ContentBased, &r2, RequestType::Chat, CacheKeyComponents::all(), 16);
        assert_ne!(k1, k2);
    }
}
