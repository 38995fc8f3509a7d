//! Build a [`NormalizedRequest`] from an inbound chat/embeddings body
//! (`§4.2` "Key generation" feeds off this, not the raw wire body).

use gateway_cache::{NormalizedMessage, NormalizedRequest};
use serde_json::{json, Value};

/// Fields `§4.2`'s semantic key strategy bundles into `extra_params` beyond
/// model/messages/temperature: anything that changes sampling behavior
/// without changing the prompt, so two requests differing only in one of
/// these must not collide on the same cache entry.
const SAMPLING_FIELDS: &[&str] = &["max_tokens", "top_p", "presence_penalty", "frequency_penalty", "n", "stop", "encoding_format", "dimensions"];

/// Project a `/v1/chat/completions` body down to the fields that matter
/// for cache identity, stripping non-deterministic fields (`stream`,
/// `user`) the caller is expected to have already read separately.
pub fn chat_request(provider: &str, body: &Value) -> NormalizedRequest {
    let model = body.get("model").and_then(Value::as_str).unwrap_or_default().to_string();
    let messages = body
        .get("messages")
        .and_then(Value::as_array)
        .map(|messages| {
            messages
                .iter()
                .map(|m| NormalizedMessage {
                    role: m.get("role").and_then(Value::as_str).unwrap_or_default().to_string(),
                    content: message_content(m),
                })
                .collect()
        })
        .unwrap_or_default();
    let temperature = body.get("temperature").and_then(Value::as_f64);
    let tools = body.get("tools").cloned();

    NormalizedRequest { provider: provider.to_string(), model, messages, temperature, tools, extra_params: sampling_params(body) }
}

/// Project a `/v1/embeddings` body: a single synthetic "user" message
/// carrying the input, so it hashes through the same key builder as chat.
pub fn embeddings_request(provider: &str, body: &Value) -> NormalizedRequest {
    let model = body.get("model").and_then(Value::as_str).unwrap_or_default().to_string();
    let input = match body.get("input") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect::<Vec<_>>().join("\u{1}"),
        _ => String::new(),
    };
    NormalizedRequest {
        provider: provider.to_string(),
        model,
        messages: vec![NormalizedMessage { role: "user".to_string(), content: input }],
        temperature: None,
        tools: None,
        extra_params: sampling_params(body),
    }
}

/// Pull the sampling-affecting fields (`§4.2`'s semantic-key bundle) out of
/// a request body into one object, so callers never need to touch the raw
/// body again once they have a [`NormalizedRequest`]. `None` when the body
/// carries none of them, so a request with no extra sampling params hashes
/// identically to one built before this field existed.
fn sampling_params(body: &Value) -> Option<Value> {
    let mut extra = serde_json::Map::new();
    for field in SAMPLING_FIELDS {
        if let Some(value) = body.get(*field) {
            extra.insert((*field).to_string(), value.clone());
        }
    }
    if extra.is_empty() {
        None
    } else {
        Some(json!(extra))
    }
}

/// Chat message `content` can be a plain string or a list of typed parts
/// (OpenAI's multimodal content array); flatten text parts for hashing.
fn message_content(message: &Value) -> String {
    match message.get("content") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_request_extracts_model_and_messages() {
        let body = json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hi"}],
            "temperature": 0.2,
        });
        let normalized = chat_request("openai", &body);
        assert_eq!(normalized.model, "gpt-4o");
        assert_eq!(normalized.messages.len(), 1);
        assert_eq!(normalized.temperature, Some(0.2));
    }

    #[test]
    fn chat_request_flattens_multimodal_content() {
        let body = json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]}],
        });
        let normalized = chat_request("openai", &body);
        assert_eq!(normalized.messages[0].content, "a\nb");
    }

    #[test]
    fn chat_request_bundles_sampling_params_into_extra() {
        let body = json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hi"}],
            "max_tokens": 256,
            "top_p": 0.9,
        });
        let normalized = chat_request("openai", &body);
        let extra = normalized.extra_params.expect("sampling fields present");
        assert_eq!(extra["max_tokens"], json!(256));
        assert_eq!(extra["top_p"], json!(0.9));
    }

    #[test]
    fn chat_requests_differing_only_in_max_tokens_do_not_collide() {
        let mut a = json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "hi"}], "max_tokens": 16});
        let mut b = a.clone();
        a.as_object_mut().unwrap().insert("max_tokens".to_string(), json!(16));
        b.as_object_mut().unwrap().insert("max_tokens".to_string(), json!(512));
        assert_ne!(chat_request("openai", &a).extra_params, chat_request("openai", &b).extra_params);
    }

    #[test]
    fn embeddings_request_joins_array_input() {
        let body = json!({"model": "text-embedding-3-small", "input": ["a", "b"]});
        let normalized = embeddings_request("openai", &body);
        assert_eq!(normalized.messages[0].content, "a\u{1}b");
    }
}
