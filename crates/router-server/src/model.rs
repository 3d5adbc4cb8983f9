//! Minimal, passthrough-preserving views over the client's chat request and the upstream's chat
//! response JSON bodies.

use router_core::Message;
use serde_json::Value;

/// Parses the `messages` array into the reduced view routing needs. Unknown fields anywhere in
/// `body` (including non-string or missing `content`) are tolerated; a message with no `content`
/// string is treated as empty content rather than a parse error.
pub fn extract_messages(body: &Value) -> Vec<Message> {
    body.get("messages")
        .and_then(Value::as_array)
        .map(|messages| {
            messages
                .iter()
                .map(|m| Message {
                    role: m
                        .get("role")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_string(),
                    content: m
                        .get("content")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// The client's originally requested model, or empty string if absent.
pub fn extract_model(body: &Value) -> String {
    body.get("model")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

/// Overwrites the top-level `model` field in place, preserving every other key.
pub fn set_model(body: &mut Value, model: &str) {
    if let Value::Object(map) = body {
        map.insert("model".to_string(), Value::String(model.to_string()));
    }
}

/// Token usage extracted from an upstream chat response. Missing fields default to zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

pub fn extract_usage(body: &Value) -> TokenUsage {
    let usage = body.get("usage");
    TokenUsage {
        prompt_tokens: usage
            .and_then(|u| u.get("prompt_tokens"))
            .and_then(Value::as_u64)
            .unwrap_or(0),
        completion_tokens: usage
            .and_then(|u| u.get("completion_tokens"))
            .and_then(Value::as_u64)
            .unwrap_or(0),
        total_tokens: usage
            .and_then(|u| u.get("total_tokens"))
            .and_then(Value::as_u64)
            .unwrap_or(0),
    }
}
