// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Anthropic messages provider

use crate::error::TransportError;
use crate::provider::{ChatProvider, ProviderKind, ProviderSettings};
use crate::request::{ChatTurn, Role};
use crate::response::ProviderReply;
use async_trait::async_trait;
use serde_json::{json, Value};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Anthropic provider implementation
pub struct AnthropicProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider
    pub fn new(api_key: String, settings: &ProviderSettings) -> crate::Result<Self> {
        Ok(Self {
            api_key,
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            client: settings.http_client()?,
        })
    }
}

/// Messages API body. System turns move into the top-level `system` field.
pub(crate) fn request_body(model: &str, turns: &[ChatTurn], max_output_tokens: u32) -> Value {
    let system: Vec<&str> = turns
        .iter()
        .filter(|t| t.role == Role::System)
        .map(|t| t.content.as_str())
        .collect();
    let messages: Vec<Value> = turns
        .iter()
        .filter(|t| t.role != Role::System)
        .map(|t| json!({"role": t.role.as_str(), "content": t.content}))
        .collect();

    let mut body = json!({
        "model": model,
        "max_tokens": max_output_tokens,
        "temperature": 0.0,
        "messages": messages,
    });
    if !system.is_empty() {
        body["system"] = Value::String(system.join("\n\n"));
    }
    body
}

/// Pull text and reported usage out of a Messages API response.
pub(crate) fn parse_reply(json: &Value) -> Result<ProviderReply, TransportError> {
    let text = json["content"]
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter_map(|block| block["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .ok_or_else(|| TransportError::MalformedResponse {
            provider: "anthropic",
            detail: format!("missing content blocks: {}", json),
        })?;

    let input = json["usage"]["input_tokens"].as_u64();
    let output = json["usage"]["output_tokens"].as_u64();
    let text = text.trim().to_string();
    Ok(match (input, output) {
        (Some(i), Some(o)) => ProviderReply::with_tokens(text, (i + o) as u32),
        _ => ProviderReply::text(text),
    })
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    async fn complete(
        &self,
        model: &str,
        turns: &[ChatTurn],
        max_output_tokens: u32,
    ) -> anyhow::Result<ProviderReply> {
        let body = request_body(model, turns, max_output_tokens);
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(TransportError::Http {
                provider: "anthropic",
                status: status.as_u16(),
                body: text,
            }
            .into());
        }

        let json: Value =
            serde_json::from_str(&text).map_err(|e| TransportError::MalformedResponse {
                provider: "anthropic",
                detail: e.to_string(),
            })?;
        Ok(parse_reply(&json)?)
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_lifts_system() {
        let turns = vec![ChatTurn::system("be terse"), ChatTurn::user("hello")];
        let body = request_body("claude-3-5-sonnet", &turns, 4096);

        assert_eq!(body["system"], "be terse");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["max_tokens"], 4096);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
    }

    #[test]
    fn test_request_body_without_system() {
        let turns = vec![ChatTurn::user("hello")];
        let body = request_body("claude-3-haiku", &turns, 100);
        assert!(body.get("system").is_none());
    }

    #[test]
    fn test_parse_reply_with_usage() {
        let json = json!({
            "content": [{"type": "text", "text": "  {\"a\": 1}  "}],
            "usage": {"input_tokens": 12, "output_tokens": 30}
        });
        let reply = parse_reply(&json).unwrap();
        assert_eq!(reply.text, "{\"a\": 1}");
        assert_eq!(reply.reported_tokens, Some(42));
    }

    #[test]
    fn test_parse_reply_without_usage() {
        let json = json!({"content": [{"type": "text", "text": "ok"}]});
        let reply = parse_reply(&json).unwrap();
        assert_eq!(reply.reported_tokens, None);
    }

    #[test]
    fn test_parse_reply_malformed() {
        let err = parse_reply(&json!({"error": "overloaded"})).unwrap_err();
        assert!(matches!(err, TransportError::MalformedResponse { .. }));
    }
}
