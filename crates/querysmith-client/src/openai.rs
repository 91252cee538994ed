// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! OpenAI chat completions provider.
//!
//! Reasoning models reject `temperature` and take their output cap as
//! `max_completion_tokens`; [`OpenAiCapabilities::for_model`] makes that
//! dispatch explicit instead of special-casing a model name at call time.

use crate::error::TransportError;
use crate::provider::{ChatProvider, ProviderKind, ProviderSettings};
use crate::request::ChatTurn;
use crate::response::ProviderReply;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Parameter name carrying the output length cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenLimitParam {
    /// `max_tokens`
    MaxTokens,
    /// `max_completion_tokens`
    MaxCompletionTokens,
}

/// Request-shape capabilities of an OpenAI model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenAiCapabilities {
    /// How the output cap is sent
    pub token_limit: TokenLimitParam,
    /// Whether `temperature` may be sent
    pub supports_temperature: bool,
}

impl OpenAiCapabilities {
    /// Resolve capabilities from the model identifier.
    pub fn for_model(model: &str) -> Self {
        if is_reasoning_model(model) {
            Self {
                token_limit: TokenLimitParam::MaxCompletionTokens,
                supports_temperature: false,
            }
        } else {
            Self {
                token_limit: TokenLimitParam::MaxTokens,
                supports_temperature: true,
            }
        }
    }
}

fn is_reasoning_model(model: &str) -> bool {
    let model = model.to_ascii_lowercase();
    ["o1", "o3", "o4"].iter().any(|family| {
        model == *family
            || model
                .strip_prefix(family)
                .is_some_and(|rest| rest.starts_with('-'))
    })
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
}

impl<'a> OpenAiRequest<'a> {
    pub(crate) fn new(model: &'a str, messages: &'a [ChatTurn], max_output_tokens: u32) -> Self {
        let caps = OpenAiCapabilities::for_model(model);
        let (max_tokens, max_completion_tokens) = match caps.token_limit {
            TokenLimitParam::MaxTokens => (Some(max_output_tokens), None),
            TokenLimitParam::MaxCompletionTokens => (None, Some(max_output_tokens)),
        };
        Self {
            model,
            messages,
            temperature: caps.supports_temperature.then_some(0.0),
            max_tokens,
            max_completion_tokens,
        }
    }
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<Choice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    total_tokens: u32,
}

/// OpenAI provider implementation
pub struct OpenAiProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider
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

    /// Base URL in use
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    async fn complete(
        &self,
        model: &str,
        turns: &[ChatTurn],
        max_output_tokens: u32,
    ) -> anyhow::Result<ProviderReply> {
        let body = OpenAiRequest::new(model, turns, max_output_tokens);
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(TransportError::Http {
                provider: "openai",
                status: status.as_u16(),
                body: text,
            }
            .into());
        }

        let parsed: OpenAiResponse =
            serde_json::from_str(&text).map_err(|e| TransportError::MalformedResponse {
                provider: "openai",
                detail: e.to_string(),
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| TransportError::MalformedResponse {
                provider: "openai",
                detail: "no choices in response".to_string(),
            })?;

        let text = content.trim().to_string();
        Ok(match parsed.usage {
            Some(usage) => ProviderReply::with_tokens(text, usage.total_tokens),
            None => ProviderReply::text(text),
        })
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAI
    }
}
