// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Provider abstraction for different chat backends

use crate::anthropic::AnthropicProvider;
use crate::error::TransportError;
use crate::openai::OpenAiProvider;
use crate::request::ChatTurn;
use crate::response::ProviderReply;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Backend protocol family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions
    OpenAI,
    /// Anthropic messages
    Anthropic,
}

impl ProviderKind {
    /// Canonical provider name
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = TransportError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAI),
            "claude" | "anthropic" => Ok(ProviderKind::Anthropic),
            _ => Err(TransportError::UnknownProvider(name.to_string())),
        }
    }
}

/// Provider trait for chat backends.
///
/// One call is one attempt; retry, timing and usage estimation live in
/// [`RetryingTransport`](crate::transport::RetryingTransport).
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send the conversation once
    async fn complete(
        &self,
        model: &str,
        turns: &[ChatTurn],
        max_output_tokens: u32,
    ) -> anyhow::Result<ProviderReply>;

    /// Get provider kind
    fn kind(&self) -> ProviderKind;
}

/// Connection settings shared by the HTTP providers
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    /// Override for the API base URL
    pub base_url: Option<String>,

    /// HTTP-level timeout applied to every request
    pub http_timeout: Option<Duration>,
}

impl ProviderSettings {
    /// Use a custom base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the HTTP timeout
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    pub(crate) fn http_client(&self) -> crate::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.http_timeout {
            builder = builder.timeout(timeout);
        }
        builder
            .build()
            .map_err(|e| TransportError::ClientBuild(e.to_string()))
    }
}

/// Build the provider implementation for a kind.
pub fn build_provider(
    kind: ProviderKind,
    api_key: String,
    settings: &ProviderSettings,
) -> crate::Result<Arc<dyn ChatProvider>> {
    let provider: Arc<dyn ChatProvider> = match kind {
        ProviderKind::OpenAI => Arc::new(OpenAiProvider::new(api_key, settings)?),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(api_key, settings)?),
    };
    Ok(provider)
}
