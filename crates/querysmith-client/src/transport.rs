// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Retrying chat transport.
//!
//! [`RetryingTransport`] wraps a [`ChatProvider`] and retries every failed
//! attempt with exponential backoff (`base_delay * 2^(attempt-1)`). Backoff
//! uses `tokio::time::sleep`, so concurrent calls keep making progress while
//! one of them waits.
//!
//! # Examples
//!
//! ```ignore
//! use querysmith_client::{ChatTransport, RetryingTransport, TransportConfig, ChatTurn};
//!
//! let transport = RetryingTransport::new("openai", provider, TransportConfig::default());
//! let result = transport
//!     .call_chat_completion("gpt-4o", &[ChatTurn::user("Hello")])
//!     .await?;
//! println!("{} ({:?} tokens)", result.text, result.usage.tokens_spent);
//! ```

use crate::error::{Result, TransportError};
use crate::provider::ChatProvider;
use crate::request::ChatTurn;
use crate::response::{estimate_exchange_tokens, CompletionResult, Usage};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Configuration for transport calls.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Maximum number of attempts, including the first.
    pub max_retries: u32,
    /// Delay before the second attempt; doubles for each later one.
    pub base_delay: Duration,
    /// Output length cap sent to the provider.
    pub max_output_tokens: u32,
    /// Upper bound on a single attempt.
    pub request_timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_output_tokens: 4096,
            request_timeout: Some(Duration::from_secs(120)),
        }
    }
}

impl TransportConfig {
    /// Backoff before the attempt following failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Capability to run one chat completion with bounded retry.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send `turns` to `model` and return the generated text with usage.
    async fn call_chat_completion(
        &self,
        model: &str,
        turns: &[ChatTurn],
    ) -> Result<CompletionResult>;
}

/// Transport that retries a provider with exponential backoff.
pub struct RetryingTransport {
    name: String,
    provider: Arc<dyn ChatProvider>,
    config: TransportConfig,
}

impl RetryingTransport {
    /// Create a transport for the provider registered under `name`.
    pub fn new(
        name: impl Into<String>,
        provider: Arc<dyn ChatProvider>,
        config: TransportConfig,
    ) -> Self {
        Self {
            name: name.into(),
            provider,
            config,
        }
    }

    /// Provider name this transport was built for
    pub fn provider_name(&self) -> &str {
        &self.name
    }

    /// Get configuration
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    async fn attempt(&self, model: &str, turns: &[ChatTurn]) -> anyhow::Result<CompletionResult> {
        let start = Instant::now();
        let call = self
            .provider
            .complete(model, turns, self.config.max_output_tokens);

        let reply = match self.config.request_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| TransportError::Timeout(limit))??,
            None => call.await?,
        };
        let elapsed = start.elapsed();

        let tokens = reply
            .reported_tokens
            .unwrap_or_else(|| estimate_exchange_tokens(turns, &reply.text));

        Ok(CompletionResult {
            text: reply.text,
            usage: Usage::new(Some(tokens), elapsed),
        })
    }

    async fn call_with_retry(&self, model: &str, turns: &[ChatTurn]) -> Result<CompletionResult> {
        let max_attempts = self.config.max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match self.attempt(model, turns).await {
                Ok(result) => {
                    tracing::info!(
                        attempt,
                        tokens_spent = ?result.usage.tokens_spent,
                        time_in_seconds = result.usage.time_in_seconds,
                        "chat completion received"
                    );
                    return Ok(result);
                }
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < max_attempts {
                        let delay = self.config.backoff(attempt);
                        tracing::warn!(
                            attempt,
                            error = %last_error,
                            retry_in = ?delay,
                            "chat completion attempt failed"
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        tracing::error!(attempt, error = %last_error, "chat completion attempts exhausted");
                    }
                }
            }
        }

        Err(TransportError::Exhausted {
            provider: self.name.clone(),
            model: model.to_string(),
            attempts: max_attempts,
            last_error,
        })
    }
}

#[async_trait]
impl ChatTransport for RetryingTransport {
    async fn call_chat_completion(
        &self,
        model: &str,
        turns: &[ChatTurn],
    ) -> Result<CompletionResult> {
        let span = tracing::info_span!("chat_completion", provider = %self.name, model);
        self.call_with_retry(model, turns).instrument(span).await
    }
}
