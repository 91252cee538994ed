// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Mock providers and transports for tests and examples.
//!
//! # Examples
//!
//! ```
//! use querysmith_client::mock::MockTransport;
//!
//! let transport = MockTransport::new(|_model, turns| {
//!     format!("{{\"echo\": \"{}\"}}", turns[0].content)
//! });
//! ```

use crate::error::Result;
use crate::provider::{ChatProvider, ProviderKind};
use crate::request::ChatTurn;
use crate::response::{estimate_exchange_tokens, CompletionResult, ProviderReply, Usage};
use crate::transport::ChatTransport;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// A provider driven by a closure, for exercising retry behavior.
///
/// The closure receives the 1-based attempt number and the model; returning
/// `Err` simulates a failed remote call.
pub struct MockProvider<F>
where
    F: Fn(u32, &str) -> anyhow::Result<String> + Send + Sync,
{
    responder: F,
    attempts: AtomicU32,
    kind: ProviderKind,
}

impl<F> MockProvider<F>
where
    F: Fn(u32, &str) -> anyhow::Result<String> + Send + Sync,
{
    /// Create a new mock provider
    pub fn new(responder: F) -> Self {
        Self {
            responder,
            attempts: AtomicU32::new(0),
            kind: ProviderKind::OpenAI,
        }
    }

    /// Report a different provider kind
    pub fn with_kind(mut self, kind: ProviderKind) -> Self {
        self.kind = kind;
        self
    }

    /// Number of attempts made so far
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

/// Provider that fails `failures` times, then answers with `text`.
pub fn flaky_provider(
    failures: u32,
    text: &'static str,
) -> MockProvider<impl Fn(u32, &str) -> anyhow::Result<String> + Send + Sync> {
    MockProvider::new(move |attempt, _| {
        if attempt <= failures {
            anyhow::bail!("503 service unavailable (attempt {attempt})")
        }
        Ok(text.to_string())
    })
}

#[async_trait]
impl<F> ChatProvider for MockProvider<F>
where
    F: Fn(u32, &str) -> anyhow::Result<String> + Send + Sync,
{
    async fn complete(
        &self,
        model: &str,
        _turns: &[ChatTurn],
        _max_output_tokens: u32,
    ) -> anyhow::Result<ProviderReply> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        (self.responder)(attempt, model).map(ProviderReply::text)
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }
}

/// A transport driven by a closure, with an optional artificial delay.
///
/// Records every call so tests can inspect what the engines sent.
pub struct MockTransport<F>
where
    F: Fn(&str, &[ChatTurn]) -> String + Send + Sync,
{
    responder: F,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, Vec<ChatTurn>)>>,
}

impl<F> MockTransport<F>
where
    F: Fn(&str, &[ChatTurn]) -> String + Send + Sync,
{
    /// Create a new mock transport
    pub fn new(responder: F) -> Self {
        Self {
            responder,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sleep for `delay` before answering each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every `(model, turns)` pair received so far
    pub fn calls(&self) -> Vec<(String, Vec<ChatTurn>)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl<F> ChatTransport for MockTransport<F>
where
    F: Fn(&str, &[ChatTurn]) -> String + Send + Sync,
{
    async fn call_chat_completion(
        &self,
        model: &str,
        turns: &[ChatTurn],
    ) -> Result<CompletionResult> {
        let start = Instant::now();
        self.calls
            .lock()
            .push((model.to_string(), turns.to_vec()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let text = (self.responder)(model, turns);
        let tokens = estimate_exchange_tokens(turns, &text);
        Ok(CompletionResult {
            text,
            usage: Usage::new(Some(tokens), start.elapsed()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_transport_records_calls() {
        let transport = MockTransport::new(|model, _| format!("from {model}"));
        let result = transport
            .call_chat_completion("gpt-4o", &[ChatTurn::user("hi")])
            .await
            .unwrap();

        assert_eq!(result.text, "from gpt-4o");
        assert!(result.usage.time_in_seconds >= 0.0);
        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "gpt-4o");
    }

    #[tokio::test]
    async fn test_flaky_provider_counts_attempts() {
        let provider = flaky_provider(1, "ok");
        assert!(provider.complete("m", &[], 10).await.is_err());
        let reply = provider.complete("m", &[], 10).await.unwrap();
        assert_eq!(reply.text, "ok");
        assert_eq!(provider.attempts(), 2);
    }
}
