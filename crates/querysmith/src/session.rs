// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Refinement sessions.
//!
//! A [`RefinementSession`] runs one technique end to end: render the
//! technique template, call the transport, extract structured output and read
//! the final answer. Each session admits one `optimize()` at a time; a call
//! that arrives while another is in flight fails immediately with
//! [`Error::ConcurrentOptimization`].
//!
//! # Example
//!
//! ```ignore
//! let session = RefinementSession::new("Summarize this report", "openai", "gpt-4o", transport, renderer);
//! let output = session.optimize("CoT", 3).await?;
//! if let Some(query) = session.final_optimized_query() {
//!     println!("{query}");
//! }
//! ```

use crate::error::{Error, Result};
use crate::extract::{extract, StructuredOutput};
use crate::sink::ResultSink;
use crate::technique::TechniqueCatalog;
use crate::template::TemplateRenderer;
use parking_lot::Mutex;
use querysmith_client::{single_user_turn, ChatTransport, TransportSource};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::Instrument;

/// Iteration count used when `optimize()` is called with `0`
pub const DEFAULT_ITERATIONS: u32 = 3;

/// Optimization state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No call in flight
    Idle = 0,
    /// An `optimize()` call is running
    Optimizing = 1,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        if v == SessionState::Optimizing as u8 {
            SessionState::Optimizing
        } else {
            SessionState::Idle
        }
    }
}

/// Holds the session in `Optimizing` and returns it to `Idle` on drop,
/// including when the call errors or its future is dropped.
struct OptimizingGuard<'a> {
    state: &'a AtomicU8,
}

impl<'a> OptimizingGuard<'a> {
    fn enter(state: &'a AtomicU8) -> Result<Self> {
        state
            .compare_exchange(
                SessionState::Idle as u8,
                SessionState::Optimizing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| Error::ConcurrentOptimization)?;
        Ok(Self { state })
    }
}

impl Drop for OptimizingGuard<'_> {
    fn drop(&mut self) {
        self.state.store(SessionState::Idle as u8, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct Outcome {
    technique: Option<String>,
    iterations: u32,
    final_optimized_query: Option<String>,
    raw_output: Option<StructuredOutput>,
}

/// Serializable snapshot of a session, for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Original query
    pub user_query: String,
    /// Provider name
    pub provider: String,
    /// Model identifier
    pub model: String,
    /// Technique of the last `optimize()`
    pub technique: Option<String>,
    /// Iteration count of the last `optimize()`
    pub iterations: u32,
    /// Final answer of the last `optimize()`
    pub final_optimized_query: Option<String>,
    /// Structured output of the last `optimize()`
    pub raw_output: Option<StructuredOutput>,
}

/// Per-query refinement state.
pub struct RefinementSession {
    user_query: String,
    provider: String,
    model: String,
    transport: Arc<dyn ChatTransport>,
    renderer: Arc<TemplateRenderer>,
    catalog: Arc<TechniqueCatalog>,
    default_iterations: u32,
    state: AtomicU8,
    outcome: Mutex<Outcome>,
}

impl RefinementSession {
    /// Create a session over an already-resolved transport
    pub fn new(
        user_query: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
        transport: Arc<dyn ChatTransport>,
        renderer: Arc<TemplateRenderer>,
    ) -> Self {
        Self {
            user_query: user_query.into(),
            provider: provider.into(),
            model: model.into(),
            transport,
            renderer,
            catalog: Arc::new(TechniqueCatalog::default()),
            default_iterations: DEFAULT_ITERATIONS,
            state: AtomicU8::new(SessionState::Idle as u8),
            outcome: Mutex::new(Outcome::default()),
        }
    }

    /// Create a session, resolving the provider's transport from `source`
    pub fn connect(
        source: &dyn TransportSource,
        user_query: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
        renderer: Arc<TemplateRenderer>,
    ) -> Result<Self> {
        let provider = provider.into();
        let transport = source.transport_for(&provider)?;
        Ok(Self::new(user_query, provider, model, transport, renderer))
    }

    /// Use a custom technique catalog
    pub fn with_catalog(mut self, catalog: Arc<TechniqueCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Iteration count substituted for `0`
    pub fn with_default_iterations(mut self, iterations: u32) -> Self {
        self.default_iterations = iterations.max(1);
        self
    }

    /// Original query
    pub fn user_query(&self) -> &str {
        &self.user_query
    }

    /// Provider name
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Model identifier
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Transport in use
    pub fn transport(&self) -> &Arc<dyn ChatTransport> {
        &self.transport
    }

    /// Renderer in use
    pub fn renderer(&self) -> &Arc<TemplateRenderer> {
        &self.renderer
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether an `optimize()` call is in flight
    pub fn is_optimizing(&self) -> bool {
        self.state() == SessionState::Optimizing
    }

    /// Final answer of the last successful `optimize()`
    pub fn final_optimized_query(&self) -> Option<String> {
        self.outcome.lock().final_optimized_query.clone()
    }

    /// Structured output of the last `optimize()`
    pub fn raw_output(&self) -> Option<StructuredOutput> {
        self.outcome.lock().raw_output.clone()
    }

    /// Snapshot for persistence
    pub fn record(&self) -> SessionRecord {
        let outcome = self.outcome.lock();
        SessionRecord {
            user_query: self.user_query.clone(),
            provider: self.provider.clone(),
            model: self.model.clone(),
            technique: outcome.technique.clone(),
            iterations: outcome.iterations,
            final_optimized_query: outcome.final_optimized_query.clone(),
            raw_output: outcome.raw_output.clone(),
        }
    }

    /// Persist the current snapshot to `sink`
    pub async fn persist(&self, sink: &dyn ResultSink) -> Result<String> {
        let record = serde_json::to_value(self.record())?;
        sink.persist(record).await
    }

    /// Run `technique` for `iterations` passes; `0` means the session default.
    ///
    /// Returns the structured output with transport usage under `usage`.
    /// Extraction failure is returned as the `Failed` marker, not an error;
    /// in that case the final answer is cleared.
    pub async fn optimize(&self, technique: &str, iterations: u32) -> Result<StructuredOutput> {
        let _guard = OptimizingGuard::enter(&self.state)?;
        let iterations = if iterations == 0 {
            self.default_iterations
        } else {
            iterations
        };
        let span = tracing::info_span!(
            "optimize",
            technique,
            iterations,
            provider = %self.provider,
            model = %self.model
        );
        self.run_technique(technique, iterations).instrument(span).await
    }

    async fn run_technique(&self, technique: &str, iterations: u32) -> Result<StructuredOutput> {
        if !self.renderer.contains(technique) {
            return Err(Error::UnsupportedTechnique(technique.to_string()));
        }

        let context = json!({
            "user_query": self.user_query,
            "number_of_iterations": iterations,
            "number_of_versions": iterations,
        });
        let prompt = self.renderer.render(technique, &context)?;
        let turns = single_user_turn(prompt);

        let completion = self
            .transport
            .call_chat_completion(&self.model, &turns)
            .await?;

        let output = extract(&completion.text);
        let descriptor = self.catalog.descriptor(technique);
        if !output.is_failure() && !descriptor.shape.matches(&output) {
            tracing::warn!(expected = ?descriptor.shape, "technique output has unexpected shape");
        }

        let final_answer = output.final_answer(&descriptor.answer_field);
        if output.is_failure() {
            tracing::warn!("technique output could not be parsed");
        } else if final_answer.is_none() {
            tracing::warn!(field = %descriptor.answer_field, "final answer field missing");
        }

        let output = output.with_usage(completion.usage);
        {
            let mut outcome = self.outcome.lock();
            outcome.technique = Some(technique.to_string());
            outcome.iterations = iterations;
            outcome.final_optimized_query = final_answer;
            outcome.raw_output = Some(output.clone());
        }

        tracing::info!(
            tokens_spent = ?completion.usage.tokens_spent,
            time_in_seconds = completion.usage.time_in_seconds,
            "technique finished"
        );
        Ok(output)
    }
}
