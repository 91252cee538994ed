// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! # Querysmith
//!
//! Prompt refinement orchestration: run a query through an optimization
//! technique, recover structured output from the model's reply and track the
//! refined query per session.
//!
//! ## Pipeline
//!
//! ```text
//! RefinementSession::optimize(technique, iterations)
//!   -> TemplateRenderer::render(technique, context)
//!   -> ChatTransport::call_chat_completion(model, turns)
//!   -> extract(text)
//!   -> StructuredOutput::final_answer(field)
//! ```
//!
//! Scoring, comparison and blind sampling live in `querysmith-eval`; the chat
//! transport lives in `querysmith-client`.

#![warn(missing_docs)]

pub mod analysis;
pub mod error;
pub mod extract;
pub mod models;
pub mod session;
pub mod sink;
pub mod technique;
pub mod template;

pub use analysis::QueryAnalyzer;
pub use error::{Error, Result};
pub use extract::{extract, StructuredOutput, PARSE_FAILURE};
pub use models::ModelRegistry;
pub use session::{RefinementSession, SessionRecord, SessionState, DEFAULT_ITERATIONS};
pub use sink::{MemorySink, NoopSink, ResultSink};
pub use technique::{AnswerShape, TechniqueCatalog, TechniqueDescriptor, FINAL_ANSWER_FIELD};
pub use template::{FileTemplateStore, InMemoryTemplateStore, TemplateRenderer, TemplateStore};

/// Prelude for common imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::extract::{extract, StructuredOutput};
    pub use crate::session::RefinementSession;
    pub use crate::template::{FileTemplateStore, TemplateRenderer};
    pub use querysmith_client::{ChatTransport, ChatTurn, CompletionResult, TransportConfig};
}
