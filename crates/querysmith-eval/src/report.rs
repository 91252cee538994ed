// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Optimize-then-rescore runs.

use crate::evaluator::{EvaluationVerdict, Evaluator};
use querysmith::extract::StructuredOutput;
use querysmith::{RefinementSession, ResultSink, Result};
use serde::{Deserialize, Serialize};

/// Before/after scores of one refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementReport {
    /// Query as submitted
    pub user_query: String,
    /// Technique applied
    pub technique: String,
    /// Iterations requested
    pub iterations: u32,
    /// Score of the original query
    pub original_evaluation: EvaluationVerdict,
    /// Technique output, including usage
    pub optimization: StructuredOutput,
    /// Refined query, when the technique produced one
    pub final_optimized_query: Option<String>,
    /// Score of the refined query
    pub refined_evaluation: Option<EvaluationVerdict>,
    /// Sink id, when the report was persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
}

impl Evaluator {
    /// Score the session's query, optimize it, then score the refined query.
    ///
    /// The original score and the optimization run concurrently. The refined
    /// query is only scored when the technique produced a non-empty one.
    pub async fn refine_and_evaluate(
        &self,
        session: &RefinementSession,
        technique: &str,
        iterations: u32,
        use_human_criteria: bool,
        sink: Option<&dyn ResultSink>,
    ) -> Result<RefinementReport> {
        let (original_evaluation, optimization) = tokio::try_join!(
            self.evaluate(session.user_query(), use_human_criteria),
            session.optimize(technique, iterations),
        )?;

        let final_optimized_query = session
            .final_optimized_query()
            .filter(|q| !q.trim().is_empty());
        let refined_evaluation = match &final_optimized_query {
            Some(query) => Some(self.evaluate(query, use_human_criteria).await?),
            None => {
                tracing::warn!(technique, "no refined query to evaluate");
                None
            }
        };

        let mut report = RefinementReport {
            user_query: session.user_query().to_string(),
            technique: technique.to_string(),
            iterations,
            original_evaluation,
            optimization,
            final_optimized_query,
            refined_evaluation,
            record_id: None,
        };

        if let Some(sink) = sink {
            let id = sink.persist(serde_json::to_value(&report)?).await?;
            report.record_id = Some(id);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::EVALUATOR_LLM;
    use querysmith::template::{InMemoryTemplateStore, TemplateRenderer};
    use querysmith::MemorySink;
    use querysmith_client::mock::MockTransport;
    use std::sync::Arc;

    fn renderer() -> Arc<TemplateRenderer> {
        let store = InMemoryTemplateStore::new()
            .with(EVALUATOR_LLM, "EVAL {{ user_query }}")
            .with("CoT", "OPT {{ user_query }}");
        Arc::new(TemplateRenderer::new(Arc::new(store)))
    }

    #[tokio::test]
    async fn test_refine_and_evaluate() {
        let transport = Arc::new(MockTransport::new(|_, turns| {
            let prompt = &turns[0].content;
            if prompt.starts_with("OPT") {
                r#"{"Final_Optimized_Query": "sharper query"}"#.to_string()
            } else if prompt.contains("sharper query") {
                r#"{"score": 9}"#.to_string()
            } else {
                r#"{"score": 4}"#.to_string()
            }
        }));
        let renderer = renderer();
        let session = RefinementSession::new("vague query", "openai", "gpt-4o", transport.clone(), renderer.clone());
        let evaluator = Evaluator::new(transport, renderer, "gpt-4o");
        let sink = MemorySink::new();

        let report = evaluator
            .refine_and_evaluate(&session, "CoT", 2, false, Some(&sink))
            .await
            .unwrap();

        assert_eq!(report.final_optimized_query.as_deref(), Some("sharper query"));
        assert_eq!(report.original_evaluation.result.get("score"), Some(&serde_json::json!(4)));
        let refined = report.refined_evaluation.unwrap();
        assert_eq!(refined.result.get("score"), Some(&serde_json::json!(9)));
        assert_eq!(report.record_id.as_deref(), Some("0"));
        assert_eq!(sink.records()[0]["technique"], "CoT");
    }

    #[tokio::test]
    async fn test_no_refined_query_skips_rescore() {
        let transport = Arc::new(MockTransport::new(|_, turns| {
            if turns[0].content.starts_with("OPT") {
                "model refused".to_string()
            } else {
                r#"{"score": 4}"#.to_string()
            }
        }));
        let renderer = renderer();
        let session = RefinementSession::new("q", "openai", "gpt-4o", transport.clone(), renderer.clone());
        let evaluator = Evaluator::new(transport.clone(), renderer, "gpt-4o");

        let report = evaluator
            .refine_and_evaluate(&session, "CoT", 1, false, None)
            .await
            .unwrap();

        assert!(report.optimization.is_failure());
        assert!(report.refined_evaluation.is_none());
        assert_eq!(transport.calls().len(), 2);
    }
}
