// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Rubric evaluation, pairwise comparison and answer judging.

use futures::future::join_all;
use querysmith::extract::{extract, StructuredOutput};
use querysmith::template::TemplateRenderer;
use querysmith::{Error, Result};
use querysmith_client::{single_user_turn, CallPool, ChatTransport};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::Instrument;

/// Rubric key for human-authored criteria
pub const EVALUATOR_HUMAN: &str = "evaluator_human";
/// Rubric key for model-authored criteria
pub const EVALUATOR_LLM: &str = "evaluator_llm";
/// Rubric key for judging a model's answer to a query
pub const INDEPENDENT_AGENT: &str = "independent_agent";

/// Which rubric scored a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criteria {
    /// Human-authored rubric
    Human,
    /// Model-authored rubric
    Llm,
}

impl Criteria {
    /// Select by the human-criteria switch
    pub fn from_flag(use_human: bool) -> Self {
        if use_human {
            Criteria::Human
        } else {
            Criteria::Llm
        }
    }

    /// Template key of the rubric
    pub fn template_key(&self) -> &'static str {
        match self {
            Criteria::Human => EVALUATOR_HUMAN,
            Criteria::Llm => EVALUATOR_LLM,
        }
    }
}

/// Scored evaluation of one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationVerdict {
    /// Rubric used
    pub criteria_used: Criteria,
    /// Structured score and reasons, or the extraction failure marker
    #[serde(rename = "structured_score_and_reasons")]
    pub result: StructuredOutput,
}

/// Raw answers to two queries from the same model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    /// Answer to the first query
    pub response_a: String,
    /// Answer to the second query
    pub response_b: String,
}

/// Judgement of a model's answer to a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerJudgement {
    /// `overall_score` field of the verdict, when present and numeric
    pub overall_score: Option<f64>,
    /// Full structured verdict
    pub details: StructuredOutput,
}

/// Scores queries against rubric templates with one model.
#[derive(Clone)]
pub struct Evaluator {
    transport: Arc<dyn ChatTransport>,
    renderer: Arc<TemplateRenderer>,
    model: String,
    pool: CallPool,
}

impl Evaluator {
    /// Create an evaluator
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        renderer: Arc<TemplateRenderer>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            renderer,
            model: model.into(),
            pool: CallPool::default(),
        }
    }

    /// Bound concurrent calls made by batch operations
    pub fn with_pool(mut self, pool: CallPool) -> Self {
        self.pool = pool;
        self
    }

    /// Model used for every call
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Score `query` against the human or model-authored rubric.
    pub async fn evaluate(&self, query: &str, use_human_criteria: bool) -> Result<EvaluationVerdict> {
        let criteria = Criteria::from_flag(use_human_criteria);
        let key = criteria.template_key();
        if !self.renderer.contains(key) {
            return Err(Error::RubricNotConfigured(key.to_string()));
        }

        let prompt = self.renderer.render(key, &json!({ "user_query": query }))?;
        let span = tracing::info_span!("evaluate", rubric = key, model = %self.model);
        let completion = self
            .transport
            .call_chat_completion(&self.model, &single_user_turn(prompt))
            .instrument(span)
            .await?;

        let result = extract(&completion.text).with_usage(completion.usage);
        if result.is_failure() {
            tracing::warn!(rubric = key, "evaluation output could not be parsed");
        }
        Ok(EvaluationVerdict {
            criteria_used: criteria,
            result,
        })
    }

    /// Answer both queries concurrently and return the raw texts.
    pub async fn compare(&self, query_a: &str, query_b: &str) -> Result<Comparison> {
        let turns_a = single_user_turn(query_a);
        let turns_b = single_user_turn(query_b);
        let (a, b) = tokio::try_join!(
            self.transport.call_chat_completion(&self.model, &turns_a),
            self.transport.call_chat_completion(&self.model, &turns_b),
        )?;
        Ok(Comparison {
            response_a: a.text,
            response_b: b.text,
        })
    }

    /// Evaluate every query as its own task.
    ///
    /// Results come back in input order; one failure does not affect the
    /// others. Concurrency is bounded by the evaluator's [`CallPool`].
    pub async fn evaluate_batch(
        &self,
        queries: Vec<String>,
        use_human_criteria: bool,
    ) -> Vec<Result<EvaluationVerdict>> {
        let handles: Vec<_> = queries
            .into_iter()
            .map(|query| {
                let evaluator = self.clone();
                tokio::spawn(async move {
                    let _permit = evaluator.pool.acquire().await;
                    evaluator.evaluate(&query, use_human_criteria).await
                })
            })
            .collect();

        let results: Vec<Result<EvaluationVerdict>> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap_or_else(|e| Err(Error::Task(e.to_string()))))
            .collect();

        let failed = results.iter().filter(|r| r.is_err()).count();
        tracing::info!(total = results.len(), failed, "batch evaluation finished");
        results
    }

    /// Judge `model_response` as an answer to `user_query`.
    pub async fn judge_answer(&self, user_query: &str, model_response: &str) -> Result<AnswerJudgement> {
        if !self.renderer.contains(INDEPENDENT_AGENT) {
            return Err(Error::RubricNotConfigured(INDEPENDENT_AGENT.to_string()));
        }
        let prompt = self.renderer.render(
            INDEPENDENT_AGENT,
            &json!({ "user_query": user_query, "model_response": model_response }),
        )?;
        let completion = self
            .transport
            .call_chat_completion(&self.model, &single_user_turn(prompt))
            .await?;

        let details = extract(&completion.text).with_usage(completion.usage);
        let overall_score = details.get("overall_score").and_then(score_value);
        Ok(AnswerJudgement {
            overall_score,
            details,
        })
    }
}

/// Numeric score, accepting numbers and numeric strings.
fn score_value(value: &serde_json::Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}
