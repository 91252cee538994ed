// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Integration tests for the evaluation engine

use querysmith::template::{InMemoryTemplateStore, TemplateRenderer};
use querysmith::Error;
use querysmith_client::mock::MockTransport;
use querysmith_client::{CallPool, ChatTransport, ChatTurn, CompletionResult, TransportError};
use pretty_assertions::assert_eq;
use querysmith_eval::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn renderer() -> Arc<TemplateRenderer> {
    let store = InMemoryTemplateStore::new()
        .with("evaluator_llm", "Rate: {{ user_query }}")
        .with("evaluator_human", "Rate by rubric: {{ user_query }}");
    Arc::new(TemplateRenderer::new(Arc::new(store)))
}

#[tokio::test(start_paused = true)]
async fn test_compare_runs_concurrently() {
    let delay = Duration::from_secs(2);
    let transport = Arc::new(
        MockTransport::new(|_, turns| format!("answer to {}", turns[0].content)).with_delay(delay),
    );
    let evaluator = Evaluator::new(transport, renderer(), "gpt-4o");

    let start = tokio::time::Instant::now();
    let comparison = evaluator.compare("query A", "query B").await.unwrap();

    assert!(start.elapsed() < delay * 2);
    assert_eq!(comparison.response_a, "answer to query A");
    assert_eq!(comparison.response_b, "answer to query B");
}

/// Fails for queries containing "bad", tracks peak concurrency.
struct FlakyTransport {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait::async_trait]
impl ChatTransport for FlakyTransport {
    async fn call_chat_completion(
        &self,
        model: &str,
        turns: &[ChatTurn],
    ) -> querysmith_client::Result<CompletionResult> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if turns[0].content.contains("bad") {
            return Err(TransportError::Exhausted {
                provider: "openai".to_string(),
                model: model.to_string(),
                attempts: 3,
                last_error: "503".to_string(),
            });
        }
        Ok(CompletionResult {
            text: r#"{"score": 6}"#.to_string(),
            usage: querysmith_client::Usage::new(Some(10), Duration::from_millis(100)),
        })
    }
}

#[tokio::test(start_paused = true)]
async fn test_batch_reports_every_item() {
    let transport = Arc::new(FlakyTransport {
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let evaluator = Evaluator::new(transport.clone(), renderer(), "gpt-4o").with_pool(CallPool::new(2));

    let queries = vec![
        "good one".to_string(),
        "bad one".to_string(),
        "good two".to_string(),
        "good three".to_string(),
        "bad two".to_string(),
    ];
    let results = evaluator.evaluate_batch(queries, true).await;

    assert_eq!(results.len(), 5);
    let outcomes: Vec<bool> = results.iter().map(|r| r.is_ok()).collect();
    assert_eq!(outcomes, vec![true, false, true, true, false]);
    assert!(matches!(&results[1], Err(Error::Transport(_))));
    for verdict in results.iter().flatten() {
        assert_eq!(verdict.criteria_used, Criteria::Human);
    }
    assert!(transport.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_blind_samples_hide_provider() {
    use std::collections::HashMap;

    let mut transports: HashMap<String, Arc<dyn ChatTransport>> = HashMap::new();
    transports.insert(
        "openai".to_string(),
        Arc::new(MockTransport::new(|model, _| format!("{model} says hi"))),
    );
    transports.insert(
        "claude".to_string(),
        Arc::new(MockTransport::new(|model, _| format!("{model} says hello"))),
    );
    let mut models: HashMap<String, Vec<String>> = HashMap::new();
    models.insert("openai".to_string(), vec!["gpt-4o".to_string(), "gpt-4o-mini".to_string()]);
    models.insert("claude".to_string(), vec!["claude-3-haiku".to_string()]);

    let sampler = BlindSampler::new(
        Arc::new(transports),
        Arc::new(models),
        vec!["openai".to_string(), "claude".to_string()],
    )
    .with_seed(42);

    let samples = sampler.generate_blind_samples("greet me", 3).await.unwrap();
    assert_eq!(samples.len(), 3);
    let value = serde_json::to_value(&samples).unwrap();
    for sample in value.as_array().unwrap() {
        let fields: Vec<&String> = sample.as_object().unwrap().keys().collect();
        assert_eq!(fields, vec!["model", "text"]);
    }
}
