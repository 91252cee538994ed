// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Query analysis helpers: key elements, task decomposition and expert
//! persona lookup. Each is one render, one call and one extraction.

use crate::error::Result;
use crate::extract::{extract, StructuredOutput};
use crate::template::TemplateRenderer;
use querysmith_client::{single_user_turn, ChatTransport, ChatTurn};
use serde_json::json;
use std::sync::Arc;

/// Template key for key element extraction
pub const KEY_EXTRACTION: &str = "key_extraction";
/// Template key for automatic decomposition
pub const DECOMPOSITION_AUTO: &str = "decomposition_auto";
/// Template key for decomposition with user clarifications
pub const DECOMPOSITION_USER: &str = "decomposition_user";
/// Template key for the expert persona finder
pub const EXPERT_PERSONA: &str = "expert_persona";

/// Runs analysis templates against one model.
pub struct QueryAnalyzer {
    transport: Arc<dyn ChatTransport>,
    renderer: Arc<TemplateRenderer>,
    model: String,
}

impl QueryAnalyzer {
    /// Create an analyzer
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        renderer: Arc<TemplateRenderer>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            renderer,
            model: model.into(),
        }
    }

    /// Goal, context, instructions, constraints, style and examples of `query`.
    pub async fn extract_key_elements(&self, query: &str) -> Result<StructuredOutput> {
        let prompt = self
            .renderer
            .render(KEY_EXTRACTION, &json!({ "user_query": query }))?;
        self.call(&single_user_turn(prompt)).await
    }

    /// Split `task` into subtasks.
    pub async fn decompose(&self, task: &str) -> Result<StructuredOutput> {
        let turns = self.decomposition_turns(DECOMPOSITION_AUTO, task)?;
        self.call(&turns).await
    }

    /// Decompose `task`, feeding `clarifications` back when the first answer
    /// is not structured (the model asked questions instead).
    pub async fn decompose_with_clarifications(
        &self,
        task: &str,
        clarifications: &str,
    ) -> Result<StructuredOutput> {
        let mut turns = self.decomposition_turns(DECOMPOSITION_USER, task)?;
        let first = self
            .transport
            .call_chat_completion(&self.model, &turns)
            .await?;
        let output = extract(&first.text);
        if !output.is_failure() || clarifications.trim().is_empty() {
            return Ok(output.with_usage(first.usage));
        }

        tracing::debug!("decomposition asked for clarification");
        turns.push(ChatTurn::assistant(first.text));
        turns.push(ChatTurn::user(format!(
            "Based on the original request: '{task}'\n\
             and the following clarifications: {clarifications}\n\
             Now produce the final JSON decomposition strictly following this schema:\n\
             {{ \"prompt\": string, \"subtasks\": [array of strings] }}.\n\
             Your final answer must be valid JSON with no extra commentary."
        )));
        self.call(&turns).await
    }

    /// Expert persona best suited to answer `query`.
    pub async fn find_expert_persona(&self, query: &str) -> Result<StructuredOutput> {
        let prompt = self
            .renderer
            .render(EXPERT_PERSONA, &json!({ "user_query": query }))?;
        self.call(&single_user_turn(prompt)).await
    }

    fn decomposition_turns(&self, key: &str, task: &str) -> Result<Vec<ChatTurn>> {
        let system = self.renderer.load(key)?;
        Ok(vec![
            ChatTurn::system(system.to_string()),
            ChatTurn::user(format!("Decompose the following task: {task}")),
        ])
    }

    async fn call(&self, turns: &[ChatTurn]) -> Result<StructuredOutput> {
        let completion = self
            .transport
            .call_chat_completion(&self.model, turns)
            .await?;
        Ok(extract(&completion.text).with_usage(completion.usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::template::InMemoryTemplateStore;
    use querysmith_client::mock::MockTransport;
    use querysmith_client::Role;

    fn renderer() -> Arc<TemplateRenderer> {
        let store = InMemoryTemplateStore::new()
            .with(KEY_EXTRACTION, "Extract elements of: {{ user_query }}")
            .with(DECOMPOSITION_AUTO, "You split tasks into subtasks.")
            .with(DECOMPOSITION_USER, "You split tasks, asking when unclear.");
        Arc::new(TemplateRenderer::new(Arc::new(store)))
    }

    #[tokio::test]
    async fn test_key_elements() {
        let transport = Arc::new(MockTransport::new(|_, _| {
            r#"{"goal": "g", "context": "", "examples": []}"#.to_string()
        }));
        let analyzer = QueryAnalyzer::new(transport.clone(), renderer(), "gpt-4o");

        let output = analyzer.extract_key_elements("write a poem").await.unwrap();
        assert_eq!(output.get("goal").and_then(|v| v.as_str()), Some("g"));
        assert!(transport.calls()[0].1[0].content.contains("write a poem"));
    }

    #[tokio::test]
    async fn test_decompose_turns() {
        let transport = Arc::new(MockTransport::new(|_, _| {
            r#"{"prompt": "p", "subtasks": ["a", "b"]}"#.to_string()
        }));
        let analyzer = QueryAnalyzer::new(transport.clone(), renderer(), "gpt-4o");

        analyzer.decompose("build a website").await.unwrap();
        let turns = &transport.calls()[0].1;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::System);
        assert_eq!(turns[0].content, "You split tasks into subtasks.");
        assert_eq!(turns[1].content, "Decompose the following task: build a website");
    }

    #[tokio::test]
    async fn test_decompose_with_clarifications_follows_up() {
        let transport = Arc::new(MockTransport::new(|_, turns| {
            if turns.len() == 2 {
                "Which framework should I use?".to_string()
            } else {
                r#"{"prompt": "p", "subtasks": ["setup"]}"#.to_string()
            }
        }));
        let analyzer = QueryAnalyzer::new(transport.clone(), renderer(), "gpt-4o");

        let output = analyzer
            .decompose_with_clarifications("build a website", "use axum")
            .await
            .unwrap();
        assert!(!output.is_failure());

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        let follow_up = &calls[1].1;
        assert_eq!(follow_up[2].role, Role::Assistant);
        assert!(follow_up[3].content.contains("use axum"));
    }

    #[tokio::test]
    async fn test_missing_persona_template() {
        let transport = Arc::new(MockTransport::new(|_, _| String::new()));
        let analyzer = QueryAnalyzer::new(transport, renderer(), "gpt-4o");

        let err = analyzer.find_expert_persona("q").await.unwrap_err();
        assert!(matches!(err, Error::TemplateNotFound(k) if k == EXPERT_PERSONA));
    }
}
