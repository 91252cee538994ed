// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Completion result types

use crate::request::ChatTurn;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Words-to-tokens ratio used when a provider does not report usage.
///
/// This is a rough estimate, not an exact token count.
pub const TOKENS_PER_WORD: f64 = 1.33;

/// Result of one successful transport call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResult {
    /// Generated text, trimmed
    pub text: String,

    /// Usage metrics for the call
    pub usage: Usage,
}

/// Usage metrics for a transport call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens spent, exact when the provider reports them, estimated otherwise
    pub tokens_spent: Option<u32>,

    /// Wall-clock duration of the successful attempt
    pub time_in_seconds: f64,
}

impl Usage {
    /// Create usage from a token count and elapsed time (rounded to ms).
    pub fn new(tokens_spent: Option<u32>, elapsed: Duration) -> Self {
        Self {
            tokens_spent,
            time_in_seconds: (elapsed.as_secs_f64() * 1000.0).round() / 1000.0,
        }
    }
}

/// Raw reply of a single provider attempt, before usage accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReply {
    /// Generated text
    pub text: String,

    /// Token total reported by the provider, if any
    pub reported_tokens: Option<u32>,
}

impl ProviderReply {
    /// Reply without reported usage
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reported_tokens: None,
        }
    }

    /// Reply with a reported token total
    pub fn with_tokens(text: impl Into<String>, tokens: u32) -> Self {
        Self {
            text: text.into(),
            reported_tokens: Some(tokens),
        }
    }
}

/// Approximate token count of a piece of text from its word count.
pub fn estimate_tokens(text: &str) -> u32 {
    (text.split_whitespace().count() as f64 * TOKENS_PER_WORD) as u32
}

/// Approximate tokens for a full exchange: every turn plus the completion.
pub fn estimate_exchange_tokens(turns: &[ChatTurn], completion: &str) -> u32 {
    let prompt_words: usize = turns
        .iter()
        .map(|t| t.content.split_whitespace().count())
        .sum();
    let prompt_tokens = (prompt_words as f64 * TOKENS_PER_WORD) as u32;
    prompt_tokens + estimate_tokens(completion)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_rounds_to_millis() {
        let usage = Usage::new(Some(10), Duration::from_micros(1_234_567));
        assert_eq!(usage.tokens_spent, Some(10));
        assert!((usage.time_in_seconds - 1.235).abs() < 1e-9);
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        // 3 words * 1.33 = 3.99 -> 3
        assert_eq!(estimate_tokens("one two three"), 3);
        // 100 words * 1.33 = 133
        let text = vec!["w"; 100].join(" ");
        assert_eq!(estimate_tokens(&text), 133);
    }

    #[test]
    fn test_estimate_exchange_tokens() {
        let turns = vec![
            ChatTurn::system("a b c d e f g h i j"),
            ChatTurn::user("k l m n o p q r s t"),
        ];
        // 20 prompt words -> 26, 10 completion words -> 13
        let completion = "1 2 3 4 5 6 7 8 9 10";
        assert_eq!(estimate_exchange_tokens(&turns, completion), 39);
    }

    #[test]
    fn test_completion_result_serializes() {
        let result = CompletionResult {
            text: "hi".to_string(),
            usage: Usage::new(None, Duration::from_millis(500)),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["usage"]["time_in_seconds"], 0.5);
        assert!(json["usage"]["tokens_spent"].is_null());
    }
}
