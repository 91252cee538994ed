// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Structured output extraction from raw model text.
//!
//! Models wrap their JSON in code fences, prose, or both, and sometimes leave
//! trailing commas behind. [`extract`] recovers the structured value or
//! returns a [`StructuredOutput::Failed`] marker that keeps the raw text.
//!
//! Candidates are tried in order, first match wins:
//!
//! 1. A code fence (optionally tagged `json`) wrapping the whole text.
//! 2. `[` .. last `]` when the first `[` comes before the first `{`, kept only
//!    when it holds a non-empty list of step objects.
//! 3. First `{` .. last `}`.
//!
//! Each candidate is parsed as-is and then once more after stripping
//! trailing commas. Candidate selection is greedy: braces inside string
//! values before the real object, or trailing prose containing `}`, can
//! still defeat it.

use querysmith_client::Usage;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error marker used for every extraction failure.
pub const PARSE_FAILURE: &str = "JSON parsing failed";

/// Reserved key under which transport usage is attached.
pub const USAGE_KEY: &str = "usage";

/// Reserved key holding the step list of array-shaped outputs.
pub const STEPS_KEY: &str = "steps";

/// Structured result recovered from model text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StructuredOutput {
    /// Extraction failed; the raw text is kept for diagnosis.
    Failed {
        /// Always [`PARSE_FAILURE`]
        error: String,
        /// Text exactly as the model returned it
        raw_response: String,
        /// Usage of the call that produced the text
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
    /// JSON array, usually of intermediate steps
    List(Vec<Value>),
    /// JSON object
    Object(Map<String, Value>),
}

impl StructuredOutput {
    /// Failure marker for `raw`
    pub fn failed(raw: impl Into<String>) -> Self {
        Self::Failed {
            error: PARSE_FAILURE.to_string(),
            raw_response: raw.into(),
            usage: None,
        }
    }

    /// True for the failure marker
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Object fields, if this is an object
    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Top-level field of an object output
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object()?.get(key)
    }

    /// Read the final-answer `field`.
    ///
    /// Objects are read at the top level. Lists are read from their last
    /// element; this also covers lists already wrapped under [`STEPS_KEY`].
    pub fn final_answer(&self, field: &str) -> Option<String> {
        let value = match self {
            Self::Object(map) => match map.get(field) {
                Some(v) => Some(v),
                None => map
                    .get(STEPS_KEY)
                    .and_then(Value::as_array)
                    .and_then(|steps| steps.last())
                    .and_then(|last| last.get(field)),
            },
            Self::List(items) => items.last().and_then(|last| last.get(field)),
            Self::Failed { .. } => None,
        }?;
        match value {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Attach call usage under the reserved `usage` key.
    ///
    /// Lists become `{"steps": [...], "usage": {...}}`.
    pub fn with_usage(self, usage: Usage) -> Self {
        let usage_value = match serde_json::to_value(usage) {
            Ok(v) => v,
            Err(_) => return self,
        };
        match self {
            Self::Object(mut map) => {
                map.insert(USAGE_KEY.to_string(), usage_value);
                Self::Object(map)
            }
            Self::List(items) => {
                let mut map = Map::new();
                map.insert(STEPS_KEY.to_string(), Value::Array(items));
                map.insert(USAGE_KEY.to_string(), usage_value);
                Self::Object(map)
            }
            Self::Failed {
                error,
                raw_response,
                ..
            } => Self::Failed {
                error,
                raw_response,
                usage: Some(usage),
            },
        }
    }

    /// Usage attached by [`with_usage`](Self::with_usage), if any
    pub fn usage(&self) -> Option<Usage> {
        match self {
            Self::Failed { usage, .. } => *usage,
            Self::Object(map) => map
                .get(USAGE_KEY)
                .and_then(|v| serde_json::from_value(v.clone()).ok()),
            Self::List(_) => None,
        }
    }

    /// Convert into a plain JSON value
    pub fn into_value(self) -> Value {
        match self {
            Self::Object(map) => Value::Object(map),
            Self::List(items) => Value::Array(items),
            failed => serde_json::to_value(failed).unwrap_or(Value::Null),
        }
    }
}

/// Recover structured output from raw model text. Never fails.
pub fn extract(text: &str) -> StructuredOutput {
    if !text.contains('{') {
        tracing::debug!("no object in model output");
        return StructuredOutput::failed(text);
    }

    for candidate in candidates(text) {
        if let Some(output) = parse_candidate(candidate) {
            return output;
        }
    }

    tracing::debug!(chars = text.len(), "model output could not be parsed");
    StructuredOutput::failed(text)
}

fn candidates(text: &str) -> Vec<&str> {
    let mut out = Vec::with_capacity(3);

    if let Some(inner) = fenced_block(text) {
        out.push(inner);
    }

    let first_brace = text.find('{');
    let first_bracket = text.find('[');
    if let (Some(bracket), Some(brace)) = (first_bracket, first_brace) {
        if bracket < brace {
            if let Some(end) = text.rfind(']') {
                if end > bracket {
                    out.push(&text[bracket..=end]);
                }
            }
        }
    }

    if let (Some(start), Some(end)) = (first_brace, text.rfind('}')) {
        if end > start {
            out.push(&text[start..=end]);
        }
    }
    out
}

/// Body of a code fence spanning the whole text.
fn fenced_block(text: &str) -> Option<&str> {
    let body = text.trim().strip_prefix("```")?;
    let body = body
        .strip_prefix("json")
        .or_else(|| body.strip_prefix("JSON"))
        .unwrap_or(body);
    let body = body.strip_suffix("```")?.trim();
    let is_object = body.starts_with('{') && body.ends_with('}');
    let is_array = body.starts_with('[') && body.ends_with(']');
    (is_object || is_array).then_some(body)
}

fn parse_candidate(candidate: &str) -> Option<StructuredOutput> {
    let value = match serde_json::from_str::<Value>(candidate) {
        Ok(v) => v,
        Err(first) => {
            let repaired = strip_trailing_commas(candidate);
            match serde_json::from_str::<Value>(&repaired) {
                Ok(v) => {
                    tracing::debug!(error = %first, "parsed model output after repair");
                    v
                }
                Err(_) => return None,
            }
        }
    };
    match value {
        Value::Object(map) => Some(StructuredOutput::Object(map)),
        Value::Array(items) if is_step_list(&items) => Some(StructuredOutput::List(items)),
        _ => None,
    }
}

/// A list result must be a non-empty sequence of step objects; anything else
/// (`[1]`, `[]`) is prose noise and the object candidate is tried instead.
fn is_step_list(items: &[Value]) -> bool {
    !items.is_empty() && items.iter().all(Value::is_object)
}

/// Drop commas that are followed only by whitespace and a closing `}` or `]`.
///
/// Works on raw text, so a string value containing `", }"` is also touched.
pub fn strip_trailing_commas(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for (i, c) in json.char_indices() {
        if c == ',' {
            let rest = json[i + 1..].trim_start();
            if rest.starts_with('}') || rest.starts_with(']') {
                continue;
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    fn object(value: Value) -> StructuredOutput {
        match value {
            Value::Object(map) => StructuredOutput::Object(map),
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_plain_object() {
        let out = extract(r#"{"Final_Optimized_Query": "q", "score": 8}"#);
        assert_eq!(out, object(json!({"Final_Optimized_Query": "q", "score": 8})));
    }

    #[test]
    fn test_fenced_object() {
        let out = extract("```json\n{\"a\": 1}\n```");
        assert_eq!(out, object(json!({"a": 1})));

        let out = extract("```\n{\"a\": 2}\n```");
        assert_eq!(out, object(json!({"a": 2})));
    }

    #[test]
    fn test_object_inside_prose() {
        let out = extract("Sure! Here is the result:\n{\"a\": {\"b\": [1, 2]}}\nHope this helps.");
        assert_eq!(out, object(json!({"a": {"b": [1, 2]}})));
    }

    #[test]
    fn test_trailing_comma_repaired() {
        let out = extract(r#"{"a": 1, "b": [1, 2,],}"#);
        assert_eq!(out, object(json!({"a": 1, "b": [1, 2]})));
    }

    #[test]
    fn test_no_braces_fails() {
        let out = extract("I cannot help with that.");
        assert_eq!(out, StructuredOutput::failed("I cannot help with that."));
        assert!(out.is_failure());
    }

    #[test]
    fn test_unrepairable_fails_with_raw_text() {
        let raw = "{\"a\": 1 \"b\": 2}";
        match extract(raw) {
            StructuredOutput::Failed {
                error,
                raw_response,
                ..
            } => {
                assert_eq!(error, PARSE_FAILURE);
                assert_eq!(raw_response, raw);
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_array_of_steps() {
        let raw = "Steps:\n[{\"step\": 1}, {\"step\": 2, \"Final_Optimized_Query\": \"last\"}]";
        let out = extract(raw);
        assert!(matches!(out, StructuredOutput::List(ref items) if items.len() == 2));
        assert_eq!(out.final_answer("Final_Optimized_Query").as_deref(), Some("last"));
    }

    #[test]
    fn test_bracket_in_prose_falls_back_to_object() {
        let out = extract("[note] see below {\"a\": 1}");
        assert_eq!(out, object(json!({"a": 1})));
    }

    #[test]
    fn test_scalar_array_in_prose_does_not_shadow_object() {
        let out = extract("Version [1] below:\n{\"Final_Optimized_Query\": \"q\"}");
        assert_eq!(out, object(json!({"Final_Optimized_Query": "q"})));
        assert_eq!(out.final_answer("Final_Optimized_Query").as_deref(), Some("q"));

        let out = extract("Constraints: []\n{\"Final_Optimized_Query\": \"q\"}");
        assert_eq!(out, object(json!({"Final_Optimized_Query": "q"})));
    }

    #[test]
    fn test_final_answer_object() {
        let out = object(json!({"Final_Optimized_Query": "better"}));
        assert_eq!(out.final_answer("Final_Optimized_Query").as_deref(), Some("better"));
        assert_eq!(out.final_answer("missing"), None);
    }

    #[test]
    fn test_with_usage_wraps_list() {
        let usage = Usage::new(Some(12), Duration::from_millis(250));
        let out = StructuredOutput::List(vec![json!({"Final_Optimized_Query": "x"})])
            .with_usage(usage);

        assert_eq!(out.get(STEPS_KEY).and_then(Value::as_array).map(Vec::len), Some(1));
        assert_eq!(out.usage(), Some(usage));
        assert_eq!(out.final_answer("Final_Optimized_Query").as_deref(), Some("x"));
    }

    #[test]
    fn test_failed_serializes_as_marker() {
        let usage = Usage::new(None, Duration::from_millis(10));
        let value = StructuredOutput::failed("oops").with_usage(usage).into_value();
        assert_eq!(value["error"], PARSE_FAILURE);
        assert_eq!(value["raw_response"], "oops");
        assert_eq!(value["usage"]["time_in_seconds"], 0.01);
    }

    #[test]
    fn test_strip_trailing_commas() {
        assert_eq!(strip_trailing_commas("{\"a\": 1,\n}"), "{\"a\": 1\n}");
        assert_eq!(strip_trailing_commas("[1, 2 , ]"), "[1, 2  ]");
        assert_eq!(strip_trailing_commas("{\"a\": 1, \"b\": 2}"), "{\"a\": 1, \"b\": 2}");
    }
}
