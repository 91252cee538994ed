// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Technique descriptors.
//!
//! A technique is a named prompting strategy with its own template. Its
//! descriptor records which field carries the final answer and which output
//! shape the template asks for; the engine reads every technique the same way
//! (see [`StructuredOutput::final_answer`](crate::extract::StructuredOutput::final_answer)).

use crate::extract::StructuredOutput;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Field holding a technique's final answer.
pub const FINAL_ANSWER_FIELD: &str = "Final_Optimized_Query";

/// Output container a technique's template asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerShape {
    /// A single JSON object
    Object,
    /// A JSON array of steps, final answer in the last one
    Steps,
}

impl AnswerShape {
    /// Whether `output` has this shape
    pub fn matches(&self, output: &StructuredOutput) -> bool {
        matches!(
            (self, output),
            (AnswerShape::Object, StructuredOutput::Object(_))
                | (AnswerShape::Steps, StructuredOutput::List(_))
        )
    }
}

/// Final-answer location for one technique
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechniqueDescriptor {
    /// Field carrying the final answer
    pub answer_field: String,
    /// Expected container shape
    pub shape: AnswerShape,
}

impl TechniqueDescriptor {
    /// Descriptor with the standard answer field
    pub fn new(shape: AnswerShape) -> Self {
        Self {
            answer_field: FINAL_ANSWER_FIELD.to_string(),
            shape,
        }
    }

    /// Override the answer field
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.answer_field = field.into();
        self
    }
}

impl Default for TechniqueDescriptor {
    fn default() -> Self {
        Self::new(AnswerShape::Object)
    }
}

/// Descriptors keyed by technique name.
#[derive(Debug, Clone)]
pub struct TechniqueCatalog {
    descriptors: HashMap<String, TechniqueDescriptor>,
}

impl TechniqueCatalog {
    /// Empty catalog; every technique uses the default descriptor
    pub fn empty() -> Self {
        Self {
            descriptors: HashMap::new(),
        }
    }

    /// Register or replace a descriptor
    pub fn register(&mut self, name: impl Into<String>, descriptor: TechniqueDescriptor) {
        self.descriptors.insert(name.into(), descriptor);
    }

    /// Builder form of [`register`](Self::register)
    pub fn with(mut self, name: impl Into<String>, descriptor: TechniqueDescriptor) -> Self {
        self.register(name, descriptor);
        self
    }

    /// Descriptor for `name`, falling back to the default
    pub fn descriptor(&self, name: &str) -> TechniqueDescriptor {
        self.descriptors.get(name).cloned().unwrap_or_default()
    }

    /// Names with an explicit descriptor
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(String::as_str)
    }
}

impl Default for TechniqueCatalog {
    fn default() -> Self {
        let mut catalog = Self::empty();
        for name in ["CoT", "SC", "SC_ReAct"] {
            catalog.register(name, TechniqueDescriptor::new(AnswerShape::Object));
        }
        for name in ["CoD", "PC", "ReAct"] {
            catalog.register(name, TechniqueDescriptor::new(AnswerShape::Steps));
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_catalog() {
        let catalog = TechniqueCatalog::default();
        assert_eq!(catalog.descriptor("CoT").shape, AnswerShape::Object);
        assert_eq!(catalog.descriptor("ReAct").shape, AnswerShape::Steps);
        assert_eq!(catalog.names().count(), 6);
        for name in catalog.names() {
            assert_eq!(catalog.descriptor(name).answer_field, FINAL_ANSWER_FIELD);
        }
    }

    #[test]
    fn test_unknown_technique_uses_default() {
        let catalog = TechniqueCatalog::default();
        assert_eq!(catalog.descriptor("ToT"), TechniqueDescriptor::default());
    }

    #[test]
    fn test_shape_matches() {
        let list = StructuredOutput::List(vec![json!({})]);
        assert!(AnswerShape::Steps.matches(&list));
        assert!(!AnswerShape::Object.matches(&list));
        assert!(!AnswerShape::Object.matches(&StructuredOutput::failed("x")));
    }

    #[test]
    fn test_custom_field() {
        let catalog = TechniqueCatalog::empty().with(
            "Rewrite",
            TechniqueDescriptor::new(AnswerShape::Object).with_field("rewritten"),
        );
        assert_eq!(catalog.descriptor("Rewrite").answer_field, "rewritten");
    }
}
