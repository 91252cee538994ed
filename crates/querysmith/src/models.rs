// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Model listings per provider

use std::collections::HashMap;

/// Lists the model identifiers configured for a provider.
pub trait ModelRegistry: Send + Sync {
    /// Models for `provider`; empty when the provider is unknown
    fn list_models(&self, provider: &str) -> Vec<String>;

    /// Whether `model` is configured for `provider`
    fn has_model(&self, provider: &str, model: &str) -> bool {
        self.list_models(provider).iter().any(|m| m == model)
    }
}

impl ModelRegistry for HashMap<String, Vec<String>> {
    fn list_models(&self, provider: &str) -> Vec<String> {
        self.get(provider).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_registry() {
        let mut models = HashMap::new();
        models.insert(
            "openai".to_string(),
            vec!["gpt-4o".to_string(), "o3-mini".to_string()],
        );

        assert_eq!(models.list_models("openai").len(), 2);
        assert!(models.has_model("openai", "o3-mini"));
        assert!(!models.has_model("openai", "claude-3-haiku"));
        assert!(models.list_models("claude").is_empty());
    }
}
