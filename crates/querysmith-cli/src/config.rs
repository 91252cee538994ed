// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! YAML configuration for the CLI.
//!
//! ```yaml
//! provider: openai
//! models:
//!   openai: [gpt-4o, o3-mini]
//!   claude:
//!     sonnet: claude-3-5-sonnet-latest
//! api_keys:
//!   openai: sk-...
//! prompts:
//!   CoT: prompts/cot.txt
//!   evaluator_llm: prompts/evaluator_llm.txt
//! retry:
//!   max_retries: 3
//!   base_delay_secs: 1.0
//!   timeout_secs: 120
//! blind_pool: [openai, claude]
//! ```

use anyhow::{bail, Context};
use querysmith::template::FileTemplateStore;
use querysmith_client::{CredentialResolver, TransportConfig, TransportError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Models configured for one provider: a plain list, or aliases mapping to
/// model identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelList {
    /// `[gpt-4o, o3-mini]`
    List(Vec<String>),
    /// `{fast: gpt-4o-mini, best: gpt-4o}`
    Aliases(BTreeMap<String, String>),
}

impl ModelList {
    /// Model identifiers: list order for `List`, sorted by alias for `Aliases`
    pub fn ids(&self) -> Vec<String> {
        match self {
            ModelList::List(ids) => ids.clone(),
            ModelList::Aliases(map) => map.values().cloned().collect(),
        }
    }

    /// Resolve an alias or identifier to a configured model identifier
    pub fn resolve(&self, name: &str) -> Option<String> {
        match self {
            ModelList::List(ids) => ids.iter().find(|m| *m == name).cloned(),
            ModelList::Aliases(map) => map
                .get(name)
                .cloned()
                .or_else(|| map.values().find(|m| *m == name).cloned()),
        }
    }
}

/// Retry section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Attempts per call
    pub max_retries: u32,
    /// Backoff base in seconds
    pub base_delay_secs: f64,
    /// Per-attempt timeout in seconds; absent or 0 disables it
    pub timeout_secs: Option<u64>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = TransportConfig::default();
        Self {
            max_retries: defaults.max_retries,
            base_delay_secs: defaults.base_delay.as_secs_f64(),
            timeout_secs: defaults.request_timeout.map(|d| d.as_secs()),
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default provider
    pub provider: Option<String>,
    /// Models per provider
    pub models: HashMap<String, ModelList>,
    /// API keys per provider
    pub api_keys: HashMap<String, String>,
    /// Template files per key
    pub prompts: HashMap<String, PathBuf>,
    /// Transport retry settings
    pub retry: RetrySettings,
    /// Providers whose models form the blind sampling pool
    pub blind_pool: Vec<String>,

    /// Directory of the loaded file; relative prompt paths resolve against it
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl AppConfig {
    /// Load from a YAML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config = Self::from_yaml(&text)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parse YAML text
    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Transport configuration from the retry section
    pub fn transport_config(&self) -> anyhow::Result<TransportConfig> {
        if !self.retry.base_delay_secs.is_finite() || self.retry.base_delay_secs < 0.0 {
            bail!("retry.base_delay_secs must be a non-negative number");
        }
        Ok(TransportConfig {
            max_retries: self.retry.max_retries,
            base_delay: Duration::from_secs_f64(self.retry.base_delay_secs),
            request_timeout: self
                .retry
                .timeout_secs
                .filter(|s| *s > 0)
                .map(Duration::from_secs),
            ..TransportConfig::default()
        })
    }

    /// Template store over the `prompts` section
    pub fn template_store(&self) -> FileTemplateStore {
        let mut store = FileTemplateStore::new().with_root(&self.base_dir);
        for (key, path) in &self.prompts {
            store.insert(key.clone(), path.clone());
        }
        store
    }

    /// Model lists flattened to identifiers
    pub fn model_registry(&self) -> HashMap<String, Vec<String>> {
        self.models
            .iter()
            .map(|(provider, list)| (provider.clone(), list.ids()))
            .collect()
    }

    /// Pick and validate the provider and model for a command.
    ///
    /// Falls back to the configured default provider and its first model
    /// (the alphabetically first alias when models are given as aliases).
    pub fn select(
        &self,
        provider: Option<&str>,
        model: Option<&str>,
    ) -> anyhow::Result<(String, String)> {
        let provider = provider
            .map(str::to_string)
            .or_else(|| self.provider.clone())
            .unwrap_or_else(|| "openai".to_string())
            .to_lowercase();
        let Some(models) = self.models.get(&provider) else {
            bail!("provider '{provider}' has no models configured");
        };
        let model = match model {
            Some(name) => models
                .resolve(name)
                .with_context(|| format!("model '{name}' is not configured for '{provider}'"))?,
            None => models
                .ids()
                .into_iter()
                .next()
                .with_context(|| format!("provider '{provider}' has an empty model list"))?,
        };
        Ok((provider, model))
    }

    /// Providers for blind sampling; every configured provider when unset
    pub fn blind_providers(&self) -> Vec<String> {
        if self.blind_pool.is_empty() {
            let mut all: Vec<String> = self.models.keys().cloned().collect();
            all.sort();
            all
        } else {
            self.blind_pool.clone()
        }
    }
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// API keys from `<PROVIDER>_API_KEY`, falling back to the config file.
pub struct EnvCredentials {
    keys: HashMap<String, String>,
    lookup: EnvLookup,
}

impl EnvCredentials {
    /// Read the process environment
    pub fn new(keys: HashMap<String, String>) -> Self {
        Self::with_lookup(keys, |name| std::env::var(name).ok())
    }

    /// Use a custom environment lookup
    pub fn with_lookup(
        keys: HashMap<String, String>,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            keys,
            lookup: Box::new(lookup),
        }
    }
}

impl CredentialResolver for EnvCredentials {
    fn get_key(&self, provider: &str) -> querysmith_client::Result<String> {
        let provider = provider.to_lowercase();
        let env_name = format!("{}_API_KEY", provider.to_uppercase());
        (self.lookup)(&env_name)
            .filter(|k| !k.is_empty())
            .or_else(|| self.keys.get(&provider).filter(|k| !k.is_empty()).cloned())
            .ok_or(TransportError::MissingCredential(provider))
    }
}
