// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Provider registry keyed by provider name

use crate::error::{Result, TransportError};
use crate::provider::{build_provider, ProviderKind, ProviderSettings};
use crate::transport::{ChatTransport, RetryingTransport, TransportConfig};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Supplies API keys by provider name.
///
/// The transport layer never reads credentials from the environment or the
/// filesystem itself; callers decide where keys come from.
pub trait CredentialResolver: Send + Sync {
    /// Key for `provider`, or [`TransportError::MissingCredential`].
    fn get_key(&self, provider: &str) -> Result<String>;
}

impl CredentialResolver for HashMap<String, String> {
    fn get_key(&self, provider: &str) -> Result<String> {
        self.get(provider)
            .filter(|key| !key.is_empty())
            .cloned()
            .ok_or_else(|| TransportError::MissingCredential(provider.to_string()))
    }
}

/// Resolves a transport for a provider name.
pub trait TransportSource: Send + Sync {
    /// Transport for `provider`
    fn transport_for(&self, provider: &str) -> Result<Arc<dyn ChatTransport>>;
}

/// Builds one [`RetryingTransport`] per provider name and reuses it.
pub struct TransportRegistry {
    credentials: Arc<dyn CredentialResolver>,
    settings: HashMap<ProviderKind, ProviderSettings>,
    config: TransportConfig,
    transports: DashMap<String, Arc<dyn ChatTransport>>,
}

impl TransportRegistry {
    /// Create a registry
    pub fn new(credentials: Arc<dyn CredentialResolver>, config: TransportConfig) -> Self {
        Self {
            credentials,
            settings: HashMap::new(),
            config,
            transports: DashMap::new(),
        }
    }

    /// Override connection settings for one provider kind
    pub fn with_settings(mut self, kind: ProviderKind, settings: ProviderSettings) -> Self {
        self.settings.insert(kind, settings);
        self
    }

    /// Get configuration
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn build(&self, provider: &str) -> Result<Arc<dyn ChatTransport>> {
        let kind: ProviderKind = provider.parse()?;
        let api_key = self.credentials.get_key(provider)?;

        let mut settings = self.settings.get(&kind).cloned().unwrap_or_default();
        if settings.http_timeout.is_none() {
            settings.http_timeout = self.config.request_timeout;
        }

        tracing::debug!(provider, kind = kind.as_str(), "building chat transport");
        let inner = build_provider(kind, api_key, &settings)?;
        Ok(Arc::new(RetryingTransport::new(
            provider,
            inner,
            self.config.clone(),
        )))
    }
}

impl TransportSource for TransportRegistry {
    fn transport_for(&self, provider: &str) -> Result<Arc<dyn ChatTransport>> {
        let key = provider.to_ascii_lowercase();
        if let Some(existing) = self.transports.get(&key) {
            return Ok(existing.clone());
        }
        let transport = self.build(provider)?;
        Ok(self.transports.entry(key).or_insert(transport).clone())
    }
}

impl TransportSource for HashMap<String, Arc<dyn ChatTransport>> {
    fn transport_for(&self, provider: &str) -> Result<Arc<dyn ChatTransport>> {
        self.get(provider)
            .cloned()
            .ok_or_else(|| TransportError::UnknownProvider(provider.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Arc<dyn CredentialResolver> {
        let mut keys = HashMap::new();
        keys.insert("openai".to_string(), "sk-test".to_string());
        keys.insert("claude".to_string(), "sk-ant-test".to_string());
        keys.insert("empty".to_string(), String::new());
        Arc::new(keys)
    }

    #[test]
    fn test_map_credentials() {
        let creds = credentials();
        assert_eq!(creds.get_key("openai").unwrap(), "sk-test");
        assert!(matches!(
            creds.get_key("empty"),
            Err(TransportError::MissingCredential(_))
        ));
        assert!(matches!(
            creds.get_key("mistral"),
            Err(TransportError::MissingCredential(_))
        ));
    }

    #[test]
    fn test_registry_reuses_transport() {
        let registry = TransportRegistry::new(credentials(), TransportConfig::default());
        let a = registry.transport_for("openai").unwrap();
        let b = registry.transport_for("openai").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let claude = registry.transport_for("claude").unwrap();
        assert!(!Arc::ptr_eq(&a, &claude));
    }

    #[test]
    fn test_registry_unknown_provider() {
        let registry = TransportRegistry::new(credentials(), TransportConfig::default());
        assert!(matches!(
            registry.transport_for("gemini"),
            Err(TransportError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_registry_missing_key() {
        let registry = TransportRegistry::new(
            Arc::new(HashMap::<String, String>::new()),
            TransportConfig::default(),
        );
        assert!(matches!(
            registry.transport_for("openai"),
            Err(TransportError::MissingCredential(_))
        ));
    }
}
