// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Template store and Jinja renderer.
//!
//! Templates are addressed by a logical key (`"CoT"`, `"evaluator_llm"`,
//! ...). A [`TemplateStore`] resolves the key to a backing path and reads its
//! text; [`TemplateRenderer`] substitutes a context into it with minijinja.
//! Placeholders missing from the context render as empty strings.
//!
//! # Example
//!
//! ```
//! use querysmith::template::{InMemoryTemplateStore, TemplateRenderer};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let store = InMemoryTemplateStore::new().with("CoT", "Refine: {{ user_query }}");
//! let renderer = TemplateRenderer::new(Arc::new(store));
//! let text = renderer.render("CoT", &json!({"user_query": "X"})).unwrap();
//! assert_eq!(text, "Refine: X");
//! ```

use crate::error::{Error, Result};
use lru::LruCache;
use minijinja::{Environment, UndefinedBehavior};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Key-value template storage.
pub trait TemplateStore: Send + Sync {
    /// Backing path registered for `key`, if any
    fn lookup(&self, key: &str) -> Option<PathBuf>;

    /// Raw text at `path`
    fn read(&self, path: &Path) -> std::io::Result<String>;
}

/// Templates backed by files on disk.
#[derive(Debug, Clone, Default)]
pub struct FileTemplateStore {
    root: Option<PathBuf>,
    paths: HashMap<String, PathBuf>,
}

impl FileTemplateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `root`
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Register a template file under `key`
    pub fn insert(&mut self, key: impl Into<String>, path: impl Into<PathBuf>) {
        self.paths.insert(key.into(), path.into());
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with(mut self, key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.insert(key, path);
        self
    }

    /// Registered keys
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.paths.keys().map(String::as_str)
    }
}

impl TemplateStore for FileTemplateStore {
    fn lookup(&self, key: &str) -> Option<PathBuf> {
        let path = self.paths.get(key)?;
        Some(match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.clone(),
        })
    }

    fn read(&self, path: &Path) -> std::io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// Templates held in memory, keyed by name.
///
/// The "path" of a template is its key.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTemplateStore {
    templates: HashMap<String, String>,
}

impl InMemoryTemplateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template
    pub fn with(mut self, key: impl Into<String>, content: impl Into<String>) -> Self {
        self.templates.insert(key.into(), content.into());
        self
    }
}

impl TemplateStore for InMemoryTemplateStore {
    fn lookup(&self, key: &str) -> Option<PathBuf> {
        self.templates.contains_key(key).then(|| PathBuf::from(key))
    }

    fn read(&self, path: &Path) -> std::io::Result<String> {
        path.to_str()
            .and_then(|key| self.templates.get(key))
            .cloned()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no such template"))
    }
}

/// Renders templates from a [`TemplateStore`].
pub struct TemplateRenderer {
    store: Arc<dyn TemplateStore>,
    env: Environment<'static>,
    cache: Option<Mutex<LruCache<String, Arc<str>>>>,
}

impl TemplateRenderer {
    /// Create a renderer that reads templates on every call
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Lenient);
        Self {
            store,
            env,
            cache: None,
        }
    }

    /// Keep up to `capacity` raw templates in an LRU cache
    pub fn with_cache(mut self, capacity: usize) -> Self {
        self.cache = NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap)));
        self
    }

    /// Whether a template is registered under `key`
    pub fn contains(&self, key: &str) -> bool {
        self.store.lookup(key).is_some()
    }

    /// Raw template text, trimmed.
    pub fn load(&self, key: &str) -> Result<Arc<str>> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.lock().get(key) {
                return Ok(hit.clone());
            }
        }

        let path = self
            .store
            .lookup(key)
            .ok_or_else(|| Error::TemplateNotFound(key.to_string()))?;
        let text = self
            .store
            .read(&path)
            .map_err(|source| Error::TemplateLoad {
                key: key.to_string(),
                path: path.clone(),
                source,
            })?;
        let text: Arc<str> = Arc::from(text.trim());
        tracing::debug!(key, path = %path.display(), "loaded template");

        if let Some(cache) = &self.cache {
            cache.lock().put(key.to_string(), text.clone());
        }
        Ok(text)
    }

    /// Render `key` with `context`.
    pub fn render<S: Serialize>(&self, key: &str, context: &S) -> Result<String> {
        let source = self.load(key)?;
        let rendered = self
            .env
            .render_str(&source, context)
            .map_err(|e| Error::render(key, e))?;
        tracing::debug!(key, chars = rendered.len(), "rendered template");
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn renderer() -> TemplateRenderer {
        let store = InMemoryTemplateStore::new()
            .with(
                "CoT",
                "Query: {{ user_query }}\nPasses: {{ number_of_iterations }}",
            )
            .with("partial", "[{{ user_query }}][{{ missing }}]")
            .with("broken", "{% if %}");
        TemplateRenderer::new(Arc::new(store))
    }

    #[test]
    fn test_render_substitutes_context() {
        let text = renderer()
            .render("CoT", &json!({"user_query": "X", "number_of_iterations": 3}))
            .unwrap();
        assert!(text.contains('X'));
        assert!(text.contains('3'));
    }

    #[test]
    fn test_missing_placeholder_renders_empty() {
        let text = renderer()
            .render("partial", &json!({"user_query": "q"}))
            .unwrap();
        assert_eq!(text, "[q][]");
    }

    #[test]
    fn test_unknown_key() {
        let err = renderer().render("nope", &json!({})).unwrap_err();
        assert!(matches!(err, Error::TemplateNotFound(k) if k == "nope"));
    }

    #[test]
    fn test_invalid_syntax() {
        let err = renderer().render("broken", &json!({})).unwrap_err();
        assert!(matches!(err, Error::TemplateRender { .. }));
    }

    #[test]
    fn test_file_store_missing_file() {
        let store = FileTemplateStore::new()
            .with_root("/definitely/not/here")
            .with("CoT", "cot.txt");
        assert_eq!(
            store.lookup("CoT"),
            Some(PathBuf::from("/definitely/not/here/cot.txt"))
        );

        let renderer = TemplateRenderer::new(Arc::new(store));
        let err = renderer.render("CoT", &json!({})).unwrap_err();
        assert!(matches!(err, Error::TemplateLoad { .. }));
    }

    #[test]
    fn test_cache_serves_repeat_loads() {
        let renderer = renderer().with_cache(4);
        let first = renderer.load("CoT").unwrap();
        let second = renderer.load("CoT").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
