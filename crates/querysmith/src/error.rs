// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Error types for Querysmith

use querysmith_client::TransportError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Querysmith operations
pub type Result<T> = core::result::Result<T, Error>;

/// Main error type for the refinement and evaluation engines.
///
/// Malformed model output is not an error: it is returned as
/// [`StructuredOutput::Failed`](crate::extract::StructuredOutput::Failed) so
/// callers keep the raw text.
#[derive(Error, Debug)]
pub enum Error {
    /// No template is registered under this key
    #[error("Template not found: '{0}'")]
    TemplateNotFound(String),

    /// The template file is registered but cannot be read
    #[error("Failed to load template '{key}' from {}: {source}", .path.display())]
    TemplateLoad {
        /// Logical template key
        key: String,
        /// Backing file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The template text is not valid Jinja or failed to render
    #[error("Failed to render template '{key}': {message}")]
    TemplateRender {
        /// Logical template key
        key: String,
        /// Renderer message
        message: String,
    },

    /// Requested technique has no registered template
    #[error("Unsupported technique: '{0}'")]
    UnsupportedTechnique(String),

    /// Selected rubric has no registered template
    #[error("Rubric not configured: '{0}'")]
    RubricNotConfigured(String),

    /// `optimize()` was entered while the session was already optimizing
    #[error("Session is already optimizing; overlapping optimize() calls are rejected")]
    ConcurrentOptimization,

    /// Blind sample count outside the accepted range
    #[error("Invalid sample count {requested}: must be between {min} and {max}")]
    InvalidSampleCount {
        /// Requested count
        requested: usize,
        /// Lower bound (inclusive)
        min: usize,
        /// Upper bound (inclusive)
        max: usize,
    },

    /// Fewer candidate models than samples requested
    #[error("Model pool has {available} models, {requested} requested")]
    InsufficientModelPool {
        /// Requested count
        requested: usize,
        /// Distinct models available
        available: usize,
    },

    /// Chat transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A spawned task panicked or was cancelled
    #[error("Task failed: {0}")]
    Task(String),

    /// Result sink rejected a record
    #[error("Sink error: {0}")]
    Sink(String),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a render error
    pub fn render(key: impl Into<String>, message: impl ToString) -> Self {
        Self::TemplateRender {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Create a sink error
    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    /// Check if this is a configuration error (missing template, rubric,
    /// provider or credential). These are fatal and never retried.
    #[inline]
    pub fn is_configuration_error(&self) -> bool {
        match self {
            Self::TemplateNotFound(_)
            | Self::TemplateLoad { .. }
            | Self::TemplateRender { .. }
            | Self::UnsupportedTechnique(_)
            | Self::RubricNotConfigured(_) => true,
            Self::Transport(e) => e.is_configuration_error(),
            _ => false,
        }
    }

    /// Get the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::TemplateNotFound(_)
            | Self::TemplateLoad { .. }
            | Self::TemplateRender { .. }
            | Self::UnsupportedTechnique(_)
            | Self::RubricNotConfigured(_) => "configuration",
            Self::Transport(e) if e.is_configuration_error() => "configuration",
            Self::Transport(_) => "transport",
            Self::ConcurrentOptimization => "concurrency",
            Self::InvalidSampleCount { .. } | Self::InsufficientModelPool { .. } => "validation",
            Self::Task(_) => "task",
            Self::Sink(_) => "sink",
            Self::Json(_) => "json",
        }
    }
}
