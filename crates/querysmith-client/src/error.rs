// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Transport error types

use thiserror::Error;

/// Result type alias for transport operations
pub type Result<T> = core::result::Result<T, TransportError>;

/// Errors surfaced by the chat transport layer.
///
/// Individual attempt failures never escape the retrying transport; callers
/// only ever see [`TransportError::Exhausted`] for remote failures.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Every attempt failed.
    #[error("{provider} call to model '{model}' failed after {attempts} attempts: {last_error}")]
    Exhausted {
        /// Provider name the transport was built for
        provider: String,
        /// Model requested
        model: String,
        /// Attempts made
        attempts: u32,
        /// Message of the final failure
        last_error: String,
    },

    /// A single attempt exceeded the configured timeout.
    #[error("attempt timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// No protocol is registered under this provider name.
    #[error("unsupported provider '{0}'")]
    UnknownProvider(String),

    /// The credential resolver had no key for the provider.
    #[error("no API key available for provider '{0}'")]
    MissingCredential(String),

    /// Non-success HTTP status.
    #[error("{provider} API error ({status}): {body}")]
    Http {
        /// Provider name
        provider: &'static str,
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// The provider answered with a body we could not interpret.
    #[error("unexpected {provider} response format: {detail}")]
    MalformedResponse {
        /// Provider name
        provider: &'static str,
        /// What was wrong
        detail: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

impl TransportError {
    /// True for errors caused by configuration rather than the remote side.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownProvider(_) | Self::MissingCredential(_) | Self::ClientBuild(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_message() {
        let err = TransportError::Exhausted {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            attempts: 3,
            last_error: "connection reset".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("after 3 attempts"));
        assert!(msg.contains("connection reset"));
        assert!(!err.is_configuration_error());
    }

    #[test]
    fn test_configuration_errors() {
        assert!(TransportError::UnknownProvider("x".into()).is_configuration_error());
        assert!(TransportError::MissingCredential("openai".into()).is_configuration_error());
        assert!(TransportError::ClientBuild("no TLS backend".into()).is_configuration_error());
    }
}
