// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Chat-completion transport for Querysmith.
//!
//! Provides a uniform "send these chat turns to this model, get text and usage
//! back" capability over several providers, with bounded retry and
//! exponential backoff.

pub mod anthropic;
pub mod error;
pub mod mock;
pub mod openai;
pub mod pool;
pub mod provider;
pub mod registry;
pub mod request;
pub mod response;
pub mod transport;

pub use error::{Result, TransportError};
pub use pool::CallPool;
pub use provider::{build_provider, ChatProvider, ProviderKind, ProviderSettings};
pub use registry::{CredentialResolver, TransportRegistry, TransportSource};
pub use request::{single_user_turn, ChatTurn, Role};
pub use response::{estimate_tokens, CompletionResult, ProviderReply, Usage};
pub use transport::{ChatTransport, RetryingTransport, TransportConfig};
