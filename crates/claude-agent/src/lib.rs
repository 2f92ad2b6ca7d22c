//! `claude-agent`: a small, typed client for the Anthropic Messages API.
//!
//! Every agent reply in the cockpit is a single, non-streaming call to
//! `POST /v1/messages`. This crate owns the wire types and the HTTP call so
//! the rest of the workspace only deals in [`CompletionRequest`] and
//! [`Completion`].
//!
//! # Architecture
//!
//! ```text
//! CompletionRequest  (system prompt + history + new query)
//!     │
//!     ▼
//! ClaudeClient       ← reqwest, explicit timeout, x-api-key / anthropic-version
//!     │
//!     ▼
//! MessagesResponse   ← typed from the API; first text block is the reply
//!     │
//!     ▼
//! Completion         (text, model, token usage)
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use claude_agent::{ClaudeClient, ClientConfig, CompletionRequest};
//!
//! let client = ClaudeClient::new(ClientConfig::new(api_key))?;
//! let completion = client
//!     .complete(CompletionRequest::new("You are a publicist.", "We hit 100 users!"))
//!     .await?;
//! println!("{}", completion.text);
//! ```

pub mod client;
pub mod error;
pub mod types;


pub use client::{ClaudeClient, ClientConfig, Completion, CompletionRequest};
pub use error::ClaudeAgentError;
pub use types::{ChatMessage, ContentBlock, MessagesRequest, MessagesResponse, Role, TokenUsage};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ClaudeAgentError>;
