//! LLM adapter: a minimal chat-completion surface for the search core.
//!
//! The core never talks to a provider directly; it depends on the
//! [`LlmClient`] trait, which exposes a single `invoke(messages) -> String`
//! operation. Rate limiting and retry with exponential backoff live inside
//! the concrete adapter so callers see at most a transient/permanent error
//! classification.
//!
//! ## Example
//!
//! ```rust,ignore
//! use frontier_core::llm::{ChatMessage, LlmClientConfig, OpenAiCompatClient};
//!
//! let client = OpenAiCompatClient::new(
//!     LlmClientConfig::new("api-key").with_model("gpt-4o-mini"),
//! );
//!
//! let reply = client
//!     .invoke(&[ChatMessage::user("What is 2+2?")])
//!     .await?;
//! ```

mod client;
mod mock;
mod parse;
mod types;

pub use client::{LlmClient, LlmClientConfig, OpenAiCompatClient, RateLimit, RetryConfig};
pub use mock::ScriptedLlm;
pub use parse::extract_json_block;
pub use types::{ChatMessage, ChatRole};
