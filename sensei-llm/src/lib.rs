//! BYO-key client for the language-model backend.
//!
//! Pure HTTP client over the OpenRouter-compatible chat-completions API.

mod client;
mod error;
mod types;

pub use client::{LlmClient, ModelBackend};
pub use error::{LlmError, Result};
pub use types::{ChatMessage, Role};
