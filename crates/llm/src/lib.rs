//! Chat-completion integration crate for the estate RAG tool.
//!
//! Provides a provider-agnostic `LlmClient` trait, OpenAI-compatible and
//! Ollama implementations, and the bounded retry policy shared with the
//! embedding side.
//!
//! # Example
//! ```no_run
//! use estate_llm::{complete_with_retry, LlmRequest, OllamaClient, RetryPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Hello, world!", "llama3.2");
//! let response = complete_with_retry(&client, &request, &RetryPolicy::default()).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod retry;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiClient};
pub use retry::{complete_with_retry, RetryPolicy};
pub use types::ProviderType;
