//! LLM provider factory.
//!
//! Resolves a provider name plus endpoint and credential into a ready
//! `LlmClient`.

use crate::client::LlmClient;
use crate::providers::{ollama::DEFAULT_OLLAMA_URL, openai::DEFAULT_OPENAI_URL};
use crate::providers::{OllamaClient, OpenAiClient};
use crate::types::ProviderType;
use std::sync::Arc;
use std::time::Duration;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("openai", "ollama")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - API key (required by "openai")
/// * `timeout` - Per-request timeout
///
/// # Errors
/// Returns error if the provider is unknown, a required key is missing, or
/// the HTTP client cannot be built.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    timeout: Duration,
) -> Result<Arc<dyn LlmClient>, String> {
    let provider_type =
        ProviderType::parse(provider).ok_or_else(|| format!("Unknown provider: {}", provider))?;

    if provider_type.requires_api_key() && api_key.is_none() {
        return Err(format!("{} provider requires an API key", provider_type.as_str()));
    }

    match provider_type {
        ProviderType::Ollama => {
            let base_url = endpoint.unwrap_or(DEFAULT_OLLAMA_URL);
            let client = OllamaClient::with_base_url(base_url)
                .with_timeout(timeout)
                .map_err(|e| e.to_string())?;
            Ok(Arc::new(client))
        }
        ProviderType::OpenAI => {
            let api_key = api_key.unwrap_or_default();
            let base_url = endpoint.unwrap_or(DEFAULT_OPENAI_URL);
            let client = OpenAiClient::with_base_url(base_url, api_key)
                .with_timeout(timeout)
                .map_err(|e| e.to_string())?;
            Ok(Arc::new(client))
        }
    }
}
