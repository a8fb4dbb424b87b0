//! Model-serving backends.

mod ollama;
mod openai;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use llmbench_core::{BenchConfig, ChatMessage, Provider};
use thiserror::Error;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

/// Environment variable holding the key for OpenAI-compatible backends.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("No response received from model")]
    EmptyResponse,
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[async_trait]
pub trait ModelClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// Sends the whole conversation and returns the raw reply text.
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: f32,
        timeout: Duration,
    ) -> Result<String>;

    async fn list_models(&self) -> Result<Vec<String>>;

    /// Makes sure `model` can be used, fetching it if the backend supports it.
    async fn ensure_model(&self, model: &str) -> Result<()> {
        let models = self.list_models().await?;
        match models.iter().any(|m| m == model) {
            true => Ok(()),
            false => Err(ClientError::Backend(format!(
                "Model '{model}' is not available"
            ))),
        }
    }
}

/// Builds the client for the configured provider. `api_key` overrides the
/// environment.
pub fn build_client(config: &BenchConfig, api_key: Option<String>) -> Result<Arc<dyn ModelClient>> {
    match config.provider {
        Provider::Ollama => Ok(Arc::new(OllamaClient::new(&config.base_url()))),
        Provider::OpenAi => {
            let present = |k: &String| !k.trim().is_empty();
            let key = api_key
                .filter(present)
                .or_else(|| std::env::var(API_KEY_ENV).ok().filter(present))
                .ok_or_else(|| {
                    ClientError::MissingCredentials(format!(
                        "set {API_KEY_ENV} or pass --api-key"
                    ))
                })?;
            Ok(Arc::new(OpenAiClient::new(&config.base_url(), &key)))
        }
    }
}

fn truncate(body: &str, max: usize) -> &str {
    match body.char_indices().nth(max) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
