use std::time::Duration;

use async_trait::async_trait;
use llmbench_core::{ChatMessage, Provider};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::{truncate, ClientError, ModelClient, Result};

const MAX_TOKENS: u32 = 4096;
const PULL_TIMEOUT: Duration = Duration::from_secs(300);
const LIST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct OllamaClient {
    host: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    #[serde(default)]
    status: String,
}

impl OllamaClient {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    #[instrument(skip(self), fields(host = %self.host))]
    async fn pull(&self, model: &str) -> Result<()> {
        info!("Pulling model, this may take a while");
        let url = format!("{}/api/pull", self.host);
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "model": model, "stream": false }))
            .timeout(PULL_TIMEOUT)
            .send()
            .await
            .map_err(|e| http_error(e, PULL_TIMEOUT))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Backend(format!(
                "Pull of '{model}' failed: {status} - {}",
                truncate(&body, 500)
            )));
        }

        let pulled: PullResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;
        debug!(status = %pulled.status, "Pull finished");
        Ok(())
    }
}

fn http_error(e: reqwest::Error, timeout: Duration) -> ClientError {
    match e.is_timeout() {
        true => ClientError::Timeout(timeout.as_secs()),
        false => ClientError::Http(e.to_string()),
    }
}

/// Ollama treats a bare name as its `:latest` tag.
fn same_model(listed: &str, wanted: &str) -> bool {
    listed == wanted || (!wanted.contains(':') && listed == format!("{wanted}:latest"))
}

#[async_trait]
impl ModelClient for OllamaClient {
    fn provider(&self) -> Provider {
        Provider::Ollama
    }

    #[instrument(skip(self, messages), fields(host = %self.host, messages = messages.len()))]
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: f32,
        timeout: Duration,
    ) -> Result<String> {
        let url = format!("{}/api/chat", self.host);
        let request = ChatRequest {
            model,
            messages,
            stream: false,
            options: ChatOptions {
                temperature,
                num_predict: MAX_TOKENS,
            },
        };

        let resp = self
            .client
            .post(&url)
            .json(&request)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| http_error(e, timeout))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Backend(format!(
                "Chat failed: {status} - {}",
                truncate(&body, 500)
            )));
        }

        let body = resp.text().await.map_err(|e| http_error(e, timeout))?;
        let chat: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            ClientError::Http(format!(
                "Failed to parse response: {e} - Body: {}",
                truncate(&body, 500)
            ))
        })?;

        let content = chat.message.map(|m| m.content).unwrap_or_default();
        match content.trim().is_empty() {
            true => Err(ClientError::EmptyResponse),
            false => Ok(content),
        }
    }

    #[instrument(skip(self), fields(host = %self.host))]
    async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.host);
        let resp = self
            .client
            .get(&url)
            .timeout(LIST_TIMEOUT)
            .send()
            .await
            .map_err(|e| http_error(e, LIST_TIMEOUT))?;

        if !resp.status().is_success() {
            return Err(ClientError::Backend(format!(
                "Failed to list models: {}",
                resp.status()
            )));
        }

        let tags: TagsResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn ensure_model(&self, model: &str) -> Result<()> {
        let models = self.list_models().await?;
        if models.iter().any(|m| same_model(m, model)) {
            return Ok(());
        }
        self.pull(model).await
    }
}
