use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
    Client,
};
use async_trait::async_trait;
use llmbench_core::{ChatMessage, Provider, Role};
use tracing::{debug, instrument, warn};

use super::{ClientError, ModelClient, Result};

fn backend_err(e: impl ToString) -> ClientError {
    ClientError::Backend(e.to_string())
}

fn map_openai_err(e: OpenAIError) -> ClientError {
    match e {
        OpenAIError::Reqwest(inner) => ClientError::Http(inner.to_string()),
        other => backend_err(other),
    }
}

fn extract_content(response: CreateChatCompletionResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(ClientError::EmptyResponse)
}

fn to_request_message(msg: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
    let content = msg.content.clone();
    let message = match msg.role {
        Role::System => ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(content)
                .build()
                .map_err(backend_err)?,
        ),
        Role::User => ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(content)
                .build()
                .map_err(backend_err)?,
        ),
        Role::Assistant => ChatCompletionRequestMessage::Assistant(
            ChatCompletionRequestAssistantMessageArgs::default()
                .content(content)
                .build()
                .map_err(backend_err)?,
        ),
    };
    Ok(message)
}

/// Any OpenAI-compatible chat completions endpoint (OpenRouter by default).
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_base(base_url.trim_end_matches('/'))
            .with_api_key(api_key);
        Self {
            client: Client::with_config(config),
            base_url: base_url.to_string(),
        }
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    #[instrument(skip(self, messages), fields(base = %self.base_url, messages = messages.len()))]
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: f32,
        timeout: Duration,
    ) -> Result<String> {
        let messages = messages
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>>>()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .temperature(temperature)
            .build()
            .map_err(backend_err)?;

        let response = tokio::time::timeout(timeout, self.client.chat().create(request))
            .await
            .map_err(|_| ClientError::Timeout(timeout.as_secs()))?
            .map_err(map_openai_err)?;

        debug!(choices = response.choices.len(), "Chat completion received");
        extract_content(response)
    }

    #[instrument(skip(self), fields(base = %self.base_url))]
    async fn list_models(&self) -> Result<Vec<String>> {
        let listed = self.client.models().list().await.map_err(map_openai_err)?;
        Ok(listed.data.into_iter().map(|m| m.id).collect())
    }

    /// An unlisted model is only a warning; hosted listings are not always
    /// complete.
    async fn ensure_model(&self, model: &str) -> Result<()> {
        let models = self.list_models().await?;
        if !models.iter().any(|m| m == model) {
            warn!(model, "Model not found in backend listing, trying anyway");
        }
        Ok(())
    }
}
