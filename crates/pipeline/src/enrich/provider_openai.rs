//! OpenAI-backed completion provider.
//!
//! Also covers self-hosted OpenAI-compatible gateways via a custom base
//! URL, so "local" deployments do not need their own implementation.

use crate::enrich::provider::{CompletionProvider, ProviderError};
use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str =
    "You are a security analyst explaining vulnerability findings. Respond with a single JSON object and nothing else.";

pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String, base_url: Option<String>) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base_url) = base_url {
            config = config.with_api_base(base_url);
        }
        Self {
            client: Client::with_config(config),
            model,
            // Low temperature keeps explanations close to the finding facts.
            temperature: 0.2,
        }
    }

    /// Credential from the environment; `None` leaves enrichment disabled.
    pub fn from_env(model: String, base_url: Option<String>) -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok()?;
        Some(Self::new(api_key, model, base_url))
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError> {
        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: SYSTEM_PROMPT.to_string(),
                ..Default::default()
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: async_openai::types::ChatCompletionRequestUserMessageContent::Text(
                    prompt.to_string(),
                ),
                ..Default::default()
            }),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(max_tokens as u16)
            .build()
            .map_err(|e| ProviderError::Api(e.to_string()))?;

        debug!(model = %self.model, max_tokens, "sending enrichment request");

        let response = self.client.chat().create(request).await.map_err(|err| {
            let text = err.to_string();
            // async-openai surfaces 429s inside the error text; pick them
            // out so the breaker can treat them as cooldown, not failure.
            if text.contains("429") || text.to_lowercase().contains("rate limit") {
                ProviderError::RateLimited
            } else if text.to_lowercase().contains("connection") || text.to_lowercase().contains("dns") {
                ProviderError::Network(text)
            } else {
                ProviderError::Api(text)
            }
        })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| ProviderError::InvalidResponse("no content in response".to_string()))?;

        if content.trim().is_empty() {
            warn!(model = %self.model, "provider returned empty content");
            return Err(ProviderError::InvalidResponse("empty content".to_string()));
        }

        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
