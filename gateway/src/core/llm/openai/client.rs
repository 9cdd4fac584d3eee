use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::messages::{ChatMessage, ChatRequest, ChatResponse};
use crate::core::conversation::Message;
use crate::core::llm::{GenerationParams, LanguageModel};
use crate::core::providers::{ProviderError, ProviderResult, api_error};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Non-streaming chat completions client.
pub struct OpenAIChat {
    client: Client,
    api_key: String,
    base_url: String,
    provider: &'static str,
}

impl OpenAIChat {
    pub fn new(
        api_key: String,
        base_url: String,
        provider: &'static str,
    ) -> ProviderResult<Self> {
        if api_key.is_empty() {
            return Err(ProviderError::Configuration(format!(
                "{provider} API key is required"
            )));
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            base_url,
            provider,
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LanguageModel for OpenAIChat {
    async fn generate(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> ProviderResult<String> {
        let request = ChatRequest {
            model: &params.model,
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            stream: false,
        };

        let response = self
            .client
            .post(self.chat_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".to_string()))?;

        debug!(
            provider = self.provider,
            finish_reason = ?choice.finish_reason,
            "Generation complete"
        );

        let text = choice.message.content.unwrap_or_default();
        if text.trim().is_empty() {
            return Err(ProviderError::InvalidResponse(
                "Empty completion content".to_string(),
            ));
        }
        Ok(text.trim().to_string())
    }

    fn provider_name(&self) -> &'static str {
        self.provider
    }
}
