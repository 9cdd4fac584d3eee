use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::info;

use super::DEFAULT_MODEL;
use super::messages::PrerecordedResponse;
use crate::core::assistant::TranscriberSettings;
use crate::core::providers::{ProviderError, ProviderResult, api_error};
use crate::core::stt::Transcriber;
use crate::utils::audio::prepare_upload;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Deepgram prerecorded transcription.
pub struct DeepgramSTT {
    client: Client,
    api_key: String,
    base_url: String,
}

impl DeepgramSTT {
    pub fn new(api_key: String, base_url: String) -> ProviderResult<Self> {
        if api_key.is_empty() {
            return Err(ProviderError::Configuration(
                "Deepgram API key is required".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            base_url,
        })
    }
}

#[async_trait]
impl Transcriber for DeepgramSTT {
    async fn transcribe(
        &self,
        audio: Bytes,
        settings: &TranscriberSettings,
    ) -> ProviderResult<String> {
        if audio.is_empty() {
            return Err(ProviderError::InvalidInput(
                "Cannot transcribe empty audio".to_string(),
            ));
        }

        let (upload, container) = prepare_upload(audio, settings.sample_rate)
            .map_err(|e| ProviderError::InvalidInput(format!("Failed to build WAV: {e}")))?;

        let url = format!("{}/v1/listen", self.base_url.trim_end_matches('/'));
        let model = settings.model.as_deref().unwrap_or(DEFAULT_MODEL);

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", container.mime_type())
            .query(&[
                ("model", model),
                ("language", settings.language.as_str()),
                ("smart_format", "true"),
            ])
            .body(upload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let parsed: PrerecordedResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let text = parsed.best_transcript().unwrap_or_default().trim().to_string();
        info!(chars = text.len(), "Deepgram transcription complete");
        Ok(text)
    }

    fn provider_name(&self) -> &'static str {
        "deepgram"
    }
}
