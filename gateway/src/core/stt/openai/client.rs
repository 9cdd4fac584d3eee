use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use tracing::{debug, info};

use super::messages::{OpenAIErrorResponse, TranscriptionResponse};
use crate::core::assistant::TranscriberSettings;
use crate::core::providers::{ProviderError, ProviderResult};
use crate::core::stt::Transcriber;
use crate::utils::audio::prepare_upload;

const DEFAULT_MODEL: &str = "whisper-1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Batch transcription through the OpenAI audio transcription endpoint.
///
/// WAV, WebM, Ogg and MP3 payloads are uploaded as-is; headerless PCM is
/// wrapped in a WAV container at the assistant's configured sample rate.
pub struct OpenAISTT {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAISTT {
    pub fn new(api_key: String, base_url: String) -> ProviderResult<Self> {
        if api_key.is_empty() {
            return Err(ProviderError::Configuration(
                "OpenAI API key is required".to_string(),
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

    fn api_url(&self) -> String {
        format!(
            "{}/audio/transcriptions",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl Transcriber for OpenAISTT {
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
        debug!(bytes = upload.len(), container = ?container, "Uploading audio for transcription");

        let part = Part::bytes(upload.to_vec())
            .file_name(container.file_name())
            .mime_str(container.mime_type())
            .map_err(|e| ProviderError::InvalidInput(e.to_string()))?;

        let mut form = Form::new()
            .part("file", part)
            .text(
                "model",
                settings
                    .model
                    .clone()
                    .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            )
            .text("response_format", "json");
        if !settings.language.is_empty() {
            form = form.text("language", settings.language.clone());
        }

        let response = self
            .client
            .post(self.api_url())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = match serde_json::from_str::<OpenAIErrorResponse>(&body) {
                Ok(parsed) => parsed.error.message,
                Err(_) => body,
            };
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: TranscriptionResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let text = parsed.text.trim().to_string();
        info!(chars = text.len(), "Transcription complete");
        Ok(text)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}
