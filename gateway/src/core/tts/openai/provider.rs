use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use super::config::{AudioOutputFormat, OpenAITTSModel};
use crate::core::assistant::VoiceSettings;
use crate::core::providers::{ProviderError, ProviderResult, api_error};
use crate::core::tts::SpeechSynthesizer;

/// OpenAI TTS API endpoint
pub const OPENAI_TTS_URL: &str = "https://api.openai.com/v1/audio/speech";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// OpenAI speech synthesis over the audio speech endpoint.
pub struct OpenAITTS {
    client: Client,
    api_key: String,
    url: String,
}

impl OpenAITTS {
    pub fn new(api_key: String, url: String) -> ProviderResult<Self> {
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
            url,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAITTS {
    async fn synthesize(&self, text: &str, voice: &VoiceSettings) -> ProviderResult<Bytes> {
        if text.trim().is_empty() {
            return Err(ProviderError::InvalidInput(
                "Cannot synthesize empty text".to_string(),
            ));
        }

        let model = OpenAITTSModel::from_setting(voice.model.as_deref());
        let format = AudioOutputFormat::from_setting(voice.output_format.as_deref());

        let mut body = json!({
            "model": model.as_str(),
            "input": text,
            "voice": voice.voice_id.to_lowercase(),
            "response_format": format.as_str(),
        });

        // Only send speed when it differs from the API default
        if let Some(speed) = voice.speed
            && (speed - 1.0).abs() > 0.001
        {
            body["speed"] = json!(speed.clamp(0.25, 4.0));
        }

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "Synthesis returned no audio".to_string(),
            ));
        }

        debug!(bytes = audio.len(), model = model.as_str(), "OpenAI synthesis complete");
        Ok(audio)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}
