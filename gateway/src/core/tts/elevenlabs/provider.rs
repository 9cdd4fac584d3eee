use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use crate::core::assistant::VoiceSettings;
use crate::core::providers::{ProviderError, ProviderResult, api_error};
use crate::core::tts::SpeechSynthesizer;

/// ElevenLabs API base URL
pub const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";

const DEFAULT_MODEL: &str = "eleven_turbo_v2_5";
const DEFAULT_STABILITY: f32 = 0.5;
const DEFAULT_SIMILARITY_BOOST: f32 = 0.75;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ElevenLabsTTS {
    client: Client,
    api_key: String,
    base_url: String,
}

impl ElevenLabsTTS {
    pub fn new(api_key: String, base_url: String) -> ProviderResult<Self> {
        if api_key.is_empty() {
            return Err(ProviderError::Configuration(
                "ElevenLabs API key is required".to_string(),
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

    fn speech_url(&self, voice_id: &str) -> String {
        format!(
            "{}/v1/text-to-speech/{}",
            self.base_url.trim_end_matches('/'),
            voice_id
        )
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsTTS {
    async fn synthesize(&self, text: &str, voice: &VoiceSettings) -> ProviderResult<Bytes> {
        if text.trim().is_empty() {
            return Err(ProviderError::InvalidInput(
                "Cannot synthesize empty text".to_string(),
            ));
        }
        if voice.voice_id.is_empty() {
            return Err(ProviderError::Configuration(
                "ElevenLabs requires a voice_id".to_string(),
            ));
        }

        let mut voice_settings = json!({
            "stability": voice.stability.unwrap_or(DEFAULT_STABILITY),
            "similarity_boost": voice.similarity_boost.unwrap_or(DEFAULT_SIMILARITY_BOOST),
        });
        if let Some(speed) = voice.speed {
            voice_settings["speed"] = json!(speed);
        }

        let body = json!({
            "text": text,
            "model_id": voice.model.as_deref().unwrap_or(DEFAULT_MODEL),
            "voice_settings": voice_settings,
        });

        let response = self
            .client
            .post(self.speech_url(&voice.voice_id))
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
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

        debug!(bytes = audio.len(), voice_id = %voice.voice_id, "ElevenLabs synthesis complete");
        Ok(audio)
    }

    fn provider_name(&self) -> &'static str {
        "elevenlabs"
    }
}
