//! Provider selection.
//!
//! Each assistant names one provider per capability. The names are parsed
//! once, when a session starts, into a [`ProviderSet`] of trait objects; no
//! string dispatch happens per turn.

mod error;

pub use error::{ProviderError, ProviderResult};
pub(crate) use error::api_error;

use std::fmt;
use std::sync::Arc;

use crate::core::assistant::AssistantConfig;
use crate::core::llm::{GROQ_BASE_URL, LanguageModel, OPENAI_BASE_URL, create_language_model};
use crate::core::stt::{
    DEEPGRAM_BASE_URL, DEEPGRAM_WS_URL, StreamingTranscriber, Transcriber,
    create_streaming_transcriber, create_transcriber,
};
use crate::core::tts::{ELEVENLABS_BASE_URL, SpeechSynthesizer, create_synthesizer};

/// API keys and endpoints for the HTTP-backed providers.
///
/// Base URLs are configurable so deployments can route through proxies and
/// tests can point adapters at mock servers.
#[derive(Clone)]
pub struct ProviderCredentials {
    pub openai_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub deepgram_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,

    pub openai_base_url: String,
    pub groq_base_url: String,
    pub deepgram_base_url: String,
    pub deepgram_ws_url: String,
    pub elevenlabs_base_url: String,
}

impl Default for ProviderCredentials {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            groq_api_key: None,
            deepgram_api_key: None,
            elevenlabs_api_key: None,
            openai_base_url: OPENAI_BASE_URL.to_string(),
            groq_base_url: GROQ_BASE_URL.to_string(),
            deepgram_base_url: DEEPGRAM_BASE_URL.to_string(),
            deepgram_ws_url: DEEPGRAM_WS_URL.to_string(),
            elevenlabs_base_url: ELEVENLABS_BASE_URL.to_string(),
        }
    }
}

impl ProviderCredentials {
    /// API key for a provider, or a configuration error naming it.
    pub fn require_key(&self, provider: &str) -> ProviderResult<String> {
        let key = match provider {
            "openai" => &self.openai_api_key,
            "groq" => &self.groq_api_key,
            "deepgram" => &self.deepgram_api_key,
            "elevenlabs" => &self.elevenlabs_api_key,
            _ => &None,
        };
        key.clone().filter(|k| !k.is_empty()).ok_or_else(|| {
            ProviderError::Configuration(format!("{provider} API key not configured"))
        })
    }
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |k: &Option<String>| k.as_ref().map(|_| "<redacted>");
        f.debug_struct("ProviderCredentials")
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("groq_api_key", &redact(&self.groq_api_key))
            .field("deepgram_api_key", &redact(&self.deepgram_api_key))
            .field("elevenlabs_api_key", &redact(&self.elevenlabs_api_key))
            .field("openai_base_url", &self.openai_base_url)
            .field("groq_base_url", &self.groq_base_url)
            .field("deepgram_base_url", &self.deepgram_base_url)
            .field("deepgram_ws_url", &self.deepgram_ws_url)
            .field("elevenlabs_base_url", &self.elevenlabs_base_url)
            .finish()
    }
}

impl Drop for ProviderCredentials {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        for key in [
            &mut self.openai_api_key,
            &mut self.groq_api_key,
            &mut self.deepgram_api_key,
            &mut self.elevenlabs_api_key,
        ]
        .into_iter()
        .flatten()
        {
            key.zeroize();
        }
    }
}

/// The adapters serving one session.
#[derive(Clone)]
pub struct ProviderSet {
    pub llm: Arc<dyn LanguageModel>,
    pub tts: Arc<dyn SpeechSynthesizer>,
    pub stt: Arc<dyn Transcriber>,
    /// Present only when the transcription provider supports live mode
    pub streaming: Option<Arc<dyn StreamingTranscriber>>,
}

impl fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSet")
            .field("llm", &self.llm.provider_name())
            .field("tts", &self.tts.provider_name())
            .field("stt", &self.stt.provider_name())
            .field(
                "streaming",
                &self.streaming.as_ref().map(|s| s.provider_name()),
            )
            .finish()
    }
}

/// Builds the [`ProviderSet`] for an assistant.
pub trait ProviderFactory: Send + Sync {
    fn build(&self, assistant: &AssistantConfig) -> ProviderResult<ProviderSet>;
}

/// Production factory backed by the HTTP/WebSocket provider adapters.
#[derive(Debug, Clone, Default)]
pub struct HttpProviderFactory {
    credentials: ProviderCredentials,
}

impl HttpProviderFactory {
    pub fn new(credentials: ProviderCredentials) -> Self {
        Self { credentials }
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn build(&self, assistant: &AssistantConfig) -> ProviderResult<ProviderSet> {
        Ok(ProviderSet {
            llm: create_language_model(&assistant.model.provider, &self.credentials)?,
            tts: create_synthesizer(&assistant.voice.provider, &self.credentials)?,
            stt: create_transcriber(&assistant.transcriber.provider, &self.credentials)?,
            streaming: create_streaming_transcriber(
                &assistant.transcriber.provider,
                &self.credentials,
            )?,
        })
    }
}
