//! Speech transcription providers, batch and live.

mod base;
pub mod deepgram;
pub mod openai;

pub use base::{
    LiveChannel, LiveInput, LiveSink, StreamingTranscriber, TranscriptEvent, Transcriber,
};
pub use deepgram::{DEEPGRAM_BASE_URL, DEEPGRAM_WS_URL, DeepgramLive, DeepgramSTT};
pub use openai::OpenAISTT;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::core::providers::{ProviderCredentials, ProviderError, ProviderResult};

/// Supported transcription providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptionProvider {
    /// Whisper file transcription; batch only
    OpenAI,
    /// Deepgram prerecorded and live transcription
    Deepgram,
}

impl fmt::Display for TranscriptionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAI => write!(f, "openai"),
            Self::Deepgram => write!(f, "deepgram"),
        }
    }
}

impl FromStr for TranscriptionProvider {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "whisper" => Ok(Self::OpenAI),
            "deepgram" => Ok(Self::Deepgram),
            _ => Err(ProviderError::Configuration(format!(
                "Unsupported transcription provider: {s}. Supported providers: openai, deepgram"
            ))),
        }
    }
}

/// Build the batch transcription adapter for a provider name.
pub fn create_transcriber(
    provider: &str,
    credentials: &ProviderCredentials,
) -> ProviderResult<Arc<dyn Transcriber>> {
    let transcriber: Arc<dyn Transcriber> = match provider.parse::<TranscriptionProvider>()? {
        TranscriptionProvider::OpenAI => Arc::new(OpenAISTT::new(
            credentials.require_key("openai")?,
            credentials.openai_base_url.clone(),
        )?),
        TranscriptionProvider::Deepgram => Arc::new(DeepgramSTT::new(
            credentials.require_key("deepgram")?,
            credentials.deepgram_base_url.clone(),
        )?),
    };
    Ok(transcriber)
}

/// Build the live transcription adapter for a provider name.
///
/// Returns `Ok(None)` for providers without a live mode.
pub fn create_streaming_transcriber(
    provider: &str,
    credentials: &ProviderCredentials,
) -> ProviderResult<Option<Arc<dyn StreamingTranscriber>>> {
    match provider.parse::<TranscriptionProvider>()? {
        TranscriptionProvider::OpenAI => Ok(None),
        TranscriptionProvider::Deepgram => Ok(Some(Arc::new(DeepgramLive::new(
            credentials.require_key("deepgram")?,
            credentials.deepgram_ws_url.clone(),
        )?))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing() {
        assert_eq!(
            "Whisper".parse::<TranscriptionProvider>().unwrap(),
            TranscriptionProvider::OpenAI
        );
        assert_eq!(
            "deepgram".parse::<TranscriptionProvider>().unwrap(),
            TranscriptionProvider::Deepgram
        );
        assert!("assemblyai".parse::<TranscriptionProvider>().is_err());
    }

    #[test]
    fn test_openai_has_no_live_mode() {
        let mut credentials = ProviderCredentials::default();
        credentials.openai_api_key = Some("sk-test".into());
        assert!(
            create_streaming_transcriber("openai", &credentials)
                .unwrap()
                .is_none()
        );
    }
}
