//! Speech synthesis providers.

mod base;
pub mod elevenlabs;
pub mod openai;

pub use base::SpeechSynthesizer;
pub use elevenlabs::{ELEVENLABS_BASE_URL, ElevenLabsTTS};
pub use openai::{OPENAI_TTS_URL, OpenAITTS};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::core::providers::{ProviderCredentials, ProviderError, ProviderResult};

/// Supported synthesis providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisProvider {
    OpenAI,
    ElevenLabs,
}

impl fmt::Display for SynthesisProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAI => write!(f, "openai"),
            Self::ElevenLabs => write!(f, "elevenlabs"),
        }
    }
}

impl FromStr for SynthesisProvider {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "elevenlabs" | "11labs" => Ok(Self::ElevenLabs),
            _ => Err(ProviderError::Configuration(format!(
                "Unsupported synthesis provider: {s}. Supported providers: openai, elevenlabs"
            ))),
        }
    }
}

/// Build the synthesis adapter for a provider name.
pub fn create_synthesizer(
    provider: &str,
    credentials: &ProviderCredentials,
) -> ProviderResult<Arc<dyn SpeechSynthesizer>> {
    let synthesizer: Arc<dyn SpeechSynthesizer> = match provider.parse::<SynthesisProvider>()? {
        SynthesisProvider::OpenAI => Arc::new(OpenAITTS::new(
            credentials.require_key("openai")?,
            format!(
                "{}/audio/speech",
                credentials.openai_base_url.trim_end_matches('/')
            ),
        )?),
        SynthesisProvider::ElevenLabs => Arc::new(ElevenLabsTTS::new(
            credentials.require_key("elevenlabs")?,
            credentials.elevenlabs_base_url.clone(),
        )?),
    };
    Ok(synthesizer)
}
