//! Text generation providers.

mod base;
pub mod openai;

pub use base::{GenerationParams, LanguageModel};
pub use openai::{GROQ_BASE_URL, OPENAI_BASE_URL, OpenAIChat};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::core::providers::{ProviderCredentials, ProviderError, ProviderResult};

/// Supported generation providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationProvider {
    OpenAI,
    /// OpenAI-compatible chat completions served by Groq
    Groq,
}

impl fmt::Display for GenerationProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAI => write!(f, "openai"),
            Self::Groq => write!(f, "groq"),
        }
    }
}

impl FromStr for GenerationProvider {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "groq" => Ok(Self::Groq),
            _ => Err(ProviderError::Configuration(format!(
                "Unsupported generation provider: {s}. Supported providers: openai, groq"
            ))),
        }
    }
}

/// Build the generation adapter for a provider name.
pub fn create_language_model(
    provider: &str,
    credentials: &ProviderCredentials,
) -> ProviderResult<Arc<dyn LanguageModel>> {
    let model: Arc<dyn LanguageModel> = match provider.parse::<GenerationProvider>()? {
        GenerationProvider::OpenAI => Arc::new(OpenAIChat::new(
            credentials.require_key("openai")?,
            credentials.openai_base_url.clone(),
            "openai",
        )?),
        GenerationProvider::Groq => Arc::new(OpenAIChat::new(
            credentials.require_key("groq")?,
            credentials.groq_base_url.clone(),
            "groq",
        )?),
    };
    Ok(model)
}
