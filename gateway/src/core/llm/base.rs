use async_trait::async_trait;

use crate::core::assistant::ModelSettings;
use crate::core::conversation::Message;
use crate::core::providers::ProviderResult;

/// Parameters passed with every generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<&ModelSettings> for GenerationParams {
    fn from(settings: &ModelSettings) -> Self {
        Self {
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }
}

/// Uniform contract for text generation providers.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Produce the next assistant reply for the ordered history.
    async fn generate(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> ProviderResult<String>;

    /// Short provider identifier for logging.
    fn provider_name(&self) -> &'static str;
}
