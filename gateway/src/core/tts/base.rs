use async_trait::async_trait;
use bytes::Bytes;

use crate::core::assistant::VoiceSettings;
use crate::core::providers::ProviderResult;

/// Uniform contract for speech synthesis providers.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Render `text` with the given voice into encoded audio bytes.
    async fn synthesize(&self, text: &str, voice: &VoiceSettings) -> ProviderResult<Bytes>;

    fn provider_name(&self) -> &'static str;
}
