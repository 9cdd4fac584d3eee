pub mod assistant;
pub mod conversation;
pub mod llm;
pub mod providers;
pub mod registry;
pub mod streaming;
pub mod stt;
pub mod telephony;
pub mod tts;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types for convenience
pub use assistant::{AssistantConfig, AssistantDirectory, ConfigDirectory, PhoneNumberConfig};
pub use conversation::{
    Message, Orchestrator, OrchestratorError, OrchestratorHandle, Role, SessionEvent, TurnOutput,
    spawn_session,
};
pub use providers::{
    HttpProviderFactory, ProviderCredentials, ProviderError, ProviderFactory, ProviderSet,
};
pub use registry::{RegistryEntry, SessionRegistry};
