//! Assistant persona configuration and lookup.
//!
//! Assistants and phone-number mappings are owned by an external
//! configuration service. This process only reads them through the
//! [`AssistantDirectory`] trait; [`ConfigDirectory`] serves them from the
//! loaded server configuration.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::utils::phone::normalize_number;

/// Generation model settings for an assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Provider name, e.g. `openai` or `groq`
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 250,
        }
    }
}

/// Voice selector and voice parameters for synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    /// Provider name, e.g. `openai` or `elevenlabs`
    pub provider: String,
    pub voice_id: String,
    /// Provider-specific synthesis model
    pub model: Option<String>,
    /// Speaking rate multiplier
    pub speed: Option<f32>,
    pub stability: Option<f32>,
    pub similarity_boost: Option<f32>,
    /// Output container requested from the provider (mp3, wav, pcm)
    pub output_format: Option<String>,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            voice_id: "alloy".to_string(),
            model: None,
            speed: None,
            stability: None,
            similarity_boost: None,
            output_format: None,
        }
    }
}

/// Transcription settings, shared by batch and live transcription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriberSettings {
    /// Provider name, e.g. `openai` or `deepgram`
    pub provider: String,
    pub model: Option<String>,
    pub language: String,
    /// Speech inactivity after which a pending interim is finalized
    pub silence_threshold_ms: u64,
    /// Sample rate of raw PCM input
    pub sample_rate: u32,
}

impl Default for TranscriberSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            language: "en".to_string(),
            silence_threshold_ms: 800,
            sample_rate: 16000,
        }
    }
}

/// Snapshot of an assistant persona.
///
/// Sessions capture a snapshot at creation so configuration edits never
/// change a conversation that is already running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub id: String,
    #[serde(default)]
    pub org_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub system_prompt: String,
    /// Opening line spoken before any user input
    #[serde(default)]
    pub first_message: Option<String>,
    /// Phrases that end a phone call, matched case-insensitively as substrings
    #[serde(default)]
    pub end_call_phrases: Vec<String>,
    #[serde(default)]
    pub end_call_message: Option<String>,
    #[serde(default)]
    pub voicemail_message: Option<String>,
    #[serde(default)]
    pub interruptions_enabled: bool,
    #[serde(default)]
    pub model: ModelSettings,
    #[serde(default)]
    pub voice: VoiceSettings,
    #[serde(default)]
    pub transcriber: TranscriberSettings,
}

impl AssistantConfig {
    /// Minimal assistant with default provider settings.
    pub fn new(id: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            org_id: String::new(),
            name: String::new(),
            system_prompt: system_prompt.into(),
            first_message: None,
            end_call_phrases: Vec::new(),
            end_call_message: None,
            voicemail_message: None,
            interruptions_enabled: false,
            model: ModelSettings::default(),
            voice: VoiceSettings::default(),
            transcriber: TranscriberSettings::default(),
        }
    }

    /// Returns the first configured end phrase contained in `text`, ignoring case.
    pub fn matched_end_phrase(&self, text: &str) -> Option<&str> {
        let haystack = text.to_lowercase();
        self.end_call_phrases
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .find(|p| haystack.contains(&p.to_lowercase()))
    }

    /// Opening line, ignoring blank configuration values.
    pub fn greeting(&self) -> Option<&str> {
        self.first_message
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Mapping of a provisioned phone number to an assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoneNumberConfig {
    pub number: String,
    pub assistant_id: String,
}

/// Read-only lookup of assistant configuration.
pub trait AssistantDirectory: Send + Sync {
    fn assistant(&self, id: &str) -> Option<Arc<AssistantConfig>>;

    /// Resolve the assistant serving a called number.
    fn assistant_for_number(&self, number: &str) -> Option<Arc<AssistantConfig>>;
}

/// Directory backed by the assistants and numbers listed in server configuration.
#[derive(Debug, Default)]
pub struct ConfigDirectory {
    assistants: HashMap<String, Arc<AssistantConfig>>,
    numbers: HashMap<String, String>,
}

impl ConfigDirectory {
    pub fn new(assistants: Vec<AssistantConfig>, numbers: Vec<PhoneNumberConfig>) -> Self {
        let assistants = assistants
            .into_iter()
            .map(|a| (a.id.clone(), Arc::new(a)))
            .collect();
        let numbers = numbers
            .into_iter()
            .map(|n| (normalize_number(&n.number), n.assistant_id))
            .collect();
        Self {
            assistants,
            numbers,
        }
    }

    pub fn len(&self) -> usize {
        self.assistants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assistants.is_empty()
    }
}

impl AssistantDirectory for ConfigDirectory {
    fn assistant(&self, id: &str) -> Option<Arc<AssistantConfig>> {
        self.assistants.get(id).cloned()
    }

    fn assistant_for_number(&self, number: &str) -> Option<Arc<AssistantConfig>> {
        let assistant_id = self.numbers.get(&normalize_number(number))?;
        self.assistant(assistant_id)
    }
}
