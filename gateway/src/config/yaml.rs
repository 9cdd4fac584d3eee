use serde::Deserialize;
use std::path::PathBuf;

use crate::core::assistant::{AssistantConfig, PhoneNumberConfig};

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration; anything left
/// out falls back to environment variables and then to defaults.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///   public_url: "https://voice.example.com"
///
/// providers:
///   openai_api_key: "sk-..."
///   deepgram_api_key: "dg-..."
///
/// telephony:
///   account_sid: "AC..."
///   auth_token: "..."
///   default_caller: "+15550001111"
///   validate_signatures: true
///
/// conversation:
///   registry_ttl_seconds: 3600
///   gather_timeout_seconds: 5
///
/// security:
///   cors_allowed_origins: "*"
///
/// assistants:
///   - id: "support"
///     system_prompt: "You are a helpful support agent."
///     first_message: "Hello, how can I help?"
///     end_call_phrases: ["goodbye", "bye"]
///
/// phone_numbers:
///   - number: "+15550001111"
///     assistant_id: "support"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub providers: Option<ProvidersYaml>,
    pub telephony: Option<TelephonyYaml>,
    pub conversation: Option<ConversationYaml>,
    pub security: Option<SecurityYaml>,
    pub assistants: Vec<AssistantConfig>,
    pub phone_numbers: Vec<PhoneNumberConfig>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub public_url: Option<String>,
    pub tls: Option<TlsYaml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Provider API keys and endpoint overrides
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersYaml {
    pub openai_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub deepgram_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub groq_base_url: Option<String>,
    pub deepgram_base_url: Option<String>,
    pub deepgram_ws_url: Option<String>,
    pub elevenlabs_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TelephonyYaml {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub api_base_url: Option<String>,
    pub default_caller: Option<String>,
    pub validate_signatures: Option<bool>,
    pub wait_music_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ConversationYaml {
    pub registry_ttl_seconds: Option<u64>,
    pub registry_sweep_interval_seconds: Option<u64>,
    pub audio_clip_ttl_seconds: Option<u64>,
    pub gather_timeout_seconds: Option<u32>,
    pub socket_idle_timeout_seconds: Option<u64>,
    pub max_message_bytes: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
    pub max_websocket_connections: Option<usize>,
    pub max_connections_per_ip: Option<u32>,
}

impl YamlConfig {
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 8080
  public_url: "https://voice.example.com"

providers:
  openai_api_key: "sk-test"
  deepgram_ws_url: "ws://localhost:9000/v1/listen"

telephony:
  account_sid: "AC123"
  auth_token: "token"
  validate_signatures: false
  wait_music_url: "https://cdn.example.com/hold.mp3"

conversation:
  gather_timeout_seconds: 7

assistants:
  - id: "sales"
    system_prompt: "Sell things."
    interruptions_enabled: true
    model:
      provider: "groq"
      model: "llama-3.1-8b-instant"
    voice:
      provider: "elevenlabs"
      voice_id: "rachel"
      stability: 0.4
    transcriber:
      provider: "deepgram"
      silence_threshold_ms: 600

phone_numbers:
  - number: "+15550001111"
    assistant_id: "sales"
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        let server = config.server.as_ref().unwrap();
        assert_eq!(server.port, Some(8080));
        assert_eq!(
            server.public_url.as_deref(),
            Some("https://voice.example.com")
        );
        assert_eq!(
            config.providers.as_ref().unwrap().openai_api_key.as_deref(),
            Some("sk-test")
        );
        let telephony = config.telephony.as_ref().unwrap();
        assert_eq!(telephony.validate_signatures, Some(false));
        assert_eq!(
            config.conversation.as_ref().unwrap().gather_timeout_seconds,
            Some(7)
        );

        let sales = &config.assistants[0];
        assert!(sales.interruptions_enabled);
        assert_eq!(sales.model.provider, "groq");
        // Unspecified settings keep their defaults
        assert_eq!(sales.model.max_tokens, 250);
        assert_eq!(sales.voice.stability, Some(0.4));
        assert_eq!(sales.transcriber.silence_threshold_ms, 600);
        assert_eq!(sales.transcriber.language, "en");
        assert_eq!(config.phone_numbers[0].assistant_id, "sales");
    }

    #[test]
    fn test_yaml_config_empty() {
        let config: YamlConfig = serde_yaml::from_str("").unwrap();

        assert!(config.server.is_none());
        assert!(config.providers.is_none());
        assert!(config.telephony.is_none());
        assert!(config.assistants.is_empty());
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "server:\n  port: 3000\n").unwrap();

        let config = YamlConfig::from_file(&config_path).unwrap();
        assert_eq!(config.server.unwrap().port, Some(3000));
    }

    #[test]
    fn test_from_file_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.yaml");
        fs::write(&config_path, "invalid: yaml: [content").unwrap();

        let err = YamlConfig::from_file(&config_path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse YAML"));
    }
}
