use std::collections::HashSet;

use super::{ServerConfig, TlsConfig};
use crate::core::llm::GenerationProvider;
use crate::core::stt::TranscriptionProvider;
use crate::core::tts::SynthesisProvider;
use crate::utils::phone::normalize_number;

type ValidationResult = Result<(), Box<dyn std::error::Error>>;

/// Validate the merged configuration.
pub(super) fn validate(config: &ServerConfig) -> ValidationResult {
    validate_tls(&config.tls)?;
    validate_public_url(config.public_url.as_deref())?;
    validate_conversation(config)?;
    validate_directory(config)?;
    Ok(())
}

pub(super) fn validate_tls(tls: &Option<TlsConfig>) -> ValidationResult {
    let Some(tls) = tls else {
        return Ok(());
    };
    if !tls.cert_path.exists() {
        return Err(format!(
            "TLS certificate file not found: {}",
            tls.cert_path.display()
        )
        .into());
    }
    if !tls.key_path.exists() {
        return Err(format!("TLS key file not found: {}", tls.key_path.display()).into());
    }
    Ok(())
}

pub(super) fn validate_public_url(public_url: Option<&str>) -> ValidationResult {
    let Some(raw) = public_url else {
        return Ok(());
    };
    let parsed = url::Url::parse(raw).map_err(|e| format!("Invalid public_url {raw}: {e}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("public_url must use http or https: {raw}").into());
    }
    Ok(())
}

fn validate_conversation(config: &ServerConfig) -> ValidationResult {
    let c = &config.conversation;
    if c.registry_ttl_seconds == 0 {
        return Err("registry_ttl_seconds must be greater than zero".into());
    }
    if c.gather_timeout_seconds == 0 {
        return Err("gather_timeout_seconds must be greater than zero".into());
    }
    if c.max_message_bytes == 0 {
        return Err("max_message_bytes must be greater than zero".into());
    }
    Ok(())
}

/// Assistants must have unique ids and known providers; numbers must map to
/// a listed assistant.
pub(super) fn validate_directory(config: &ServerConfig) -> ValidationResult {
    let mut ids = HashSet::new();
    for assistant in &config.assistants {
        if assistant.id.trim().is_empty() {
            return Err("Assistant id cannot be empty".into());
        }
        if !ids.insert(assistant.id.as_str()) {
            return Err(format!("Duplicate assistant id: {}", assistant.id).into());
        }
        assistant
            .model
            .provider
            .parse::<GenerationProvider>()
            .map_err(|e| format!("Assistant {}: {e}", assistant.id))?;
        assistant
            .voice
            .provider
            .parse::<SynthesisProvider>()
            .map_err(|e| format!("Assistant {}: {e}", assistant.id))?;
        assistant
            .transcriber
            .provider
            .parse::<TranscriptionProvider>()
            .map_err(|e| format!("Assistant {}: {e}", assistant.id))?;
    }

    let mut numbers = HashSet::new();
    for number in &config.phone_numbers {
        let normalized = normalize_number(&number.number);
        if normalized.is_empty() {
            return Err(format!("Invalid phone number: {}", number.number).into());
        }
        if !numbers.insert(normalized) {
            return Err(format!("Phone number mapped twice: {}", number.number).into());
        }
        if !ids.contains(number.assistant_id.as_str()) {
            return Err(format!(
                "Phone number {} maps to unknown assistant {}",
                number.number, number.assistant_id
            )
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assistant::{AssistantConfig, PhoneNumberConfig};
    use std::path::PathBuf;

    fn config_with(assistants: Vec<AssistantConfig>, numbers: Vec<PhoneNumberConfig>) -> ServerConfig {
        ServerConfig {
            assistants,
            phone_numbers: numbers,
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_public_url_must_be_http() {
        assert!(validate_public_url(Some("https://voice.example.com")).is_ok());
        assert!(validate_public_url(Some("ftp://voice.example.com")).is_err());
        assert!(validate_public_url(Some("not a url")).is_err());
        assert!(validate_public_url(None).is_ok());
    }

    #[test]
    fn test_missing_tls_files() {
        let tls = Some(TlsConfig {
            cert_path: PathBuf::from("/nonexistent/cert.pem"),
            key_path: PathBuf::from("/nonexistent/key.pem"),
        });
        assert!(validate_tls(&tls).is_err());
    }

    #[test]
    fn test_duplicate_assistant_ids() {
        let config = config_with(
            vec![AssistantConfig::new("a", "p"), AssistantConfig::new("a", "q")],
            vec![],
        );
        assert!(validate_directory(&config).is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let mut assistant = AssistantConfig::new("a", "p");
        assistant.voice.provider = "nonexistent".to_string();
        let err = validate_directory(&config_with(vec![assistant], vec![])).unwrap_err();
        assert!(err.to_string().contains("Assistant a"));
    }

    #[test]
    fn test_number_mapping_checks() {
        let number = |n: &str, a: &str| PhoneNumberConfig {
            number: n.to_string(),
            assistant_id: a.to_string(),
        };
        let assistants = vec![AssistantConfig::new("a", "p")];

        assert!(
            validate_directory(&config_with(assistants.clone(), vec![number("+15550001111", "a")]))
                .is_ok()
        );
        assert!(
            validate_directory(&config_with(
                assistants.clone(),
                vec![number("+15550001111", "a"), number("+1 555 000 1111", "a")]
            ))
            .is_err()
        );
        let err = validate_directory(&config_with(assistants, vec![number("+15550001111", "b")]))
            .unwrap_err();
        assert!(err.to_string().contains("unknown assistant"));
    }
}
