use std::path::PathBuf;

use super::env::load_from_env;
use super::yaml::YamlConfig;
use super::{ServerConfig, TlsConfig};

/// Environment-based configuration with YAML values applied on top.
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = load_from_env()?;
    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        override_with(&mut config.host, server.host);
        override_with(&mut config.port, server.port);
        if server.public_url.is_some() {
            config.public_url = server.public_url;
        }
        if let Some(tls) = server.tls {
            match tls.enabled {
                Some(false) => config.tls = None,
                Some(true) => {
                    config.tls = Some(TlsConfig {
                        cert_path: tls
                            .cert_path
                            .map(PathBuf::from)
                            .ok_or("server.tls.enabled is set but cert_path is missing")?,
                        key_path: tls
                            .key_path
                            .map(PathBuf::from)
                            .ok_or("server.tls.enabled is set but key_path is missing")?,
                    });
                }
                None => {}
            }
        }
    }

    if let Some(providers) = yaml.providers {
        let creds = &mut config.providers;
        override_some(&mut creds.openai_api_key, providers.openai_api_key);
        override_some(&mut creds.groq_api_key, providers.groq_api_key);
        override_some(&mut creds.deepgram_api_key, providers.deepgram_api_key);
        override_some(&mut creds.elevenlabs_api_key, providers.elevenlabs_api_key);
        override_with(&mut creds.openai_base_url, providers.openai_base_url);
        override_with(&mut creds.groq_base_url, providers.groq_base_url);
        override_with(&mut creds.deepgram_base_url, providers.deepgram_base_url);
        override_with(&mut creds.deepgram_ws_url, providers.deepgram_ws_url);
        override_with(&mut creds.elevenlabs_base_url, providers.elevenlabs_base_url);
    }

    if let Some(telephony) = yaml.telephony {
        let t = &mut config.telephony;
        override_some(&mut t.account_sid, telephony.account_sid);
        override_some(&mut t.auth_token, telephony.auth_token);
        override_with(&mut t.api_base_url, telephony.api_base_url);
        override_some(&mut t.default_caller, telephony.default_caller);
        override_with(&mut t.validate_signatures, telephony.validate_signatures);
        override_some(&mut t.wait_music_url, telephony.wait_music_url);
    }

    if let Some(conversation) = yaml.conversation {
        let c = &mut config.conversation;
        override_with(&mut c.registry_ttl_seconds, conversation.registry_ttl_seconds);
        override_with(
            &mut c.registry_sweep_interval_seconds,
            conversation.registry_sweep_interval_seconds,
        );
        override_with(&mut c.audio_clip_ttl_seconds, conversation.audio_clip_ttl_seconds);
        override_with(&mut c.gather_timeout_seconds, conversation.gather_timeout_seconds);
        override_with(
            &mut c.socket_idle_timeout_seconds,
            conversation.socket_idle_timeout_seconds,
        );
        override_with(&mut c.max_message_bytes, conversation.max_message_bytes);
    }

    if let Some(security) = yaml.security {
        override_some(&mut config.cors_allowed_origins, security.cors_allowed_origins);
        override_with(
            &mut config.rate_limit_requests_per_second,
            security.rate_limit_requests_per_second,
        );
        override_with(&mut config.rate_limit_burst_size, security.rate_limit_burst_size);
        override_some(
            &mut config.max_websocket_connections,
            security.max_websocket_connections,
        );
        override_with(&mut config.max_connections_per_ip, security.max_connections_per_ip);
    }

    config.assistants = yaml.assistants;
    config.phone_numbers = yaml.phone_numbers;

    Ok(config)
}

fn override_with<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn override_some<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}
