use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::{ConversationConfig, ServerConfig, TelephonyConfig, TlsConfig};
use crate::core::providers::ProviderCredentials;

/// Read a non-empty environment variable.
pub(super) fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable, failing with the variable name on bad input.
pub(super) fn parse_env<T>(name: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {name}: {e}").into()),
        None => Ok(None),
    }
}

fn parse_bool(name: &str) -> Result<Option<bool>, Box<dyn std::error::Error>> {
    match env_var(name) {
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            other => Err(format!("Invalid value for {name}: {other}").into()),
        },
        None => Ok(None),
    }
}

/// Build the configuration from environment variables over defaults.
pub(super) fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let defaults = ServerConfig::default();

    let tls = match parse_bool("TLS_ENABLED")? {
        Some(true) => Some(TlsConfig {
            cert_path: env_var("TLS_CERT_PATH")
                .map(PathBuf::from)
                .ok_or("TLS_ENABLED is set but TLS_CERT_PATH is missing")?,
            key_path: env_var("TLS_KEY_PATH")
                .map(PathBuf::from)
                .ok_or("TLS_ENABLED is set but TLS_KEY_PATH is missing")?,
        }),
        _ => None,
    };

    let base = ProviderCredentials::default();
    let providers = ProviderCredentials {
        openai_api_key: env_var("OPENAI_API_KEY"),
        groq_api_key: env_var("GROQ_API_KEY"),
        deepgram_api_key: env_var("DEEPGRAM_API_KEY"),
        elevenlabs_api_key: env_var("ELEVENLABS_API_KEY"),
        openai_base_url: env_var("OPENAI_BASE_URL").unwrap_or_else(|| base.openai_base_url.clone()),
        groq_base_url: env_var("GROQ_BASE_URL").unwrap_or_else(|| base.groq_base_url.clone()),
        deepgram_base_url: env_var("DEEPGRAM_BASE_URL")
            .unwrap_or_else(|| base.deepgram_base_url.clone()),
        deepgram_ws_url: env_var("DEEPGRAM_WS_URL").unwrap_or_else(|| base.deepgram_ws_url.clone()),
        elevenlabs_base_url: env_var("ELEVENLABS_BASE_URL")
            .unwrap_or_else(|| base.elevenlabs_base_url.clone()),
    };

    let mut telephony = TelephonyConfig::default();
    telephony.account_sid = env_var("TELEPHONY_ACCOUNT_SID");
    telephony.auth_token = env_var("TELEPHONY_AUTH_TOKEN");
    if let Some(api_base) = env_var("TELEPHONY_API_BASE_URL") {
        telephony.api_base_url = api_base;
    }
    telephony.default_caller = env_var("TELEPHONY_DEFAULT_CALLER");
    if let Some(validate) = parse_bool("TELEPHONY_VALIDATE_SIGNATURES")? {
        telephony.validate_signatures = validate;
    }
    telephony.wait_music_url = env_var("TELEPHONY_WAIT_MUSIC_URL");

    let conv = ConversationConfig::default();
    let conversation = ConversationConfig {
        registry_ttl_seconds: parse_env("REGISTRY_TTL_SECONDS")?
            .unwrap_or(conv.registry_ttl_seconds),
        registry_sweep_interval_seconds: parse_env("REGISTRY_SWEEP_INTERVAL_SECONDS")?
            .unwrap_or(conv.registry_sweep_interval_seconds),
        audio_clip_ttl_seconds: parse_env("AUDIO_CLIP_TTL_SECONDS")?
            .unwrap_or(conv.audio_clip_ttl_seconds),
        gather_timeout_seconds: parse_env("GATHER_TIMEOUT_SECONDS")?
            .unwrap_or(conv.gather_timeout_seconds),
        socket_idle_timeout_seconds: parse_env("SOCKET_IDLE_TIMEOUT_SECONDS")?
            .unwrap_or(conv.socket_idle_timeout_seconds),
        max_message_bytes: parse_env("MAX_MESSAGE_BYTES")?.unwrap_or(conv.max_message_bytes),
    };

    Ok(ServerConfig {
        host: env_var("HOST").unwrap_or_else(|| defaults.host.clone()),
        port: parse_env("PORT")?.unwrap_or(defaults.port),
        tls,
        public_url: env_var("PUBLIC_URL"),
        providers,
        telephony,
        conversation,
        cors_allowed_origins: env_var("CORS_ALLOWED_ORIGINS"),
        rate_limit_requests_per_second: parse_env("RATE_LIMIT_REQUESTS_PER_SECOND")?
            .unwrap_or(defaults.rate_limit_requests_per_second),
        rate_limit_burst_size: parse_env("RATE_LIMIT_BURST_SIZE")?
            .unwrap_or(defaults.rate_limit_burst_size),
        max_websocket_connections: parse_env("MAX_WEBSOCKET_CONNECTIONS")?,
        max_connections_per_ip: parse_env("MAX_CONNECTIONS_PER_IP")?
            .unwrap_or(defaults.max_connections_per_ip),
        assistants: Vec::new(),
        phone_numbers: Vec::new(),
    })
}
