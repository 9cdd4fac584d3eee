//! Configuration module for the conversation gateway
//!
//! Server configuration comes from .env files, environment variables, and an
//! optional YAML file. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Applying YAML overrides on top of the environment
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use waav_conversation::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config = ServerConfig::from_file(&PathBuf::from("config.yaml"))?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

use crate::core::assistant::{AssistantConfig, PhoneNumberConfig};
use crate::core::providers::ProviderCredentials;
use crate::core::telephony::DEFAULT_TELEPHONY_API_BASE;

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone, PartialEq)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Telephony provider account and webhook settings
#[derive(Clone)]
pub struct TelephonyConfig {
    pub account_sid: Option<String>,
    /// Auth token; also the key for webhook signatures
    pub auth_token: Option<String>,
    pub api_base_url: String,
    /// Caller id used for outbound calls without an explicit `from`
    pub default_caller: Option<String>,
    /// Verify `X-Telephony-Signature` on webhooks when an auth token is set
    pub validate_signatures: bool,
    /// Audio played by the wait-music endpoint
    pub wait_music_url: Option<String>,
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            api_base_url: DEFAULT_TELEPHONY_API_BASE.to_string(),
            default_caller: None,
            validate_signatures: true,
            wait_music_url: None,
        }
    }
}

impl TelephonyConfig {
    /// Whether webhook signatures are enforced.
    pub fn signature_key(&self) -> Option<&str> {
        if !self.validate_signatures {
            return None;
        }
        self.auth_token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn can_place_calls(&self) -> bool {
        self.account_sid.as_deref().is_some_and(|s| !s.is_empty())
            && self.auth_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

impl std::fmt::Debug for TelephonyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelephonyConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field("default_caller", &self.default_caller)
            .field("validate_signatures", &self.validate_signatures)
            .field("wait_music_url", &self.wait_music_url)
            .finish()
    }
}

/// Zeroize the auth token when the telephony configuration is dropped.
impl Drop for TelephonyConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut token) = self.auth_token {
            token.zeroize();
        }
    }
}

/// Timeouts and limits for live conversations
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationConfig {
    /// Lifetime of a call's registry entry without further webhooks
    pub registry_ttl_seconds: u64,
    /// How often expired registry entries are released
    pub registry_sweep_interval_seconds: u64,
    /// How long synthesized telephony clips stay fetchable
    pub audio_clip_ttl_seconds: u64,
    /// Speech gather timeout sent to the telephony provider
    pub gather_timeout_seconds: u32,
    /// Socket sessions idle this long are closed
    pub socket_idle_timeout_seconds: u64,
    /// Upper bound on a single inbound socket message
    pub max_message_bytes: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            registry_ttl_seconds: 3600,
            registry_sweep_interval_seconds: 60,
            audio_clip_ttl_seconds: 600,
            gather_timeout_seconds: 5,
            socket_idle_timeout_seconds: 300,
            max_message_bytes: 10 * 1024 * 1024,
        }
    }
}

impl ConversationConfig {
    pub fn registry_ttl(&self) -> Duration {
        Duration::from_secs(self.registry_ttl_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.registry_sweep_interval_seconds.max(1))
    }

    pub fn audio_clip_ttl(&self) -> Duration {
        Duration::from_secs(self.audio_clip_ttl_seconds)
    }

    pub fn socket_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.socket_idle_timeout_seconds)
    }
}

/// Server configuration
///
/// Contains everything needed to run the conversation gateway:
/// - Server settings (host, port, TLS, public URL)
/// - Provider API keys and endpoints
/// - Telephony account settings
/// - Conversation timeouts
/// - Security settings (CORS, rate limiting, connection limits)
/// - The assistant directory (assistants and phone-number mappings)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    /// Externally reachable base URL, used for webhook actions and clip URLs
    pub public_url: Option<String>,

    pub providers: ProviderCredentials,
    pub telephony: TelephonyConfig,
    pub conversation: ConversationConfig,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,
    /// Maximum requests per second per IP address
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    pub rate_limit_burst_size: u32,
    /// Maximum concurrent WebSocket connections
    /// Default: None (unlimited)
    pub max_websocket_connections: Option<usize>,
    /// Maximum connections per IP address
    pub max_connections_per_ip: u32,

    // Directory
    pub assistants: Vec<AssistantConfig>,
    pub phone_numbers: Vec<PhoneNumberConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            tls: None,
            public_url: None,
            providers: ProviderCredentials::default(),
            telephony: TelephonyConfig::default(),
            conversation: ConversationConfig::default(),
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
            max_websocket_connections: None,
            max_connections_per_ip: 100,
            assistants: Vec::new(),
            phone_numbers: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables only
    ///
    /// The .env file is loaded in `main` before this runs, so its values
    /// appear as environment variables with lower priority than real ones.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Absolute URL for a path served by this gateway, when a public URL is set.
    pub fn public_endpoint(&self, path: &str) -> Option<String> {
        let base = self.public_url.as_deref()?.trim_end_matches('/');
        Some(format!("{base}/{}", path.trim_start_matches('/')))
    }

    /// URL the telephony provider should call for a webhook path.
    ///
    /// Falls back to the bare path, which providers resolve relative to the
    /// URL of the request that returned the markup.
    pub fn webhook_url(&self, path: &str) -> String {
        self.public_endpoint(path)
            .unwrap_or_else(|| format!("/{}", path.trim_start_matches('/')))
    }
}
