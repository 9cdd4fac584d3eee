//! Shared application state.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use dashmap::DashMap;
use moka::future::Cache;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::core::assistant::{AssistantDirectory, ConfigDirectory};
use crate::core::providers::{HttpProviderFactory, ProviderFactory};
use crate::core::registry::SessionRegistry;
use crate::core::telephony::{RestTelephonyClient, TelephonyProvider};
use crate::store::{ConversationStore, MemoryStore};

/// Reasons a WebSocket connection is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionLimitError {
    GlobalLimitReached,
    PerIpLimitReached,
}

/// Collaborators injected into [`AppState`].
pub struct AppComponents {
    pub store: Arc<dyn ConversationStore>,
    pub directory: Arc<dyn AssistantDirectory>,
    pub providers: Arc<dyn ProviderFactory>,
    pub telephony: Option<Arc<dyn TelephonyProvider>>,
}

impl AppComponents {
    /// Production collaborators derived from configuration.
    pub fn from_config(config: &ServerConfig) -> Self {
        let telephony: Option<Arc<dyn TelephonyProvider>> = if config.telephony.can_place_calls() {
            match RestTelephonyClient::new(
                config.telephony.api_base_url.clone(),
                config.telephony.account_sid.clone().unwrap_or_default(),
                config.telephony.auth_token.clone().unwrap_or_default(),
            ) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    warn!(error = %e, "Outbound calling disabled");
                    None
                }
            }
        } else {
            None
        };

        Self {
            store: Arc::new(MemoryStore::new()),
            directory: Arc::new(ConfigDirectory::new(
                config.assistants.clone(),
                config.phone_numbers.clone(),
            )),
            providers: Arc::new(HttpProviderFactory::new(config.providers.clone())),
            telephony,
        }
    }
}

pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<dyn ConversationStore>,
    pub directory: Arc<dyn AssistantDirectory>,
    pub providers: Arc<dyn ProviderFactory>,
    /// Live conversations keyed by socket session id or call sid
    pub registry: Arc<SessionRegistry>,
    pub telephony: Option<Arc<dyn TelephonyProvider>>,
    /// Synthesized clips fetched by the telephony provider via `<Play>`
    audio_clips: Cache<String, Bytes>,
    ws_connections: AtomicUsize,
    ip_connections: DashMap<IpAddr, u32>,
}

impl AppState {
    pub async fn new(config: ServerConfig) -> Arc<Self> {
        let components = AppComponents::from_config(&config);
        Self::with_components(config, components)
    }

    pub fn with_components(config: ServerConfig, components: AppComponents) -> Arc<Self> {
        let audio_clips = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(config.conversation.audio_clip_ttl())
            .build();

        info!(
            assistants = config.assistants.len(),
            phone_numbers = config.phone_numbers.len(),
            outbound_calls = components.telephony.is_some(),
            "Application state initialized"
        );

        Arc::new(Self {
            config,
            store: components.store,
            directory: components.directory,
            providers: components.providers,
            registry: Arc::new(SessionRegistry::new()),
            telephony: components.telephony,
            audio_clips,
            ws_connections: AtomicUsize::new(0),
            ip_connections: DashMap::new(),
        })
    }

    /// Cache a clip and return its id.
    pub async fn store_clip(&self, audio: Bytes) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.audio_clips.insert(id.clone(), audio).await;
        id
    }

    pub async fn clip(&self, id: &str) -> Option<Bytes> {
        self.audio_clips.get(id).await
    }

    /// Reserve a WebSocket slot for `ip`, enforcing global and per-IP limits.
    pub fn try_acquire_connection(&self, ip: IpAddr) -> Result<(), ConnectionLimitError> {
        if let Some(max) = self.config.max_websocket_connections {
            let reserved = self
                .ws_connections
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                    (current < max).then_some(current + 1)
                });
            if reserved.is_err() {
                return Err(ConnectionLimitError::GlobalLimitReached);
            }
        } else {
            self.ws_connections.fetch_add(1, Ordering::SeqCst);
        }

        let mut per_ip = self.ip_connections.entry(ip).or_insert(0);
        if *per_ip >= self.config.max_connections_per_ip {
            drop(per_ip);
            self.ws_connections.fetch_sub(1, Ordering::SeqCst);
            return Err(ConnectionLimitError::PerIpLimitReached);
        }
        *per_ip += 1;
        Ok(())
    }

    pub fn release_connection(&self, ip: IpAddr) {
        let _ = self
            .ws_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| c.checked_sub(1));
        if let Some(mut count) = self.ip_connections.get_mut(&ip) {
            *count = count.saturating_sub(1);
        }
        self.ip_connections.remove_if(&ip, |_, count| *count == 0);
    }

    pub fn ws_connection_count(&self) -> usize {
        self.ws_connections.load(Ordering::SeqCst)
    }

    pub fn ip_connection_count(&self, ip: &IpAddr) -> u32 {
        self.ip_connections.get(ip).map(|c| *c).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn test_clip_cache_roundtrip() {
        let state = AppState::new(ServerConfig::default()).await;
        let id = state.store_clip(Bytes::from_static(b"mp3")).await;

        assert_eq!(state.clip(&id).await, Some(Bytes::from_static(b"mp3")));
        assert_eq!(state.clip("missing").await, None);
    }

    #[tokio::test]
    async fn test_no_telephony_client_without_credentials() {
        let state = AppState::new(ServerConfig::default()).await;
        assert!(state.telephony.is_none());
    }

    #[tokio::test]
    async fn test_release_clears_ip_entry() {
        let state = AppState::new(ServerConfig::default()).await;
        let ip: IpAddr = Ipv4Addr::new(10, 0, 0, 1).into();

        state.try_acquire_connection(ip).unwrap();
        state.release_connection(ip);
        state.release_connection(ip);

        assert_eq!(state.ws_connection_count(), 0);
        assert_eq!(state.ip_connection_count(&ip), 0);
    }
}
