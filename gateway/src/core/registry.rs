//! Lookup from transport identifiers to live conversations.
//!
//! Telephony webhooks arrive as independent requests, so the orchestrator for
//! a call must be found again on every request. Entries carry an expiry and
//! are removed on terminal status, explicit end, or by the sweeper.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::core::assistant::AssistantConfig;
use crate::core::conversation::OrchestratorHandle;
use crate::store::TransportKind;

#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub handle: OrchestratorHandle,
    pub assistant: Arc<AssistantConfig>,
    pub transport: TransportKind,
    pub session_id: String,
}

#[derive(Debug)]
struct Slot {
    entry: RegistryEntry,
    expires_at: Instant,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now && !self.entry.handle.is_ended()
    }
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    entries: DashMap<String, Slot>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `entry` under a transport identifier for at most `ttl`.
    ///
    /// Replacing a live entry ends the conversation it pointed to.
    pub fn put(&self, id: impl Into<String>, entry: RegistryEntry, ttl: Duration) {
        let id = id.into();
        let slot = Slot {
            entry,
            expires_at: Instant::now() + ttl,
        };
        if let Some(previous) = self.entries.insert(id.clone(), slot) {
            debug!(id = %id, session_id = %previous.entry.session_id, "Replacing registry entry");
            let handle = previous.entry.handle;
            tokio::spawn(async move { handle.end().await });
        }
    }

    /// Live entry for `id`. Expired entries are evicted and reported absent.
    pub fn get(&self, id: &str) -> Option<RegistryEntry> {
        {
            let slot = self.entries.get(id)?;
            if slot.is_live(Instant::now()) {
                return Some(slot.entry.clone());
            }
        }

        // Re-checked under the shard lock; a concurrent put for this id survives
        if let Some((_, expired)) = self
            .entries
            .remove_if(id, |_, slot| !slot.is_live(Instant::now()))
        {
            debug!(id = %id, "Evicting expired registry entry");
            let handle = expired.entry.handle;
            tokio::spawn(async move { handle.end().await });
        }
        None
    }

    /// Push back the expiry of a live entry.
    pub fn touch(&self, id: &str, ttl: Duration) -> bool {
        match self.entries.get_mut(id) {
            Some(mut slot) => {
                slot.expires_at = Instant::now() + ttl;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: &str) -> Option<RegistryEntry> {
        self.entries.remove(id).map(|(_, slot)| slot.entry)
    }

    /// Remove the entry and end its conversation.
    ///
    /// This is the single cleanup gate for end phrases, terminal call status,
    /// and transport disconnects.
    pub async fn release(&self, id: &str) -> bool {
        let Some(entry) = self.remove(id) else {
            return false;
        };
        entry.handle.end().await;
        info!(id = %id, session_id = %entry.session_id, "Released conversation");
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Release every expired entry. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|slot| !slot.is_live(now))
            .map(|slot| slot.key().clone())
            .collect();

        let mut released = 0;
        for id in expired {
            let Some((_, slot)) = self
                .entries
                .remove_if(&id, |_, slot| !slot.is_live(Instant::now()))
            else {
                continue;
            };
            slot.entry.handle.end().await;
            debug!(id = %id, session_id = %slot.entry.session_id, "Released expired conversation");
            released += 1;
        }
        if released > 0 {
            info!(released, remaining = self.len(), "Swept expired conversations");
        }
        released
    }

    /// Periodically sweep expired entries until the registry is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let registry = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                registry.sweep().await;
            }
        })
    }
}
