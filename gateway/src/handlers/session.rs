//! Conversation startup shared by the socket and telephony transports.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::core::assistant::AssistantConfig;
use crate::core::conversation::{Orchestrator, OrchestratorHandle, SessionEvent, spawn_session};
use crate::core::registry::RegistryEntry;
use crate::errors::{AppError, AppResult};
use crate::state::AppState;
use crate::store::Session;

/// Persist `session`, build its providers, and register a running
/// orchestrator under `registry_key`.
///
/// The session record is ended again if the conversation cannot start.
pub(crate) async fn start_conversation(
    state: &Arc<AppState>,
    session: Session,
    registry_key: &str,
    events: Option<mpsc::Sender<SessionEvent>>,
) -> AppResult<OrchestratorHandle> {
    let assistant = session.assistant.clone();
    let session_id = session.id.clone();
    let transport = session.transport;

    state.store.create_session(session).await?;

    let orchestrator = match build_orchestrator(state, &session_id, assistant.clone()).await {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            if let Err(store_err) = state.store.end_session(&session_id).await {
                warn!(session_id = %session_id, error = %store_err, "Failed to end aborted session");
            }
            return Err(e);
        }
    };

    let handle = spawn_session(orchestrator, events);
    state.registry.put(
        registry_key,
        RegistryEntry {
            handle: handle.clone(),
            assistant: assistant.clone(),
            transport,
            session_id: session_id.clone(),
        },
        state.config.conversation.registry_ttl(),
    );

    info!(
        session_id = %session_id,
        assistant_id = %assistant.id,
        key = %registry_key,
        ?transport,
        "Conversation started"
    );
    Ok(handle)
}

async fn build_orchestrator(
    state: &Arc<AppState>,
    session_id: &str,
    assistant: Arc<AssistantConfig>,
) -> AppResult<Orchestrator> {
    let providers = state.providers.build(&assistant)?;
    let mut orchestrator =
        Orchestrator::new(session_id, assistant, providers, state.store.clone());
    orchestrator.initialize().await.map_err(AppError::from)?;
    Ok(orchestrator)
}
