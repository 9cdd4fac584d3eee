//! Persistent storage collaborator.
//!
//! The conversation core only needs per-row atomic append/read of sessions,
//! calls, messages and voicemails. [`ConversationStore`] captures that
//! surface; [`MemoryStore`] is the in-process implementation.

mod memory;
pub mod models;

pub use memory::MemoryStore;
pub use models::{
    Call, CallDirection, CallStatus, RecordingRef, Session, SessionStatus, StatusChange,
    TransportKind, Voicemail,
};

use async_trait::async_trait;
use thiserror::Error;

use crate::core::conversation::Message;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create_session(&self, session: Session) -> StoreResult<()>;

    async fn get_session(&self, id: &str) -> StoreResult<Session>;

    /// End a session. Returns whether this call performed the transition.
    async fn end_session(&self, id: &str) -> StoreResult<bool>;

    /// Append-only message log for a session.
    async fn append_message(&self, session_id: &str, message: Message) -> StoreResult<()>;

    async fn list_messages(&self, session_id: &str) -> StoreResult<Vec<Message>>;

    async fn create_call(&self, call: Call) -> StoreResult<()>;

    async fn get_call_by_ref(&self, call_sid: &str) -> StoreResult<Call>;

    /// Associate the call with the session conversing over it.
    async fn link_call_session(
        &self,
        call_sid: &str,
        session_id: &str,
        assistant_id: &str,
    ) -> StoreResult<()>;

    /// Apply a provider-reported status following the call lifecycle rules.
    async fn update_call_status(
        &self,
        call_sid: &str,
        status: CallStatus,
        duration_secs: Option<u32>,
        answered_by: Option<String>,
    ) -> StoreResult<(StatusChange, Call)>;

    async fn attach_recording(&self, call_sid: &str, recording: RecordingRef) -> StoreResult<()>;

    async fn attach_transcription(&self, call_sid: &str, text: &str) -> StoreResult<()>;

    async fn create_voicemail(&self, voicemail: Voicemail) -> StoreResult<()>;

    /// Attach transcription text to the latest voicemail left on a call.
    async fn attach_voicemail_transcription(&self, call_sid: &str, text: &str) -> StoreResult<()>;
}
