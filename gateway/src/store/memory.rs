use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{
    Call, CallStatus, ConversationStore, RecordingRef, Session, StatusChange, StoreError,
    StoreResult, Voicemail,
};
use crate::core::conversation::Message;

/// In-memory store. Each map entry is updated under its shard lock, which
/// gives the per-row atomicity the conversation core relies on.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: DashMap<String, Session>,
    messages: DashMap<String, Vec<Message>>,
    calls: DashMap<String, Call>,
    voicemails: DashMap<String, Vec<Voicemail>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Voicemails recorded on a call, oldest first.
    pub fn voicemails_for(&self, call_sid: &str) -> Vec<Voicemail> {
        self.voicemails
            .get(call_sid)
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn create_session(&self, session: Session) -> StoreResult<()> {
        match self.sessions.entry(session.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "session {} already exists",
                session.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(())
            }
        }
    }

    async fn get_session(&self, id: &str) -> StoreResult<Session> {
        self.sessions
            .get(id)
            .map(|s| s.clone())
            .ok_or_else(|| StoreError::NotFound(format!("session {id}")))
    }

    async fn end_session(&self, id: &str) -> StoreResult<bool> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("session {id}")))?;
        Ok(session.end())
    }

    async fn append_message(&self, session_id: &str, message: Message) -> StoreResult<()> {
        if !self.sessions.contains_key(session_id) {
            return Err(StoreError::NotFound(format!("session {session_id}")));
        }
        self.messages
            .entry(session_id.to_string())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn list_messages(&self, session_id: &str) -> StoreResult<Vec<Message>> {
        Ok(self
            .messages
            .get(session_id)
            .map(|m| m.clone())
            .unwrap_or_default())
    }

    async fn create_call(&self, call: Call) -> StoreResult<()> {
        match self.calls.entry(call.call_sid.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "call {} already exists",
                call.call_sid
            ))),
            Entry::Vacant(slot) => {
                slot.insert(call);
                Ok(())
            }
        }
    }

    async fn get_call_by_ref(&self, call_sid: &str) -> StoreResult<Call> {
        self.calls
            .get(call_sid)
            .map(|c| c.clone())
            .ok_or_else(|| StoreError::NotFound(format!("call {call_sid}")))
    }

    async fn link_call_session(
        &self,
        call_sid: &str,
        session_id: &str,
        assistant_id: &str,
    ) -> StoreResult<()> {
        let mut call = self
            .calls
            .get_mut(call_sid)
            .ok_or_else(|| StoreError::NotFound(format!("call {call_sid}")))?;
        call.session_id = Some(session_id.to_string());
        call.assistant_id = Some(assistant_id.to_string());
        Ok(())
    }

    async fn update_call_status(
        &self,
        call_sid: &str,
        status: CallStatus,
        duration_secs: Option<u32>,
        answered_by: Option<String>,
    ) -> StoreResult<(StatusChange, Call)> {
        let mut call = self
            .calls
            .get_mut(call_sid)
            .ok_or_else(|| StoreError::NotFound(format!("call {call_sid}")))?;
        let change = call.apply_status(status, duration_secs);
        if answered_by.is_some() && call.answered_by.is_none() {
            call.answered_by = answered_by;
        }
        Ok((change, call.clone()))
    }

    async fn attach_recording(&self, call_sid: &str, recording: RecordingRef) -> StoreResult<()> {
        let mut call = self
            .calls
            .get_mut(call_sid)
            .ok_or_else(|| StoreError::NotFound(format!("call {call_sid}")))?;
        call.recording = Some(recording);
        Ok(())
    }

    async fn attach_transcription(&self, call_sid: &str, text: &str) -> StoreResult<()> {
        let mut call = self
            .calls
            .get_mut(call_sid)
            .ok_or_else(|| StoreError::NotFound(format!("call {call_sid}")))?;
        call.transcription = Some(text.to_string());
        Ok(())
    }

    async fn create_voicemail(&self, voicemail: Voicemail) -> StoreResult<()> {
        self.voicemails
            .entry(voicemail.call_sid.clone())
            .or_default()
            .push(voicemail);
        Ok(())
    }

    async fn attach_voicemail_transcription(&self, call_sid: &str, text: &str) -> StoreResult<()> {
        let mut voicemails = self
            .voicemails
            .get_mut(call_sid)
            .ok_or_else(|| StoreError::NotFound(format!("voicemail for call {call_sid}")))?;
        let latest = voicemails
            .last_mut()
            .ok_or_else(|| StoreError::NotFound(format!("voicemail for call {call_sid}")))?;
        latest.transcription = Some(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::assistant::AssistantConfig;
    use crate::store::{CallDirection, SessionStatus, TransportKind};

    fn session(id: &str) -> Session {
        Session::new(
            id,
            Arc::new(AssistantConfig::new("a1", "prompt")),
            TransportKind::Socket,
        )
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let store = MemoryStore::new();
        store.create_session(session("s1")).await.unwrap();
        assert!(store.create_session(session("s1")).await.is_err());

        assert!(store.end_session("s1").await.unwrap());
        assert!(!store.end_session("s1").await.unwrap());
        assert_eq!(
            store.get_session("s1").await.unwrap().status,
            SessionStatus::Ended
        );
        assert!(matches!(
            store.end_session("missing").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_messages_are_append_only_in_order() {
        let store = MemoryStore::new();
        store.create_session(session("s1")).await.unwrap();
        store.append_message("s1", Message::user("Hi")).await.unwrap();
        store
            .append_message("s1", Message::assistant("Hello!"))
            .await
            .unwrap();

        let messages = store.list_messages("s1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "Hi");
        assert_eq!(messages[1].content, "Hello!");

        assert!(store.append_message("nope", Message::user("x")).await.is_err());
    }

    #[tokio::test]
    async fn test_call_status_updates_are_monotonic() {
        let store = MemoryStore::new();
        store
            .create_call(Call::new("CA1", CallDirection::Inbound, "+1", "+2"))
            .await
            .unwrap();

        let (change, _) = store
            .update_call_status("CA1", CallStatus::Completed, Some(30), None)
            .await
            .unwrap();
        assert!(matches!(change, StatusChange::Applied { .. }));

        let (change, call) = store
            .update_call_status("CA1", CallStatus::Ringing, None, None)
            .await
            .unwrap();
        assert!(matches!(change, StatusChange::Ignored { .. }));
        assert_eq!(call.status, CallStatus::Completed);
    }

    #[tokio::test]
    async fn test_recording_attaches_after_terminal() {
        let store = MemoryStore::new();
        store
            .create_call(Call::new("CA1", CallDirection::Inbound, "+1", "+2"))
            .await
            .unwrap();
        store
            .update_call_status("CA1", CallStatus::Completed, None, None)
            .await
            .unwrap();
        store
            .attach_recording(
                "CA1",
                RecordingRef {
                    url: "https://rec/1".into(),
                    sid: Some("RE1".into()),
                    duration_secs: Some(12),
                },
            )
            .await
            .unwrap();

        let call = store.get_call_by_ref("CA1").await.unwrap();
        assert_eq!(call.recording.unwrap().url, "https://rec/1");
        assert_eq!(call.status, CallStatus::Completed);
    }

    #[tokio::test]
    async fn test_voicemail_transcription_targets_latest() {
        let store = MemoryStore::new();
        store
            .create_voicemail(Voicemail::new("CA1", "+1", "https://rec/a", Some(5)))
            .await
            .unwrap();
        store
            .create_voicemail(Voicemail::new("CA1", "+1", "https://rec/b", Some(7)))
            .await
            .unwrap();
        store
            .attach_voicemail_transcription("CA1", "call me back")
            .await
            .unwrap();

        let voicemails = store.voicemails_for("CA1");
        assert_eq!(voicemails[0].transcription, None);
        assert_eq!(voicemails[1].transcription.as_deref(), Some("call me back"));
        assert!(
            store
                .attach_voicemail_transcription("CA2", "x")
                .await
                .is_err()
        );
    }
}
