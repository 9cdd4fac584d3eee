use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::message::Message;
use crate::core::assistant::AssistantConfig;
use crate::core::llm::GenerationParams;
use crate::core::providers::{ProviderError, ProviderSet};
use crate::core::streaming::TranscriptionSession;
use crate::core::stt::TranscriptEvent;
use crate::store::ConversationStore;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrchestratorError {
    #[error("Conversation not initialized")]
    NotInitialized,

    #[error("Conversation has ended")]
    Ended,

    #[error("{0}")]
    Validation(String),

    /// Transcription succeeded but produced no text
    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Result of one completed turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutput {
    pub text: String,
    pub audio: Bytes,
    /// Recognized user speech when the turn started from audio
    pub transcription: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingInput,
    Transcribing,
    Generating,
    Synthesizing,
    Emitted,
    Ended,
}

/// How streamed user audio is turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// Provider live channel with interim and final events
    Live,
    /// Chunks are buffered and batch-transcribed when the stream stops
    Buffered,
}

enum AudioStream {
    Live(TranscriptionSession),
    Buffered(BytesMut),
}

/// Turn-taking state machine for one session.
///
/// Exclusively owned by its session task, so turns never overlap and the
/// history has a single writer. History entries are flushed to the store as
/// they are appended; the in-memory copy stays authoritative.
pub struct Orchestrator {
    session_id: String,
    assistant: Arc<AssistantConfig>,
    providers: ProviderSet,
    store: Arc<dyn ConversationStore>,
    history: Vec<Message>,
    state: TurnState,
    greeted: bool,
    stream: Option<AudioStream>,
}

impl Orchestrator {
    pub fn new(
        session_id: impl Into<String>,
        assistant: Arc<AssistantConfig>,
        providers: ProviderSet,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            assistant,
            providers,
            store,
            history: Vec::new(),
            state: TurnState::Idle,
            greeted: false,
            stream: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn assistant(&self) -> &Arc<AssistantConfig> {
        &self.assistant
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Seed the history with the system prompt. Repeated calls are no-ops.
    ///
    /// The prompt lives in the working history only; the store records
    /// conversation turns.
    pub async fn initialize(&mut self) -> OrchestratorResult<()> {
        match self.state {
            TurnState::Ended => return Err(OrchestratorError::Ended),
            TurnState::Idle => {}
            _ => return Ok(()),
        }

        self.history.push(Message::system(self.assistant.system_prompt.clone()));
        self.state = TurnState::AwaitingInput;

        info!(
            session_id = %self.session_id,
            assistant_id = %self.assistant.id,
            providers = ?self.providers,
            "Conversation initialized"
        );
        Ok(())
    }

    /// Speak the configured opening line, at most once per session.
    pub async fn greeting(&mut self) -> OrchestratorResult<Option<TurnOutput>> {
        self.ensure_ready()?;
        if self.greeted {
            return Ok(None);
        }
        self.greeted = true;

        let Some(text) = self.assistant.greeting().map(str::to_string) else {
            return Ok(None);
        };
        self.append(Message::assistant(text.clone())).await;

        self.state = TurnState::Synthesizing;
        let audio = self.synthesize(&text).await?;
        self.state = TurnState::AwaitingInput;

        Ok(Some(TurnOutput {
            text,
            audio,
            transcription: None,
        }))
    }

    /// Run one turn from user text.
    ///
    /// The user message is kept even when generation fails; the session
    /// stays usable and the caller may retry.
    pub async fn handle_text_input(&mut self, text: &str) -> OrchestratorResult<TurnOutput> {
        self.ensure_ready()?;
        let text = text.trim();
        if text.is_empty() {
            return Err(OrchestratorError::Validation(
                "Message text cannot be empty".to_string(),
            ));
        }

        self.append(Message::user(text)).await;

        self.state = TurnState::Generating;
        let params = GenerationParams::from(&self.assistant.model);
        let reply = match self.providers.llm.generate(&self.history, &params).await {
            Ok(reply) => reply,
            Err(e) => {
                self.state = TurnState::AwaitingInput;
                warn!(session_id = %self.session_id, error = %e, "Generation failed");
                return Err(e.into());
            }
        };
        self.append(Message::assistant(reply.clone())).await;

        self.state = TurnState::Synthesizing;
        let audio = self.synthesize(&reply).await?;

        self.state = TurnState::Emitted;
        debug!(
            session_id = %self.session_id,
            history_len = self.history.len(),
            "Turn completed"
        );
        self.state = TurnState::AwaitingInput;

        Ok(TurnOutput {
            text: reply,
            audio,
            transcription: None,
        })
    }

    /// Batch-transcribe user audio, then run a text turn with the result.
    pub async fn handle_audio_input(&mut self, audio: Bytes) -> OrchestratorResult<TurnOutput> {
        self.ensure_ready()?;
        if audio.is_empty() {
            return Err(OrchestratorError::Validation(
                "Audio data cannot be empty".to_string(),
            ));
        }

        self.state = TurnState::Transcribing;
        let transcript = match self
            .providers
            .stt
            .transcribe(audio, &self.assistant.transcriber)
            .await
        {
            Ok(t) => t.trim().to_string(),
            Err(e) => {
                self.state = TurnState::AwaitingInput;
                warn!(session_id = %self.session_id, error = %e, "Transcription failed");
                return Err(e.into());
            }
        };
        if transcript.is_empty() {
            self.state = TurnState::AwaitingInput;
            return Err(OrchestratorError::Transcription(
                "no speech detected".to_string(),
            ));
        }

        let mut output = self.handle_text_input(&transcript).await?;
        output.transcription = Some(transcript);
        Ok(output)
    }

    /// Begin accepting streamed audio.
    ///
    /// Returns the transcript event stream when the provider supports live
    /// transcription. Otherwise chunks are buffered until [`Self::stop_stream`].
    pub async fn start_stream(
        &mut self,
    ) -> OrchestratorResult<(StreamMode, Option<mpsc::Receiver<TranscriptEvent>>)> {
        self.ensure_ready()?;
        self.close_stream().await;

        match self.providers.streaming.clone() {
            Some(live) => {
                let mut session = TranscriptionSession::new(
                    self.session_id.clone(),
                    live,
                    self.assistant.transcriber.clone(),
                );
                let events = session.open().await?;
                self.stream = Some(AudioStream::Live(session));
                Ok((StreamMode::Live, Some(events)))
            }
            None => {
                debug!(session_id = %self.session_id, "Buffering streamed audio for batch transcription");
                self.stream = Some(AudioStream::Buffered(BytesMut::new()));
                Ok((StreamMode::Buffered, None))
            }
        }
    }

    /// Forward a streamed chunk. Chunks outside an open stream are ignored.
    pub async fn feed_stream(&mut self, chunk: Bytes) -> OrchestratorResult<()> {
        match self.stream.as_mut() {
            Some(AudioStream::Live(session)) => Ok(session.feed(chunk).await?),
            Some(AudioStream::Buffered(buffer)) => {
                buffer.extend_from_slice(&chunk);
                Ok(())
            }
            None => {
                warn!(
                    session_id = %self.session_id,
                    bytes = chunk.len(),
                    "Audio chunk received without an open stream, ignoring"
                );
                Ok(())
            }
        }
    }

    /// Close the audio stream.
    ///
    /// A live stream delivers its remaining finals on the event stream. A
    /// buffered stream is transcribed here and produces the turn directly.
    pub async fn stop_stream(&mut self) -> OrchestratorResult<Option<TurnOutput>> {
        match self.stream.take() {
            Some(AudioStream::Live(mut session)) => {
                session.close().await;
                Ok(None)
            }
            Some(AudioStream::Buffered(buffer)) if !buffer.is_empty() => {
                self.handle_audio_input(buffer.freeze()).await.map(Some)
            }
            Some(AudioStream::Buffered(_)) | None => Ok(None),
        }
    }

    /// Close the conversation. Idempotent.
    pub async fn end(&mut self) {
        if self.state == TurnState::Ended {
            return;
        }
        self.close_stream().await;
        self.state = TurnState::Ended;

        match self.store.end_session(&self.session_id).await {
            Ok(true) => info!(session_id = %self.session_id, "Session ended"),
            Ok(false) => {}
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Failed to mark session ended")
            }
        }
    }

    fn ensure_ready(&self) -> OrchestratorResult<()> {
        match self.state {
            TurnState::Idle => Err(OrchestratorError::NotInitialized),
            TurnState::Ended => Err(OrchestratorError::Ended),
            _ => Ok(()),
        }
    }

    async fn synthesize(&mut self, text: &str) -> OrchestratorResult<Bytes> {
        match self.providers.tts.synthesize(text, &self.assistant.voice).await {
            Ok(audio) => Ok(audio),
            Err(e) => {
                self.state = TurnState::AwaitingInput;
                warn!(session_id = %self.session_id, error = %e, "Synthesis failed");
                Err(e.into())
            }
        }
    }

    async fn close_stream(&mut self) {
        if let Some(AudioStream::Live(mut session)) = self.stream.take() {
            session.close().await;
        }
    }

    async fn append(&mut self, message: Message) {
        if let Err(e) = self
            .store
            .append_message(&self.session_id, message.clone())
            .await
        {
            warn!(
                session_id = %self.session_id,
                role = %message.role,
                error = %e,
                "Failed to persist message"
            );
        }
        self.history.push(message);
    }
}
