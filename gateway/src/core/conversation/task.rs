//! Session task and its handle.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::orchestrator::{
    Orchestrator, OrchestratorError, OrchestratorResult, StreamMode, TurnOutput,
};
use crate::core::stt::TranscriptEvent;

const COMMAND_BUFFER: usize = 32;

/// Output produced by the session task without a matching request,
/// i.e. from streaming transcription.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Interim {
        text: String,
        confidence: Option<f32>,
    },
    /// A final transcript completed a turn
    Reply(TurnOutput),
    /// A final transcript started a turn that failed
    TurnFailed(OrchestratorError),
}

type Reply<T> = oneshot::Sender<OrchestratorResult<T>>;

enum Command {
    Greeting(Reply<Option<TurnOutput>>),
    Text(String, Reply<TurnOutput>),
    Audio(Bytes, Reply<TurnOutput>),
    StreamStart(Reply<StreamMode>),
    StreamChunk(Bytes),
    StreamStop(Reply<Option<TurnOutput>>),
}

/// Reply to a queued command. Resolves to [`OrchestratorError::Ended`] if
/// the session ends before the command runs.
pub struct PendingReply<T>(oneshot::Receiver<OrchestratorResult<T>>);

impl<T> Future for PendingReply<T> {
    type Output = OrchestratorResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0)
            .poll(cx)
            .map(|r| r.unwrap_or(Err(OrchestratorError::Ended)))
    }
}

/// Cloneable handle to a running session task.
///
/// Commands are processed strictly in the order they are queued.
#[derive(Clone)]
pub struct OrchestratorHandle {
    session_id: Arc<str>,
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken,
    finished: watch::Receiver<bool>,
}

impl std::fmt::Debug for OrchestratorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorHandle")
            .field("session_id", &self.session_id)
            .field("ended", &self.is_ended())
            .finish()
    }
}

impl OrchestratorHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_ended(&self) -> bool {
        self.cancel.is_cancelled() || *self.finished.borrow()
    }

    async fn enqueue<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> OrchestratorResult<PendingReply<T>> {
        if self.cancel.is_cancelled() {
            return Err(OrchestratorError::Ended);
        }
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| OrchestratorError::Ended)?;
        Ok(PendingReply(rx))
    }

    pub async fn queue_greeting(&self) -> OrchestratorResult<PendingReply<Option<TurnOutput>>> {
        self.enqueue(Command::Greeting).await
    }

    pub async fn queue_text(&self, text: String) -> OrchestratorResult<PendingReply<TurnOutput>> {
        self.enqueue(|tx| Command::Text(text, tx)).await
    }

    pub async fn queue_audio(&self, audio: Bytes) -> OrchestratorResult<PendingReply<TurnOutput>> {
        self.enqueue(|tx| Command::Audio(audio, tx)).await
    }

    pub async fn queue_stream_start(&self) -> OrchestratorResult<PendingReply<StreamMode>> {
        self.enqueue(Command::StreamStart).await
    }

    pub async fn queue_stream_stop(
        &self,
    ) -> OrchestratorResult<PendingReply<Option<TurnOutput>>> {
        self.enqueue(Command::StreamStop).await
    }

    /// Queue a streamed audio chunk; there is no reply.
    pub async fn stream_chunk(&self, chunk: Bytes) -> OrchestratorResult<()> {
        if self.cancel.is_cancelled() {
            return Err(OrchestratorError::Ended);
        }
        self.commands
            .send(Command::StreamChunk(chunk))
            .await
            .map_err(|_| OrchestratorError::Ended)
    }

    pub async fn greeting(&self) -> OrchestratorResult<Option<TurnOutput>> {
        self.queue_greeting().await?.await
    }

    pub async fn send_text(&self, text: impl Into<String>) -> OrchestratorResult<TurnOutput> {
        self.queue_text(text.into()).await?.await
    }

    pub async fn send_audio(&self, audio: Bytes) -> OrchestratorResult<TurnOutput> {
        self.queue_audio(audio).await?.await
    }

    /// Stop accepting input, drop any in-flight turn, and wait for the
    /// orchestrator to close. Idempotent.
    pub async fn end(&self) {
        self.cancel.cancel();
        let mut finished = self.finished.clone();
        let _ = finished.wait_for(|done| *done).await;
    }
}

/// Spawn the task owning `orchestrator`.
///
/// The orchestrator should already be initialized. Streaming outputs are sent
/// to `events` when provided and discarded otherwise.
pub fn spawn_session(
    orchestrator: Orchestrator,
    events: Option<mpsc::Sender<SessionEvent>>,
) -> OrchestratorHandle {
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
    let (finished_tx, finished_rx) = watch::channel(false);
    let cancel = CancellationToken::new();
    let session_id: Arc<str> = Arc::from(orchestrator.session_id());

    tokio::spawn(run_session(
        orchestrator,
        commands_rx,
        events,
        cancel.clone(),
        finished_tx,
    ));

    OrchestratorHandle {
        session_id,
        commands: commands_tx,
        cancel,
        finished: finished_rx,
    }
}

async fn run_session(
    mut orchestrator: Orchestrator,
    mut commands: mpsc::Receiver<Command>,
    events: Option<mpsc::Sender<SessionEvent>>,
    cancel: CancellationToken,
    finished: watch::Sender<bool>,
) {
    let session_id = orchestrator.session_id().to_string();
    let mut transcripts: Option<mpsc::Receiver<TranscriptEvent>> = None;
    debug!(session_id = %session_id, "Session task started");

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            command = commands.recv() => {
                let Some(command) = command else { break };
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = execute(&mut orchestrator, command, &mut transcripts) => {}
                }
            }

            event = next_transcript(&mut transcripts) => {
                match event {
                    Some(TranscriptEvent::Interim { text, confidence }) => {
                        emit(&events, SessionEvent::Interim { text, confidence });
                    }
                    Some(TranscriptEvent::Final { text, .. }) => {
                        // Only a final transcript starts a turn
                        let outcome = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            result = orchestrator.handle_text_input(&text) => result,
                        };
                        let event = match outcome {
                            Ok(mut output) => {
                                output.transcription = Some(text);
                                SessionEvent::Reply(output)
                            }
                            Err(e) => SessionEvent::TurnFailed(e),
                        };
                        if let Some(tx) = &events
                            && tx.send(event).await.is_err()
                        {
                            debug!(session_id = %session_id, "Session event receiver dropped");
                        }
                    }
                    None => transcripts = None,
                }
            }
        }
    }

    // Results of anything still queued are discarded
    commands.close();
    orchestrator.end().await;
    let _ = finished.send(true);
    info!(session_id = %session_id, "Session task finished");
}

async fn execute(
    orchestrator: &mut Orchestrator,
    command: Command,
    transcripts: &mut Option<mpsc::Receiver<TranscriptEvent>>,
) {
    match command {
        Command::Greeting(reply) => {
            let _ = reply.send(orchestrator.greeting().await);
        }
        Command::Text(text, reply) => {
            let _ = reply.send(orchestrator.handle_text_input(&text).await);
        }
        Command::Audio(audio, reply) => {
            let _ = reply.send(orchestrator.handle_audio_input(audio).await);
        }
        Command::StreamStart(reply) => {
            let result = orchestrator.start_stream().await.map(|(mode, events)| {
                *transcripts = events;
                mode
            });
            let _ = reply.send(result);
        }
        Command::StreamChunk(chunk) => {
            if let Err(e) = orchestrator.feed_stream(chunk).await {
                warn!(
                    session_id = %orchestrator.session_id(),
                    error = %e,
                    "Failed to forward audio chunk"
                );
            }
        }
        Command::StreamStop(reply) => {
            let _ = reply.send(orchestrator.stop_stream().await);
        }
    }
}

async fn next_transcript(
    transcripts: &mut Option<mpsc::Receiver<TranscriptEvent>>,
) -> Option<TranscriptEvent> {
    match transcripts {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn emit(events: &Option<mpsc::Sender<SessionEvent>>, event: SessionEvent) {
    // Interims are advisory and never block the session
    if let Some(tx) = events {
        let _ = tx.try_send(event);
    }
}
