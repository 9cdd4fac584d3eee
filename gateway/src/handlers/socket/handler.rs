//! Conversation WebSocket handler
//!
//! One connection drives one session. Inbound frames are mapped to
//! orchestrator commands; replies are awaited in the order the commands were
//! queued so every input gets its answer in sequence, while streaming
//! transcription events are pushed as they arrive.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Extension,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::FuturesOrdered;
use futures::{FutureExt, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::core::conversation::{OrchestratorHandle, SessionEvent};
use crate::errors::{AppError, AppResult};
use crate::handlers::session::start_conversation;
use crate::middleware::ClientIp;
use crate::state::AppState;
use crate::store::{Session, TransportKind};
use crate::utils::audio::decode_audio;

use super::messages::{IncomingMessage, MessageRoute, OutgoingMessage};

/// Optimized channel buffer size for audio workloads
const CHANNEL_BUFFER_SIZE: usize = 1024;

const EVENT_BUFFER_SIZE: usize = 64;

/// Time allowed for queued outgoing messages to flush on close
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

type PendingMessages = FuturesOrdered<BoxFuture<'static, ReplyBatch>>;

/// Replies owed to one inbound message.
struct ReplyBatch {
    messages: Vec<OutgoingMessage>,
    /// Set when the reply settles whether the audio stream is open
    stream_open: Option<bool>,
}

impl From<Vec<OutgoingMessage>> for ReplyBatch {
    fn from(messages: Vec<OutgoingMessage>) -> Self {
        Self {
            messages,
            stream_open: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SocketParams {
    pub assistant_id: Option<String>,
}

/// How the connection loop should proceed after a frame.
enum FrameOutcome {
    Continue,
    /// Client asked to end the session, or the session is gone
    End,
    Disconnected,
}

/// `GET /ws?assistant_id=...`
///
/// Upgrades to the conversation socket. The connection slot reserved by the
/// connection limit middleware is released when the socket closes.
pub async fn socket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<SocketParams>,
    client_ip: Option<Extension<ClientIp>>,
) -> Response {
    let max_message_bytes = state.config.conversation.max_message_bytes;
    info!(assistant_id = ?params.assistant_id, "Conversation WebSocket upgrade requested");

    ws.max_frame_size(max_message_bytes)
        .max_message_size(max_message_bytes)
        .on_upgrade(move |socket| async move {
            handle_socket(socket, state.clone(), params.assistant_id).await;
            if let Some(Extension(ClientIp(ip))) = client_ip {
                state.release_connection(ip);
            }
        })
}

async fn open_session(
    state: &Arc<AppState>,
    assistant_id: Option<&str>,
    session_id: &str,
    events: mpsc::Sender<SessionEvent>,
) -> AppResult<OrchestratorHandle> {
    let assistant_id = assistant_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Validation("assistant_id is required".to_string()))?;
    let assistant = state
        .directory
        .assistant(assistant_id)
        .ok_or_else(|| AppError::NotFound(format!("Assistant {assistant_id}")))?;

    let session = Session::new(session_id, assistant, TransportKind::Socket);
    start_conversation(state, session, session_id, Some(events)).await
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, assistant_id: Option<String>) {
    let (mut sender, mut receiver) = socket.split();
    let (message_tx, mut message_rx) = mpsc::channel::<MessageRoute>(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing messages
    let sender_task = tokio::spawn(async move {
        while let Some(route) = message_rx.recv().await {
            let result = match route {
                MessageRoute::Outgoing(message) => match serde_json::to_string(&message) {
                    Ok(json) => sender.send(Message::Text(json.into())).await,
                    Err(e) => {
                        error!("Failed to serialize outgoing message: {}", e);
                        continue;
                    }
                },
                MessageRoute::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };

            if let Err(e) = result {
                debug!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
    });

    let session_id = uuid::Uuid::new_v4().to_string();
    let (events_tx, mut events_rx) = mpsc::channel::<SessionEvent>(EVENT_BUFFER_SIZE);

    let handle = match open_session(&state, assistant_id.as_deref(), &session_id, events_tx).await
    {
        Ok(handle) => handle,
        Err(e) => {
            warn!(assistant_id = ?assistant_id, error = %e, "Rejecting conversation socket");
            let _ = message_tx
                .send(MessageRoute::Outgoing(OutgoingMessage::error(e.to_string())))
                .await;
            let _ = message_tx.send(MessageRoute::Close).await;
            let _ = tokio::time::timeout(FLUSH_TIMEOUT, sender_task).await;
            return;
        }
    };

    send(
        &message_tx,
        OutgoingMessage::Connected {
            session_id: session_id.clone(),
        },
    )
    .await;

    let mut pending: PendingMessages = FuturesOrdered::new();
    match handle.queue_greeting().await {
        Ok(reply) => pending.push_back(
            async move {
                match reply.await {
                    Ok(Some(output)) => vec![output.into()],
                    Ok(None) => Vec::new(),
                    Err(e) => vec![OutgoingMessage::error(e.to_string())],
                }
            }
            .map(ReplyBatch::from)
            .boxed(),
        ),
        Err(e) => warn!(session_id = %session_id, error = %e, "Failed to queue greeting"),
    }

    let idle_timeout = state.config.conversation.socket_idle_timeout();
    let idle = tokio::time::sleep(idle_timeout);
    tokio::pin!(idle);
    let mut streaming = false;

    let client_ended = loop {
        select! {
            frame = receiver.next() => {
                idle.as_mut().reset(Instant::now() + idle_timeout);

                match frame {
                    Some(Ok(msg)) => {
                        match process_frame(msg, &handle, &mut pending, &mut streaming, &message_tx).await {
                            FrameOutcome::Continue => {}
                            FrameOutcome::End => break true,
                            FrameOutcome::Disconnected => break false,
                        }
                    }
                    Some(Err(e)) => {
                        warn!(session_id = %session_id, "WebSocket error: {}", e);
                        break false;
                    }
                    None => {
                        info!(session_id = %session_id, "WebSocket connection closed by client");
                        break false;
                    }
                }
            }
            Some(batch) = pending.next(), if !pending.is_empty() => {
                if let Some(open) = batch.stream_open {
                    streaming = open;
                }
                for message in batch.messages {
                    send(&message_tx, message).await;
                }
            }
            Some(event) = events_rx.recv() => {
                send(&message_tx, event.into()).await;
            }
            _ = &mut idle => {
                warn!(
                    session_id = %session_id,
                    idle_secs = idle_timeout.as_secs(),
                    "WebSocket connection idle, closing"
                );
                send(&message_tx, OutgoingMessage::error("Connection closed due to inactivity")).await;
                break true;
            }
        }
    };

    // Replies still outstanding are discarded with the pending set
    drop(pending);
    if !state.registry.release(&session_id).await {
        handle.end().await;
    }

    if client_ended {
        send(&message_tx, OutgoingMessage::SessionEnded).await;
        let _ = message_tx.send(MessageRoute::Close).await;
        let _ = tokio::time::timeout(FLUSH_TIMEOUT, sender_task).await;
    } else {
        sender_task.abort();
    }

    info!(session_id = %session_id, "Conversation WebSocket terminated");
}

async fn send(message_tx: &mpsc::Sender<MessageRoute>, message: OutgoingMessage) {
    if message_tx.send(MessageRoute::Outgoing(message)).await.is_err() {
        debug!("Sender task stopped, dropping outgoing message");
    }
}

/// Process one inbound WebSocket frame
async fn process_frame(
    msg: Message,
    handle: &OrchestratorHandle,
    pending: &mut PendingMessages,
    streaming: &mut bool,
    message_tx: &mpsc::Sender<MessageRoute>,
) -> FrameOutcome {
    match msg {
        Message::Text(text) => {
            let incoming: IncomingMessage = match serde_json::from_str(&text) {
                Ok(msg) => msg,
                Err(e) => {
                    warn!(session_id = %handle.session_id(), "Failed to parse socket message: {}", e);
                    send(message_tx, OutgoingMessage::error(format!("Invalid message format: {e}")))
                        .await;
                    return FrameOutcome::Continue;
                }
            };

            if let Err(e) = incoming.validate() {
                send(message_tx, OutgoingMessage::error(e)).await;
                return FrameOutcome::Continue;
            }

            dispatch(incoming, handle, pending, streaming, message_tx).await
        }
        Message::Binary(data) => {
            if !*streaming {
                warn!(
                    session_id = %handle.session_id(),
                    bytes = data.len(),
                    "Binary frame without an open audio stream, dropping"
                );
                return FrameOutcome::Continue;
            }
            forward_chunk(handle, data, message_tx).await
        }
        Message::Ping(_) | Message::Pong(_) => FrameOutcome::Continue,
        Message::Close(_) => {
            info!(session_id = %handle.session_id(), "WebSocket close received");
            FrameOutcome::Disconnected
        }
    }
}

async fn dispatch(
    msg: IncomingMessage,
    handle: &OrchestratorHandle,
    pending: &mut PendingMessages,
    streaming: &mut bool,
    message_tx: &mpsc::Sender<MessageRoute>,
) -> FrameOutcome {
    let queued = match msg {
        IncomingMessage::UserMessage { text } => handle.queue_text(text).await.map(|reply| {
            async move {
                match reply.await {
                    Ok(output) => vec![output.into()],
                    Err(e) => vec![OutgoingMessage::error(e.to_string())],
                }
            }
            .map(ReplyBatch::from)
            .boxed()
        }),
        IncomingMessage::UserAudio { data } => {
            let audio = match decode_audio(&data) {
                Ok(audio) => audio,
                Err(e) => {
                    send(message_tx, OutgoingMessage::error(format!("Invalid audio data: {e}")))
                        .await;
                    return FrameOutcome::Continue;
                }
            };
            handle.queue_audio(audio).await.map(|reply| {
                async move {
                    match reply.await {
                        Ok(output) => vec![output.into()],
                        Err(e) => vec![OutgoingMessage::error(e.to_string())],
                    }
                }
                .map(ReplyBatch::from)
                .boxed()
            })
        }
        IncomingMessage::UserAudioStreamStart => {
            // Chunks sent before the ready reply are forwarded; a failed open resets this
            *streaming = true;
            handle.queue_stream_start().await.map(|reply| {
                async move {
                    match reply.await {
                        Ok(mode) => {
                            debug!(?mode, "Audio stream opened");
                            ReplyBatch {
                                messages: vec![OutgoingMessage::AudioStreamReady],
                                stream_open: Some(true),
                            }
                        }
                        Err(e) => ReplyBatch {
                            messages: vec![OutgoingMessage::error(e.to_string())],
                            stream_open: Some(false),
                        },
                    }
                }
                .boxed()
            })
        }
        IncomingMessage::UserAudioStreamChunk { data } => {
            return match decode_audio(&data) {
                Ok(chunk) => forward_chunk(handle, chunk, message_tx).await,
                Err(e) => {
                    send(message_tx, OutgoingMessage::error(format!("Invalid audio data: {e}")))
                        .await;
                    FrameOutcome::Continue
                }
            };
        }
        IncomingMessage::UserAudioStreamEnd => {
            *streaming = false;
            handle.queue_stream_stop().await.map(|reply| {
                async move {
                    match reply.await {
                        Ok(Some(output)) => vec![OutgoingMessage::AudioStreamClosed, output.into()],
                        Ok(None) => vec![OutgoingMessage::AudioStreamClosed],
                        Err(e) => vec![
                            OutgoingMessage::AudioStreamClosed,
                            OutgoingMessage::error(e.to_string()),
                        ],
                    }
                }
                .map(|messages| ReplyBatch {
                    messages,
                    stream_open: Some(false),
                })
                .boxed()
            })
        }
        IncomingMessage::EndSession => {
            info!(session_id = %handle.session_id(), "Client requested session end");
            return FrameOutcome::End;
        }
    };

    match queued {
        Ok(reply) => {
            pending.push_back(reply);
            FrameOutcome::Continue
        }
        Err(e) => {
            send(message_tx, OutgoingMessage::error(e.to_string())).await;
            FrameOutcome::End
        }
    }
}

async fn forward_chunk(
    handle: &OrchestratorHandle,
    chunk: Bytes,
    message_tx: &mpsc::Sender<MessageRoute>,
) -> FrameOutcome {
    match handle.stream_chunk(chunk).await {
        Ok(()) => FrameOutcome::Continue,
        Err(e) => {
            send(message_tx, OutgoingMessage::error(e.to_string())).await;
            FrameOutcome::End
        }
    }
}
