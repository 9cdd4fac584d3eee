//! Streaming transcription session.
//!
//! A [`TranscriptionSession`] wraps a provider's live channel with an explicit
//! `Closed → Open → Closed` lifecycle. While open, a pump task forwards the
//! provider's interim and final events into a stream owned by the consumer
//! and promotes a pending interim to final after the configured silence
//! window. The consumer's stream survives provider reconnects.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

use crate::core::assistant::TranscriberSettings;
use crate::core::providers::ProviderResult;
use crate::core::stt::{LiveSink, StreamingTranscriber, TranscriptEvent};

/// Capacity of the consumer-facing event stream
const EVENT_BUFFER: usize = 64;
/// Upper bound on waiting for the provider to flush on close
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Closed,
    Open,
}

pub struct TranscriptionSession {
    session_id: String,
    provider: Arc<dyn StreamingTranscriber>,
    settings: TranscriberSettings,
    state: StreamState,
    sink: Option<LiveSink>,
    pump: Option<JoinHandle<()>>,
    /// Sender side of the consumer stream; dropped on close to end it
    events_tx: Option<mpsc::Sender<TranscriptEvent>>,
}

impl TranscriptionSession {
    pub fn new(
        session_id: impl Into<String>,
        provider: Arc<dyn StreamingTranscriber>,
        settings: TranscriberSettings,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            provider,
            settings,
            state: StreamState::Closed,
            sink: None,
            pump: None,
            events_tx: None,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == StreamState::Open
    }

    /// Open the live channel and return the event stream for this open period.
    ///
    /// Opening an already open session closes the previous period first.
    pub async fn open(&mut self) -> ProviderResult<mpsc::Receiver<TranscriptEvent>> {
        if self.is_open() {
            self.close().await;
        }

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        self.connect_channel(events_tx.clone()).await?;
        self.events_tx = Some(events_tx);
        self.state = StreamState::Open;

        info!(
            session_id = %self.session_id,
            provider = self.provider.provider_name(),
            "Streaming transcription opened"
        );
        Ok(events_rx)
    }

    /// Forward an audio chunk to the provider.
    ///
    /// A chunk fed while closed is dropped with a warning. A provider channel
    /// that dropped while open is reconnected before forwarding.
    pub async fn feed(&mut self, chunk: Bytes) -> ProviderResult<()> {
        if !self.is_open() {
            warn!(
                session_id = %self.session_id,
                bytes = chunk.len(),
                "Audio chunk received while transcription stream is closed, ignoring"
            );
            return Ok(());
        }
        if chunk.is_empty() {
            return Ok(());
        }

        let needs_reconnect = self.sink.as_ref().is_none_or(|sink| !sink.is_open());
        if needs_reconnect {
            self.reconnect().await?;
        }

        let Some(sink) = self.sink.as_ref() else {
            return Ok(());
        };
        if sink.send_audio(chunk.clone()).await.is_err() {
            // Dropped between the liveness check and the send
            self.reconnect().await?;
            if let Some(sink) = self.sink.as_ref() {
                sink.send_audio(chunk).await?;
            }
        }
        Ok(())
    }

    /// Flush the provider, deliver remaining events, and release resources.
    ///
    /// Idempotent; later `feed` calls are no-ops.
    pub async fn close(&mut self) {
        if !self.is_open() {
            return;
        }
        self.state = StreamState::Closed;

        if let Some(sink) = self.sink.take() {
            sink.finish().await;
        }
        // Dropping our sender lets the stream end once the pump exits
        self.events_tx = None;
        if let Some(pump) = self.pump.take()
            && timeout(CLOSE_FLUSH_TIMEOUT, pump).await.is_err()
        {
            warn!(session_id = %self.session_id, "Transcription flush timed out");
        }

        info!(session_id = %self.session_id, "Streaming transcription closed");
    }

    async fn reconnect(&mut self) -> ProviderResult<()> {
        info!(
            session_id = %self.session_id,
            "Live transcription channel dropped, reconnecting"
        );
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.sink = None;
        let Some(events_tx) = self.events_tx.clone() else {
            return Ok(());
        };
        self.connect_channel(events_tx).await
    }

    async fn connect_channel(&mut self, events_tx: mpsc::Sender<TranscriptEvent>) -> ProviderResult<()> {
        let channel = self.provider.connect(&self.settings).await?;
        let silence = Duration::from_millis(self.settings.silence_threshold_ms.max(1));
        self.pump = Some(tokio::spawn(pump_events(
            self.session_id.clone(),
            channel.events,
            events_tx,
            silence,
        )));
        self.sink = Some(channel.sink);
        Ok(())
    }
}

impl Drop for TranscriptionSession {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

/// Forward provider events to the consumer, finalizing on silence.
///
/// Providers keep accumulating an utterance after the silence window fires,
/// so text already promoted here is stripped from later provider events until
/// the provider closes that utterance itself.
async fn pump_events(
    session_id: String,
    mut provider_events: mpsc::Receiver<TranscriptEvent>,
    out: mpsc::Sender<TranscriptEvent>,
    silence: Duration,
) {
    let mut pending: Option<PendingInterim> = None;
    let mut promoted: Option<String> = None;
    let deadline = sleep(silence);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            event = provider_events.recv() => {
                match event {
                    Some(TranscriptEvent::Interim { text, confidence }) => {
                        let unheard = strip_promoted(promoted.as_deref(), &text);
                        if unheard.is_empty() {
                            continue;
                        }
                        deadline.as_mut().reset(Instant::now() + silence);
                        pending = Some(PendingInterim {
                            full: text,
                            unheard: unheard.clone(),
                            confidence,
                        });
                        // Interims are advisory; drop them rather than block the feed path
                        match out.try_send(TranscriptEvent::Interim { text: unheard, confidence }) {
                            Err(TrySendError::Closed(_)) => return,
                            Err(TrySendError::Full(_)) => {
                                debug!(session_id = %session_id, "Interim transcript dropped, consumer lagging");
                            }
                            Ok(()) => {}
                        }
                    }
                    Some(TranscriptEvent::Final { text, confidence }) => {
                        pending = None;
                        let unheard = strip_promoted(promoted.take().as_deref(), &text);
                        if unheard.is_empty() {
                            debug!(session_id = %session_id, "Provider final already delivered on silence, skipping");
                            continue;
                        }
                        if out.send(TranscriptEvent::Final { text: unheard, confidence }).await.is_err() {
                            return;
                        }
                    }
                    None => break,
                }
            }

            _ = &mut deadline, if pending.is_some() => {
                if let Some(interim) = pending.take() {
                    debug!(session_id = %session_id, "Silence threshold reached, finalizing transcript");
                    promoted = Some(interim.full);
                    let event = TranscriptEvent::Final {
                        text: interim.unheard,
                        confidence: interim.confidence,
                    };
                    if out.send(event).await.is_err() {
                        return;
                    }
                }
            }
        }
    }

    // Provider channel ended with speech still pending
    if let Some(interim) = pending.take() {
        let _ = out
            .send(TranscriptEvent::Final {
                text: interim.unheard,
                confidence: interim.confidence,
            })
            .await;
    }
}

struct PendingInterim {
    /// Text as the provider reported it
    full: String,
    /// Portion not yet delivered as a final
    unheard: String,
    confidence: Option<f32>,
}

/// Remove an already finalized prefix from a provider transcript.
///
/// The prefix only counts when it ends on a word boundary.
fn strip_promoted(promoted: Option<&str>, text: &str) -> String {
    let text = text.trim();
    let Some(prefix) = promoted.map(str::trim).filter(|p| !p.is_empty()) else {
        return text.to_string();
    };
    match text.strip_prefix(prefix) {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => {
            rest.trim().to_string()
        }
        _ => text.to_string(),
    }
}
