use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::core::assistant::TranscriberSettings;
use crate::core::providers::{ProviderError, ProviderResult};

/// Output of a live transcription channel.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEvent {
    /// Provisional text. Advisory only, never starts a turn.
    Interim {
        text: String,
        confidence: Option<f32>,
    },
    /// Settled utterance text.
    Final {
        text: String,
        confidence: Option<f32>,
    },
}

impl TranscriptEvent {
    pub fn text(&self) -> &str {
        match self {
            Self::Interim { text, .. } | Self::Final { text, .. } => text,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::Final { .. })
    }
}

/// Input accepted by a live channel's connection task.
#[derive(Debug)]
pub enum LiveInput {
    Audio(Bytes),
    /// Flush pending audio and close the provider stream
    Finish,
}

/// Write half of a live transcription channel.
#[derive(Debug, Clone)]
pub struct LiveSink {
    tx: mpsc::Sender<LiveInput>,
    open: Arc<AtomicBool>,
}

impl LiveSink {
    pub fn new(tx: mpsc::Sender<LiveInput>, open: Arc<AtomicBool>) -> Self {
        Self { tx, open }
    }

    pub async fn send_audio(&self, chunk: Bytes) -> ProviderResult<()> {
        if !self.is_open() {
            return Err(ProviderError::ConnectionFailed(
                "Live transcription channel is closed".to_string(),
            ));
        }
        self.tx.send(LiveInput::Audio(chunk)).await.map_err(|_| {
            self.open.store(false, Ordering::Release);
            ProviderError::ConnectionFailed("Live transcription channel dropped".to_string())
        })
    }

    /// Ask the provider to flush and close. Safe to call on a dropped channel.
    pub async fn finish(&self) {
        let _ = self.tx.send(LiveInput::Finish).await;
    }

    /// Whether the provider connection is still up.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.tx.is_closed()
    }
}

/// A connected live transcription channel: an audio sink plus its event stream.
#[derive(Debug)]
pub struct LiveChannel {
    pub sink: LiveSink,
    pub events: mpsc::Receiver<TranscriptEvent>,
}

/// Batch transcription: whole utterance in, text out.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio: Bytes,
        settings: &TranscriberSettings,
    ) -> ProviderResult<String>;

    fn provider_name(&self) -> &'static str;
}

/// Live transcription: opens a channel that yields interim and final events.
#[async_trait]
pub trait StreamingTranscriber: Send + Sync {
    async fn connect(&self, settings: &TranscriberSettings) -> ProviderResult<LiveChannel>;

    fn provider_name(&self) -> &'static str;
}
