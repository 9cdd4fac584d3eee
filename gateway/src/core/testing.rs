//! Scripted provider fakes for unit tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::core::assistant::{TranscriberSettings, VoiceSettings};
use crate::core::conversation::Message;
use crate::core::llm::{GenerationParams, LanguageModel};
use crate::core::providers::{ProviderError, ProviderResult, ProviderSet};
use crate::core::stt::{
    LiveChannel, LiveInput, LiveSink, StreamingTranscriber, TranscriptEvent, Transcriber,
};
use crate::core::tts::SpeechSynthesizer;

/// Language model that replays queued results, then echoes the last user turn.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ProviderResult<String>>>,
    calls: Mutex<Vec<Vec<Message>>>,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, reply: ProviderResult<String>) {
        self.replies.lock().push_back(reply);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Histories passed to each `generate` call.
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(
        &self,
        messages: &[Message],
        _params: &GenerationParams,
    ) -> ProviderResult<String> {
        self.calls.lock().push(messages.to_vec());
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.replies.lock().pop_front();
        match scripted {
            Some(reply) => reply,
            None => {
                let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
                Ok(format!("You said: {last}"))
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

/// Synthesizer producing `AUDIO:<text>` bytes.
#[derive(Default)]
pub struct FakeSynth {
    fail: AtomicBool,
}

impl FakeSynth {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynth {
    async fn synthesize(&self, text: &str, _voice: &VoiceSettings) -> ProviderResult<Bytes> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("synthesis down".into()));
        }
        Ok(Bytes::from(format!("AUDIO:{text}")))
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

/// Batch transcriber returning a fixed transcript.
pub struct FakeTranscriber {
    transcript: Mutex<String>,
}

impl FakeTranscriber {
    pub fn new(transcript: &str) -> Arc<Self> {
        Arc::new(Self {
            transcript: Mutex::new(transcript.to_string()),
        })
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(
        &self,
        _audio: Bytes,
        _settings: &TranscriberSettings,
    ) -> ProviderResult<String> {
        Ok(self.transcript.lock().clone())
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

/// Test-side control of one fake live connection.
#[derive(Clone)]
pub struct LiveScript {
    events: mpsc::UnboundedSender<TranscriptEvent>,
    audio: Arc<Mutex<Vec<Bytes>>>,
    open: Arc<AtomicBool>,
}

impl LiveScript {
    pub fn emit(&self, event: TranscriptEvent) {
        let _ = self.events.send(event);
    }

    pub fn received_audio(&self) -> Vec<Bytes> {
        self.audio.lock().clone()
    }

    /// Simulate the provider dropping the connection.
    pub fn drop_connection(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

/// Live transcriber whose connections are driven by [`LiveScript`] handles.
pub struct FakeLive {
    connects: AtomicUsize,
    fail: AtomicBool,
    scripts: mpsc::UnboundedSender<LiveScript>,
}

impl FakeLive {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<LiveScript>) {
        let (scripts, scripts_rx) = mpsc::unbounded_channel();
        let live = Arc::new(Self {
            connects: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            scripts,
        });
        (live, scripts_rx)
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn fail_connects(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StreamingTranscriber for FakeLive {
    async fn connect(&self, _settings: &TranscriberSettings) -> ProviderResult<LiveChannel> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::ConnectionFailed("unreachable".into()));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);

        let (input_tx, mut input_rx) = mpsc::channel::<LiveInput>(64);
        let (event_tx, event_rx) = mpsc::channel::<TranscriptEvent>(64);
        let (script_tx, mut script_rx) = mpsc::unbounded_channel::<TranscriptEvent>();
        let open = Arc::new(AtomicBool::new(true));
        let audio = Arc::new(Mutex::new(Vec::new()));

        let task_audio = audio.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    input = input_rx.recv() => match input {
                        Some(LiveInput::Audio(chunk)) => task_audio.lock().push(chunk),
                        Some(LiveInput::Finish) | None => break,
                    },
                    Some(event) = script_rx.recv() => {
                        if event_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let _ = self.scripts.send(LiveScript {
            events: script_tx,
            audio,
            open: open.clone(),
        });

        Ok(LiveChannel {
            sink: LiveSink::new(input_tx, open),
            events: event_rx,
        })
    }

    fn provider_name(&self) -> &'static str {
        "fake-live"
    }
}

pub fn provider_set(
    llm: Arc<ScriptedModel>,
    tts: Arc<FakeSynth>,
    stt: Arc<FakeTranscriber>,
    streaming: Option<Arc<FakeLive>>,
) -> ProviderSet {
    ProviderSet {
        llm,
        tts,
        stt,
        streaming: streaming.map(|s| s as Arc<dyn StreamingTranscriber>),
    }
}
