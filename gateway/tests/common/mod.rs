//! Shared fixtures for integration tests.
//!
//! Scripted provider fakes, a static provider factory, and an application
//! builder wiring them into the real routers.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tower::util::ServiceExt;

use waav_conversation::core::assistant::{
    AssistantConfig, PhoneNumberConfig, TranscriberSettings, VoiceSettings,
};
use waav_conversation::core::conversation::Message;
use waav_conversation::core::llm::{GenerationParams, LanguageModel};
use waav_conversation::core::providers::{
    ProviderError, ProviderFactory, ProviderResult, ProviderSet,
};
use waav_conversation::core::stt::{
    LiveChannel, LiveInput, LiveSink, StreamingTranscriber, TranscriptEvent, Transcriber,
};
use waav_conversation::core::telephony::{OutboundCall, PlacedCall, TelephonyProvider};
use waav_conversation::core::tts::SpeechSynthesizer;
use waav_conversation::{
    AppComponents, AppState, ConfigDirectory, ServerConfig, routes, store::MemoryStore,
};

pub const ASSISTANT_ID: &str = "support";
pub const ASSISTANT_NUMBER: &str = "+15550100100";

/// Language model replaying queued results, then echoing the last turn.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ProviderResult<String>>>,
    calls: Mutex<usize>,
}

impl ScriptedModel {
    pub fn push(&self, reply: ProviderResult<String>) {
        self.replies.lock().push_back(reply);
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(
        &self,
        messages: &[Message],
        _params: &GenerationParams,
    ) -> ProviderResult<String> {
        *self.calls.lock() += 1;
        let scripted = self.replies.lock().pop_front();
        scripted.unwrap_or_else(|| {
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(format!("You said: {last}"))
        })
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

/// Synthesizer producing `AUDIO:<text>`.
pub struct FakeSynth;

#[async_trait]
impl SpeechSynthesizer for FakeSynth {
    async fn synthesize(&self, text: &str, _voice: &VoiceSettings) -> ProviderResult<Bytes> {
        Ok(Bytes::from(format!("AUDIO:{text}")))
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

/// Batch transcriber returning a fixed transcript.
pub struct FakeTranscriber(pub &'static str);

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(
        &self,
        _audio: Bytes,
        _settings: &TranscriberSettings,
    ) -> ProviderResult<String> {
        Ok(self.0.to_string())
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

/// Live transcriber that hears each audio chunk as UTF-8 words.
///
/// Every chunk extends the utterance and is reported as an interim; the
/// utterance is finalized when the sink finishes.
#[derive(Default)]
pub struct EchoLive {
    pub fail_connects: AtomicBool,
}

#[async_trait]
impl StreamingTranscriber for EchoLive {
    async fn connect(&self, _settings: &TranscriberSettings) -> ProviderResult<LiveChannel> {
        if self.fail_connects.load(Ordering::SeqCst) {
            return Err(ProviderError::ConnectionFailed("unreachable".into()));
        }

        let (input_tx, mut input_rx) = mpsc::channel::<LiveInput>(64);
        let (event_tx, event_rx) = mpsc::channel::<TranscriptEvent>(64);
        tokio::spawn(async move {
            let mut heard: Vec<String> = Vec::new();
            while let Some(input) = input_rx.recv().await {
                match input {
                    LiveInput::Audio(chunk) => {
                        heard.push(String::from_utf8_lossy(&chunk).trim().to_string());
                        let event = TranscriptEvent::Interim {
                            text: heard.join(" "),
                            confidence: Some(0.8),
                        };
                        if event_tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    LiveInput::Finish => break,
                }
            }
            if !heard.is_empty() {
                let _ = event_tx
                    .send(TranscriptEvent::Final {
                        text: heard.join(" "),
                        confidence: Some(0.9),
                    })
                    .await;
            }
        });

        Ok(LiveChannel {
            sink: LiveSink::new(input_tx, Arc::new(AtomicBool::new(true))),
            events: event_rx,
        })
    }

    fn provider_name(&self) -> &'static str {
        "echo-live"
    }
}

/// Factory handing every session the same adapters.
pub struct StaticProviderFactory(pub ProviderSet);

impl ProviderFactory for StaticProviderFactory {
    fn build(&self, _assistant: &AssistantConfig) -> ProviderResult<ProviderSet> {
        Ok(self.0.clone())
    }
}

/// Telephony provider recording placed calls.
#[derive(Default)]
pub struct RecordingTelephony {
    pub placed: Mutex<Vec<OutboundCall>>,
}

#[async_trait]
impl TelephonyProvider for RecordingTelephony {
    async fn place_call(&self, call: &OutboundCall) -> ProviderResult<PlacedCall> {
        if call.to.ends_with("0000") {
            return Err(ProviderError::Api {
                status: 400,
                message: "invalid number".to_string(),
            });
        }
        self.placed.lock().push(call.clone());
        Ok(PlacedCall {
            sid: format!("CA-out-{}", self.placed.lock().len()),
            status: Some("queued".to_string()),
        })
    }
}

pub fn test_assistant() -> AssistantConfig {
    let mut assistant = AssistantConfig::new(ASSISTANT_ID, "You are a helpful support agent.");
    assistant.first_message = Some("Hello".to_string());
    assistant.end_call_phrases = vec!["goodbye".to_string()];
    assistant
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        rate_limit_requests_per_second: 100000,
        assistants: vec![test_assistant()],
        phone_numbers: vec![PhoneNumberConfig {
            number: ASSISTANT_NUMBER.to_string(),
            assistant_id: ASSISTANT_ID.to_string(),
        }],
        ..ServerConfig::default()
    }
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub model: Arc<ScriptedModel>,
    pub telephony: Arc<RecordingTelephony>,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Self::build(config, None)
    }

    /// Application whose sessions stream audio to a live transcriber.
    pub fn with_live_transcriber(live: Arc<dyn StreamingTranscriber>) -> Self {
        let mut config = test_config();
        // Utterances end when the client closes the stream
        config.assistants[0].transcriber.silence_threshold_ms = 10_000;
        Self::build(config, Some(live))
    }

    fn build(config: ServerConfig, streaming: Option<Arc<dyn StreamingTranscriber>>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let model = Arc::new(ScriptedModel::default());
        let telephony = Arc::new(RecordingTelephony::default());
        let providers = ProviderSet {
            llm: model.clone(),
            tts: Arc::new(FakeSynth),
            stt: Arc::new(FakeTranscriber("hello from audio")),
            streaming,
        };

        let components = AppComponents {
            store: store.clone(),
            directory: Arc::new(ConfigDirectory::new(
                config.assistants.clone(),
                config.phone_numbers.clone(),
            )),
            providers: Arc::new(StaticProviderFactory(providers)),
            telephony: Some(telephony.clone()),
        };
        let state = AppState::with_components(config, components);
        let router = routes::create_router(state.clone());

        Self {
            state,
            store,
            model,
            telephony,
            router,
        }
    }

    pub async fn post_form(&self, uri: &str, body: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> (StatusCode, String) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Bytes) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body)
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, String) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&body).into_owned())
    }
}
