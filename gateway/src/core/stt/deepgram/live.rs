use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};
use url::Url;

use super::DEFAULT_MODEL;
use super::messages::{ControlMessage, DeepgramMessage};
use crate::core::assistant::TranscriberSettings;
use crate::core::providers::{ProviderError, ProviderResult};
use crate::core::stt::{LiveChannel, LiveInput, LiveSink, StreamingTranscriber, TranscriptEvent};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(8);
/// Minimum `utterance_end_ms` accepted by Deepgram
const MIN_UTTERANCE_END_MS: u64 = 1000;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Folds Deepgram's segment stream into utterance-level events.
///
/// Segments marked `is_final` are settled but may be followed by more speech;
/// the utterance closes on `speech_final` or an `UtteranceEnd` message.
#[derive(Debug, Default)]
pub struct UtteranceAssembler {
    settled: Vec<String>,
    confidence: Option<f32>,
}

impl UtteranceAssembler {
    pub fn apply(&mut self, message: DeepgramMessage) -> Option<TranscriptEvent> {
        match message {
            DeepgramMessage::Results {
                channel,
                is_final,
                speech_final,
            } => {
                let (text, confidence) = channel
                    .alternatives
                    .into_iter()
                    .next()
                    .map(|a| (a.transcript.trim().to_string(), a.confidence))
                    .unwrap_or_default();

                if is_final {
                    if !text.is_empty() {
                        self.settled.push(text);
                        self.confidence = confidence.or(self.confidence);
                    }
                    if speech_final {
                        return self.take_final();
                    }
                    if self.settled.is_empty() {
                        return None;
                    }
                    return Some(TranscriptEvent::Interim {
                        text: self.settled.join(" "),
                        confidence,
                    });
                }

                if text.is_empty() {
                    return None;
                }
                let mut parts = self.settled.clone();
                parts.push(text);
                Some(TranscriptEvent::Interim {
                    text: parts.join(" "),
                    confidence,
                })
            }
            DeepgramMessage::UtteranceEnd {} => self.take_final(),
            _ => None,
        }
    }

    fn take_final(&mut self) -> Option<TranscriptEvent> {
        if self.settled.is_empty() {
            return None;
        }
        let text = self.settled.join(" ");
        self.settled.clear();
        Some(TranscriptEvent::Final {
            text,
            confidence: self.confidence.take(),
        })
    }
}

/// Deepgram live transcription over WebSocket.
pub struct DeepgramLive {
    api_key: String,
    ws_url: String,
}

impl DeepgramLive {
    pub fn new(api_key: String, ws_url: String) -> ProviderResult<Self> {
        if api_key.is_empty() {
            return Err(ProviderError::Configuration(
                "Deepgram API key is required".to_string(),
            ));
        }
        Ok(Self { api_key, ws_url })
    }

    pub(crate) fn listen_url(&self, settings: &TranscriberSettings) -> ProviderResult<Url> {
        let base = format!("{}/v1/listen", self.ws_url.trim_end_matches('/'));
        let endpointing = settings.silence_threshold_ms.to_string();
        let utterance_end = settings
            .silence_threshold_ms
            .max(MIN_UTTERANCE_END_MS)
            .to_string();
        let sample_rate = settings.sample_rate.to_string();

        Url::parse_with_params(
            &base,
            &[
                ("model", settings.model.as_deref().unwrap_or(DEFAULT_MODEL)),
                ("language", settings.language.as_str()),
                ("encoding", "linear16"),
                ("sample_rate", sample_rate.as_str()),
                ("channels", "1"),
                ("interim_results", "true"),
                ("endpointing", endpointing.as_str()),
                ("utterance_end_ms", utterance_end.as_str()),
                ("smart_format", "true"),
            ],
        )
        .map_err(|e| ProviderError::Configuration(format!("Invalid Deepgram URL: {e}")))
    }
}

#[async_trait]
impl StreamingTranscriber for DeepgramLive {
    async fn connect(&self, settings: &TranscriberSettings) -> ProviderResult<LiveChannel> {
        let url = self.listen_url(settings)?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| ProviderError::ConnectionFailed(e.to_string()))?;
        let auth = HeaderValue::from_str(&format!("Token {}", self.api_key))
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;
        request.headers_mut().insert("Authorization", auth);

        let (ws, _response) = timeout(CONNECT_TIMEOUT, connect_async(request))
            .await
            .map_err(|_| ProviderError::Timeout("Deepgram live connect".to_string()))?
            .map_err(|e| {
                ProviderError::ConnectionFailed(format!("Failed to connect to Deepgram: {e}"))
            })?;

        info!("Connected to Deepgram live transcription");

        let (input_tx, input_rx) = mpsc::channel::<LiveInput>(64);
        // Bounded for backpressure; events are small and consumed promptly
        let (event_tx, event_rx) = mpsc::channel::<TranscriptEvent>(256);
        let open = Arc::new(AtomicBool::new(true));

        tokio::spawn(run_connection(ws, input_rx, event_tx, open.clone()));

        Ok(LiveChannel {
            sink: LiveSink::new(input_tx, open),
            events: event_rx,
        })
    }

    fn provider_name(&self) -> &'static str {
        "deepgram"
    }
}

fn control_frame(message: ControlMessage) -> Option<Message> {
    serde_json::to_string(&message)
        .ok()
        .map(|json| Message::Text(json.into()))
}

async fn run_connection(
    ws: WsStream,
    mut input_rx: mpsc::Receiver<LiveInput>,
    event_tx: mpsc::Sender<TranscriptEvent>,
    open: Arc<AtomicBool>,
) {
    let (mut ws_sink, mut ws_stream) = ws.split();
    let mut assembler = UtteranceAssembler::default();
    let mut keepalive = interval(KEEPALIVE_INTERVAL);
    let mut finishing = false;

    loop {
        tokio::select! {
            input = input_rx.recv(), if !finishing => {
                match input {
                    Some(LiveInput::Audio(chunk)) => {
                        let len = chunk.len();
                        if let Err(e) = ws_sink.send(Message::Binary(chunk)).await {
                            error!("Failed to send audio to Deepgram: {}", e);
                            break;
                        }
                        debug!("Sent {} bytes of audio to Deepgram", len);
                    }
                    // Sink dropped or explicit finish: flush and wait for the close
                    Some(LiveInput::Finish) | None => {
                        finishing = true;
                        if let Some(frame) = control_frame(ControlMessage::CloseStream) {
                            let _ = ws_sink.send(frame).await;
                        }
                    }
                }
            }

            _ = keepalive.tick(), if !finishing => {
                if let Some(frame) = control_frame(ControlMessage::KeepAlive)
                    && let Err(e) = ws_sink.send(frame).await
                {
                    warn!("Deepgram keepalive failed: {}", e);
                    break;
                }
            }

            message = ws_stream.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        let parsed = match serde_json::from_str::<DeepgramMessage>(&text) {
                            Ok(parsed) => parsed,
                            Err(e) => {
                                warn!("Unparseable Deepgram message: {}", e);
                                continue;
                            }
                        };
                        if let Some(event) = assembler.apply(parsed)
                            && event_tx.send(event).await.is_err()
                        {
                            debug!("Transcript consumer dropped, closing Deepgram stream");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!("Deepgram closed the stream: {:?}", frame);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("Deepgram WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        info!("Deepgram WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    // Emit whatever settled text is left so a flush never loses speech
    if let Some(event) = assembler.take_final() {
        let _ = event_tx.send(event).await;
    }
    open.store(false, Ordering::Release);
    let _ = ws_sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(text: &str, is_final: bool, speech_final: bool) -> DeepgramMessage {
        serde_json::from_value(serde_json::json!({
            "type": "Results",
            "channel": {"alternatives": [{"transcript": text, "confidence": 0.9}]},
            "is_final": is_final,
            "speech_final": speech_final,
        }))
        .unwrap()
    }

    #[test]
    fn test_interim_then_final() {
        let mut assembler = UtteranceAssembler::default();

        let event = assembler.apply(results("hello", false, false)).unwrap();
        assert!(!event.is_final());
        assert_eq!(event.text(), "hello");

        assert!(matches!(
            assembler.apply(results("hello there", true, false)),
            Some(TranscriptEvent::Interim { .. })
        ));

        let event = assembler.apply(results("friend", true, true)).unwrap();
        assert!(event.is_final());
        assert_eq!(event.text(), "hello there friend");
    }

    #[test]
    fn test_utterance_end_flushes_settled_text() {
        let mut assembler = UtteranceAssembler::default();
        assembler.apply(results("book a table", true, false));
        let utterance_end: DeepgramMessage =
            serde_json::from_str(r#"{"type":"UtteranceEnd","last_word_end":2.1}"#).unwrap();
        let event = assembler.apply(utterance_end).unwrap();
        assert_eq!(
            event,
            TranscriptEvent::Final {
                text: "book a table".into(),
                confidence: Some(0.9)
            }
        );
        // Nothing pending afterwards
        let utterance_end: DeepgramMessage =
            serde_json::from_str(r#"{"type":"UtteranceEnd"}"#).unwrap();
        assert!(assembler.apply(utterance_end).is_none());
    }

    #[test]
    fn test_empty_results_are_ignored() {
        let mut assembler = UtteranceAssembler::default();
        assert!(assembler.apply(results("", false, false)).is_none());
        assert!(assembler.apply(results("", true, true)).is_none());
    }

    #[test]
    fn test_unknown_messages_parse() {
        let msg: DeepgramMessage =
            serde_json::from_str(r#"{"type":"SomethingNew","x":1}"#).unwrap();
        assert!(matches!(msg, DeepgramMessage::Unknown));
    }

    #[test]
    fn test_listen_url_params() {
        let live = DeepgramLive::new("key".into(), "wss://api.deepgram.com".into()).unwrap();
        let settings = TranscriberSettings {
            silence_threshold_ms: 500,
            ..TranscriberSettings::default()
        };
        let url = live.listen_url(&settings).unwrap();
        let query = url.query().unwrap();
        assert!(query.contains("interim_results=true"));
        assert!(query.contains("endpointing=500"));
        assert!(query.contains("utterance_end_ms=1000"));
        assert_eq!(url.path(), "/v1/listen");
    }
}
