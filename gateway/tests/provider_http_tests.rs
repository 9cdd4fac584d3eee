//! Provider adapter tests against mock HTTP servers.

use bytes::Bytes;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use waav_conversation::core::assistant::{
    AssistantConfig, ModelSettings, TranscriberSettings, VoiceSettings,
};
use waav_conversation::core::conversation::Message;
use waav_conversation::core::llm::{GenerationParams, LanguageModel, OpenAIChat};
use waav_conversation::core::stt::{DeepgramSTT, Transcriber};
use waav_conversation::core::tts::{ElevenLabsTTS, SpeechSynthesizer};
use waav_conversation::{HttpProviderFactory, ProviderCredentials, ProviderError, ProviderFactory};

fn history() -> Vec<Message> {
    vec![
        Message::system("You are terse."),
        Message::assistant("Hello"),
        Message::user("What time is it?"),
    ]
}

fn params() -> GenerationParams {
    GenerationParams::from(&ModelSettings::default())
}

#[tokio::test]
async fn test_openai_chat_sends_history_and_trims_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "stream": false,
            "messages": [
                {"role": "system", "content": "You are terse."},
                {"role": "assistant", "content": "Hello"},
                {"role": "user", "content": "What time is it?"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {"role": "assistant", "content": "  Noon.  "},
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let chat = OpenAIChat::new("sk-test".into(), format!("{}/v1", server.uri()), "openai").unwrap();
    let reply = chat.generate(&history(), &params()).await.unwrap();
    assert_eq!(reply, "Noon.");
}

#[tokio::test]
async fn test_openai_chat_maps_api_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let chat = OpenAIChat::new("sk-test".into(), format!("{}/v1", server.uri()), "openai").unwrap();
    let err = chat.generate(&history(), &params()).await.unwrap_err();
    assert_eq!(
        err,
        ProviderError::Api {
            status: 429,
            message: "rate limited".to_string()
        }
    );
}

#[tokio::test]
async fn test_openai_chat_rejects_empty_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": ""}}]
        })))
        .mount(&server)
        .await;

    let chat = OpenAIChat::new("sk-test".into(), server.uri(), "groq").unwrap();
    let err = chat.generate(&history(), &params()).await.unwrap_err();
    assert!(matches!(err, ProviderError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_elevenlabs_synthesis() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/text-to-speech/voice-42"))
        .and(header("xi-api-key", "xi-test"))
        .and(body_partial_json(json!({
            "text": "Hello there",
            "voice_settings": {"stability": 0.5}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/mpeg")
                .set_body_bytes(b"ID3-mp3-bytes".to_vec()),
        )
        .mount(&server)
        .await;

    let tts = ElevenLabsTTS::new("xi-test".into(), server.uri()).unwrap();
    let voice = VoiceSettings {
        provider: "elevenlabs".to_string(),
        voice_id: "voice-42".to_string(),
        ..VoiceSettings::default()
    };
    let audio = tts.synthesize("Hello there", &voice).await.unwrap();
    assert_eq!(audio, Bytes::from_static(b"ID3-mp3-bytes"));
}

#[tokio::test]
async fn test_elevenlabs_rejects_empty_text_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tts = ElevenLabsTTS::new("xi-test".into(), server.uri()).unwrap();
    let err = tts
        .synthesize("   ", &VoiceSettings::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidInput(_)));
}

#[tokio::test]
async fn test_deepgram_prerecorded_transcription() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/listen"))
        .and(header("authorization", "Token dg-test"))
        .and(query_param("language", "en"))
        .and(query_param("smart_format", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": {
                "channels": [{
                    "alternatives": [{"transcript": " book a table ", "confidence": 0.97}]
                }]
            }
        })))
        .mount(&server)
        .await;

    let stt = DeepgramSTT::new("dg-test".into(), server.uri()).unwrap();
    let pcm = Bytes::from(vec![0u8; 3200]);
    let text = stt
        .transcribe(pcm, &TranscriberSettings::default())
        .await
        .unwrap();
    assert_eq!(text, "book a table");
}

#[tokio::test]
async fn test_deepgram_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/listen"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let stt = DeepgramSTT::new("dg-test".into(), server.uri()).unwrap();
    let err = stt
        .transcribe(Bytes::from(vec![1u8; 320]), &TranscriberSettings::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Api { status: 503, .. }));
}

#[tokio::test]
async fn test_factory_routes_adapters_to_configured_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer gsk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "From groq"}}]
        })))
        .mount(&server)
        .await;

    let mut credentials = ProviderCredentials::default();
    credentials.groq_api_key = Some("gsk-test".to_string());
    credentials.openai_api_key = Some("sk-test".to_string());
    credentials.groq_base_url = server.uri();
    let factory = HttpProviderFactory::new(credentials);

    let mut assistant = AssistantConfig::new("a1", "prompt");
    assistant.model.provider = "groq".to_string();
    let providers = factory.build(&assistant).unwrap();
    assert_eq!(providers.llm.provider_name(), "groq");
    assert!(providers.streaming.is_none());

    let reply = providers.llm.generate(&history(), &params()).await.unwrap();
    assert_eq!(reply, "From groq");
}
