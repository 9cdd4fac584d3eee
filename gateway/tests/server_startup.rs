//! Server Startup Tests
//!
//! Loads configuration the way `main` does and checks the assembled
//! application answers before any provider is reachable.

use std::env;
use std::fs;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serial_test::serial;
use tempfile::TempDir;
use tower::util::ServiceExt;

use waav_conversation::{AssistantDirectory, ServerConfig, routes, state::AppState};

const CONFIG_YAML: &str = r#"
server:
  host: "127.0.0.1"
  port: 3555

conversation:
  gather_timeout_seconds: 7

assistants:
  - id: "support"
    system_prompt: "You are a helpful support agent."
    first_message: "Hello, how can I help?"
    end_call_phrases: ["goodbye"]
    transcriber:
      provider: "deepgram"
      language: "en-US"
      silence_threshold_ms: 600
      sample_rate: 8000

phone_numbers:
  - number: "+1 (555) 010-0100"
    assistant_id: "support"
"#;

const PROVIDER_ENV: [&str; 4] = [
    "OPENAI_API_KEY",
    "GROQ_API_KEY",
    "DEEPGRAM_API_KEY",
    "ELEVENLABS_API_KEY",
];

fn clear_provider_env() {
    for name in PROVIDER_ENV {
        unsafe {
            env::remove_var(name);
        }
    }
}

fn write_config(contents: &str) -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
#[serial]
fn test_yaml_config_loads_directory() {
    clear_provider_env();
    let (_dir, path) = write_config(CONFIG_YAML);

    let config = ServerConfig::from_file(&path).unwrap();
    assert_eq!(config.address(), "127.0.0.1:3555");
    assert_eq!(config.conversation.gather_timeout_seconds, 7);
    assert_eq!(config.assistants.len(), 1);

    let assistant = &config.assistants[0];
    assert_eq!(assistant.transcriber.provider, "deepgram");
    assert_eq!(assistant.transcriber.silence_threshold_ms, 600);
    assert_eq!(assistant.model.provider, "openai");
}

#[test]
#[serial]
fn test_number_for_unknown_assistant_is_rejected() {
    clear_provider_env();
    let (_dir, path) = write_config(
        r#"
assistants:
  - id: "support"
phone_numbers:
  - number: "+15550100100"
    assistant_id: "sales"
"#,
    );

    let err = ServerConfig::from_file(&path).unwrap_err();
    assert!(err.to_string().contains("sales"));
}

#[test]
#[serial]
fn test_unknown_provider_is_rejected() {
    clear_provider_env();
    let (_dir, path) = write_config(
        r#"
assistants:
  - id: "support"
    voice:
      provider: "polly"
      voice_id: "Joanna"
"#,
    );

    let err = ServerConfig::from_file(&path).unwrap_err();
    assert!(err.to_string().contains("polly"));
}

#[tokio::test]
#[serial]
async fn test_app_starts_without_provider_keys() {
    clear_provider_env();
    let (_dir, path) = write_config(CONFIG_YAML);
    let config = ServerConfig::from_file(&path).unwrap();

    let state = AppState::new(config).await;
    assert!(state.telephony.is_none());
    assert!(
        state
            .directory
            .assistant_for_number("+15550100100")
            .is_some()
    );

    let router = routes::create_router(state.clone());
    let response = router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "OK");

    // Provider construction fails without keys; the caller hears an apology
    let request = Request::builder()
        .method("POST")
        .uri("/telephony/call-start")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("CallSid=CA1&To=%2B15550100100"))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let markup = String::from_utf8_lossy(&body);
    assert!(markup.contains("something went wrong"));
    assert!(markup.contains("<Hangup/>"));
    assert!(!state.registry.contains("CA1"));

    // Outbound calling needs telephony credentials
    let request = Request::builder()
        .method("POST")
        .uri("/calls/outbound")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"assistant_id":"support","to":"+15552223333"}"#))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
