//! Synthesized audio delivered to the telephony provider.
//!
//! The provider fetches clips by URL, so a reply is played from the clip
//! cache when the service has a public URL and spoken with `<Say>` otherwise.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::core::conversation::TurnOutput;
use crate::core::telephony::{Gather, VoiceResponse};
use crate::state::AppState;
use crate::utils::audio::AudioContainer;

/// How a reply is rendered into markup.
#[derive(Debug, Clone, PartialEq)]
pub enum Utterance {
    Play(String),
    Say(String),
}

impl Utterance {
    pub async fn for_output(state: &AppState, output: &TurnOutput) -> Self {
        if !output.audio.is_empty() && state.config.public_url.is_some() {
            let clip_id = state.store_clip(output.audio.clone()).await;
            if let Some(url) = state
                .config
                .public_endpoint(&format!("telephony/audio/{clip_id}"))
            {
                return Self::Play(url);
            }
        }
        Self::Say(output.text.clone())
    }

    pub fn append_to(self, response: VoiceResponse) -> VoiceResponse {
        match self {
            Self::Play(url) => response.play(url),
            Self::Say(text) => response.say(text),
        }
    }

    pub fn nest_in(self, gather: Gather) -> Gather {
        match self {
            Self::Play(url) => gather.play(url),
            Self::Say(text) => gather.say(text),
        }
    }
}

/// `GET /telephony/audio/{clip_id}`
pub async fn audio_clip(
    State(state): State<Arc<AppState>>,
    Path(clip_id): Path<String>,
) -> Response {
    match state.clip(&clip_id).await {
        Some(audio) => {
            let mime = AudioContainer::detect(&audio).mime_type();
            ([(header::CONTENT_TYPE, mime)], audio).into_response()
        }
        None => {
            debug!(clip_id = %clip_id, "Audio clip not found or expired");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}
