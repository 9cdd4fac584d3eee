//! Telephony webhook route configuration

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::telephony;
use crate::middleware::telephony_signature_middleware;
use crate::state::AppState;
use std::sync::Arc;

/// Create the telephony webhook router
///
/// All webhooks are form-encoded POSTs signed by the provider and checked by
/// the signature middleware. The audio clip route is fetched by the provider
/// from `<Play>` and carries no signature.
pub fn create_telephony_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let webhooks = Router::new()
        .route("/telephony/call-start", post(telephony::call_start))
        .route("/telephony/speech-result", post(telephony::speech_result))
        .route("/telephony/status", post(telephony::call_status))
        .route("/telephony/recording", post(telephony::recording))
        .route("/telephony/transcription", post(telephony::transcription))
        .route("/telephony/voicemail", post(telephony::voicemail))
        .route(
            "/telephony/voicemail-transcription",
            post(telephony::voicemail_transcription),
        )
        .route(
            "/telephony/conference-status",
            post(telephony::conference_status),
        )
        .route("/telephony/wait-music", post(telephony::wait_music))
        .layer(middleware::from_fn_with_state(
            state,
            telephony_signature_middleware,
        ));

    Router::new()
        .route("/telephony/audio/{clip_id}", get(telephony::audio_clip))
        .merge(webhooks)
        .layer(TraceLayer::new_for_http())
}
