//! Telephony webhook handlers.
//!
//! A phone conversation is a chain of independent requests correlated by the
//! provider's `CallSid`. The orchestrator for a call lives in the session
//! registry between requests. Handlers answer with voice-response markup or a
//! plain acknowledgement, and never expose an internal error to the caller:
//! failures are logged with the call sid and answered with an apology.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Form, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::core::assistant::AssistantConfig;
use crate::core::telephony::markup::CONTENT_TYPE;
use crate::core::telephony::{Gather, VoiceResponse};
use crate::errors::{AppError, AppResult};
use crate::handlers::session::start_conversation;
use crate::state::AppState;
use crate::store::{Call, Session, StoreError, TransportKind, Voicemail};
use crate::utils::phone::mask_number;

use super::audio::Utterance;
use super::forms::{CallStartQuery, WebhookForm};

pub const SPEECH_RESULT_PATH: &str = "/telephony/speech-result";
pub const VOICEMAIL_PATH: &str = "/telephony/voicemail";
pub const VOICEMAIL_TRANSCRIPTION_PATH: &str = "/telephony/voicemail-transcription";

const UNAVAILABLE_MESSAGE: &str =
    "We're sorry, no one is available to take your call right now. Goodbye.";
const APOLOGY_MESSAGE: &str = "We're sorry, something went wrong. Please try again later. Goodbye.";
const EXPIRED_MESSAGE: &str = "Sorry, this conversation has expired. Please call again. Goodbye.";
const REPROMPT_MESSAGE: &str = "Sorry, I didn't catch that. Could you say that again?";
const VOICEMAIL_PROMPT: &str = "Please leave a message after the tone.";
const VOICEMAIL_THANKS: &str = "Thank you for your message. Goodbye.";
const VOICEMAIL_MAX_LENGTH_SECS: u32 = 120;

fn markup(response: VoiceResponse) -> Response {
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], response.render()).into_response()
}

fn ack() -> Response {
    Json(json!({"status": "OK"})).into_response()
}

fn apology() -> VoiceResponse {
    VoiceResponse::new().say(APOLOGY_MESSAGE).hangup()
}

/// Gather the caller's next utterance, speaking `utterance` first.
///
/// With interruptions enabled the prompt is nested in the gather so caller
/// speech cuts playback short.
fn listen(state: &AppState, assistant: &AssistantConfig, utterance: Option<Utterance>) -> VoiceResponse {
    let gather = Gather::new(
        state.config.webhook_url(SPEECH_RESULT_PATH),
        state.config.conversation.gather_timeout_seconds,
    )
    .language(assistant.transcriber.language.clone());

    match utterance {
        Some(utterance) if assistant.interruptions_enabled => {
            VoiceResponse::new().gather(utterance.nest_in(gather))
        }
        Some(utterance) => utterance.append_to(VoiceResponse::new()).gather(gather),
        None => VoiceResponse::new().gather(gather),
    }
}

/// Log a store failure for an out-of-band callback. Unknown calls are
/// expected when callbacks arrive for calls this process never saw.
fn log_store_error(call_sid: &str, what: &str, err: StoreError) {
    match err {
        StoreError::NotFound(_) => warn!(call_sid = %call_sid, "{what}: {err}"),
        other => error!(call_sid = %call_sid, error = %other, "{what} failed"),
    }
}

/// `POST /telephony/call-start`
pub async fn call_start(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallStartQuery>,
    Form(form): Form<WebhookForm>,
) -> Response {
    let Some(call_sid) = form.call_sid() else {
        warn!("Call-start webhook without CallSid");
        return markup(apology());
    };

    match start_call(&state, query, &form, call_sid).await {
        Ok(response) => markup(response),
        Err(e) => {
            error!(call_sid = %call_sid, error = %e, "Failed to start call conversation");
            state.registry.release(call_sid).await;
            markup(apology())
        }
    }
}

async fn start_call(
    state: &Arc<AppState>,
    query: CallStartQuery,
    form: &WebhookForm,
    call_sid: &str,
) -> AppResult<VoiceResponse> {
    let from = form.from.clone().unwrap_or_default();
    let to = form.to.clone().unwrap_or_default();

    // Outbound calls placed by this service already have a record
    let existing = match state.store.get_call_by_ref(call_sid).await {
        Ok(call) => Some(call),
        Err(StoreError::NotFound(_)) => None,
        Err(e) => return Err(e.into()),
    };

    let assistant_id = query
        .assistant_id
        .filter(|id| !id.is_empty())
        .or_else(|| existing.as_ref().and_then(|c| c.assistant_id.clone()));
    let assistant = match &assistant_id {
        Some(id) => state.directory.assistant(id),
        None => state.directory.assistant_for_number(&to),
    };

    let Some(assistant) = assistant else {
        info!(
            call_sid = %call_sid,
            assistant_id = ?assistant_id,
            to = %mask_number(&to),
            "No assistant for call"
        );
        return Ok(VoiceResponse::new().say(UNAVAILABLE_MESSAGE).hangup());
    };

    if existing.is_none() {
        let mut call = Call::new(call_sid, form.direction(), &from, &to);
        call.assistant_id = Some(assistant.id.clone());
        state.store.create_call(call).await?;
    }
    if let Some(status) = form.status()
        && let Err(e) = state
            .store
            .update_call_status(call_sid, status, None, form.answered_by())
            .await
    {
        log_store_error(call_sid, "Call status update", e);
    }

    let session_id = uuid::Uuid::new_v4().to_string();
    let session = Session::new(&session_id, assistant.clone(), TransportKind::Phone)
        .with_metadata("call_sid", call_sid);
    let handle = start_conversation(state, session, call_sid, None).await?;

    if let Err(e) = state
        .store
        .link_call_session(call_sid, &session_id, &assistant.id)
        .await
    {
        log_store_error(call_sid, "Linking call to session", e);
    }

    info!(
        call_sid = %call_sid,
        session_id = %session_id,
        assistant_id = %assistant.id,
        from = %mask_number(&from),
        "Call conversation started"
    );

    let greeting = handle.greeting().await.map_err(AppError::from)?;
    let utterance = match greeting {
        Some(output) => Some(Utterance::for_output(state, &output).await),
        None => None,
    };
    Ok(listen(state, &assistant, utterance))
}

/// `POST /telephony/speech-result`
pub async fn speech_result(
    State(state): State<Arc<AppState>>,
    Form(form): Form<WebhookForm>,
) -> Response {
    let Some(call_sid) = form.call_sid() else {
        warn!("Speech-result webhook without CallSid");
        return markup(apology());
    };

    let Some(entry) = state.registry.get(call_sid) else {
        let err = AppError::StaleRegistry(call_sid.to_string());
        info!(call_sid = %call_sid, "{err}");
        return markup(VoiceResponse::new().say(EXPIRED_MESSAGE).hangup());
    };
    state
        .registry
        .touch(call_sid, state.config.conversation.registry_ttl());

    let Some(speech) = form.speech() else {
        debug!(call_sid = %call_sid, "No speech captured, re-prompting");
        return markup(listen(
            &state,
            &entry.assistant,
            Some(Utterance::Say(REPROMPT_MESSAGE.to_string())),
        ));
    };

    debug!(
        call_sid = %call_sid,
        session_id = %entry.session_id,
        confidence = ?form.confidence(),
        "Speech received"
    );

    let output = match entry.handle.send_text(speech).await {
        Ok(output) => output,
        Err(e) => {
            error!(
                call_sid = %call_sid,
                session_id = %entry.session_id,
                error = %e,
                "Turn failed"
            );
            state.registry.release(call_sid).await;
            return markup(apology());
        }
    };

    let utterance = Utterance::for_output(&state, &output).await;

    if let Some(phrase) = entry.assistant.matched_end_phrase(speech) {
        info!(
            call_sid = %call_sid,
            session_id = %entry.session_id,
            phrase = %phrase,
            "End phrase detected, hanging up"
        );
        let mut response = utterance.append_to(VoiceResponse::new());
        if let Some(message) = entry.assistant.end_call_message.as_deref() {
            response = response.say(message);
        }
        state.registry.release(call_sid).await;
        return markup(response.hangup());
    }

    markup(listen(&state, &entry.assistant, Some(utterance)))
}

/// `POST /telephony/status`
pub async fn call_status(
    State(state): State<Arc<AppState>>,
    Form(form): Form<WebhookForm>,
) -> Response {
    let Some(call_sid) = form.call_sid() else {
        warn!("Status webhook without CallSid");
        return ack();
    };
    let Some(status) = form.status() else {
        warn!(call_sid = %call_sid, status = ?form.call_status, "Unrecognized call status");
        return ack();
    };

    match state
        .store
        .update_call_status(call_sid, status, form.duration_secs(), form.answered_by())
        .await
    {
        Ok((change, call)) => {
            debug!(call_sid = %call_sid, ?change, "Call status reported");
            if call.status.is_terminal() {
                let released = state.registry.release(call_sid).await;
                if let Some(session_id) = &call.session_id
                    && let Err(e) = state.store.end_session(session_id).await
                {
                    error!(call_sid = %call_sid, session_id = %session_id, error = %e, "Failed to end session");
                }
                info!(
                    call_sid = %call_sid,
                    status = %call.status,
                    duration_secs = ?call.duration_secs,
                    released,
                    "Call finished"
                );
            }
        }
        Err(e) => {
            if status.is_terminal() {
                state.registry.release(call_sid).await;
            }
            log_store_error(call_sid, "Call status update", e);
        }
    }
    ack()
}

/// `POST /telephony/recording`
pub async fn recording(
    State(state): State<Arc<AppState>>,
    Form(form): Form<WebhookForm>,
) -> Response {
    let (Some(call_sid), Some(recording)) = (form.call_sid(), form.recording()) else {
        warn!(call_sid = %form.call_sid, "Recording webhook without CallSid or RecordingUrl");
        return ack();
    };

    match state.store.attach_recording(call_sid, recording).await {
        Ok(()) => info!(call_sid = %call_sid, "Recording attached"),
        Err(e) => log_store_error(call_sid, "Attaching recording", e),
    }
    ack()
}

/// `POST /telephony/transcription`
pub async fn transcription(
    State(state): State<Arc<AppState>>,
    Form(form): Form<WebhookForm>,
) -> Response {
    let (Some(call_sid), Some(text)) = (form.call_sid(), form.transcription()) else {
        debug!(
            call_sid = %form.call_sid,
            status = ?form.transcription_status,
            "Transcription webhook without text"
        );
        return ack();
    };

    match state.store.attach_transcription(call_sid, text).await {
        Ok(()) => info!(call_sid = %call_sid, "Call transcription attached"),
        Err(e) => log_store_error(call_sid, "Attaching transcription", e),
    }
    ack()
}

/// `POST /telephony/voicemail`
///
/// Prompts for and records a message; the provider posts back here with
/// the recording once the caller is done.
pub async fn voicemail(
    State(state): State<Arc<AppState>>,
    Form(form): Form<WebhookForm>,
) -> Response {
    let Some(call_sid) = form.call_sid() else {
        warn!("Voicemail webhook without CallSid");
        return markup(apology());
    };

    let Some(recording) = form.recording() else {
        let prompt = voicemail_prompt(&state, call_sid).await;
        return markup(VoiceResponse::new().say(prompt).record(
            state.config.webhook_url(VOICEMAIL_PATH),
            VOICEMAIL_MAX_LENGTH_SECS,
            Some(state.config.webhook_url(VOICEMAIL_TRANSCRIPTION_PATH)),
        ));
    };

    let voicemail = Voicemail::new(
        call_sid,
        form.from.clone().unwrap_or_default(),
        recording.url,
        recording.duration_secs,
    );
    match state.store.create_voicemail(voicemail).await {
        Ok(()) => info!(call_sid = %call_sid, "Voicemail saved"),
        Err(e) => {
            error!(call_sid = %call_sid, error = %e, "Failed to save voicemail");
            return markup(apology());
        }
    }
    markup(VoiceResponse::new().say(VOICEMAIL_THANKS).hangup())
}

async fn voicemail_prompt(state: &AppState, call_sid: &str) -> String {
    let assistant = match state.registry.get(call_sid) {
        Some(entry) => Some(entry.assistant),
        None => match state.store.get_call_by_ref(call_sid).await {
            Ok(call) => call
                .assistant_id
                .and_then(|id| state.directory.assistant(&id)),
            Err(_) => None,
        },
    };

    assistant
        .and_then(|a| a.voicemail_message.clone())
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| VOICEMAIL_PROMPT.to_string())
}

/// `POST /telephony/voicemail-transcription`
pub async fn voicemail_transcription(
    State(state): State<Arc<AppState>>,
    Form(form): Form<WebhookForm>,
) -> Response {
    let (Some(call_sid), Some(text)) = (form.call_sid(), form.transcription()) else {
        debug!(call_sid = %form.call_sid, "Voicemail transcription without text");
        return ack();
    };

    match state.store.attach_voicemail_transcription(call_sid, text).await {
        Ok(()) => info!(call_sid = %call_sid, "Voicemail transcription attached"),
        Err(e) => log_store_error(call_sid, "Attaching voicemail transcription", e),
    }
    ack()
}

/// `POST /telephony/conference-status`
pub async fn conference_status(Form(form): Form<WebhookForm>) -> Response {
    info!(
        call_sid = %form.call_sid,
        conference_sid = ?form.conference_sid,
        event = ?form.status_callback_event,
        "Conference status"
    );
    ack()
}

/// `POST /telephony/wait-music`
pub async fn wait_music(State(state): State<Arc<AppState>>) -> Response {
    let response = match state.config.telephony.wait_music_url.as_deref() {
        Some(url) if !url.is_empty() => VoiceResponse::new().play_loop(url, 0),
        _ => VoiceResponse::new().pause(10),
    };
    markup(response)
}
