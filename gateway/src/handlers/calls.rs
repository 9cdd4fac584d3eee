//! Outbound call placement.

use std::sync::Arc;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::providers::ProviderError;
use crate::core::telephony::OutboundCall;
use crate::errors::{AppError, AppResult};
use crate::state::AppState;
use crate::store::{Call, CallDirection};
use crate::utils::phone::{mask_number, normalize_number};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutboundCallRequest {
    pub assistant_id: String,
    pub to: String,
    /// Caller id; defaults to the configured default caller
    #[serde(default)]
    pub from: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OutboundCallResponse {
    pub call_id: String,
    pub call_sid: String,
}

/// `POST /calls/outbound`
///
/// Places a call whose answer webhook starts a conversation with the
/// requested assistant.
pub async fn place_outbound_call(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OutboundCallRequest>,
) -> AppResult<Json<OutboundCallResponse>> {
    let telephony = state.telephony.clone().ok_or_else(|| {
        AppError::Provider(ProviderError::Unavailable(
            "Outbound calling is not configured".to_string(),
        ))
    })?;

    let to = normalize_number(&request.to);
    if to.trim_start_matches('+').is_empty() {
        return Err(AppError::Validation("to must be a phone number".to_string()));
    }
    let from = request
        .from
        .as_deref()
        .or(state.config.telephony.default_caller.as_deref())
        .map(normalize_number)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::Validation("from is required".to_string()))?;

    let assistant = state
        .directory
        .assistant(&request.assistant_id)
        .ok_or_else(|| AppError::NotFound(format!("Assistant {}", request.assistant_id)))?;

    let assistant_query: String =
        url::form_urlencoded::byte_serialize(assistant.id.as_bytes()).collect();
    let (Some(answer_url), Some(status_callback)) = (
        state
            .config
            .public_endpoint(&format!("telephony/call-start?assistant_id={assistant_query}")),
        state.config.public_endpoint("telephony/status"),
    ) else {
        return Err(AppError::Validation(
            "public_url must be configured to place calls".to_string(),
        ));
    };

    let placed = telephony
        .place_call(&OutboundCall {
            to: to.clone(),
            from: from.clone(),
            answer_url,
            status_callback,
        })
        .await?;

    let mut call = Call::new(&placed.sid, CallDirection::Outbound, from, &to);
    call.assistant_id = Some(assistant.id.clone());
    let call_id = call.id.clone();
    state.store.create_call(call).await?;

    info!(
        call_sid = %placed.sid,
        assistant_id = %assistant.id,
        to = %mask_number(&to),
        "Outbound call placed"
    );

    Ok(Json(OutboundCallResponse {
        call_id,
        call_sid: placed.sid,
    }))
}
