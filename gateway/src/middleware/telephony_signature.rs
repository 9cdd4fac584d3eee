//! Webhook signature verification for telephony routes.
//!
//! Enforced only when a telephony auth token is configured and signature
//! validation is enabled. The signed URL is the public URL of the request
//! when `public_url` is configured, otherwise it is rebuilt from the
//! `Host` and `X-Forwarded-Proto` headers.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;

use crate::core::telephony::signature::{SIGNATURE_HEADER, verify_signature};
use crate::state::AppState;

/// Upper bound on a webhook body buffered for verification
const MAX_WEBHOOK_BODY: usize = 64 * 1024;

fn signed_url(state: &AppState, request: &Request) -> String {
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    if let Some(url) = state.config.public_endpoint(path_and_query) {
        return url;
    }

    let headers = request.headers();
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or(if state.config.is_tls_enabled() {
            "https"
        } else {
            "http"
        });
    let host = headers
        .get(http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("{scheme}://{host}{path_and_query}")
}

pub async fn telephony_signature_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(auth_token) = state.config.telephony.signature_key() else {
        return next.run(request).await;
    };

    let url = signed_url(&state, &request);
    let provided = request
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let Some(provided) = provided else {
        tracing::warn!(url = %url, "Rejecting webhook: missing signature header");
        return (StatusCode::FORBIDDEN, "Missing webhook signature").into_response();
    };

    let (parts, body) = request.into_parts();
    let body_bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Failed to read webhook body");
            return (StatusCode::BAD_REQUEST, "Unreadable request body").into_response();
        }
    };
    if body_bytes.len() > MAX_WEBHOOK_BODY {
        return (StatusCode::PAYLOAD_TOO_LARGE, "Webhook body too large").into_response();
    }

    let params: Vec<(String, String)> = url::form_urlencoded::parse(&body_bytes)
        .into_owned()
        .collect();

    if !verify_signature(auth_token, &url, &params, &provided) {
        tracing::warn!(url = %url, "Rejecting webhook: signature mismatch");
        return (StatusCode::FORBIDDEN, "Invalid webhook signature").into_response();
    }

    tracing::debug!(url = %url, "Webhook signature verified");
    next.run(Request::from_parts(parts, Body::from(body_bytes)))
        .await
}
