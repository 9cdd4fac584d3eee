//! Error type for the HTTP boundary.
//!
//! Every failure that reaches a route handler is folded into [`AppError`].
//! Socket and telephony transports render these into their own native
//! rejection (an `error` message or apology markup); plain JSON routes use
//! the [`IntoResponse`] implementation below.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::core::conversation::OrchestratorError;
use crate::core::providers::ProviderError;
use crate::store::StoreError;

/// Result alias used by handlers.
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Dropped connection or malformed inbound message.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Generation, synthesis, transcription, or telephony call failure.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Unknown session, call, or assistant.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid required field.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A webhook referenced an unregistered or expired call.
    #[error("No active conversation for call {0}")]
    StaleRegistry(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable error code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport_error",
            Self::Provider(_) => "provider_error",
            Self::NotFound(_) | Self::StaleRegistry(_) => "not_found",
            Self::Validation(_) => "validation_error",
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Transport(_) => StatusCode::BAD_REQUEST,
            Self::Provider(_) => StatusCode::BAD_GATEWAY,
            // A stale registry reference is rejected exactly like an unknown id
            Self::NotFound(_) | Self::StaleRegistry(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error should be treated as an unknown-target rejection.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::StaleRegistry(_))
    }
}

impl From<OrchestratorError> for AppError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Validation(msg) => Self::Validation(msg),
            OrchestratorError::Transcription(msg) => Self::Validation(msg),
            OrchestratorError::Provider(e) => Self::Provider(e),
            OrchestratorError::NotInitialized | OrchestratorError::Ended => {
                Self::Transport(err.to_string())
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_registry_maps_to_not_found() {
        let err = AppError::StaleRegistry("CA123".to_string());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "not_found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_validation_from_orchestrator() {
        let err: AppError = OrchestratorError::Validation("text is required".into()).into();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_provider_error_status() {
        let err: AppError = ProviderError::Network("connection reset".into()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(!err.is_not_found());
    }
}
