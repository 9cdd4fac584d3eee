use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{api, calls};
use crate::state::AppState;
use std::sync::Arc;

/// Create the REST API router
///
/// - `GET /` - health check
/// - `POST /calls/outbound` - place an outbound call
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::health_check))
        .route("/calls/outbound", post(calls::place_outbound_call))
        .layer(TraceLayer::new_for_http())
}
