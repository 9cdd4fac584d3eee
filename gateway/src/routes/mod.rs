pub mod api;
pub mod socket;
pub mod telephony;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// All routes with state applied. Cross-cutting layers (CORS, rate limiting,
/// security headers) are added by the binary.
pub fn create_router(state: Arc<AppState>) -> Router {
    api::create_api_router()
        .merge(socket::create_socket_router(state.clone()))
        .merge(telephony::create_telephony_router(state.clone()))
        .with_state(state)
}
