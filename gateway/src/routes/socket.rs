//! Conversation WebSocket route configuration

use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::socket_handler;
use crate::middleware::connection_limit_middleware;
use crate::state::AppState;
use std::sync::Arc;

/// Create the conversation WebSocket router
///
/// # Endpoint
///
/// `GET /ws?assistant_id=...` - WebSocket upgrade for one conversation
///
/// The connection limit middleware reserves a slot per connection (global
/// and per IP); the handler releases it when the socket closes.
///
/// # Example
///
/// ```json
/// // Server greets the new connection
/// {"type": "connected", "sessionId": "..."}
///
/// // Client sends a turn
/// {"type": "user-message", "text": "Hi"}
///
/// // Server answers
/// {"type": "assistant-message", "text": "Hello!", "audio": "<base64>"}
/// ```
pub fn create_socket_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws", get(socket_handler))
        .layer(middleware::from_fn_with_state(
            state,
            connection_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}
