use axum::Json;
use serde_json::{Value, json};

/// `GET /` health check
pub async fn health_check() -> Json<Value> {
    Json(json!({"status": "OK"}))
}
