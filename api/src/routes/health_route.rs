use axum::Json;
use serde_json::{Value, json};

/// Liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "lua-code-analyzer",
    }))
}

/// Readiness probe.
pub async fn ready() -> Json<Value> {
    Json(json!({ "status": "ready" }))
}
