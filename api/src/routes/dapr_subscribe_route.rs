use crate::core::app_state::AppState;
use axum::{Json, extract::State};
use serde_json::{Value, json};
use std::sync::Arc;

/// Programmatic subscription advertisement: Dapr calls this at startup to
/// learn which topics we consume and where to deliver them.
pub async fn dapr_subscribe(State(state): State<Arc<AppState>>) -> Json<Value> {
    let transport = &state.config.transport;
    Json(json!([
        {
            "pubsubname": transport.pubsub_name,
            "topic": transport.tasks_topic,
            "route": "/parser-code-tasks",
        }
    ]))
}
