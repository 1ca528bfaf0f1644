use crate::core::app_state::AppState;
use crate::routes::parse_task::parse_task_message::ParseTaskMessage;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Delivery endpoint for the `parser-code-tasks` subscription.
///
/// `{"status":"SUCCESS"}` acknowledges the message; HTTP 500 with
/// `{"status":"RETRY"}` asks the sidecar to redeliver it.
pub async fn parse_task(
    State(state): State<Arc<AppState>>,
    Json(event): Json<Value>,
) -> Response {
    let Some(message) = ParseTaskMessage::from_event(&event) else {
        // Redelivery cannot fix a malformed payload; acknowledge and drop.
        warn!("parse_task: malformed work item: {event}");
        return (StatusCode::OK, Json(json!({ "status": "SUCCESS" }))).into_response();
    };

    info!(project_id = %message.project_id, "parse_task: work item received");

    match state.analyzer.process_project(&message.project_id).await {
        Ok(result) => {
            info!(
                project_id = %message.project_id,
                status = ?result.status,
                "parse_task: run reported"
            );
            (StatusCode::OK, Json(json!({ "status": "SUCCESS" }))).into_response()
        }
        Err(err) => {
            error!(
                project_id = %message.project_id,
                error = %format!("{err:#}"),
                "parse_task: run could not report, requesting redelivery"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "RETRY", "message": format!("{err:#}") })),
            )
                .into_response()
        }
    }
}
