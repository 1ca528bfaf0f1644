use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Work item delivered on the `parser-code-tasks` topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseTaskMessage {
    pub project_id: String,
    /// Accepted on the wire, ignored by the pipeline: each run analyzes
    /// the project from scratch.
    #[serde(default)]
    pub incremental: bool,
}

impl ParseTaskMessage {
    /// Extract the message from a delivery. Dapr may wrap the payload in a
    /// CloudEvents envelope, in which case the message sits under `data`.
    pub fn from_event(event: &Value) -> Option<Self> {
        let payload = match event.get("data") {
            Some(data) if data.is_object() => data,
            _ => event,
        };
        serde_json::from_value(payload.clone()).ok()
    }
}
