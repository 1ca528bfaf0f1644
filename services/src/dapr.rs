//! Dapr sidecar client.
//!
//! Thin HTTP wrapper over the sidecar's service-invocation and pub/sub
//! APIs: download a project archive from the storage collaborator, publish
//! plain JSON results, and publish large graph payloads compressed with
//! zstd and wrapped in a base64 envelope.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use futures::StreamExt;
use serde_json::{Value, json};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Compression level for graph payloads.
const ZSTD_LEVEL: i32 = 3;
/// Per-request deadline for sidecar calls, including archive downloads.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum DaprError {
    #[error("sidecar request failed")]
    Http(#[from] reqwest::Error),

    #[error("sidecar replied {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to write downloaded archive")]
    Io(#[from] std::io::Error),

    #[error("failed to encode payload")]
    Encode(#[from] serde_json::Error),
}

pub struct DaprClient {
    base_url: String,
    client: reqwest::Client,
}

impl DaprClient {
    /// Client for the local sidecar; the port comes from `DAPR_HTTP_PORT`
    /// (default 3500).
    pub fn from_env() -> Result<Self, DaprError> {
        let port = env::var("DAPR_HTTP_PORT").unwrap_or_else(|_| String::from("3500"));
        Self::new(format!("http://localhost:{port}"))
    }

    pub fn new(base_url: impl Into<String>) -> Result<Self, DaprError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    /// Invoke a method on another Dapr app and return the raw response.
    pub async fn invoke_service(
        &self,
        app_id: &str,
        method: &str,
    ) -> Result<reqwest::Response, DaprError> {
        let url = format!("{}/v1.0/invoke/{}/method/{}", self.base_url, app_id, method);
        debug!("dapr: invoke {url}");
        let response = self.client.get(&url).send().await?;
        Self::ensure_success(response).await
    }

    /// Stream the project's ZIP archive from the storage collaborator into
    /// `dest_dir`. Returns the path of the downloaded file.
    pub async fn download_project_zip(
        &self,
        storage_app_id: &str,
        project_id: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf, DaprError> {
        let method = format!("projects/source/zip?project_id={project_id}");
        let response = self.invoke_service(storage_app_id, &method).await?;

        let dest = dest_dir.join(format!("{project_id}.zip"));
        let mut file = tokio::fs::File::create(&dest).await?;
        let mut stream = response.bytes_stream();
        let mut total = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            total += chunk.len();
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        info!("dapr: downloaded archive ({total} bytes) -> {}", dest.display());
        Ok(dest)
    }

    /// Publish a plain JSON payload to a topic.
    pub async fn publish(
        &self,
        pubsub: &str,
        topic: &str,
        payload: &Value,
    ) -> Result<(), DaprError> {
        let url = format!("{}/v1.0/publish/{}/{}", self.base_url, pubsub, topic);
        debug!("dapr: publish -> {topic}");
        let response = self.client.post(&url).json(payload).send().await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    /// Publish a payload compressed with zstd and wrapped in a base64
    /// envelope: `{"encoding": "zstd+base64", "data": …}`.
    pub async fn publish_compressed(
        &self,
        pubsub: &str,
        topic: &str,
        payload: &Value,
    ) -> Result<(), DaprError> {
        let envelope = compress_payload(payload)?;
        self.publish(pubsub, topic, &envelope).await
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, DaprError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(DaprError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// Build the compressed envelope for a JSON payload.
pub fn compress_payload(payload: &Value) -> Result<Value, DaprError> {
    let raw = serde_json::to_vec(payload)?;
    let compressed = zstd::stream::encode_all(&raw[..], ZSTD_LEVEL)?;
    Ok(json!({
        "encoding": "zstd+base64",
        "data": STANDARD.encode(compressed),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressed_envelope_round_trips_byte_equal() {
        let payload = json!({
            "meta_data": { "graph_id": "test-123" },
            "nodes": [ { "id": "n1", "type": "FILE" } ],
            "edges": []
        });

        let envelope = compress_payload(&payload).unwrap();
        assert_eq!(envelope["encoding"], "zstd+base64");

        let compressed = STANDARD
            .decode(envelope["data"].as_str().unwrap())
            .unwrap();
        let decompressed = zstd::stream::decode_all(&compressed[..]).unwrap();
        assert_eq!(decompressed, serde_json::to_vec(&payload).unwrap());
    }

    #[test]
    fn compression_actually_shrinks_repetitive_payloads() {
        let nodes: Vec<Value> = (0..500)
            .map(|i| json!({ "id": format!("p:{i}"), "type": "IDENTIFIER" }))
            .collect();
        let payload = json!({ "nodes": nodes });

        let raw_len = serde_json::to_vec(&payload).unwrap().len();
        let envelope = compress_payload(&payload).unwrap();
        let encoded_len = envelope["data"].as_str().unwrap().len();
        assert!(encoded_len < raw_len / 2);
    }
}
