//! Configuration data structures for the analyzer pipeline.
//!
//! Split into logical groups:
//! - [`AnalyzerConfig`]: top-level container
//! - [`Filters`]: which files to include/exclude
//! - [`Limits`]: size limits
//! - [`Transport`]: pub/sub and service-invocation settings
//!
//! All structs are `serde`-friendly so they can also be loaded from JSON.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;

/// Top-level configuration for the analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Which files to include/exclude.
    pub filters: Filters,
    /// Size limits.
    pub limits: Limits,
    /// Pub/sub and collaborator settings.
    pub transport: Transport,
    /// Path to the CPG v1 JSON Schema document the export must validate
    /// against.
    pub schema_path: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            filters: Filters::default(),
            limits: Limits::default(),
            transport: Transport::default(),
            schema_path: String::from("schema/v1/cpg.export.schema.json"),
        }
    }
}

impl AnalyzerConfig {
    /// Load configuration from environment variables or fall back to
    /// defaults.
    ///
    /// Intentionally tolerant: unknown variables are ignored and parsing
    /// errors fall back to defaults. After load, a basic validation is
    /// performed to ensure sane values.
    ///
    /// Supported ENV vars (all optional):
    /// - `ANALYZER_MAX_FILE_BYTES`   (usize)
    /// - `ANALYZER_IGNORE_GLOBS`     (comma-separated)
    /// - `CPG_SCHEMA_PATH`           (path)
    /// - `PUBSUB_NAME`               (string)
    /// - `STORAGE_APP_ID`            (string)
    pub fn load_from_env_or_default() -> Result<Self> {
        let mut cfg = Self::default();

        // Limits
        if let Some(v) = env_usize("ANALYZER_MAX_FILE_BYTES") {
            cfg.limits.max_file_bytes = v;
        }

        // Filters
        if let Some(v) = env_list("ANALYZER_IGNORE_GLOBS") {
            cfg.filters.ignore_globs = v;
        }

        // Schema
        if let Ok(v) = env::var("CPG_SCHEMA_PATH") {
            if !v.trim().is_empty() {
                cfg.schema_path = v;
            }
        }

        // Transport
        if let Ok(v) = env::var("PUBSUB_NAME") {
            if !v.trim().is_empty() {
                cfg.transport.pubsub_name = v;
            }
        }
        if let Ok(v) = env::var("STORAGE_APP_ID") {
            if !v.trim().is_empty() {
                cfg.transport.storage_app_id = v;
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Basic config validation — ensures limits and options are consistent.
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_file_bytes == 0 {
            return Err(anyhow!("max_file_bytes must be greater than 0"));
        }
        if self.transport.pubsub_name.trim().is_empty() {
            return Err(anyhow!("pubsub_name must not be empty"));
        }
        Ok(())
    }
}

/// File filtering rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filters {
    /// Glob patterns for files to ignore during the scan.
    pub ignore_globs: Vec<String>,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            ignore_globs: vec![
                String::from("**/.git/**"),
                String::from("**/node_modules/**"),
                String::from("**/build/**"),
                String::from("**/target/**"),
            ],
        }
    }
}

/// Limits for scanning and parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    /// Maximum file size to parse (bytes).
    pub max_file_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_file_bytes: 2 * 1024 * 1024, // 2 MB
        }
    }
}

/// Pub/sub topics and collaborator app ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transport {
    /// Dapr pub/sub component name.
    pub pubsub_name: String,
    /// Topic the analyzer subscribes to for work items.
    pub tasks_topic: String,
    /// Topic receiving the compressed CPG export.
    pub graph_topic: String,
    /// Topic receiving the structured run summary.
    pub results_topic: String,
    /// App id of the storage collaborator serving project archives.
    pub storage_app_id: String,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            pubsub_name: String::from("pubsub"),
            tasks_topic: String::from("parser-code-tasks"),
            graph_topic: String::from("graph-updates"),
            results_topic: String::from("results"),
            storage_app_id: String::from("graph-store-adapter"),
        }
    }
}

/* ------------------------- ENV helpers ------------------------- */

fn env_usize(key: &str) -> Option<usize> {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_list(key: &str) -> Option<Vec<String>> {
    let raw = env::var(key).ok()?;
    let list = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect::<Vec<_>>();
    Some(list)
}
