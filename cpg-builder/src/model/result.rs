//! Run outcome reporting.
//!
//! One `ProcessingResult` is published to the `results` topic per work item,
//! regardless of outcome. Per-file failures are recoverable and recorded as
//! `FileError`s; everything else fails the whole run.

use serde::{Deserialize, Serialize};

/// Outcome of a single analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Zero failures.
    Completed,
    /// At least one failure and at least one success.
    Partial,
    /// Zero successes, or a non-recoverable error.
    Failed,
}

/// A recoverable, per-file failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    pub file_path: String,
    pub error_type: String,
    pub error_message: String,
}

impl FileError {
    pub fn new(
        file_path: impl Into<String>,
        error_type: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            error_type: error_type.into(),
            error_message: error_message.into(),
        }
    }
}

/// Structured summary published to the `results` topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub project_id: String,
    pub status: RunStatus,
    pub files_processed: usize,
    pub files_failed: usize,
    #[serde(default)]
    pub errors: Vec<FileError>,
    pub message: String,
}

impl ProcessingResult {
    /// Derive the run status from processed/failed counters.
    pub fn status_from_counts(processed: usize, failed: usize) -> RunStatus {
        match (processed, failed) {
            (_, 0) => RunStatus::Completed,
            (0, _) => RunStatus::Failed,
            _ => RunStatus::Partial,
        }
    }

    /// A `failed` result carrying a single explanatory message.
    pub fn failed(project_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            status: RunStatus::Failed,
            files_processed: 0,
            files_failed: 0,
            errors: Vec::new(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_derivation() {
        assert_eq!(
            ProcessingResult::status_from_counts(3, 0),
            RunStatus::Completed
        );
        assert_eq!(
            ProcessingResult::status_from_counts(2, 1),
            RunStatus::Partial
        );
        assert_eq!(
            ProcessingResult::status_from_counts(0, 2),
            RunStatus::Failed
        );
        // An empty project has nothing to fail on.
        assert_eq!(
            ProcessingResult::status_from_counts(0, 0),
            RunStatus::Completed
        );
    }

    #[test]
    fn result_serializes_with_snake_case_status() {
        let result = ProcessingResult {
            project_id: "p1".into(),
            status: RunStatus::Partial,
            files_processed: 1,
            files_failed: 1,
            errors: vec![FileError::new("a.lua", "SyntaxError", "unexpected token")],
            message: "done".into(),
        };
        let v = serde_json::to_value(&result).unwrap();
        assert_eq!(v["status"], "partial");
        assert_eq!(v["errors"][0]["error_type"], "SyntaxError");
    }
}
