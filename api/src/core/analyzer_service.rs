//! Work-item orchestration.
//!
//! One [`AnalyzerService::process_project`] call per inbound work item:
//! allocate a scratch directory, fetch and unpack the project archive,
//! drive the graph pipeline, validate and publish the export, and always
//! publish exactly one result summary. The scratch directory is released
//! on every exit path.

use anyhow::{Context, Result};
use cpg_builder::config::model::AnalyzerConfig;
use cpg_builder::export::schema::CpgSchema;
use cpg_builder::model::result::{ProcessingResult, RunStatus};
use cpg_builder::run::{ProjectAnalysis, analyze_project};
use services::archive;
use services::dapr::DaprClient;
use std::path::Path;
use tracing::{error, info};

pub struct AnalyzerService {
    dapr: DaprClient,
    config: AnalyzerConfig,
    schema: CpgSchema,
}

impl AnalyzerService {
    /// The schema is loaded once; a service that cannot load it must not
    /// come up.
    pub fn new(dapr: DaprClient, config: AnalyzerConfig) -> Result<Self> {
        let schema = CpgSchema::load(Path::new(&config.schema_path))?;
        Ok(Self {
            dapr,
            config,
            schema,
        })
    }

    /// Process one work item end to end. Returns the summary that was
    /// published to the `results` topic; an `Err` means even that summary
    /// could not be delivered and the message should be redelivered.
    pub async fn process_project(&self, project_id: &str) -> Result<ProcessingResult> {
        let result = match self.analyze_and_publish(project_id).await {
            Ok(result) => result,
            Err(err) => {
                error!(project_id, error = %format!("{err:#}"), "Run failed");
                ProcessingResult::failed(project_id, format!("{err:#}"))
            }
        };

        let summary = serde_json::to_value(&result)?;
        self.dapr
            .publish(
                &self.config.transport.pubsub_name,
                &self.config.transport.results_topic,
                &summary,
            )
            .await
            .context("publish result summary")?;

        Ok(result)
    }

    async fn analyze_and_publish(&self, project_id: &str) -> Result<ProcessingResult> {
        // Scratch space scoped to the work item; dropped (and deleted) on
        // every exit path below.
        let workdir = tempfile::tempdir().context("allocate scratch directory")?;

        let archive_path = self
            .dapr
            .download_project_zip(
                &self.config.transport.storage_app_id,
                project_id,
                workdir.path(),
            )
            .await
            .context("download project archive")?;

        let source_dir = workdir.path().join(project_id);
        {
            let archive_path = archive_path.clone();
            let source_dir = source_dir.clone();
            tokio::task::spawn_blocking(move || archive::unpack_zip(&archive_path, &source_dir))
                .await
                .context("join extraction task")??;
        }

        let analysis = {
            let config = self.config.clone();
            let project = project_id.to_string();
            tokio::task::spawn_blocking(move || analyze_project(&source_dir, &project, &config))
                .await
                .context("join analysis task")??
        };

        // A document that fails validation must never reach consumers.
        self.schema.validate(&analysis.document)?;

        let result = summarize(project_id, &analysis);
        if result.status != RunStatus::Failed {
            self.dapr
                .publish_compressed(
                    &self.config.transport.pubsub_name,
                    &self.config.transport.graph_topic,
                    &analysis.document,
                )
                .await
                .context("publish graph update")?;
        }

        info!(
            project_id,
            processed = result.files_processed,
            failed = result.files_failed,
            status = ?result.status,
            "Run finished"
        );
        Ok(result)
    }
}

fn summarize(project_id: &str, analysis: &ProjectAnalysis) -> ProcessingResult {
    let status =
        ProcessingResult::status_from_counts(analysis.files_processed, analysis.files_failed);
    let message = match status {
        RunStatus::Completed => format!("Processed {} files", analysis.files_processed),
        RunStatus::Partial => format!(
            "Processed {} files, {} failed",
            analysis.files_processed, analysis.files_failed
        ),
        RunStatus::Failed => format!("All {} files failed", analysis.files_failed),
    };
    ProcessingResult {
        project_id: project_id.to_string(),
        status,
        files_processed: analysis.files_processed,
        files_failed: analysis.files_failed,
        errors: analysis.errors.clone(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpg_builder::model::result::FileError;
    use serde_json::json;

    fn analysis(processed: usize, failed: usize) -> ProjectAnalysis {
        ProjectAnalysis {
            document: json!({}),
            files_processed: processed,
            files_failed: failed,
            errors: (0..failed)
                .map(|i| FileError::new(format!("f{i}.lua"), "SyntaxError", "bad"))
                .collect(),
        }
    }

    #[test]
    fn summaries_carry_status_and_errors() {
        let ok = summarize("p", &analysis(3, 0));
        assert_eq!(ok.status, RunStatus::Completed);
        assert!(ok.errors.is_empty());

        let partial = summarize("p", &analysis(2, 1));
        assert_eq!(partial.status, RunStatus::Partial);
        assert_eq!(partial.errors.len(), 1);
        assert!(partial.message.contains("1 failed"));

        let failed = summarize("p", &analysis(0, 2));
        assert_eq!(failed.status, RunStatus::Failed);
    }
}
