use crate::core::analyzer_service::AnalyzerService;
use cpg_builder::config::model::AnalyzerConfig;

/// Shared state for handlers.
pub struct AppState {
    pub analyzer: AnalyzerService,
    pub config: AnalyzerConfig,
}
