//! HTTP surface of the Lua code analyzer.
//!
//! Exposes the health/readiness probes, the Dapr subscription
//! advertisement and the pub/sub delivery route, and wires them to the
//! orchestrating [`core::analyzer_service::AnalyzerService`].

pub mod core;
pub mod error_handler;
pub mod routes;

use crate::core::analyzer_service::AnalyzerService;
use crate::core::app_state::AppState;
use crate::error_handler::AppError;
use axum::Router;
use axum::routing::{get, post};
use cpg_builder::config::model::AnalyzerConfig;
use services::dapr::DaprClient;
use std::env;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Build the router over shared state.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health_route::health))
        .route("/ready", get(routes::health_route::ready))
        .route("/dapr/subscribe", get(routes::dapr_subscribe_route::dapr_subscribe))
        .route(
            "/parser-code-tasks",
            post(routes::parse_task::parse_task_route::parse_task),
        )
        .with_state(state)
}

/// Start the service on `$APP_PORT` (default 8080).
pub async fn start() -> Result<(), AppError> {
    let config = AnalyzerConfig::load_from_env_or_default().map_err(AppError::Internal)?;
    let dapr = DaprClient::from_env().map_err(|e| AppError::Internal(e.into()))?;
    let analyzer = AnalyzerService::new(dapr, config.clone()).map_err(AppError::Internal)?;

    let state = Arc::new(AppState { analyzer, config });
    let router = app(state);

    let port: u16 = env::var("APP_PORT")
        .ok()
        .and_then(|p| p.trim().parse().ok())
        .unwrap_or(8080);
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(AppError::Bind)?;
    info!("api: listening on port {port}");

    axum::serve(listener, router).await.map_err(AppError::Server)?;
    Ok(())
}
