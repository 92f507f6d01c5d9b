mod errors;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::engine::WorkflowEngine;

pub use errors::AppError;

pub const DEFAULT_MAX_BODY: usize = 1_048_576;

/// Shared application state accessible by all handlers.
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
}

/// Build the router with every route and layer mounted.
pub fn router(state: Arc<AppState>, max_body: usize) -> Router {
    Router::new()
        .route(
            "/workflows",
            post(handlers::create_workflow).get(handlers::list_workflows),
        )
        .route("/workflows/search", get(handlers::search_workflows))
        .route("/workflows/import", post(handlers::import_workflow))
        .route("/workflows/bulk-delete", post(handlers::bulk_delete_workflows))
        .route(
            "/workflows/{id}",
            get(handlers::get_workflow)
                .put(handlers::update_workflow)
                .delete(handlers::delete_workflow),
        )
        .route("/workflows/{id}/clone", post(handlers::clone_workflow))
        .route("/workflows/{id}/tags", post(handlers::add_tags))
        .route("/workflows/{id}/tags/{tag}", delete(handlers::remove_tag))
        .route("/workflows/{id}/history", get(handlers::get_history))
        .route("/workflows/{id}/versions/{version}", get(handlers::get_version))
        .route(
            "/workflows/{id}/versions/{version}/rollback",
            post(handlers::rollback_workflow),
        )
        .route("/workflows/{id}/export", get(handlers::export_workflow))
        .route("/workflows/{id}/execute", post(handlers::execute_workflow))
        .route("/workflows/{id}/dry-run", post(handlers::dry_run_workflow))
        .route("/executions", get(handlers::list_executions))
        .route("/executions/compare", get(handlers::compare_executions))
        .route("/executions/{id}", get(handlers::get_execution))
        .route("/executions/{id}/retry", post(handlers::retry_execution))
        .route("/executions/{id}/cancel", post(handlers::cancel_execution))
        .route("/analytics/summary", get(handlers::analytics_summary))
        .route("/analytics/workflows/{id}", get(handlers::analytics_workflow))
        .route("/analytics/timeline", get(handlers::analytics_timeline))
        .route("/schedules", get(handlers::list_schedules))
        .route("/schedules/due", get(handlers::due_schedules))
        .route("/schedules/trigger", post(handlers::trigger_schedules))
        .route("/schedules/{id}/enable", post(handlers::enable_schedule))
        .route("/schedules/{id}/disable", post(handlers::disable_schedule))
        .route("/actions", get(handlers::list_actions))
        .route("/admin/reset", post(handlers::reset))
        .route("/admin/indexes/rebuild", post(handlers::rebuild_indexes))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the REST API server.
pub async fn serve(host: &str, port: u16, max_body: usize, engine: Arc<WorkflowEngine>) -> Result<()> {
    let state = Arc::new(AppState { engine });
    let app = router(state, max_body);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Taskflow API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
