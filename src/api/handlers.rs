use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::analytics::{ExecutionSummary, Timeline, WorkflowStats};
use crate::engine::types::*;
use crate::scheduler::ScheduleEntry;
use crate::storage::Indexes;

use super::AppState;
use super::errors::AppError;

// --- Request/Response types ---

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Deserialize)]
pub struct ExecuteQuery {
    pub trigger: Option<String>,
}

#[derive(Deserialize)]
pub struct TagsRequest {
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<String>,
}

#[derive(Deserialize)]
pub struct ListExecutionsQuery {
    pub workflow_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct CompareQuery {
    pub a: String,
    pub b: String,
}

#[derive(Deserialize)]
pub struct DaysQuery {
    pub days: Option<u32>,
}

#[derive(Deserialize)]
pub struct TimelineQuery {
    pub hours: Option<u32>,
    pub bucket_minutes: Option<u32>,
    pub workflow_id: Option<String>,
}

#[derive(Serialize)]
pub struct ActionInfo {
    pub name: String,
    pub description: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

const DEFAULT_DAYS: u32 = 7;
const DEFAULT_HOURS: u32 = 24;
const DEFAULT_BUCKET_MINUTES: u32 = 60;

fn workflow_not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Workflow '{}' not found", id))
}

// --- Workflows ---

/// POST /workflows
pub async fn create_workflow(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewWorkflow>,
) -> Result<Json<WorkflowDefinition>, AppError> {
    let workflow = state.engine.create_workflow(req)?;
    state.engine.analytics().invalidate();
    Ok(Json(workflow))
}

/// GET /workflows
pub async fn list_workflows(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WorkflowQuery>,
) -> Result<Json<Page<WorkflowDefinition>>, AppError> {
    Ok(Json(state.engine.list_workflows(&query)?))
}

/// GET /workflows/search
pub async fn search_workflows(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Json<serde_json::Value> {
    let workflows = state.engine.search_workflows(&query.q);
    Json(serde_json::json!({
        "total": workflows.len(),
        "workflows": workflows,
    }))
}

/// GET /workflows/:id
pub async fn get_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowDefinition>, AppError> {
    state
        .engine
        .get_workflow(&id)
        .map(Json)
        .ok_or_else(|| workflow_not_found(&id))
}

/// PUT /workflows/:id
pub async fn update_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<WorkflowUpdate>,
) -> Result<Json<WorkflowDefinition>, AppError> {
    let workflow = state.engine.update_workflow(&id, req)?;
    state.engine.analytics().invalidate();
    Ok(Json(workflow))
}

/// DELETE /workflows/:id
pub async fn delete_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.engine.delete_workflow(&id) {
        return Err(workflow_not_found(&id));
    }
    state.engine.analytics().invalidate();
    Ok(Json(serde_json::json!({ "deleted": id })))
}

/// POST /workflows/bulk-delete
pub async fn bulk_delete_workflows(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BulkDeleteRequest>,
) -> Json<BulkDeleteResult> {
    let result = state.engine.bulk_delete_workflows(&req.ids);
    state.engine.analytics().invalidate();
    Json(result)
}

/// POST /workflows/:id/clone
pub async fn clone_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowDefinition>, AppError> {
    let workflow = state.engine.clone_workflow(&id)?;
    state.engine.analytics().invalidate();
    Ok(Json(workflow))
}

/// POST /workflows/:id/tags
pub async fn add_tags(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<TagsRequest>,
) -> Result<Json<WorkflowDefinition>, AppError> {
    Ok(Json(state.engine.add_tags(&id, &req.tags)?))
}

/// DELETE /workflows/:id/tags/:tag
pub async fn remove_tag(
    State(state): State<Arc<AppState>>,
    Path((id, tag)): Path<(String, String)>,
) -> Result<Json<WorkflowDefinition>, AppError> {
    Ok(Json(state.engine.remove_tag(&id, &tag)?))
}

/// GET /workflows/:id/history
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<WorkflowVersion>>, AppError> {
    Ok(Json(state.engine.get_history(&id)?))
}

/// GET /workflows/:id/versions/:version
pub async fn get_version(
    State(state): State<Arc<AppState>>,
    Path((id, version)): Path<(String, u32)>,
) -> Result<Json<WorkflowDefinition>, AppError> {
    Ok(Json(state.engine.get_version(&id, version)?))
}

/// POST /workflows/:id/versions/:version/rollback
pub async fn rollback_workflow(
    State(state): State<Arc<AppState>>,
    Path((id, version)): Path<(String, u32)>,
) -> Result<Json<WorkflowDefinition>, AppError> {
    let workflow = state.engine.rollback_workflow(&id, version)?;
    state.engine.analytics().invalidate();
    Ok(Json(workflow))
}

/// GET /workflows/:id/export
pub async fn export_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowExport>, AppError> {
    Ok(Json(state.engine.export_workflow(&id)?))
}

/// POST /workflows/import
pub async fn import_workflow(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WorkflowExport>,
) -> Result<Json<WorkflowDefinition>, AppError> {
    let workflow = state.engine.import_workflow(req)?;
    state.engine.analytics().invalidate();
    Ok(Json(workflow))
}

// --- Executions ---

/// POST /workflows/:id/execute
pub async fn execute_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ExecuteQuery>,
) -> Result<Json<WorkflowExecution>, AppError> {
    let trigger = query.trigger.as_deref().unwrap_or("manual");
    let execution = state.engine.execute_workflow(&id, trigger)?;
    state.engine.analytics().invalidate();
    Ok(Json(execution))
}

/// POST /workflows/:id/dry-run
pub async fn dry_run_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowExecution>, AppError> {
    Ok(Json(state.engine.dry_run_workflow(&id)?))
}

/// GET /executions
pub async fn list_executions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListExecutionsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<ExecutionStatus>)
        .transpose()
        .map_err(AppError::BadRequest)?;
    let filter = ExecutionFilter {
        workflow_id: query.workflow_id,
        status,
        limit: query.limit,
    };
    let executions = state.engine.list_executions(&filter)?;
    Ok(Json(serde_json::json!({
        "total": executions.len(),
        "executions": executions,
    })))
}

/// GET /executions/:id
pub async fn get_execution(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowExecution>, AppError> {
    state
        .engine
        .get_execution(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Execution '{}' not found", id)))
}

/// POST /executions/:id/retry
pub async fn retry_execution(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowExecution>, AppError> {
    let execution = state.engine.retry_execution(&id)?;
    state.engine.analytics().invalidate();
    Ok(Json(execution))
}

/// POST /executions/:id/cancel
pub async fn cancel_execution(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowExecution>, AppError> {
    let execution = state.engine.cancel_execution(&id)?;
    state.engine.analytics().invalidate();
    Ok(Json(execution))
}

/// GET /executions/compare?a=..&b=..
pub async fn compare_executions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CompareQuery>,
) -> Result<Json<ExecutionComparison>, AppError> {
    Ok(Json(state.engine.compare_executions(&query.a, &query.b)?))
}

// --- Analytics ---

/// GET /analytics/summary
pub async fn analytics_summary(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DaysQuery>,
) -> Result<Json<ExecutionSummary>, AppError> {
    let summary = state
        .engine
        .analytics()
        .summary(query.days.unwrap_or(DEFAULT_DAYS))?;
    Ok(Json(summary.as_ref().clone()))
}

/// GET /analytics/workflows/:id
pub async fn analytics_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<DaysQuery>,
) -> Result<Json<WorkflowStats>, AppError> {
    let stats = state
        .engine
        .analytics()
        .workflow_stats(&id, query.days.unwrap_or(DEFAULT_DAYS))?;
    Ok(Json(stats.as_ref().clone()))
}

/// GET /analytics/timeline
pub async fn analytics_timeline(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TimelineQuery>,
) -> Result<Json<Timeline>, AppError> {
    let timeline = state.engine.analytics().timeline(
        query.hours.unwrap_or(DEFAULT_HOURS),
        query.bucket_minutes.unwrap_or(DEFAULT_BUCKET_MINUTES),
        query.workflow_id.as_deref(),
    )?;
    Ok(Json(timeline.as_ref().clone()))
}

// --- Schedules ---

/// GET /schedules
pub async fn list_schedules(State(state): State<Arc<AppState>>) -> Json<Vec<ScheduleEntry>> {
    Json(state.engine.schedules().list())
}

/// GET /schedules/due
pub async fn due_schedules(State(state): State<Arc<AppState>>) -> Json<Vec<ScheduleEntry>> {
    Json(state.engine.schedules().due(Utc::now()))
}

/// POST /schedules/trigger
pub async fn trigger_schedules(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<WorkflowExecution>> {
    let executions = state.engine.trigger_due_schedules(Utc::now());
    state.engine.analytics().invalidate();
    Json(executions)
}

/// POST /schedules/:id/enable
pub async fn enable_schedule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ScheduleEntry>, AppError> {
    set_schedule_enabled(&state, &id, true)
}

/// POST /schedules/:id/disable
pub async fn disable_schedule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ScheduleEntry>, AppError> {
    set_schedule_enabled(&state, &id, false)
}

fn set_schedule_enabled(
    state: &AppState,
    id: &str,
    enabled: bool,
) -> Result<Json<ScheduleEntry>, AppError> {
    state
        .engine
        .schedules()
        .set_enabled(id, enabled)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No schedule for workflow '{}'", id)))
}

// --- Misc ---

/// GET /actions
pub async fn list_actions(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let actions: Vec<ActionInfo> = state
        .engine
        .registry()
        .list()
        .into_iter()
        .map(|(name, description)| ActionInfo { name, description })
        .collect();

    let total = actions.len();
    Json(serde_json::json!({
        "actions": actions,
        "total": total,
    }))
}

/// POST /admin/reset
pub async fn reset(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.engine.reset();
    Json(serde_json::json!({ "reset": true }))
}

/// POST /admin/indexes/rebuild
pub async fn rebuild_indexes(State(state): State<Arc<AppState>>) -> Json<Indexes> {
    Json(state.engine.rebuild_indexes())
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
