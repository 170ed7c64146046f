//! REST API handlers for team, task and inbox queries

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;

use teamscope_core::teams::{validate_team_name, TeamInboxData};
use teamscope_core::{MonitorError, TeamMonitor, TeamMonitorData, TeamSummary};

/// JSON error response: status plus `{"error": message}`
pub(super) type ApiError = (StatusCode, Json<serde_json::Value>);

/// Helper to create JSON error responses
pub(super) fn json_error(status: StatusCode, message: &str) -> ApiError {
    (status, Json(serde_json::json!({"error": message})))
}

/// Map a boundary error to its client-visible response
fn monitor_error(err: MonitorError) -> ApiError {
    match err {
        MonitorError::InvalidTeamName { name } => {
            tracing::warn!("API: rejected team name {:?}", name);
            json_error(StatusCode::BAD_REQUEST, "Invalid team name")
        }
        MonitorError::TeamNotFound { name } => {
            tracing::debug!("API: team not found name={}", name);
            json_error(StatusCode::NOT_FOUND, "Team not found")
        }
    }
}

/// Log an unexpected failure and hide it behind a generic 500
fn internal_error(context: &str, err: anyhow::Error) -> ApiError {
    tracing::error!("API: {}: {:#}", context, err);
    json_error(StatusCode::INTERNAL_SERVER_ERROR, context)
}

/// Shared application state for API handlers
pub struct ApiState {
    pub monitor: TeamMonitor,
}

/// Liveness probe
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Summaries of every team
pub async fn get_teams(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<TeamSummary>>, ApiError> {
    state
        .monitor
        .get_summaries()
        .await
        .map(Json)
        .map_err(|e| internal_error("Failed to fetch teams", e))
}

/// Full snapshot (reconciled config + tasks) of one team
pub async fn get_team_detail(
    State(state): State<Arc<ApiState>>,
    Path(team_id): Path<String>,
) -> Result<Json<TeamMonitorData>, ApiError> {
    // Validate team name to prevent path traversal
    validate_team_name(&team_id).map_err(monitor_error)?;

    state
        .monitor
        .get_snapshot(&team_id)
        .await
        .map_err(|e| internal_error("Failed to fetch tasks", e))?
        .map(Json)
        .ok_or_else(|| monitor_error(MonitorError::TeamNotFound { name: team_id }))
}

/// Inboxes of every team that has any
pub async fn get_all_inboxes(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<TeamInboxData>>, ApiError> {
    state
        .monitor
        .get_all_inbox_snapshots()
        .await
        .map(Json)
        .map_err(|e| internal_error("Failed to fetch inboxes", e))
}

/// Inboxes of one team
pub async fn get_team_inboxes(
    State(state): State<Arc<ApiState>>,
    Path(team_name): Path<String>,
) -> Result<Json<TeamInboxData>, ApiError> {
    validate_team_name(&team_name).map_err(monitor_error)?;

    state
        .monitor
        .get_inbox_snapshot(&team_name)
        .await
        .map_err(|e| internal_error("Failed to fetch inboxes", e))?
        .map(Json)
        .ok_or_else(|| monitor_error(MonitorError::TeamNotFound { name: team_name }))
}
