use axum::{
    Extension, Json,
    extract::{Path, State},
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, ScanQueuedDto, ScanRequest};
use crate::domain::{Identity, ScanStrategy, ScanTool};
use crate::services::DispatchError;

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NotFound { kind, id } => Self::not_found(kind, id),
            DispatchError::Validation(msg) => Self::ValidationError(msg),
            DispatchError::Configuration(msg) => Self::Configuration(msg),
            DispatchError::QueueFull => Self::QueueFull,
            DispatchError::Database(msg) => Self::DatabaseError(msg),
        }
    }
}

async fn dispatch(
    state: &AppState,
    identity: &Identity,
    project_id: &str,
    tool: ScanTool,
    payload: &ScanRequest,
) -> Result<Json<ApiResponse<ScanQueuedDto>>, ApiError> {
    let strategy: ScanStrategy = payload.strategy.parse().map_err(|()| {
        ApiError::validation(format!("Unknown scan strategy: '{}'", payload.strategy))
    })?;

    let queued = state
        .dispatcher()
        .dispatch_port_scan(
            identity,
            project_id,
            tool,
            strategy,
            payload.targets.as_deref(),
        )
        .await?;

    Ok(Json(ApiResponse::success(ScanQueuedDto {
        run_id: queued.run_id,
        targets: queued.targets,
    })))
}

/// POST /projects/{id}/scans/nmap
///
/// Returns once the job is queued; the outcome lands in the scan history.
pub async fn scan_nmap(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    Json(payload): Json<ScanRequest>,
) -> Result<Json<ApiResponse<ScanQueuedDto>>, ApiError> {
    dispatch(&state, &identity, &project_id, ScanTool::Nmap, &payload).await
}

/// POST /projects/{id}/scans/masscan
pub async fn scan_masscan(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    Json(payload): Json<ScanRequest>,
) -> Result<Json<ApiResponse<ScanQueuedDto>>, ApiError> {
    dispatch(&state, &identity, &project_id, ScanTool::Masscan, &payload).await
}
