use axum::{
    Extension, Json,
    extract::{Path, State},
};
use std::sync::Arc;

use super::{
    ApiError, ApiResponse, AppState, CreateCronRequest, CronCreatedDto, CronStatusDto,
    CronStatusRequest, CronTaskListDto, DeletedDto,
};
use crate::domain::Identity;
use crate::services::CronError;

impl From<CronError> for ApiError {
    fn from(err: CronError) -> Self {
        match err {
            CronError::NotFound { kind, id } => Self::not_found(kind, id),
            CronError::Validation(msg) => Self::ValidationError(msg),
            CronError::Configuration(msg) => Self::Configuration(msg),
            CronError::QueueFull => Self::QueueFull,
            CronError::Database(msg) => Self::DatabaseError(msg),
        }
    }
}

/// Accepts a JSON number or string.
fn wire_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// GET /projects/{id}/cron
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
) -> Result<Json<ApiResponse<CronTaskListDto>>, ApiError> {
    let cron_tasks = state.cron_service().list(&identity, &project_id).await?;
    Ok(Json(ApiResponse::success(CronTaskListDto { cron_tasks })))
}

/// POST /projects/{id}/cron
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    Json(payload): Json<CreateCronRequest>,
) -> Result<Json<ApiResponse<CronCreatedDto>>, ApiError> {
    let created = state
        .cron_service()
        .create(
            &identity,
            &project_id,
            &payload.domain,
            &wire_text(&payload.period),
        )
        .await?;
    Ok(Json(ApiResponse::success(created)))
}

/// PUT /cron/{id}/status
pub async fn set_task_status(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(payload): Json<CronStatusRequest>,
) -> Result<Json<ApiResponse<CronStatusDto>>, ApiError> {
    let status = state
        .cron_service()
        .set_status(&identity, &id, &wire_text(&payload.status))
        .await?;
    Ok(Json(ApiResponse::success(status)))
}

/// DELETE /cron/{id}
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<DeletedDto>>, ApiError> {
    state.cron_service().delete(&identity, &id).await?;
    Ok(Json(ApiResponse::success(DeletedDto { id })))
}
