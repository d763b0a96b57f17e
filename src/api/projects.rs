use axum::{
    Extension, Json,
    extract::{Path, State},
};
use std::sync::Arc;

use super::{
    ApiError, ApiResponse, AppState, CreateProjectRequest, DeletedDto, ProjectDto, ProjectListDto,
    ProjectOverviewDto, RenameProjectRequest, ScanRunListDto,
};
use crate::domain::Identity;
use crate::services::ProjectError;

impl From<ProjectError> for ApiError {
    fn from(err: ProjectError) -> Self {
        match err {
            ProjectError::NotFound(id) => Self::not_found("project", id),
            ProjectError::Validation(msg) => Self::ValidationError(msg),
            ProjectError::Database(msg) => Self::DatabaseError(msg),
        }
    }
}

/// GET /projects
pub async fn list_projects(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<ApiResponse<ProjectListDto>>, ApiError> {
    let projects = state.project_service().list(&identity).await?;
    Ok(Json(ApiResponse::success(ProjectListDto { projects })))
}

/// POST /projects
pub async fn create_project(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<Json<ApiResponse<ProjectDto>>, ApiError> {
    let project = state
        .project_service()
        .create(&identity, &payload.name)
        .await?;
    Ok(Json(ApiResponse::success(project)))
}

/// GET /projects/{id}
pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ProjectOverviewDto>>, ApiError> {
    let overview = state.project_service().overview(&identity, &id).await?;
    Ok(Json(ApiResponse::success(overview)))
}

/// PUT /projects/{id}/name
pub async fn rename_project(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(payload): Json<RenameProjectRequest>,
) -> Result<Json<ApiResponse<ProjectDto>>, ApiError> {
    let project = state
        .project_service()
        .rename(&identity, &id, &payload.name)
        .await?;
    Ok(Json(ApiResponse::success(project)))
}

/// DELETE /projects/{id}
pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<DeletedDto>>, ApiError> {
    state.project_service().delete(&identity, &id).await?;

    tracing::info!(project_id = %id, owner = %identity, "Project deleted");

    Ok(Json(ApiResponse::success(DeletedDto { id })))
}

/// GET /projects/{id}/scans
pub async fn scan_history(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ScanRunListDto>>, ApiError> {
    let scans = state.project_service().scan_history(&identity, &id).await?;
    Ok(Json(ApiResponse::success(ScanRunListDto { scans })))
}
