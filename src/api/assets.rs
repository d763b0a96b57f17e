//! Handlers for the host/port/domain asset graph.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use std::sync::Arc;

use super::{
    ApiError, ApiResponse, AppState, DeletedDto, DomainMergedDto, HostMergedDto,
    MergeDomainRequest, MergeHostRequest, NoteDto, NoteRequest, StyleDto, StyleRequest,
};
use crate::domain::{Identity, ResourceKind};
use crate::services::AssetError;

impl From<AssetError> for ApiError {
    fn from(err: AssetError) -> Self {
        match err {
            AssetError::NotFound { kind, id } => Self::not_found(kind, id),
            AssetError::Validation(msg) => Self::ValidationError(msg),
            AssetError::Database(msg) => Self::DatabaseError(msg),
        }
    }
}

/// POST /projects/{id}/hosts
pub async fn merge_host(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    Json(payload): Json<MergeHostRequest>,
) -> Result<Json<ApiResponse<HostMergedDto>>, ApiError> {
    let host = state
        .asset_service()
        .merge_host(&identity, &project_id, &payload.ip, &payload.ports)
        .await?;
    Ok(Json(ApiResponse::success(HostMergedDto { host })))
}

/// POST /projects/{id}/domains
pub async fn merge_domain(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(project_id): Path<String>,
    Json(payload): Json<MergeDomainRequest>,
) -> Result<Json<ApiResponse<DomainMergedDto>>, ApiError> {
    let domain = state
        .asset_service()
        .merge_domain(&identity, &project_id, &payload.domain, &payload.ip)
        .await?;
    Ok(Json(ApiResponse::success(DomainMergedDto { domain })))
}

async fn read_note(
    state: &AppState,
    identity: &Identity,
    kind: ResourceKind,
    id: &str,
) -> Result<Json<ApiResponse<NoteDto>>, ApiError> {
    let note = state.asset_service().get_note(identity, kind, id).await?;
    Ok(Json(ApiResponse::success(NoteDto { note })))
}

async fn write_note(
    state: &AppState,
    identity: &Identity,
    kind: ResourceKind,
    id: &str,
    note: &str,
) -> Result<Json<ApiResponse<NoteDto>>, ApiError> {
    let rendered = state
        .asset_service()
        .update_note(identity, kind, id, note)
        .await?;
    Ok(Json(ApiResponse::success(NoteDto { note: rendered })))
}

async fn write_style(
    state: &AppState,
    identity: &Identity,
    kind: ResourceKind,
    id: &str,
    style: &str,
) -> Result<Json<ApiResponse<StyleDto>>, ApiError> {
    let style = state
        .asset_service()
        .set_style(identity, kind, id, style)
        .await?;
    Ok(Json(ApiResponse::success(StyleDto { style })))
}

/// GET /hosts/{id}/note
pub async fn get_host_note(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<NoteDto>>, ApiError> {
    read_note(&state, &identity, ResourceKind::Host, &id).await
}

/// PUT /hosts/{id}/note
pub async fn update_host_note(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(payload): Json<NoteRequest>,
) -> Result<Json<ApiResponse<NoteDto>>, ApiError> {
    write_note(&state, &identity, ResourceKind::Host, &id, &payload.note).await
}

/// PUT /hosts/{id}/style
pub async fn set_host_style(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(payload): Json<StyleRequest>,
) -> Result<Json<ApiResponse<StyleDto>>, ApiError> {
    write_style(&state, &identity, ResourceKind::Host, &id, &payload.style).await
}

/// DELETE /hosts/{id}
/// Removes the host together with its ports.
pub async fn delete_host(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<DeletedDto>>, ApiError> {
    state.asset_service().delete_host(&identity, &id).await?;
    Ok(Json(ApiResponse::success(DeletedDto { id })))
}

/// GET /ports/{id}/note
pub async fn get_port_note(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<NoteDto>>, ApiError> {
    read_note(&state, &identity, ResourceKind::Port, &id).await
}

/// PUT /ports/{id}/note
pub async fn update_port_note(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(payload): Json<NoteRequest>,
) -> Result<Json<ApiResponse<NoteDto>>, ApiError> {
    write_note(&state, &identity, ResourceKind::Port, &id, &payload.note).await
}

/// GET /domains/{id}/note
pub async fn get_domain_note(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<NoteDto>>, ApiError> {
    read_note(&state, &identity, ResourceKind::Domain, &id).await
}

/// PUT /domains/{id}/note
pub async fn update_domain_note(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(payload): Json<NoteRequest>,
) -> Result<Json<ApiResponse<NoteDto>>, ApiError> {
    write_note(&state, &identity, ResourceKind::Domain, &id, &payload.note).await
}

/// PUT /domains/{id}/style
pub async fn set_domain_style(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(payload): Json<StyleRequest>,
) -> Result<Json<ApiResponse<StyleDto>>, ApiError> {
    write_style(&state, &identity, ResourceKind::Domain, &id, &payload.style).await
}

/// DELETE /domains/{id}
pub async fn delete_domain(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<DeletedDto>>, ApiError> {
    state.asset_service().delete_domain(&identity, &id).await?;
    Ok(Json(ApiResponse::success(DeletedDto { id })))
}
