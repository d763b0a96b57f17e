//! Operational endpoints: status, persisted logs and health probes.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, LogDto, LogPageDto, LogsQuery, SystemStatus};
use crate::db::LogFilter;
use crate::domain::RunStatus;

const DEFAULT_PAGE_SIZE: u64 = 50;
const MAX_PAGE_SIZE: u64 = 500;

#[derive(Debug, Serialize)]
pub struct HealthLiveResponse {
    pub state: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthReadyResponse {
    pub ready: bool,
    pub database: bool,
}

/// `GET /api/system/status`
///
/// Asset totals across all users plus the dispatcher's queue state.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<SystemStatus>>, ApiError> {
    let store = state.store();

    let (projects, hosts, domains, enabled_cron_tasks) = tokio::try_join!(
        store.count_projects(),
        store.count_hosts(),
        store.count_domains(),
        store.count_enabled_cron_tasks(),
    )?;
    let (scans_queued, scans_running, scans_failed) = tokio::try_join!(
        store.count_scan_runs(RunStatus::Queued),
        store.count_scan_runs(RunStatus::Running),
        store.count_scan_runs(RunStatus::Failed),
    )?;

    let dispatcher = state.dispatcher();

    Ok(Json(ApiResponse::success(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.start_time.elapsed().as_secs(),
        projects,
        hosts,
        domains,
        enabled_cron_tasks,
        scans_queued,
        scans_running,
        scans_failed,
        max_concurrent_scans: dispatcher.max_concurrent(),
        queue_capacity: dispatcher.queue_capacity(),
    })))
}

/// `GET /api/system/logs`
pub async fn get_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<ApiResponse<LogPageDto>>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let filter = LogFilter {
        level: query.level,
        event_type: query.event_type,
        since: query.since,
    };

    let (logs, total_pages) = state.store().get_logs(page, page_size, filter).await?;

    Ok(Json(ApiResponse::success(LogPageDto {
        logs: logs.into_iter().map(LogDto::from).collect(),
        total_pages,
    })))
}

/// `GET /api/system/health/live`
pub async fn health_live() -> impl IntoResponse {
    Json(ApiResponse::success(HealthLiveResponse { state: "alive" }))
}

/// `GET /api/system/health/ready`
///
/// Readiness probe that checks database connectivity.
pub async fn health_ready(State(state): State<Arc<AppState>>) -> Response {
    let database = state.store().ping().await.is_ok();
    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ApiResponse::success(HealthReadyResponse {
            ready: database,
            database,
        })),
    )
        .into_response()
}
