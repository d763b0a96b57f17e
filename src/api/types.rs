use serde::{Deserialize, Serialize};

use crate::domain::PortObservation;
use crate::entities::{crontab, domains, hosts, ports, projects, scan_runs, system_logs};

pub const STATUS_SUCCESS: &str = "success";

/// Envelope of every JSON response: a `status` string plus the payload's
/// fields at the top level.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(flatten)]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            reason: None,
            data: Some(data),
        }
    }

    pub fn error(status: impl Into<String>, reason: Option<String>) -> Self {
        Self {
            status: status.into(),
            reason,
            data: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectDto {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub created_at: String,
}

impl From<projects::Model> for ProjectDto {
    fn from(model: projects::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            owner: model.owner,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectListDto {
    pub projects: Vec<ProjectDto>,
}

#[derive(Debug, Serialize)]
pub struct PortDto {
    pub id: String,
    pub port: String,
    pub state: String,
    pub service: String,
    pub version: String,
    pub note: String,
}

impl From<ports::Model> for PortDto {
    fn from(model: ports::Model) -> Self {
        Self {
            id: model.id,
            port: model.port,
            state: model.state,
            service: model.service,
            version: model.version,
            note: model.note,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HostDto {
    pub id: String,
    pub ip: String,
    pub note: String,
    pub style: String,
    pub portsq: i32,
    pub ports: Vec<PortDto>,
}

impl HostDto {
    #[must_use]
    pub fn with_ports(model: hosts::Model, ports: Vec<PortDto>) -> Self {
        Self {
            id: model.id,
            ip: model.ip,
            note: model.note,
            style: model.style,
            portsq: model.portsq,
            ports,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DomainDto {
    pub id: String,
    pub domain: String,
    pub lvl: String,
    pub ip: String,
    pub note: String,
    pub style: String,
}

impl From<domains::Model> for DomainDto {
    fn from(model: domains::Model) -> Self {
        Self {
            id: model.id,
            domain: model.domain,
            lvl: model.lvl,
            ip: model.ip,
            note: model.note,
            style: model.style,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CronTaskDto {
    pub id: String,
    pub domain: String,
    pub period: i32,
    pub status: i32,
    pub last_run_at: Option<String>,
    pub last_outcome: Option<String>,
    pub created_at: String,
}

impl From<crontab::Model> for CronTaskDto {
    fn from(model: crontab::Model) -> Self {
        Self {
            id: model.id,
            domain: model.domain,
            period: model.period,
            status: model.status,
            last_run_at: model.last_run_at,
            last_outcome: model.last_outcome,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScanRunDto {
    pub id: String,
    pub cron_task: Option<String>,
    pub tool: String,
    pub strategy: Option<String>,
    pub target_count: i32,
    pub status: String,
    pub hosts_merged: i32,
    pub domains_merged: i32,
    pub error: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

impl From<scan_runs::Model> for ScanRunDto {
    fn from(model: scan_runs::Model) -> Self {
        Self {
            id: model.id,
            cron_task: model.cron_task,
            tool: model.tool,
            strategy: model.strategy,
            target_count: model.target_count,
            status: model.status,
            hosts_merged: model.hosts_merged,
            domains_merged: model.domains_merged,
            error: model.error,
            created_at: model.created_at,
            started_at: model.started_at,
            finished_at: model.finished_at,
        }
    }
}

/// Everything known about one project.
#[derive(Debug, Serialize)]
pub struct ProjectOverviewDto {
    pub project: ProjectDto,
    pub hosts: Vec<HostDto>,
    pub domains: Vec<DomainDto>,
    pub cron_tasks: Vec<CronTaskDto>,
    pub scans: Vec<ScanRunDto>,
}

#[derive(Debug, Serialize)]
pub struct ScanRunListDto {
    pub scans: Vec<ScanRunDto>,
}

#[derive(Debug, Serialize)]
pub struct CronTaskListDto {
    pub cron_tasks: Vec<CronTaskDto>,
}

#[derive(Debug, Serialize)]
pub struct HostMergedDto {
    pub host: HostDto,
}

#[derive(Debug, Serialize)]
pub struct DomainMergedDto {
    pub domain: DomainDto,
}

#[derive(Debug, Serialize)]
pub struct NoteDto {
    pub note: String,
}

#[derive(Debug, Serialize)]
pub struct StyleDto {
    pub style: String,
}

#[derive(Debug, Serialize)]
pub struct ScanQueuedDto {
    pub run_id: String,
    pub targets: usize,
}

#[derive(Debug, Serialize)]
pub struct CronCreatedDto {
    pub task: CronTaskDto,
    pub run_id: String,
}

#[derive(Debug, Serialize)]
pub struct CronStatusDto {
    pub id: String,
    pub status: i32,
}

#[derive(Debug, Serialize)]
pub struct DeletedDto {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime: u64,
    pub projects: u64,
    pub hosts: u64,
    pub domains: u64,
    pub enabled_cron_tasks: u64,
    pub scans_queued: u64,
    pub scans_running: u64,
    pub scans_failed: u64,
    pub max_concurrent_scans: usize,
    pub queue_capacity: usize,
}

#[derive(Debug, Serialize)]
pub struct LogDto {
    pub id: i64,
    pub event_type: String,
    pub level: String,
    pub message: String,
    pub details: Option<String>,
    pub created_at: String,
}

impl From<system_logs::Model> for LogDto {
    fn from(model: system_logs::Model) -> Self {
        Self {
            id: model.id,
            event_type: model.event_type,
            level: model.level,
            message: model.message,
            details: model.details,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LogPageDto {
    pub logs: Vec<LogDto>,
    pub total_pages: u64,
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameProjectRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct MergeHostRequest {
    pub ip: String,
    #[serde(default)]
    pub ports: Vec<PortObservation>,
}

#[derive(Debug, Deserialize)]
pub struct MergeDomainRequest {
    pub domain: String,
    pub ip: String,
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub note: String,
}

#[derive(Debug, Deserialize)]
pub struct StyleRequest {
    #[serde(alias = "type")]
    pub style: String,
}

/// `strategy` accepts `1|2|3` or `unscanned|all|explicit`.
#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub strategy: String,
    #[serde(default)]
    pub targets: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCronRequest {
    pub domain: String,
    pub period: serde_json::Value,
}

/// `status` accepts `0|1` as a number or string.
#[derive(Debug, Deserialize)]
pub struct CronStatusRequest {
    pub status: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub level: Option<String>,
    pub event_type: Option<String>,
    pub since: Option<String>,
}
