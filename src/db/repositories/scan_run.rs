use crate::domain::{RunStatus, ScanStrategy, ScanTool};
use crate::entities::{prelude::*, scan_runs};
use anyhow::Result;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

/// Parameters of a run about to be queued.
#[derive(Debug, Clone)]
pub struct NewScanRun<'a> {
    pub project_id: &'a str,
    pub cron_task: Option<&'a str>,
    pub tool: ScanTool,
    pub strategy: Option<ScanStrategy>,
    pub target_count: usize,
}

pub struct ScanRunRepository {
    conn: DatabaseConnection,
}

impl ScanRunRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create_queued(&self, run: NewScanRun<'_>) -> Result<scan_runs::Model> {
        let model = scan_runs::Model {
            id: uuid::Uuid::new_v4().to_string(),
            project: run.project_id.to_string(),
            cron_task: run.cron_task.map(str::to_string),
            tool: run.tool.to_string(),
            strategy: run.strategy.map(|s| s.to_string()),
            target_count: i32::try_from(run.target_count).unwrap_or(i32::MAX),
            status: RunStatus::Queued.to_string(),
            hosts_merged: 0,
            domains_merged: 0,
            error: None,
            created_at: chrono::Utc::now().to_rfc3339(),
            started_at: None,
            finished_at: None,
        };

        let active = scan_runs::ActiveModel::from(model.clone()).reset_all();
        ScanRuns::insert(active)
            .exec_without_returning(&self.conn)
            .await?;

        Ok(model)
    }

    pub async fn mark_running(&self, id: &str) -> Result<()> {
        ScanRuns::update_many()
            .col_expr(
                scan_runs::Column::Status,
                Expr::value(RunStatus::Running.as_str()),
            )
            .col_expr(
                scan_runs::Column::StartedAt,
                Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(scan_runs::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn mark_succeeded(&self, id: &str, hosts_merged: i32, domains_merged: i32) -> Result<()> {
        ScanRuns::update_many()
            .col_expr(
                scan_runs::Column::Status,
                Expr::value(RunStatus::Succeeded.as_str()),
            )
            .col_expr(scan_runs::Column::HostsMerged, Expr::value(hosts_merged))
            .col_expr(scan_runs::Column::DomainsMerged, Expr::value(domains_merged))
            .col_expr(
                scan_runs::Column::FinishedAt,
                Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(scan_runs::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn mark_failed(&self, id: &str, error: &str) -> Result<()> {
        ScanRuns::update_many()
            .col_expr(
                scan_runs::Column::Status,
                Expr::value(RunStatus::Failed.as_str()),
            )
            .col_expr(scan_runs::Column::Error, Expr::value(error))
            .col_expr(
                scan_runs::Column::FinishedAt,
                Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(scan_runs::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<scan_runs::Model>> {
        Ok(ScanRuns::find_by_id(id).one(&self.conn).await?)
    }

    pub async fn list_for_project(&self, project_id: &str, limit: u64) -> Result<Vec<scan_runs::Model>> {
        Ok(ScanRuns::find()
            .filter(scan_runs::Column::Project.eq(project_id))
            .order_by_desc(scan_runs::Column::CreatedAt)
            .limit(limit)
            .all(&self.conn)
            .await?)
    }

    pub async fn count_by_status(&self, status: RunStatus) -> Result<u64> {
        Ok(ScanRuns::find()
            .filter(scan_runs::Column::Status.eq(status.as_str()))
            .count(&self.conn)
            .await?)
    }
}
