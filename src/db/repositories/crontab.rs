use crate::domain::{Period, TaskStatus};
use crate::entities::{crontab, prelude::*};
use anyhow::Result;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};

pub struct CrontabRepository {
    conn: DatabaseConnection,
}

impl CrontabRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(
        &self,
        project_id: &str,
        domain: &str,
        period: Period,
    ) -> Result<crontab::Model> {
        let model = crontab::Model {
            id: uuid::Uuid::new_v4().to_string(),
            project: project_id.to_string(),
            domain: domain.to_string(),
            period: period.level(),
            status: TaskStatus::initial_for(period).as_i32(),
            last_run_at: None,
            last_outcome: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        Crontab::insert(crontab::ActiveModel {
            id: Set(model.id.clone()),
            project: Set(model.project.clone()),
            domain: Set(model.domain.clone()),
            period: Set(model.period),
            status: Set(model.status),
            last_run_at: Set(None),
            last_outcome: Set(None),
            created_at: Set(model.created_at.clone()),
        })
        .exec_without_returning(&self.conn)
        .await?;

        Ok(model)
    }

    pub async fn get(&self, id: &str) -> Result<Option<crontab::Model>> {
        Ok(Crontab::find_by_id(id).one(&self.conn).await?)
    }

    pub async fn list_by_project(&self, project_id: &str) -> Result<Vec<crontab::Model>> {
        Ok(Crontab::find()
            .filter(crontab::Column::Project.eq(project_id))
            .order_by_asc(crontab::Column::CreatedAt)
            .all(&self.conn)
            .await?)
    }

    /// Enabled tasks with a recurring period, across all projects.
    pub async fn list_enabled_recurring(&self) -> Result<Vec<crontab::Model>> {
        Ok(Crontab::find()
            .filter(crontab::Column::Status.eq(TaskStatus::Enabled.as_i32()))
            .filter(crontab::Column::Period.ne(Period::Once.level()))
            .order_by_asc(crontab::Column::CreatedAt)
            .all(&self.conn)
            .await?)
    }

    pub async fn set_status(&self, id: &str, status: TaskStatus) -> Result<()> {
        Crontab::update_many()
            .col_expr(crontab::Column::Status, Expr::value(status.as_i32()))
            .filter(crontab::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn mark_dispatched(&self, id: &str, at: &str) -> Result<()> {
        Crontab::update_many()
            .col_expr(crontab::Column::LastRunAt, Expr::value(at))
            .filter(crontab::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn record_outcome(&self, id: &str, outcome: &str) -> Result<()> {
        Crontab::update_many()
            .col_expr(crontab::Column::LastOutcome, Expr::value(outcome))
            .filter(crontab::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = Crontab::delete_by_id(id).exec(&self.conn).await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn count_enabled(&self) -> Result<u64> {
        Ok(Crontab::find()
            .filter(crontab::Column::Status.eq(TaskStatus::Enabled.as_i32()))
            .count(&self.conn)
            .await?)
    }
}
