use crate::entities::{crontab, domains, hosts, ports, prelude::*, projects, scan_runs};
use anyhow::Result;
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::info;

pub struct ProjectRepository {
    conn: DatabaseConnection,
}

impl ProjectRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, name: &str, owner: &str) -> Result<projects::Model> {
        let model = projects::Model {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            owner: owner.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        Projects::insert(projects::ActiveModel {
            id: Set(model.id.clone()),
            name: Set(model.name.clone()),
            owner: Set(model.owner.clone()),
            created_at: Set(model.created_at.clone()),
        })
        .exec_without_returning(&self.conn)
        .await?;

        Ok(model)
    }

    pub async fn get(&self, id: &str) -> Result<Option<projects::Model>> {
        Ok(Projects::find_by_id(id).one(&self.conn).await?)
    }

    pub async fn list_by_owner(&self, owner: &str) -> Result<Vec<projects::Model>> {
        Ok(Projects::find()
            .filter(projects::Column::Owner.eq(owner))
            .order_by_asc(projects::Column::CreatedAt)
            .all(&self.conn)
            .await?)
    }

    pub async fn rename(&self, id: &str, name: &str) -> Result<bool> {
        let result = Projects::update_many()
            .col_expr(projects::Column::Name, Expr::value(name))
            .filter(projects::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Deletes a project and everything it owns in one transaction.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let txn = self.conn.begin().await?;
        let deleted = delete_project_cascade(&txn, id).await?;
        txn.commit().await?;
        Ok(deleted)
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(Projects::find().count(&self.conn).await?)
    }
}

/// Removes ports, hosts, domains, cron tasks, scan runs and finally the
/// project row. Runs on whatever connection or transaction it is given.
pub async fn delete_project_cascade<C: ConnectionTrait>(conn: &C, id: &str) -> Result<bool> {
    let ports_deleted = Ports::delete_many()
        .filter(
            ports::Column::Host.in_subquery(
                Query::select()
                    .column(hosts::Column::Id)
                    .from(Hosts)
                    .and_where(hosts::Column::Project.eq(id))
                    .to_owned(),
            ),
        )
        .exec(conn)
        .await?
        .rows_affected;

    let hosts_deleted = Hosts::delete_many()
        .filter(hosts::Column::Project.eq(id))
        .exec(conn)
        .await?
        .rows_affected;

    let domains_deleted = Domains::delete_many()
        .filter(domains::Column::Project.eq(id))
        .exec(conn)
        .await?
        .rows_affected;

    Crontab::delete_many()
        .filter(crontab::Column::Project.eq(id))
        .exec(conn)
        .await?;

    ScanRuns::delete_many()
        .filter(scan_runs::Column::Project.eq(id))
        .exec(conn)
        .await?;

    let result = Projects::delete_by_id(id).exec(conn).await?;

    if result.rows_affected > 0 {
        info!(
            project_id = %id,
            hosts = hosts_deleted,
            ports = ports_deleted,
            domains = domains_deleted,
            "Project deleted"
        );
    }

    Ok(result.rows_affected > 0)
}
