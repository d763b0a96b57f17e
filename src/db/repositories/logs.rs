use crate::entities::{prelude::*, system_logs};
use anyhow::Result;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};

/// Filters accepted by the log listing endpoint.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub level: Option<String>,
    pub event_type: Option<String>,
    pub since: Option<String>,
}

pub struct LogRepository {
    conn: DatabaseConnection,
}

impl LogRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn add(
        &self,
        event_type: &str,
        level: &str,
        message: &str,
        details: Option<String>,
    ) -> Result<()> {
        let active_model = system_logs::ActiveModel {
            event_type: Set(event_type.to_string()),
            level: Set(level.to_string()),
            message: Set(message.to_string()),
            details: Set(details),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        SystemLogs::insert(active_model).exec(&self.conn).await?;
        Ok(())
    }

    /// One page of logs, newest first, plus the total page count.
    pub async fn get_logs(
        &self,
        page: u64,
        page_size: u64,
        filter: LogFilter,
    ) -> Result<(Vec<system_logs::Model>, u64)> {
        let mut query = SystemLogs::find().order_by_desc(system_logs::Column::CreatedAt);

        if let Some(level) = filter.level {
            query = query.filter(system_logs::Column::Level.eq(level));
        }

        if let Some(event_type) = filter.event_type {
            query = query.filter(system_logs::Column::EventType.contains(event_type));
        }

        if let Some(since) = filter.since {
            query = query.filter(system_logs::Column::CreatedAt.gte(since));
        }

        let paginator = query.paginate(&self.conn, page_size.max(1));
        let total_pages = paginator.num_pages().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items, total_pages))
    }

    /// Deletes logs older than the given number of days.
    pub async fn prune_logs(&self, older_than_days: i64) -> Result<u64> {
        let cutoff = (chrono::Utc::now() - chrono::Duration::days(older_than_days)).to_rfc3339();

        let result = SystemLogs::delete_many()
            .filter(system_logs::Column::CreatedAt.lt(cutoff))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected)
    }
}
