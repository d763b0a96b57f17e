use crate::domain::{PortObservation, Period, ResourceKind, RunStatus, ScanStrategy, Style, TaskStatus};
use crate::entities::{crontab, domains, hosts, ports, projects, scan_runs};
use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use crate::entities::system_logs::Model as SystemLog;
pub use repositories::logs::LogFilter;
pub use repositories::scan_run::NewScanRun;
pub use repositories::user::User;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

/// In-memory SQLite URLs never map to a file on disk.
fn is_memory_url(db_url: &str) -> bool {
    let rest = db_url.trim_start_matches("sqlite:").trim_start_matches("//");
    rest.starts_with(":memory:") || rest.contains("mode=memory")
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !is_memory_url(db_url) {
            let path_str = db_url
                .trim_start_matches("sqlite:")
                .trim_start_matches("//")
                .split('?')
                .next()
                .unwrap_or_default();
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn access_repo(&self) -> repositories::access::AccessRepository {
        repositories::access::AccessRepository::new(self.conn.clone())
    }

    fn asset_repo(&self) -> repositories::asset::AssetRepository {
        repositories::asset::AssetRepository::new(self.conn.clone())
    }

    fn project_repo(&self) -> repositories::project::ProjectRepository {
        repositories::project::ProjectRepository::new(self.conn.clone())
    }

    fn crontab_repo(&self) -> repositories::crontab::CrontabRepository {
        repositories::crontab::CrontabRepository::new(self.conn.clone())
    }

    fn scan_run_repo(&self) -> repositories::scan_run::ScanRunRepository {
        repositories::scan_run::ScanRunRepository::new(self.conn.clone())
    }

    fn logs_repo(&self) -> repositories::logs::LogRepository {
        repositories::logs::LogRepository::new(self.conn.clone())
    }

    // ========== Ownership ==========

    pub async fn owning_project(
        &self,
        kind: ResourceKind,
        id: &str,
    ) -> Result<Option<projects::Model>> {
        self.access_repo().owning_project(kind, id).await
    }

    // ========== Projects ==========

    pub async fn create_project(&self, name: &str, owner: &str) -> Result<projects::Model> {
        self.project_repo().create(name, owner).await
    }

    pub async fn get_project(&self, id: &str) -> Result<Option<projects::Model>> {
        self.project_repo().get(id).await
    }

    pub async fn list_projects(&self, owner: &str) -> Result<Vec<projects::Model>> {
        self.project_repo().list_by_owner(owner).await
    }

    pub async fn rename_project(&self, id: &str, name: &str) -> Result<bool> {
        self.project_repo().rename(id, name).await
    }

    pub async fn delete_project(&self, id: &str) -> Result<bool> {
        self.project_repo().delete(id).await
    }

    pub async fn count_projects(&self) -> Result<u64> {
        self.project_repo().count().await
    }

    // ========== Assets ==========

    pub async fn merge_host(
        &self,
        project_id: &str,
        ip: &str,
        observations: &[PortObservation],
    ) -> Result<hosts::Model> {
        self.asset_repo()
            .merge_host(project_id, ip, observations)
            .await
    }

    pub async fn merge_domain(
        &self,
        project_id: &str,
        domain: &str,
        lvl: &str,
        ip: &str,
    ) -> Result<domains::Model> {
        self.asset_repo()
            .merge_domain(project_id, domain, lvl, ip)
            .await
    }

    pub async fn get_host(&self, id: &str) -> Result<Option<hosts::Model>> {
        self.asset_repo().get_host(id).await
    }

    pub async fn get_port(&self, id: &str) -> Result<Option<ports::Model>> {
        self.asset_repo().get_port(id).await
    }

    pub async fn get_domain(&self, id: &str) -> Result<Option<domains::Model>> {
        self.asset_repo().get_domain(id).await
    }

    pub async fn list_hosts(&self, project_id: &str) -> Result<Vec<hosts::Model>> {
        self.asset_repo().list_hosts(project_id).await
    }

    pub async fn list_ports_for_hosts(&self, host_ids: &[String]) -> Result<Vec<ports::Model>> {
        self.asset_repo().list_ports_for_hosts(host_ids).await
    }

    pub async fn list_domains(&self, project_id: &str) -> Result<Vec<domains::Model>> {
        self.asset_repo().list_domains(project_id).await
    }

    pub async fn set_note(&self, kind: ResourceKind, id: &str, note: &str) -> Result<bool> {
        let repo = self.asset_repo();
        match kind {
            ResourceKind::Host => repo.set_host_note(id, note).await,
            ResourceKind::Port => repo.set_port_note(id, note).await,
            ResourceKind::Domain => repo.set_domain_note(id, note).await,
            ResourceKind::Project | ResourceKind::CronTask => {
                anyhow::bail!("{kind} has no note")
            }
        }
    }

    pub async fn set_style(&self, kind: ResourceKind, id: &str, style: Style) -> Result<bool> {
        let repo = self.asset_repo();
        match kind {
            ResourceKind::Host => repo.set_host_style(id, style).await,
            ResourceKind::Domain => repo.set_domain_style(id, style).await,
            ResourceKind::Project | ResourceKind::Port | ResourceKind::CronTask => {
                anyhow::bail!("{kind} has no style")
            }
        }
    }

    pub async fn delete_host(&self, id: &str) -> Result<bool> {
        self.asset_repo().delete_host(id).await
    }

    pub async fn delete_domain(&self, id: &str) -> Result<bool> {
        self.asset_repo().delete_domain(id).await
    }

    pub async fn target_ips(&self, project_id: &str, strategy: ScanStrategy) -> Result<Vec<String>> {
        self.asset_repo().target_ips(project_id, strategy).await
    }

    pub async fn count_hosts(&self) -> Result<u64> {
        self.asset_repo().count_hosts().await
    }

    pub async fn count_domains(&self) -> Result<u64> {
        self.asset_repo().count_domains().await
    }

    // ========== Cron tasks ==========

    pub async fn create_cron_task(
        &self,
        project_id: &str,
        domain: &str,
        period: Period,
    ) -> Result<crontab::Model> {
        self.crontab_repo().create(project_id, domain, period).await
    }

    pub async fn get_cron_task(&self, id: &str) -> Result<Option<crontab::Model>> {
        self.crontab_repo().get(id).await
    }

    pub async fn list_cron_tasks(&self, project_id: &str) -> Result<Vec<crontab::Model>> {
        self.crontab_repo().list_by_project(project_id).await
    }

    pub async fn list_enabled_recurring_tasks(&self) -> Result<Vec<crontab::Model>> {
        self.crontab_repo().list_enabled_recurring().await
    }

    pub async fn set_cron_status(&self, id: &str, status: TaskStatus) -> Result<()> {
        self.crontab_repo().set_status(id, status).await
    }

    pub async fn mark_cron_dispatched(&self, id: &str, at: &str) -> Result<()> {
        self.crontab_repo().mark_dispatched(id, at).await
    }

    pub async fn record_cron_outcome(&self, id: &str, outcome: &str) -> Result<()> {
        self.crontab_repo().record_outcome(id, outcome).await
    }

    pub async fn delete_cron_task(&self, id: &str) -> Result<bool> {
        self.crontab_repo().delete(id).await
    }

    pub async fn count_enabled_cron_tasks(&self) -> Result<u64> {
        self.crontab_repo().count_enabled().await
    }

    // ========== Scan runs ==========

    pub async fn create_scan_run(&self, run: NewScanRun<'_>) -> Result<scan_runs::Model> {
        self.scan_run_repo().create_queued(run).await
    }

    pub async fn mark_scan_running(&self, id: &str) -> Result<()> {
        self.scan_run_repo().mark_running(id).await
    }

    pub async fn mark_scan_succeeded(
        &self,
        id: &str,
        hosts_merged: i32,
        domains_merged: i32,
    ) -> Result<()> {
        self.scan_run_repo()
            .mark_succeeded(id, hosts_merged, domains_merged)
            .await
    }

    pub async fn mark_scan_failed(&self, id: &str, error: &str) -> Result<()> {
        self.scan_run_repo().mark_failed(id, error).await
    }

    pub async fn get_scan_run(&self, id: &str) -> Result<Option<scan_runs::Model>> {
        self.scan_run_repo().get(id).await
    }

    pub async fn list_scan_runs(&self, project_id: &str, limit: u64) -> Result<Vec<scan_runs::Model>> {
        self.scan_run_repo().list_for_project(project_id, limit).await
    }

    pub async fn count_scan_runs(&self, status: RunStatus) -> Result<u64> {
        self.scan_run_repo().count_by_status(status).await
    }

    // ========== System logs ==========

    pub async fn add_log(
        &self,
        event_type: &str,
        level: &str,
        message: &str,
        details: Option<String>,
    ) -> Result<()> {
        self.logs_repo()
            .add(event_type, level, message, details)
            .await
    }

    pub async fn get_logs(
        &self,
        page: u64,
        page_size: u64,
        filter: LogFilter,
    ) -> Result<(Vec<SystemLog>, u64)> {
        self.logs_repo().get_logs(page, page_size, filter).await
    }

    pub async fn prune_logs(&self, older_than_days: i64) -> Result<u64> {
        self.logs_repo().prune_logs(older_than_days).await
    }

    // ========== Users ==========

    #[must_use]
    pub fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn verify_user_password(&self, username: &str, password: &str) -> Result<bool> {
        self.user_repo().verify_password(username, password).await
    }

    pub async fn verify_api_key(&self, api_key: &str) -> Result<Option<User>> {
        self.user_repo().verify_api_key(api_key).await
    }
}

#[cfg(test)]
mod tests {
    use super::migrator::Migrator;
    use super::{Store, is_memory_url};
    use sea_orm::{ConnectionTrait, Statement};
    use sea_orm_migration::MigratorTrait;

    const UNIQUE_KEYS: [&str; 3] = [
        "idx_hosts_project_ip_unique",
        "idx_ports_host_port_unique",
        "idx_domains_project_domain_unique",
    ];

    async fn unique_indexes(store: &Store) -> Vec<String> {
        let rows = store
            .conn
            .query_all(Statement::from_string(
                store.conn.get_database_backend(),
                "SELECT name FROM sqlite_master WHERE type = 'index' AND sql LIKE 'CREATE UNIQUE%' ORDER BY name",
            ))
            .await
            .unwrap();
        rows.iter()
            .map(|row| row.try_get::<String>("", "name").unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_natural_key_indexes_migrate_both_ways() {
        let store = Store::with_pool_options("sqlite::memory:", 1, 1).await.unwrap();
        let indexes = unique_indexes(&store).await;
        for name in UNIQUE_KEYS {
            assert!(indexes.iter().any(|i| i == name), "{name} missing: {indexes:?}");
        }

        Migrator::down(&store.conn, Some(1)).await.unwrap();
        let indexes = unique_indexes(&store).await;
        assert!(UNIQUE_KEYS.iter().all(|name| !indexes.iter().any(|i| i == name)));

        Migrator::up(&store.conn, None).await.unwrap();
        assert_eq!(unique_indexes(&store).await.len(), indexes.len() + UNIQUE_KEYS.len());
    }

    #[test]
    fn test_memory_url_detection() {
        assert!(is_memory_url(":memory:"));
        assert!(is_memory_url("sqlite::memory:"));
        assert!(is_memory_url("sqlite://:memory:"));
        assert!(is_memory_url("sqlite:file:test?mode=memory&cache=shared"));
        assert!(!is_memory_url("sqlite:data/scopewatch.db"));
        assert!(!is_memory_url("sqlite:///tmp/x.db?mode=rwc"));
    }
}
