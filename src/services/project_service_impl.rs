//! `SeaORM` implementation of the `ProjectService` trait.

use crate::api::types::{
    CronTaskDto, DomainDto, HostDto, PortDto, ProjectDto, ProjectOverviewDto, ScanRunDto,
};
use crate::db::Store;
use crate::domain::{Identity, ResourceKind};
use crate::services::access::AccessGuard;
use crate::services::project_service::{ProjectError, ProjectService};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::info;

const MAX_PROJECT_NAME_LEN: usize = 128;
const RECENT_SCANS: u64 = 20;
const SCAN_HISTORY_LIMIT: u64 = 200;

pub struct SeaOrmProjectService {
    store: Store,
    guard: AccessGuard,
}

impl SeaOrmProjectService {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            guard: AccessGuard::new(store.clone()),
            store,
        }
    }
}

fn validate_name(name: &str) -> Result<&str, ProjectError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ProjectError::Validation("Project name is required".to_string()));
    }
    if name.chars().count() > MAX_PROJECT_NAME_LEN {
        return Err(ProjectError::Validation(format!(
            "Project name must be at most {MAX_PROJECT_NAME_LEN} characters"
        )));
    }
    Ok(name)
}

#[async_trait]
impl ProjectService for SeaOrmProjectService {
    async fn list(&self, identity: &Identity) -> Result<Vec<ProjectDto>, ProjectError> {
        let projects = self.store.list_projects(identity.username()).await?;
        Ok(projects.into_iter().map(ProjectDto::from).collect())
    }

    async fn create(&self, identity: &Identity, name: &str) -> Result<ProjectDto, ProjectError> {
        let name = validate_name(name)?;
        let project = self.store.create_project(name, identity.username()).await?;

        info!(project_id = %project.id, owner = %identity, "Project created");

        Ok(ProjectDto::from(project))
    }

    async fn overview(
        &self,
        identity: &Identity,
        id: &str,
    ) -> Result<ProjectOverviewDto, ProjectError> {
        let project = self
            .guard
            .authorize(ResourceKind::Project, id, identity)
            .await?;

        let (hosts, domains, cron_tasks, scans) = tokio::try_join!(
            self.store.list_hosts(id),
            self.store.list_domains(id),
            self.store.list_cron_tasks(id),
            self.store.list_scan_runs(id, RECENT_SCANS),
        )?;

        let host_ids: Vec<String> = hosts.iter().map(|h| h.id.clone()).collect();
        let mut ports_by_host: HashMap<String, Vec<PortDto>> = HashMap::new();
        for port in self.store.list_ports_for_hosts(&host_ids).await? {
            ports_by_host
                .entry(port.host.clone())
                .or_default()
                .push(PortDto::from(port));
        }

        let hosts = hosts
            .into_iter()
            .map(|h| {
                let ports = ports_by_host.remove(&h.id).unwrap_or_default();
                HostDto::with_ports(h, ports)
            })
            .collect();

        Ok(ProjectOverviewDto {
            project: ProjectDto::from(project),
            hosts,
            domains: domains.into_iter().map(DomainDto::from).collect(),
            cron_tasks: cron_tasks.into_iter().map(CronTaskDto::from).collect(),
            scans: scans.into_iter().map(ScanRunDto::from).collect(),
        })
    }

    async fn rename(
        &self,
        identity: &Identity,
        id: &str,
        name: &str,
    ) -> Result<ProjectDto, ProjectError> {
        let project = self
            .guard
            .authorize(ResourceKind::Project, id, identity)
            .await?;
        let name = validate_name(name)?;

        self.store.rename_project(id, name).await?;

        Ok(ProjectDto {
            name: name.to_string(),
            ..ProjectDto::from(project)
        })
    }

    async fn delete(&self, identity: &Identity, id: &str) -> Result<(), ProjectError> {
        self.guard
            .authorize(ResourceKind::Project, id, identity)
            .await?;

        if !self.store.delete_project(id).await? {
            return Err(ProjectError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn scan_history(
        &self,
        identity: &Identity,
        id: &str,
    ) -> Result<Vec<ScanRunDto>, ProjectError> {
        self.guard
            .authorize(ResourceKind::Project, id, identity)
            .await?;

        let runs = self.store.list_scan_runs(id, SCAN_HISTORY_LIMIT).await?;
        Ok(runs.into_iter().map(ScanRunDto::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  acme external  ").unwrap(), "acme external");
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(MAX_PROJECT_NAME_LEN + 1)).is_err());
    }
}
