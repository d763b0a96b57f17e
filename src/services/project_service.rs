//! Domain service for projects: the ownership root of every asset.

use crate::api::types::{ProjectDto, ProjectOverviewDto, ScanRunDto};
use crate::domain::Identity;
use crate::services::access::AccessError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Project {0} not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<AccessError> for ProjectError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::NotFound { id, .. } => Self::NotFound(id),
            AccessError::Database(msg) => Self::Database(msg),
        }
    }
}

impl From<anyhow::Error> for ProjectError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[async_trait::async_trait]
pub trait ProjectService: Send + Sync {
    async fn list(&self, identity: &Identity) -> Result<Vec<ProjectDto>, ProjectError>;

    async fn create(&self, identity: &Identity, name: &str) -> Result<ProjectDto, ProjectError>;

    /// Hosts with their ports, domains, cron tasks and recent scans.
    async fn overview(
        &self,
        identity: &Identity,
        id: &str,
    ) -> Result<ProjectOverviewDto, ProjectError>;

    async fn rename(
        &self,
        identity: &Identity,
        id: &str,
        name: &str,
    ) -> Result<ProjectDto, ProjectError>;

    /// Deletes ports, hosts, domains, cron tasks, scan runs and the project
    /// in one transaction.
    async fn delete(&self, identity: &Identity, id: &str) -> Result<(), ProjectError>;

    async fn scan_history(
        &self,
        identity: &Identity,
        id: &str,
    ) -> Result<Vec<ScanRunDto>, ProjectError>;
}
