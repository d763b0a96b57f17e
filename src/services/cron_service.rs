//! Domain service for recurring subdomain enumeration tasks.

use crate::api::types::{CronCreatedDto, CronStatusDto, CronTaskDto};
use crate::domain::{Identity, ResourceKind};
use crate::services::access::AccessError;
use crate::services::dispatcher::DispatchError;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CronError {
    #[error("{kind} {id} not found")]
    NotFound { kind: ResourceKind, id: String },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Configuration(String),

    #[error("scan queue is full")]
    QueueFull,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<AccessError> for CronError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::NotFound { kind, id } => Self::NotFound { kind, id },
            AccessError::Database(msg) => Self::Database(msg),
        }
    }
}

impl From<DispatchError> for CronError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NotFound { kind, id } => Self::NotFound { kind, id },
            DispatchError::Validation(msg) => Self::Validation(msg),
            DispatchError::Configuration(msg) => Self::Configuration(msg),
            DispatchError::QueueFull => Self::QueueFull,
            DispatchError::Database(msg) => Self::Database(msg),
        }
    }
}

impl From<anyhow::Error> for CronError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[async_trait::async_trait]
pub trait CronService: Send + Sync {
    async fn list(
        &self,
        identity: &Identity,
        project_id: &str,
    ) -> Result<Vec<CronTaskDto>, CronError>;

    /// Stores the task and queues its first enumeration right away.
    ///
    /// `period` is the level `1..=5`; level 1 tasks are stored disabled.
    async fn create(
        &self,
        identity: &Identity,
        project_id: &str,
        domain: &str,
        period: &str,
    ) -> Result<CronCreatedDto, CronError>;

    /// Sets the task to `status` (`"1"` enabled, `"0"` disabled). Setting the
    /// current value is a no-op. One-shot tasks are rejected unchanged.
    async fn set_status(
        &self,
        identity: &Identity,
        task_id: &str,
        status: &str,
    ) -> Result<CronStatusDto, CronError>;

    async fn delete(&self, identity: &Identity, task_id: &str) -> Result<(), CronError>;

    /// Dispatches every enabled recurring task whose period has elapsed at
    /// `now`. Returns how many were dispatched.
    async fn run_due_tasks(&self, now: DateTime<Utc>) -> Result<usize, CronError>;
}
