use crate::api::types::{CronCreatedDto, CronStatusDto, CronTaskDto};
use crate::db::Store;
use crate::domain::events::NotificationEvent;
use crate::domain::validator::is_domain;
use crate::domain::{Identity, Period, ResourceKind, ScanTool, TaskStatus};
use crate::entities::crontab;
use crate::services::access::AccessGuard;
use crate::services::cron_service::{CronError, CronService};
use crate::services::dispatcher::ScanDispatcher;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{info, warn};

pub struct SeaOrmCronService {
    store: Store,
    guard: AccessGuard,
    dispatcher: ScanDispatcher,
    event_bus: broadcast::Sender<NotificationEvent>,
}

impl SeaOrmCronService {
    #[must_use]
    pub fn new(
        store: Store,
        dispatcher: ScanDispatcher,
        event_bus: broadcast::Sender<NotificationEvent>,
    ) -> Self {
        Self {
            guard: AccessGuard::new(store.clone()),
            store,
            dispatcher,
            event_bus,
        }
    }

    fn not_found(task_id: &str) -> CronError {
        CronError::NotFound {
            kind: ResourceKind::CronTask,
            id: task_id.to_string(),
        }
    }
}

/// A recurring task is due when it never ran or its period has elapsed.
/// An unreadable timestamp counts as never run.
fn is_due(task: &crontab::Model, now: DateTime<Utc>) -> bool {
    let Some(interval) = Period::from_level(task.period).and_then(|p| p.interval()) else {
        return false;
    };
    let Ok(interval) = chrono::Duration::from_std(interval) else {
        return false;
    };

    task.last_run_at
        .as_deref()
        .and_then(|at| DateTime::parse_from_rfc3339(at).ok())
        .is_none_or(|last| last.with_timezone(&Utc) + interval <= now)
}

#[async_trait]
impl CronService for SeaOrmCronService {
    async fn list(
        &self,
        identity: &Identity,
        project_id: &str,
    ) -> Result<Vec<CronTaskDto>, CronError> {
        self.guard
            .authorize(ResourceKind::Project, project_id, identity)
            .await?;

        let tasks = self.store.list_cron_tasks(project_id).await?;
        Ok(tasks.into_iter().map(CronTaskDto::from).collect())
    }

    async fn create(
        &self,
        identity: &Identity,
        project_id: &str,
        domain: &str,
        period: &str,
    ) -> Result<CronCreatedDto, CronError> {
        self.guard
            .authorize(ResourceKind::Project, project_id, identity)
            .await?;

        let domain = domain.trim();
        if !is_domain(domain) {
            return Err(CronError::Validation(format!("Invalid domain: '{domain}'")));
        }
        let period: Period = period.parse().map_err(|()| {
            CronError::Validation(format!("Invalid period: '{}'", period.trim()))
        })?;

        self.dispatcher.check_tool(ScanTool::Subdomains)?;
        let slot = self.dispatcher.reserve(ScanTool::Subdomains)?;

        let task = self
            .store
            .create_cron_task(project_id, domain, period)
            .await?;

        let queued = match self
            .dispatcher
            .dispatch_subdomains_reserved(slot, project_id, domain, Some(&task.id))
            .await
        {
            Ok(queued) => queued,
            Err(e) => {
                if let Err(cleanup) = self.store.delete_cron_task(&task.id).await {
                    warn!(task_id = %task.id, error = %cleanup, "Failed to remove undispatched cron task");
                }
                return Err(e.into());
            }
        };

        info!(
            event = "cron_task_created",
            task_id = %task.id,
            project_id,
            domain,
            period = period.level(),
            "Cron task created"
        );
        let _ = self.event_bus.send(NotificationEvent::CronTaskCreated {
            task_id: task.id.clone(),
            project_id: project_id.to_string(),
            period: period.level(),
        });

        let now = Utc::now().to_rfc3339();
        self.store.mark_cron_dispatched(&task.id, &now).await?;

        Ok(CronCreatedDto {
            task: CronTaskDto {
                last_run_at: Some(now),
                ..CronTaskDto::from(task)
            },
            run_id: queued.run_id,
        })
    }

    async fn set_status(
        &self,
        identity: &Identity,
        task_id: &str,
        status: &str,
    ) -> Result<CronStatusDto, CronError> {
        self.guard
            .authorize(ResourceKind::CronTask, task_id, identity)
            .await?;

        let task = self
            .store
            .get_cron_task(task_id)
            .await?
            .ok_or_else(|| Self::not_found(task_id))?;

        if Period::from_level(task.period).is_none_or(|p| p.is_one_shot()) {
            return Err(CronError::Validation(
                "One-shot tasks cannot be toggled".to_string(),
            ));
        }

        let status = TaskStatus::parse(status).ok_or_else(|| {
            CronError::Validation(format!("Status must be 0 or 1 (got '{}')", status.trim()))
        })?;

        if TaskStatus::from_i32(task.status) != status {
            self.store.set_cron_status(task_id, status).await?;
            info!(task_id, status = status.as_i32(), "Cron task status changed");
        }

        Ok(CronStatusDto {
            id: task.id,
            status: status.as_i32(),
        })
    }

    async fn delete(&self, identity: &Identity, task_id: &str) -> Result<(), CronError> {
        self.guard
            .authorize(ResourceKind::CronTask, task_id, identity)
            .await?;

        if !self.store.delete_cron_task(task_id).await? {
            return Err(Self::not_found(task_id));
        }
        info!(task_id, "Cron task deleted");
        Ok(())
    }

    async fn run_due_tasks(&self, now: DateTime<Utc>) -> Result<usize, CronError> {
        let due: Vec<crontab::Model> = self
            .store
            .list_enabled_recurring_tasks()
            .await?
            .into_iter()
            .filter(|t| is_due(t, now))
            .collect();

        let mut dispatched = 0;
        for task in due {
            match self
                .dispatcher
                .dispatch_subdomains(&task.project, &task.domain, Some(&task.id))
                .await
            {
                Ok(queued) => {
                    self.store
                        .mark_cron_dispatched(&task.id, &now.to_rfc3339())
                        .await?;
                    dispatched += 1;
                    let _ = self.event_bus.send(NotificationEvent::CronTaskTriggered {
                        task_id: task.id.clone(),
                        project_id: task.project.clone(),
                        run_ids: vec![queued.run_id],
                    });
                }
                Err(e) => {
                    warn!(task_id = %task.id, domain = %task.domain, error = %e, "Cron dispatch failed");
                    self.store
                        .record_cron_outcome(&task.id, &format!("not dispatched: {e}"))
                        .await?;
                }
            }
        }

        Ok(dispatched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(period: i32, last_run_at: Option<&str>) -> crontab::Model {
        crontab::Model {
            id: "t1".to_string(),
            project: "p1".to_string(),
            domain: "example.com".to_string(),
            period,
            status: 1,
            last_run_at: last_run_at.map(str::to_string),
            last_outcome: None,
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_is_due() {
        let now = DateTime::parse_from_rfc3339("2026-03-10T12:00:00+00:00")
            .unwrap()
            .with_timezone(&Utc);

        assert!(is_due(&task(2, None), now));
        assert!(is_due(&task(2, Some("2026-03-09T12:00:00+00:00")), now));
        assert!(!is_due(&task(2, Some("2026-03-09T12:00:01+00:00")), now));
        assert!(!is_due(&task(3, Some("2026-03-05T00:00:00+00:00")), now));
        assert!(is_due(&task(3, Some("2026-03-03T00:00:00+00:00")), now));
        assert!(is_due(&task(5, Some("garbage")), now));
        assert!(!is_due(&task(1, None), now));
    }
}
