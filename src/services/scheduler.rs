use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, interval};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::SchedulerConfig;
use crate::services::{CronService, LogService};

/// Drives recurring cron tasks and log retention.
pub struct Scheduler {
    cron: Arc<dyn CronService>,
    logs: Arc<LogService>,
    config: SchedulerConfig,
    log_retention_days: u32,
    running: Arc<RwLock<bool>>,
}

impl Scheduler {
    pub fn new(
        cron: Arc<dyn CronService>,
        logs: Arc<LogService>,
        config: SchedulerConfig,
        log_retention_days: u32,
    ) -> Self {
        Self {
            cron,
            logs,
            config,
            log_retention_days,
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            info!("Scheduler is disabled in config");
            return Ok(());
        }

        *self.running.write().await = true;
        info!("Starting background scheduler");

        if let Some(cron_expr) = &self.config.cron_expression {
            self.run_with_cron(cron_expr).await
        } else {
            self.run_with_interval().await
        }
    }

    async fn run_with_cron(&self, cron_expr: &str) -> Result<()> {
        let mut sched = JobScheduler::new().await?;

        let cron = Arc::clone(&self.cron);
        let running = Arc::clone(&self.running);
        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let cron = Arc::clone(&cron);
            let running = Arc::clone(&running);
            Box::pin(async move {
                if !*running.read().await {
                    return;
                }
                check_due_tasks(cron.as_ref()).await;
            })
        })?;

        let logs = Arc::clone(&self.logs);
        let retention = self.log_retention_days;
        let prune_job = Job::new_async("0 30 3 * * *", move |_uuid, _lock| {
            let logs = Arc::clone(&logs);
            Box::pin(async move {
                if let Err(e) = logs.prune(retention).await {
                    error!(event = "job_failed", job_name = "prune_logs", error = %e, "Log pruning failed");
                }
            })
        })?;

        sched.add(job).await?;
        sched.add(prune_job).await?;
        sched.start().await?;

        info!("Scheduler running with cron: {}", cron_expr);

        loop {
            if !*self.running.read().await {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        sched.shutdown().await?;
        Ok(())
    }

    async fn run_with_interval(&self) -> Result<()> {
        let interval_mins = self.config.check_interval_minutes.max(1);

        info!("Scheduler running: check cron tasks every {}m", interval_mins);

        let mut check_interval = interval(Duration::from_secs(u64::from(interval_mins) * 60));
        let mut prune_interval = interval(Duration::from_secs(24 * 60 * 60));

        loop {
            tokio::select! {
                _ = check_interval.tick() => {
                    if !*self.running.read().await {
                        break;
                    }
                    check_due_tasks(self.cron.as_ref()).await;
                }
                _ = prune_interval.tick() => {
                    if !*self.running.read().await {
                        break;
                    }
                    if let Err(e) = self.logs.prune(self.log_retention_days).await {
                        error!(event = "job_failed", job_name = "prune_logs", error = %e, "Log pruning failed");
                    }
                }
            }
        }

        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping scheduler...");
        *self.running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Runs one pass over the cron table immediately.
    pub async fn run_once(&self) -> Result<usize> {
        Ok(self.cron.run_due_tasks(Utc::now()).await?)
    }
}

async fn check_due_tasks(cron: &dyn CronService) {
    let start = std::time::Instant::now();
    info!(event = "job_started", job_name = "cron_tasks", "Checking due cron tasks");

    match cron.run_due_tasks(Utc::now()).await {
        Ok(dispatched) => info!(
            event = "job_finished",
            job_name = "cron_tasks",
            dispatched,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Cron task check finished"
        ),
        Err(e) => {
            error!(event = "job_failed", job_name = "cron_tasks", error = %e, "Cron task check failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{CronCreatedDto, CronStatusDto, CronTaskDto};
    use crate::db::Store;
    use crate::domain::Identity;
    use crate::services::CronError;
    use chrono::DateTime;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::broadcast;

    #[derive(Default)]
    struct CountingCron {
        passes: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl CronService for CountingCron {
        async fn list(&self, _: &Identity, _: &str) -> Result<Vec<CronTaskDto>, CronError> {
            Ok(Vec::new())
        }

        async fn create(
            &self,
            _: &Identity,
            _: &str,
            _: &str,
            _: &str,
        ) -> Result<CronCreatedDto, CronError> {
            Err(CronError::Validation("unused".to_string()))
        }

        async fn set_status(
            &self,
            _: &Identity,
            _: &str,
            _: &str,
        ) -> Result<CronStatusDto, CronError> {
            Err(CronError::Validation("unused".to_string()))
        }

        async fn delete(&self, _: &Identity, _: &str) -> Result<(), CronError> {
            Ok(())
        }

        async fn run_due_tasks(&self, _: DateTime<Utc>) -> Result<usize, CronError> {
            Ok(self.passes.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }

    async fn scheduler(config: SchedulerConfig) -> (Scheduler, Arc<CountingCron>) {
        let path = std::env::temp_dir().join(format!("scopewatch-{}.db", uuid::Uuid::new_v4()));
        let store = Store::new(&format!("sqlite:{}?mode=rwc", path.display()))
            .await
            .unwrap();
        let (tx, _) = broadcast::channel(8);
        let logs = Arc::new(LogService::new(store, tx));
        let cron = Arc::new(CountingCron::default());
        (Scheduler::new(cron.clone(), logs, config, 30), cron)
    }

    #[tokio::test]
    async fn test_disabled_scheduler_returns_immediately() {
        let config = SchedulerConfig {
            enabled: false,
            ..SchedulerConfig::default()
        };
        let (scheduler, cron) = scheduler(config).await;

        scheduler.start().await.unwrap();
        assert!(!scheduler.is_running().await);
        assert_eq!(cron.passes.load(Ordering::SeqCst), 0);

        assert_eq!(scheduler.run_once().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_interval_loop_checks_on_start_and_stops() {
        let (scheduler, cron) = scheduler(SchedulerConfig::default()).await;
        let scheduler = Arc::new(scheduler);

        let handle = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.start().await })
        };

        for _ in 0..100 {
            if cron.passes.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(scheduler.is_running().await);
        assert_eq!(cron.passes.load(Ordering::SeqCst), 1);

        scheduler.stop().await;
        assert!(!scheduler.is_running().await);
        handle.abort();
    }
}
