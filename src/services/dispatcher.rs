//! Background scan dispatch.
//!
//! Requests are resolved into a [`ScanJob`] and pushed onto a bounded queue.
//! A single worker loop drains the queue and runs each job on its own task,
//! holding one semaphore permit per running scan.

use crate::db::{NewScanRun, Store};
use crate::domain::events::NotificationEvent;
use crate::domain::validator::{is_domain, parse_target_list};
use crate::domain::{Discovery, Identity, ResourceKind, ScanStrategy, ScanTool};
use crate::entities::scan_runs;
use crate::services::access::{AccessError, AccessGuard};
use crate::services::asset_service::{AssetService, Merged};
use crate::tools::ToolRegistry;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{Semaphore, broadcast, mpsc};
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{kind} {id} not found")]
    NotFound { kind: ResourceKind, id: String },

    #[error("{0}")]
    Validation(String),

    /// The tool is missing or misconfigured; nothing was queued.
    #[error("{0}")]
    Configuration(String),

    #[error("scan queue is full")]
    QueueFull,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<AccessError> for DispatchError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::NotFound { kind, id } => Self::NotFound { kind, id },
            AccessError::Database(msg) => Self::Database(msg),
        }
    }
}

impl From<anyhow::Error> for DispatchError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct ScanJob {
    pub run_id: String,
    pub project_id: String,
    pub tool: ScanTool,
    pub targets: Vec<String>,
    pub cron_task: Option<String>,
}

/// What the caller gets back once a job is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedScan {
    pub run_id: String,
    pub targets: usize,
}

/// A held place in the scan queue. Dropping it releases the place.
pub struct QueueSlot(mpsc::OwnedPermit<ScanJob>);

#[derive(Clone)]
pub struct ScanDispatcher {
    store: Store,
    guard: AccessGuard,
    tools: ToolRegistry,
    event_bus: broadcast::Sender<NotificationEvent>,
    queue: mpsc::Sender<ScanJob>,
    max_concurrent: usize,
    queue_capacity: usize,
}

impl ScanDispatcher {
    /// Creates the dispatcher and spawns its worker loop.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn start(
        store: Store,
        assets: Arc<dyn AssetService>,
        tools: ToolRegistry,
        event_bus: broadcast::Sender<NotificationEvent>,
        max_concurrent: usize,
        queue_capacity: usize,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        let queue_capacity = queue_capacity.max(1);
        let (queue, rx) = mpsc::channel(queue_capacity);

        let worker = ScanWorker {
            store: store.clone(),
            assets,
            tools: tools.clone(),
            event_bus: event_bus.clone(),
        };
        tokio::spawn(worker.run(rx, Arc::new(Semaphore::new(max_concurrent))));

        Self {
            guard: AccessGuard::new(store.clone()),
            store,
            tools,
            event_bus,
            queue,
            max_concurrent,
            queue_capacity,
        }
    }

    #[must_use]
    pub const fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    #[must_use]
    pub const fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Queues an nmap or masscan run against the project's hosts.
    ///
    /// `targets` is only read for [`ScanStrategy::Explicit`].
    pub async fn dispatch_port_scan(
        &self,
        identity: &Identity,
        project_id: &str,
        tool: ScanTool,
        strategy: ScanStrategy,
        targets: Option<&str>,
    ) -> Result<QueuedScan, DispatchError> {
        self.guard
            .authorize(ResourceKind::Project, project_id, identity)
            .await?;

        if tool == ScanTool::Subdomains {
            return Err(DispatchError::Validation(
                "Subdomain enumeration is not a port scan".to_string(),
            ));
        }
        self.check_tool(tool)?;

        let targets = match strategy {
            ScanStrategy::Explicit => {
                parse_target_list(targets.unwrap_or_default()).map_err(DispatchError::Validation)?
            }
            ScanStrategy::Unscanned | ScanStrategy::AllKnown => {
                self.store.target_ips(project_id, strategy).await?
            }
        };

        if targets.is_empty() {
            let scope = match strategy {
                ScanStrategy::Unscanned => "unscanned",
                _ => "known",
            };
            return Err(DispatchError::Validation(format!(
                "No {scope} hosts to scan"
            )));
        }

        self.enqueue(project_id, tool, Some(strategy), targets, None)
            .await
    }

    /// Queues a subdomain enumeration of `domain`.
    ///
    /// Ownership of `project_id` must already be established by the caller.
    pub async fn dispatch_subdomains(
        &self,
        project_id: &str,
        domain: &str,
        cron_task: Option<&str>,
    ) -> Result<QueuedScan, DispatchError> {
        let domain = Self::subdomain_target(domain)?;
        self.check_tool(ScanTool::Subdomains)?;

        self.enqueue(
            project_id,
            ScanTool::Subdomains,
            None,
            vec![domain],
            cron_task.map(str::to_string),
        )
        .await
    }

    /// Like [`Self::dispatch_subdomains`], but into a place reserved earlier
    /// with [`Self::reserve`], so the queue cannot reject it.
    pub async fn dispatch_subdomains_reserved(
        &self,
        slot: QueueSlot,
        project_id: &str,
        domain: &str,
        cron_task: Option<&str>,
    ) -> Result<QueuedScan, DispatchError> {
        let targets = vec![Self::subdomain_target(domain)?];
        let run = self
            .create_run(project_id, ScanTool::Subdomains, None, &targets, cron_task)
            .await?;

        Ok(self.submit(
            slot,
            ScanJob {
                run_id: run.id,
                project_id: project_id.to_string(),
                tool: ScanTool::Subdomains,
                targets,
                cron_task: cron_task.map(str::to_string),
            },
        ))
    }

    pub fn check_tool(&self, tool: ScanTool) -> Result<(), DispatchError> {
        self.tools
            .get(tool)
            .check_installed()
            .map_err(|e| DispatchError::Configuration(e.to_string()))
    }

    /// Holds one place in the queue without recording anything.
    pub fn reserve(&self, tool: ScanTool) -> Result<QueueSlot, DispatchError> {
        match self.queue.clone().try_reserve_owned() {
            Ok(permit) => Ok(QueueSlot(permit)),
            Err(e) => {
                let reason = match e {
                    mpsc::error::TrySendError::Full(_) => "scan queue is full",
                    mpsc::error::TrySendError::Closed(_) => "scan worker is not running",
                };
                metrics::counter!("scan_queue_rejections_total", "tool" => tool.as_str())
                    .increment(1);
                warn!(event = "scan_rejected", %tool, reason, "Scan rejected");
                Err(DispatchError::QueueFull)
            }
        }
    }

    fn subdomain_target(domain: &str) -> Result<String, DispatchError> {
        let domain = domain.trim();
        if is_domain(domain) {
            Ok(domain.to_string())
        } else {
            Err(DispatchError::Validation(format!(
                "Invalid domain: '{domain}'"
            )))
        }
    }

    async fn create_run(
        &self,
        project_id: &str,
        tool: ScanTool,
        strategy: Option<ScanStrategy>,
        targets: &[String],
        cron_task: Option<&str>,
    ) -> Result<scan_runs::Model, DispatchError> {
        Ok(self
            .store
            .create_scan_run(NewScanRun {
                project_id,
                cron_task,
                tool,
                strategy,
                target_count: targets.len(),
            })
            .await?)
    }

    /// Records the run, then takes a queue place. A rejected job leaves its
    /// run marked failed.
    async fn enqueue(
        &self,
        project_id: &str,
        tool: ScanTool,
        strategy: Option<ScanStrategy>,
        targets: Vec<String>,
        cron_task: Option<String>,
    ) -> Result<QueuedScan, DispatchError> {
        let run = self
            .create_run(project_id, tool, strategy, &targets, cron_task.as_deref())
            .await?;

        let slot = match self.reserve(tool) {
            Ok(slot) => slot,
            Err(e) => {
                self.store.mark_scan_failed(&run.id, &e.to_string()).await?;
                return Err(e);
            }
        };

        Ok(self.submit(
            slot,
            ScanJob {
                run_id: run.id,
                project_id: project_id.to_string(),
                tool,
                targets,
                cron_task,
            },
        ))
    }

    fn submit(&self, slot: QueueSlot, job: ScanJob) -> QueuedScan {
        let queued = QueuedScan {
            run_id: job.run_id.clone(),
            targets: job.targets.len(),
        };
        let (project_id, tool) = (job.project_id.clone(), job.tool);

        slot.0.send(job);

        metrics::counter!("scans_dispatched_total", "tool" => tool.as_str()).increment(1);
        info!(
            event = "scan_queued",
            run_id = %queued.run_id,
            project_id,
            %tool,
            targets = queued.targets,
            "Scan queued"
        );
        let _ = self.event_bus.send(NotificationEvent::ScanQueued {
            run_id: queued.run_id.clone(),
            project_id,
            tool: tool.to_string(),
            targets: queued.targets,
        });

        queued
    }
}

#[derive(Clone)]
struct ScanWorker {
    store: Store,
    assets: Arc<dyn AssetService>,
    tools: ToolRegistry,
    event_bus: broadcast::Sender<NotificationEvent>,
}

impl ScanWorker {
    async fn run(self, mut rx: mpsc::Receiver<ScanJob>, permits: Arc<Semaphore>) {
        while let Some(job) = rx.recv().await {
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };
            let worker = self.clone();
            tokio::spawn(async move {
                worker.execute(job).await;
                drop(permit);
            });
        }
        info!("Scan worker stopped");
    }

    async fn execute(&self, job: ScanJob) {
        let start = Instant::now();
        let tool = job.tool;

        if let Err(e) = self.store.mark_scan_running(&job.run_id).await {
            error!(run_id = %job.run_id, error = %e, "Failed to mark scan running");
        }
        info!(
            event = "scan_started",
            run_id = %job.run_id,
            project_id = %job.project_id,
            %tool,
            targets = job.targets.len(),
            "Scan started"
        );
        let _ = self.event_bus.send(NotificationEvent::ScanStarted {
            run_id: job.run_id.clone(),
            project_id: job.project_id.clone(),
            tool: tool.to_string(),
        });

        let runner = self.tools.get(tool);
        let outcome = match runner.run(&job.targets).await {
            Ok(discoveries) => Ok(self.merge_all(&job, &discoveries).await),
            Err(e) => Err(e.to_string()),
        };
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(tally) => {
                if let Err(e) = self
                    .store
                    .mark_scan_succeeded(&job.run_id, tally.hosts, tally.domains)
                    .await
                {
                    error!(run_id = %job.run_id, error = %e, "Failed to record scan result");
                }
                metrics::counter!(
                    "scans_finished_total",
                    "tool" => tool.as_str(),
                    "outcome" => "succeeded"
                )
                .increment(1);
                info!(
                    event = "scan_finished",
                    run_id = %job.run_id,
                    project_id = %job.project_id,
                    %tool,
                    hosts_merged = tally.hosts,
                    domains_merged = tally.domains,
                    skipped = tally.skipped,
                    duration_ms,
                    "Scan finished"
                );
                self.record_cron_outcome(
                    &job,
                    &format!(
                        "succeeded: {} hosts, {} domains",
                        tally.hosts, tally.domains
                    ),
                )
                .await;
                let _ = self.event_bus.send(NotificationEvent::ScanFinished {
                    run_id: job.run_id.clone(),
                    project_id: job.project_id.clone(),
                    tool: tool.to_string(),
                    merged: tally.hosts + tally.domains,
                    skipped: tally.skipped,
                });
            }
            Err(reason) => {
                if let Err(e) = self.store.mark_scan_failed(&job.run_id, &reason).await {
                    error!(run_id = %job.run_id, error = %e, "Failed to record scan failure");
                }
                metrics::counter!(
                    "scans_finished_total",
                    "tool" => tool.as_str(),
                    "outcome" => "failed"
                )
                .increment(1);
                error!(
                    event = "scan_failed",
                    run_id = %job.run_id,
                    project_id = %job.project_id,
                    %tool,
                    error = %reason,
                    duration_ms,
                    "Scan failed"
                );
                self.record_cron_outcome(&job, &format!("failed: {reason}"))
                    .await;
                let _ = self.event_bus.send(NotificationEvent::ScanFailed {
                    run_id: job.run_id.clone(),
                    project_id: job.project_id.clone(),
                    tool: tool.to_string(),
                    error: reason,
                });
            }
        }
    }

    /// Merges every discovery; a bad one is logged and skipped.
    async fn merge_all(&self, job: &ScanJob, discoveries: &[Discovery]) -> MergeTally {
        let mut tally = MergeTally::default();

        for discovery in discoveries {
            match self.assets.ingest(&job.project_id, discovery).await {
                Ok(Merged::Host) => tally.hosts += 1,
                Ok(Merged::Domain) => tally.domains += 1,
                Err(e) => {
                    tally.skipped += 1;
                    warn!(
                        run_id = %job.run_id,
                        discovery = ?discovery,
                        error = %e,
                        "Skipping discovery"
                    );
                }
            }
        }

        tally
    }

    async fn record_cron_outcome(&self, job: &ScanJob, outcome: &str) {
        let Some(task_id) = &job.cron_task else {
            return;
        };
        if let Err(e) = self.store.record_cron_outcome(task_id, outcome).await {
            warn!(task_id, error = %e, "Failed to record cron outcome");
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct MergeTally {
    hosts: i32,
    domains: i32,
    skipped: i32,
}
