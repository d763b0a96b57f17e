use crate::db::Store;
use crate::domain::events::NotificationEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Persists bus events to `system_logs`.
pub struct LogService {
    store: Store,
    event_bus: broadcast::Sender<NotificationEvent>,
}

impl LogService {
    #[must_use]
    pub const fn new(store: Store, event_bus: broadcast::Sender<NotificationEvent>) -> Self {
        Self { store, event_bus }
    }

    pub fn start_listener(self: Arc<Self>) {
        let mut rx = self.event_bus.subscribe();
        let service = self;

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Err(e) = service.handle_event(&event).await {
                            error!(error = %e, "Failed to save log");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        error!(count, "Log listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Log listener event bus closed");
                        break;
                    }
                }
            }
        });
    }

    async fn handle_event(&self, event: &NotificationEvent) -> anyhow::Result<()> {
        let (level, message) = describe(event);
        let details = match event {
            NotificationEvent::Error { .. } | NotificationEvent::Info { .. } => None,
            _ => Some(serde_json::to_string(event)?),
        };

        self.store
            .add_log(event.kind(), level, &message, details)
            .await
    }

    /// Drops logs older than `days`; 0 keeps everything.
    pub async fn prune(&self, days: u32) -> anyhow::Result<u64> {
        if days == 0 {
            return Ok(0);
        }
        let removed = self.store.prune_logs(i64::from(days)).await?;
        if removed > 0 {
            info!(removed, days, "Pruned old system logs");
        }
        Ok(removed)
    }
}

fn describe(event: &NotificationEvent) -> (&'static str, String) {
    match event {
        NotificationEvent::ScanQueued { tool, targets, .. } => {
            ("info", format!("{tool} scan queued for {targets} target(s)"))
        }
        NotificationEvent::ScanStarted { tool, .. } => ("info", format!("{tool} scan started")),
        NotificationEvent::ScanFinished {
            tool,
            merged,
            skipped,
            ..
        } => (
            if *skipped > 0 { "warn" } else { "success" },
            format!("{tool} scan finished: {merged} merged, {skipped} skipped"),
        ),
        NotificationEvent::ScanFailed { tool, error, .. } => {
            ("error", format!("{tool} scan failed: {error}"))
        }
        NotificationEvent::CronTaskCreated { period, .. } => {
            ("info", format!("Cron task created with period {period}"))
        }
        NotificationEvent::CronTaskTriggered { run_ids, .. } => (
            "info",
            format!("Cron task triggered {} scan(s)", run_ids.len()),
        ),
        NotificationEvent::Error { message } => ("error", message.clone()),
        NotificationEvent::Info { message } => ("info", message.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_levels() {
        let finished = NotificationEvent::ScanFinished {
            run_id: "r".to_string(),
            project_id: "p".to_string(),
            tool: "nmap".to_string(),
            merged: 3,
            skipped: 1,
        };
        assert_eq!(
            describe(&finished),
            ("warn", "nmap scan finished: 3 merged, 1 skipped".to_string())
        );

        let failed = NotificationEvent::ScanFailed {
            run_id: "r".to_string(),
            project_id: "p".to_string(),
            tool: "masscan".to_string(),
            error: "exit 1".to_string(),
        };
        assert_eq!(describe(&failed).0, "error");
    }
}
