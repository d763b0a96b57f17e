//! Domain events for the application.
//!
//! Events are published on the broadcast bus by the dispatcher and the cron
//! service. The log listener persists them to `system_logs`.

use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum NotificationEvent {
    ScanQueued {
        run_id: String,
        project_id: String,
        tool: String,
        targets: usize,
    },
    ScanStarted {
        run_id: String,
        project_id: String,
        tool: String,
    },
    ScanFinished {
        run_id: String,
        project_id: String,
        tool: String,
        merged: i32,
        skipped: i32,
    },
    ScanFailed {
        run_id: String,
        project_id: String,
        tool: String,
        error: String,
    },

    CronTaskCreated {
        task_id: String,
        project_id: String,
        period: i32,
    },
    CronTaskTriggered {
        task_id: String,
        project_id: String,
        run_ids: Vec<String>,
    },

    Error {
        message: String,
    },
    Info {
        message: String,
    },
}

impl NotificationEvent {
    /// Variant name, used as the `event_type` column of persisted logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ScanQueued { .. } => "ScanQueued",
            Self::ScanStarted { .. } => "ScanStarted",
            Self::ScanFinished { .. } => "ScanFinished",
            Self::ScanFailed { .. } => "ScanFailed",
            Self::CronTaskCreated { .. } => "CronTaskCreated",
            Self::CronTaskTriggered { .. } => "CronTaskTriggered",
            Self::Error { .. } => "Error",
            Self::Info { .. } => "Info",
        }
    }
}
