pub mod access;
pub use access::{AccessError, AccessGuard};

pub mod notes;
pub use notes::{MarkdownRenderer, NoteRenderer};

pub mod asset_service;
pub mod asset_service_impl;
pub use asset_service::{AssetError, AssetService, Merged};
pub use asset_service_impl::SeaOrmAssetService;

pub mod project_service;
pub mod project_service_impl;
pub use project_service::{ProjectError, ProjectService};
pub use project_service_impl::SeaOrmProjectService;

pub mod dispatcher;
pub use dispatcher::{DispatchError, QueueSlot, QueuedScan, ScanDispatcher};

pub mod cron_service;
pub mod cron_service_impl;
pub use cron_service::{CronError, CronService};
pub use cron_service_impl::SeaOrmCronService;

pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, LoginResult, UserInfo};
pub use auth_service_impl::SeaOrmAuthService;

pub mod logs;
pub use logs::LogService;

pub mod scheduler;
pub use scheduler::Scheduler;
