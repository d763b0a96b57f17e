pub use super::crontab::Entity as Crontab;
pub use super::domains::Entity as Domains;
pub use super::hosts::Entity as Hosts;
pub use super::ports::Entity as Ports;
pub use super::projects::Entity as Projects;
pub use super::scan_runs::Entity as ScanRuns;
pub use super::system_logs::Entity as SystemLogs;
pub use super::users::Entity as Users;
