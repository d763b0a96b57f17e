pub mod prelude;

pub mod crontab;
pub mod domains;
pub mod hosts;
pub mod ports;
pub mod projects;
pub mod scan_runs;
pub mod system_logs;
pub mod users;
