pub mod access;
pub mod asset;
pub mod crontab;
pub mod logs;
pub mod project;
pub mod scan_run;
pub mod user;
