//! Adapters around the external discovery binaries.
//!
//! Each runner turns a target list into [`Discovery`] values; the dispatcher
//! owns queuing and merging.

pub mod masscan;
pub mod nmap;
pub mod subdomains;

use crate::config::ToolsConfig;
use crate::domain::{Discovery, ScanTool};
use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

pub use masscan::MasscanRunner;
pub use nmap::NmapRunner;
pub use subdomains::SubdomainRunner;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// Carries the user-facing message, e.g. `Invalid nmap path`.
    #[error("{0}")]
    NotInstalled(String),
}

#[async_trait::async_trait]
pub trait ToolRunner: Send + Sync {
    fn tool(&self) -> ScanTool;

    /// Fails when the binary is not configured or not a file.
    fn check_installed(&self) -> Result<(), ToolError>;

    /// Runs the tool to completion and returns what it found.
    async fn run(&self, targets: &[String]) -> Result<Vec<Discovery>>;
}

/// The runner used for each tool family.
#[derive(Clone)]
pub struct ToolRegistry {
    nmap: Arc<dyn ToolRunner>,
    masscan: Arc<dyn ToolRunner>,
    subdomains: Arc<dyn ToolRunner>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new(
        nmap: Arc<dyn ToolRunner>,
        masscan: Arc<dyn ToolRunner>,
        subdomains: Arc<dyn ToolRunner>,
    ) -> Self {
        Self {
            nmap,
            masscan,
            subdomains,
        }
    }

    #[must_use]
    pub fn from_config(config: &ToolsConfig) -> Self {
        Self::new(
            Arc::new(NmapRunner::from_config(config)),
            Arc::new(MasscanRunner::from_config(config)),
            Arc::new(SubdomainRunner::from_config(config)),
        )
    }

    #[must_use]
    pub fn get(&self, tool: ScanTool) -> Arc<dyn ToolRunner> {
        match tool {
            ScanTool::Nmap => self.nmap.clone(),
            ScanTool::Masscan => self.masscan.clone(),
            ScanTool::Subdomains => self.subdomains.clone(),
        }
    }
}

/// A configured path must name an existing regular file.
pub(crate) fn check_binary(name: &str, path: &str) -> Result<(), ToolError> {
    let path = path.trim();
    if path.is_empty() || !Path::new(path).is_file() {
        return Err(ToolError::NotInstalled(format!("Invalid {name} path")));
    }
    Ok(())
}

pub(crate) fn timeout_from_minutes(minutes: u64) -> Option<Duration> {
    (minutes > 0).then(|| Duration::from_secs(minutes * 60))
}

/// Runs a binary and returns its stdout. A non-zero exit is an error carrying
/// the tail of stderr.
pub(crate) async fn run_command(
    program: &str,
    args: &[String],
    timeout: Option<Duration>,
) -> Result<String> {
    let start = Instant::now();

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to spawn {program}"))?;

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
            .await
            .with_context(|| format!("{program} timed out after {}s", limit.as_secs()))?,
        None => child.wait_with_output().await,
    }
    .with_context(|| format!("Failed to wait for {program}"))?;

    debug!(
        program,
        status = ?output.status.code(),
        duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        stdout_bytes = output.stdout.len(),
        "Tool process exited"
    );

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr
            .lines()
            .rev()
            .take(5)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join("\n");
        anyhow::bail!("{program} exited with {}: {tail}", output.status);
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_binary() {
        assert_eq!(
            check_binary("nmap", ""),
            Err(ToolError::NotInstalled("Invalid nmap path".to_string()))
        );
        assert!(check_binary("nmap", "/definitely/not/here/nmap").is_err());

        let dir = std::env::temp_dir();
        assert!(check_binary("nmap", dir.to_str().unwrap()).is_err());

        let file = dir.join(format!("scopewatch-tool-{}", uuid::Uuid::new_v4()));
        std::fs::write(&file, b"").unwrap();
        assert!(check_binary("nmap", file.to_str().unwrap()).is_ok());
        std::fs::remove_file(file).ok();
    }

    #[test]
    fn test_timeout_from_minutes() {
        assert_eq!(timeout_from_minutes(0), None);
        assert_eq!(timeout_from_minutes(2), Some(Duration::from_secs(120)));
    }
}
