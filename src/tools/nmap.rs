use crate::config::ToolsConfig;
use crate::domain::{Discovery, PortObservation, ScanTool};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use super::{ToolError, ToolRunner, check_binary, run_command, timeout_from_minutes};

/// The slice of nmap's XML report needed to rebuild hosts and open ports.
#[derive(Debug, Deserialize)]
struct NmapRun {
    #[serde(rename = "host", default)]
    hosts: Vec<Host>,
}

#[derive(Debug, Deserialize)]
struct Host {
    #[serde(rename = "address", default)]
    addresses: Vec<Address>,
    status: Option<Status>,
    ports: Option<Ports>,
}

#[derive(Debug, Deserialize)]
struct Address {
    #[serde(rename = "@addr")]
    addr: String,
    #[serde(rename = "@addrtype")]
    addr_type: String,
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(rename = "@state")]
    state: String,
}

#[derive(Debug, Deserialize)]
struct Ports {
    #[serde(rename = "port", default)]
    ports: Vec<Port>,
}

#[derive(Debug, Deserialize)]
struct Port {
    #[serde(rename = "@portid")]
    portid: u16,
    state: PortState,
    service: Option<Service>,
}

#[derive(Debug, Deserialize)]
struct PortState {
    #[serde(rename = "@state")]
    state: String,
}

#[derive(Debug, Deserialize)]
struct Service {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@product", default)]
    product: String,
    #[serde(rename = "@version", default)]
    version: String,
}

/// Hosts that are up and have at least one open port.
pub fn parse_report(xml: &str) -> Result<Vec<Discovery>> {
    let run: NmapRun = quick_xml::de::from_str(xml).context("Failed to parse nmap XML output")?;

    let discoveries = run
        .hosts
        .into_iter()
        .filter(|h| h.status.as_ref().is_none_or(|s| s.state == "up"))
        .filter_map(|host| {
            let ip = host
                .addresses
                .into_iter()
                .find(|a| a.addr_type == "ipv4")?
                .addr;

            let ports: Vec<PortObservation> = host
                .ports
                .map(|p| p.ports)
                .unwrap_or_default()
                .into_iter()
                .filter(|p| p.state.state == "open")
                .map(|p| {
                    let (service, version) = p.service.map_or_else(
                        || ("unknown".to_string(), String::new()),
                        |s| {
                            let name = if s.name.is_empty() {
                                "unknown".to_string()
                            } else {
                                s.name
                            };
                            let version = format!("{} {}", s.product, s.version).trim().to_string();
                            (name, version)
                        },
                    );
                    PortObservation {
                        port: p.portid.to_string(),
                        service,
                        version,
                    }
                })
                .collect();

            (!ports.is_empty()).then_some(Discovery::Host { ip, ports })
        })
        .collect();

    Ok(discoveries)
}

pub struct NmapRunner {
    path: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl NmapRunner {
    #[must_use]
    pub fn from_config(config: &ToolsConfig) -> Self {
        Self {
            path: config.nmap_path.trim().to_string(),
            args: config.nmap_args.clone(),
            timeout: timeout_from_minutes(config.timeout_minutes),
        }
    }

    fn command_args(&self, targets: &[String]) -> Vec<String> {
        let mut args = self.args.clone();
        args.extend(["-oX".to_string(), "-".to_string()]);
        args.extend(targets.iter().cloned());
        args
    }
}

#[async_trait::async_trait]
impl ToolRunner for NmapRunner {
    fn tool(&self) -> ScanTool {
        ScanTool::Nmap
    }

    fn check_installed(&self) -> Result<(), ToolError> {
        check_binary("nmap", &self.path)
    }

    async fn run(&self, targets: &[String]) -> Result<Vec<Discovery>> {
        let stdout = run_command(&self.path, &self.command_args(targets), self.timeout).await?;
        parse_report(&stdout)
    }
}
