use crate::config::ToolsConfig;
use crate::domain::{Discovery, PortObservation, ScanTool};
use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;

use super::{ToolError, ToolRunner, check_binary, run_command, timeout_from_minutes};

#[derive(Debug, Deserialize)]
struct Record {
    ip: String,
    #[serde(default)]
    ports: Vec<RecordPort>,
}

#[derive(Debug, Deserialize)]
struct RecordPort {
    port: u16,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    service: Option<RecordService>,
}

#[derive(Debug, Deserialize)]
struct RecordService {
    #[serde(default)]
    name: String,
}

/// Parses masscan's `-oJ` output.
///
/// The file is a JSON array written one record per line, so every line is
/// decoded on its own and a truncated run still yields what was flushed.
/// Records are grouped by IP; a port seen twice keeps the first sighting.
#[must_use]
pub fn parse_output(output: &str) -> Vec<Discovery> {
    let mut by_ip: BTreeMap<String, Vec<PortObservation>> = BTreeMap::new();

    for line in output.lines() {
        let line = line.trim().trim_end_matches(',');
        if line.is_empty() || line == "[" || line == "]" {
            continue;
        }

        let record: Record = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable masscan record");
                continue;
            }
        };

        let ports = by_ip.entry(record.ip).or_default();
        for p in record.ports {
            if p.status.as_deref().is_some_and(|s| s != "open") {
                continue;
            }
            let port = p.port.to_string();
            if ports.iter().any(|known| known.port == port) {
                continue;
            }
            let service = p
                .service
                .map(|s| s.name)
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "unknown".to_string());
            ports.push(PortObservation {
                port,
                service,
                version: String::new(),
            });
        }
    }

    by_ip
        .into_iter()
        .filter(|(_, ports)| !ports.is_empty())
        .map(|(ip, ports)| Discovery::Host { ip, ports })
        .collect()
}

pub struct MasscanRunner {
    path: String,
    args: Vec<String>,
    ports: String,
    rate: u32,
    timeout: Option<Duration>,
}

impl MasscanRunner {
    #[must_use]
    pub fn from_config(config: &ToolsConfig) -> Self {
        Self {
            path: config.masscan_path.trim().to_string(),
            args: config.masscan_args.clone(),
            ports: config.masscan_ports.clone(),
            rate: config.masscan_rate,
            timeout: timeout_from_minutes(config.timeout_minutes),
        }
    }

    fn command_args(&self, targets: &[String]) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            self.ports.clone(),
            "--rate".to_string(),
            self.rate.to_string(),
        ];
        args.extend(self.args.iter().cloned());
        args.extend(["-oJ".to_string(), "-".to_string()]);
        args.extend(targets.iter().cloned());
        args
    }
}

#[async_trait::async_trait]
impl ToolRunner for MasscanRunner {
    fn tool(&self) -> ScanTool {
        ScanTool::Masscan
    }

    fn check_installed(&self) -> Result<(), ToolError> {
        check_binary("masscan", &self.path)
    }

    async fn run(&self, targets: &[String]) -> Result<Vec<Discovery>> {
        let stdout = run_command(&self.path, &self.command_args(targets), self.timeout).await?;
        Ok(parse_output(&stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = r#"[
{   "ip": "10.0.0.5",   "timestamp": "1700000000", "ports": [ {"port": 443, "proto": "tcp", "status": "open", "reason": "syn-ack", "ttl": 64} ] },
{   "ip": "10.0.0.1",   "timestamp": "1700000001", "ports": [ {"port": 22, "proto": "tcp", "status": "open", "reason": "syn-ack", "ttl": 64} ] },
{   "ip": "10.0.0.5",   "timestamp": "1700000002", "ports": [ {"port": 80, "proto": "tcp", "service": {"name": "http", "banner": "nginx"} } ] },
{   "ip": "10.0.0.5",   "timestamp": "1700000003", "ports": [ {"port": 443, "proto": "tcp", "status": "open", "reason": "syn-ack", "ttl": 64} ] },
{ "ip": "10.0.0.9", "timestamp": "1700000004", "ports": [ {"port": 8080, "proto": "tcp", "status": "closed"} ] },
{ "finished": 1 }
]
"#;

    #[test]
    fn test_parse_output_groups_by_ip() {
        let found = parse_output(OUTPUT);
        assert_eq!(found.len(), 2);

        let Discovery::Host { ip, ports } = &found[0] else {
            panic!("expected host discovery");
        };
        assert_eq!(ip, "10.0.0.1");
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].service, "unknown");

        let Discovery::Host { ip, ports } = &found[1] else {
            panic!("expected host discovery");
        };
        assert_eq!(ip, "10.0.0.5");
        let numbers: Vec<&str> = ports.iter().map(|p| p.port.as_str()).collect();
        assert_eq!(numbers, vec!["443", "80"]);
        assert_eq!(ports[1].service, "http");
    }

    #[test]
    fn test_parse_output_empty() {
        assert!(parse_output("").is_empty());
        assert!(parse_output("[\n]\n").is_empty());
    }

    #[test]
    fn test_command_args() {
        let runner = MasscanRunner {
            path: "/usr/bin/masscan".to_string(),
            args: vec!["--wait".to_string(), "0".to_string()],
            ports: "1-1000".to_string(),
            rate: 500,
            timeout: None,
        };
        assert_eq!(
            runner.command_args(&["10.0.0.0/24".to_string()]),
            vec!["-p", "1-1000", "--rate", "500", "--wait", "0", "-oJ", "-", "10.0.0.0/24"]
        );
    }
}
