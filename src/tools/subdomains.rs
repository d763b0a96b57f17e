use crate::config::ToolsConfig;
use crate::domain::validator::is_domain;
use crate::domain::{Discovery, ScanTool};
use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ToolError, ToolRunner, check_binary, run_command, timeout_from_minutes};

const RESOLVE_CONCURRENCY: usize = 16;

/// Extracts subdomains of `domain` from enumerator output.
///
/// Takes the first token of each line, so both plain name lists and
/// `name (FQDN) --> ...` style lines work.
#[must_use]
pub fn parse_names(output: &str, domain: &str) -> BTreeSet<String> {
    let domain = domain.trim_end_matches('.').to_ascii_lowercase();
    let suffix = format!(".{domain}");

    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(|name| name.trim_end_matches('.').to_ascii_lowercase())
        .filter(|name| (*name == domain || name.ends_with(&suffix)) && is_domain(name))
        .collect()
}

async fn resolve_ipv4(name: &str) -> Option<String> {
    match tokio::net::lookup_host((name, 0)).await {
        Ok(addrs) => addrs
            .map(|a| a.ip())
            .find(IpAddr::is_ipv4)
            .map(|ip| ip.to_string()),
        Err(e) => {
            debug!(name, error = %e, "Name did not resolve");
            None
        }
    }
}

/// Passive subdomain enumeration via amass and/or findomain.
///
/// Names that do not resolve to an IPv4 address are dropped.
pub struct SubdomainRunner {
    amass_path: String,
    findomain_path: String,
    timeout: Option<Duration>,
}

impl SubdomainRunner {
    #[must_use]
    pub fn from_config(config: &ToolsConfig) -> Self {
        Self {
            amass_path: config.amass_path.trim().to_string(),
            findomain_path: config.findomain_path.trim().to_string(),
            timeout: timeout_from_minutes(config.timeout_minutes),
        }
    }

    /// Configured enumerators with their arguments for `domain`.
    fn commands(&self, domain: &str) -> Vec<(&'static str, &str, Vec<String>)> {
        let mut commands = Vec::new();
        if !self.amass_path.is_empty() {
            let args = ["enum", "-passive", "-d", domain].map(str::to_string);
            commands.push(("amass", self.amass_path.as_str(), args.to_vec()));
        }
        if !self.findomain_path.is_empty() {
            let args = ["-t", domain, "-q"].map(str::to_string);
            commands.push(("findomain", self.findomain_path.as_str(), args.to_vec()));
        }
        commands
    }

    /// Fails only when every configured enumerator failed.
    async fn enumerate(&self, domain: &str) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        let mut errors = Vec::new();
        let commands = self.commands(domain);

        for (tool, path, args) in &commands {
            match run_command(path, args, self.timeout).await {
                Ok(out) => names.extend(parse_names(&out, domain)),
                Err(e) => {
                    warn!(domain, tool, error = %e, "Subdomain enumerator failed");
                    errors.push(format!("{tool}: {e}"));
                }
            }
        }

        if !commands.is_empty() && errors.len() == commands.len() {
            anyhow::bail!("Every enumerator failed for {domain}: {}", errors.join("; "));
        }

        Ok(names)
    }
}

#[async_trait::async_trait]
impl ToolRunner for SubdomainRunner {
    fn tool(&self) -> ScanTool {
        ScanTool::Subdomains
    }

    /// At least one enumerator must be configured, and every configured
    /// path must point at a file.
    fn check_installed(&self) -> Result<(), ToolError> {
        if self.amass_path.is_empty() && self.findomain_path.is_empty() {
            return Err(ToolError::NotInstalled(
                "No subdomain enumerator configured".to_string(),
            ));
        }
        if !self.amass_path.is_empty() {
            check_binary("amass", &self.amass_path)?;
        }
        if !self.findomain_path.is_empty() {
            check_binary("findomain", &self.findomain_path)?;
        }
        Ok(())
    }

    async fn run(&self, targets: &[String]) -> Result<Vec<Discovery>> {
        let mut names = BTreeSet::new();
        for domain in targets {
            names.extend(self.enumerate(domain).await?);
        }

        let discoveries: Vec<Discovery> = stream::iter(names)
            .map(|name| async move {
                resolve_ipv4(&name)
                    .await
                    .map(|ip| Discovery::Domain { domain: name, ip })
            })
            .buffer_unordered(RESOLVE_CONCURRENCY)
            .filter_map(|d| async move { d })
            .collect()
            .await;

        debug!(resolved = discoveries.len(), "Subdomain enumeration finished");
        Ok(discoveries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names_filters_scope() {
        let output = "\
www.example.com
API.Example.com.
mail.example.com (FQDN) --> a_record --> 10.0.0.1 (IPAddress)
example.com
evil-example.com
bad_name.example.com
other.org

";
        let names = parse_names(output, "example.com");
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        assert_eq!(
            names,
            vec!["api.example.com", "example.com", "mail.example.com", "www.example.com"]
        );
    }

    #[test]
    fn test_check_installed_requires_an_enumerator() {
        let runner = SubdomainRunner {
            amass_path: String::new(),
            findomain_path: String::new(),
            timeout: None,
        };
        assert!(runner.check_installed().is_err());

        let runner = SubdomainRunner {
            amass_path: "/nope/amass".to_string(),
            findomain_path: String::new(),
            timeout: None,
        };
        assert_eq!(
            runner.check_installed(),
            Err(ToolError::NotInstalled("Invalid amass path".to_string()))
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_fails_when_every_enumerator_fails() {
        let runner = SubdomainRunner {
            amass_path: "/bin/false".to_string(),
            findomain_path: "/bin/false".to_string(),
            timeout: None,
        };
        assert!(runner.check_installed().is_ok());

        let err = runner.run(&["example.com".to_string()]).await.unwrap_err();
        assert!(err.to_string().contains("Every enumerator failed"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tolerates_one_failed_enumerator() {
        let runner = SubdomainRunner {
            amass_path: "/bin/false".to_string(),
            findomain_path: "/bin/echo".to_string(),
            timeout: None,
        };

        let found = runner.run(&["example.com".to_string()]).await.unwrap();
        assert!(found.is_empty());
    }
}
