//! Domain types for the reconnaissance asset graph.
//!
//! Enums here replace the stringly-typed columns of the storage layer. Each one
//! round-trips through its canonical wire/database spelling via `FromStr` and
//! `Display`, so handlers and repositories never compare raw strings.

pub mod events;
pub mod validator;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// The acting user of a request.
///
/// Built by the auth middleware from the session or API key and passed
/// explicitly into every authorization check.
///
/// # Examples
///
/// ```rust
/// use scopewatch::domain::Identity;
///
/// let who = Identity::new("alice");
/// assert_eq!(who.username(), "alice");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self(username.into())
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Review state shared by hosts and domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Style {
    New,
    Checked,
    Hacked,
    Suspicious,
    Default,
}

impl Style {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Checked => "Checked",
            Self::Hacked => "Hacked",
            Self::Suspicious => "Suspicious",
            Self::Default => "Default",
        }
    }

    /// Parses a style an analyst is allowed to apply.
    ///
    /// `New` is reserved for the merge engine and is rejected here.
    #[must_use]
    pub fn parse_assignable(value: &str) -> Option<Self> {
        match value.parse::<Self>() {
            Ok(Self::New) | Err(()) => None,
            Ok(style) => Some(style),
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Style {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "New" => Ok(Self::New),
            "Checked" => Ok(Self::Checked),
            "Hacked" => Ok(Self::Hacked),
            "Suspicious" => Ok(Self::Suspicious),
            "Default" => Ok(Self::Default),
            _ => Err(()),
        }
    }
}

/// Re-run period of a cron task. Level 1 is a one-shot task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Once,
    Daily,
    Weekly,
    Biweekly,
    Monthly,
}

impl Period {
    #[must_use]
    pub const fn level(&self) -> i32 {
        match self {
            Self::Once => 1,
            Self::Daily => 2,
            Self::Weekly => 3,
            Self::Biweekly => 4,
            Self::Monthly => 5,
        }
    }

    #[must_use]
    pub const fn from_level(level: i32) -> Option<Self> {
        match level {
            1 => Some(Self::Once),
            2 => Some(Self::Daily),
            3 => Some(Self::Weekly),
            4 => Some(Self::Biweekly),
            5 => Some(Self::Monthly),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_one_shot(&self) -> bool {
        matches!(self, Self::Once)
    }

    /// Time between two runs of a recurring task; `None` for one-shot tasks.
    #[must_use]
    pub const fn interval(&self) -> Option<Duration> {
        const DAY: u64 = 24 * 60 * 60;
        match self {
            Self::Once => None,
            Self::Daily => Some(Duration::from_secs(DAY)),
            Self::Weekly => Some(Duration::from_secs(7 * DAY)),
            Self::Biweekly => Some(Duration::from_secs(14 * DAY)),
            Self::Monthly => Some(Duration::from_secs(30 * DAY)),
        }
    }
}

impl FromStr for Period {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i32>()
            .ok()
            .and_then(Self::from_level)
            .ok_or(())
    }
}

/// Cron task status column: 1 enabled, 0 disabled (or consumed for one-shots).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Disabled,
    Enabled,
}

impl TaskStatus {
    #[must_use]
    pub const fn as_i32(&self) -> i32 {
        match self {
            Self::Disabled => 0,
            Self::Enabled => 1,
        }
    }

    #[must_use]
    pub const fn from_i32(value: i32) -> Self {
        if value == 1 {
            Self::Enabled
        } else {
            Self::Disabled
        }
    }

    /// Wire form: `"1"` enabled, `"0"` disabled.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "1" => Some(Self::Enabled),
            "0" => Some(Self::Disabled),
            _ => None,
        }
    }

    /// Initial status for a freshly created task.
    #[must_use]
    pub const fn initial_for(period: Period) -> Self {
        if period.is_one_shot() {
            Self::Disabled
        } else {
            Self::Enabled
        }
    }
}

/// How the target IP set of a port scan is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanStrategy {
    /// Hosts whose `portsq` is 0: never scanned, or scanned with no ports found.
    Unscanned,
    AllKnown,
    Explicit,
}

impl ScanStrategy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unscanned => "unscanned",
            Self::AllKnown => "all",
            Self::Explicit => "explicit",
        }
    }
}

impl fmt::Display for ScanStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanStrategy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" | "unscanned" => Ok(Self::Unscanned),
            "2" | "all" => Ok(Self::AllKnown),
            "3" | "explicit" => Ok(Self::Explicit),
            _ => Err(()),
        }
    }
}

/// External discovery tool families the dispatcher can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanTool {
    Nmap,
    Masscan,
    Subdomains,
}

impl ScanTool {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Nmap => "nmap",
            Self::Masscan => "masscan",
            Self::Subdomains => "subdomains",
        }
    }
}

impl fmt::Display for ScanTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one background scan unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource families the access guard knows how to resolve to a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Project,
    Host,
    Port,
    Domain,
    CronTask,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Project => "project",
            Self::Host => "host",
            Self::Port => "port",
            Self::Domain => "domain",
            Self::CronTask => "cron task",
        };
        f.write_str(name)
    }
}

/// One port observation reported by a scanner or an analyst.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PortObservation {
    pub port: String,
    pub service: String,
    #[serde(default, alias = "product")]
    pub version: String,
}

/// A single discovery produced by a tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    Host {
        ip: String,
        ports: Vec<PortObservation>,
    },
    Domain {
        domain: String,
        ip: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_assignable_excludes_new() {
        assert_eq!(Style::parse_assignable("Checked"), Some(Style::Checked));
        assert_eq!(Style::parse_assignable("Default"), Some(Style::Default));
        assert_eq!(Style::parse_assignable("New"), None);
        assert_eq!(Style::parse_assignable("checked"), None);
    }

    #[test]
    fn test_period_levels() {
        assert_eq!("1".parse::<Period>(), Ok(Period::Once));
        assert_eq!("5".parse::<Period>(), Ok(Period::Monthly));
        assert!("0".parse::<Period>().is_err());
        assert!("6".parse::<Period>().is_err());
        assert!("".parse::<Period>().is_err());
        assert!(Period::Once.interval().is_none());
        assert_eq!(
            Period::Weekly.interval(),
            Some(Duration::from_secs(7 * 24 * 60 * 60))
        );
    }

    #[test]
    fn test_initial_status() {
        assert_eq!(TaskStatus::initial_for(Period::Once), TaskStatus::Disabled);
        assert_eq!(TaskStatus::initial_for(Period::Daily), TaskStatus::Enabled);
    }

    #[test]
    fn test_status_wire_form() {
        assert_eq!(TaskStatus::parse(" 1 "), Some(TaskStatus::Enabled));
        assert_eq!(TaskStatus::parse("0"), Some(TaskStatus::Disabled));
        assert_eq!(TaskStatus::parse("2"), None);
        assert_eq!(TaskStatus::parse("on"), None);
    }

    #[test]
    fn test_strategy_tags() {
        assert_eq!("1".parse::<ScanStrategy>(), Ok(ScanStrategy::Unscanned));
        assert_eq!("all".parse::<ScanStrategy>(), Ok(ScanStrategy::AllKnown));
        assert_eq!("3".parse::<ScanStrategy>(), Ok(ScanStrategy::Explicit));
        assert!("4".parse::<ScanStrategy>().is_err());
    }
}
