//! Syntax checks for scope input: IPv4 addresses, CIDR ranges and domain names.
//!
//! Every check is a total function over `&str`; nothing here touches storage.

use regex::Regex;
use std::sync::OnceLock;

const OCTET: &str = r"([0-9]|[1-9][0-9]|1[0-9]{2}|2[0-4][0-9]|25[0-5])";
const LABEL: &str = r"([A-Za-z0-9]|[A-Za-z0-9][A-Za-z0-9\-]*[A-Za-z0-9])";
const TCP_PORT: &str =
    r"([1-9][0-9]{0,3}|[1-5][0-9]{4}|6[0-4][0-9]{3}|65[0-4][0-9]{2}|655[0-2][0-9]|6553[0-5])";

fn get_regex(re: &'static OnceLock<Regex>, pattern: impl FnOnce() -> String) -> &'static Regex {
    re.get_or_init(|| Regex::new(&pattern()).expect("Invalid regex pattern defined in code"))
}

fn ip_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(&RE, || format!(r"^({OCTET}\.){{3}}{OCTET}$"))
}

fn cidr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(&RE, || {
        format!(r"^({OCTET}\.){{3}}{OCTET}(/([0-9]|[1-2][0-9]|3[0-2]))?$")
    })
}

fn domain_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(&RE, || format!(r"^({LABEL}\.)*{LABEL}(:{TCP_PORT})?$"))
}

/// Plain dotted-quad IPv4 address.
#[must_use]
pub fn is_ip(value: &str) -> bool {
    ip_regex().is_match(value)
}

/// IPv4 address with an optional `/0`..`/32` prefix length.
#[must_use]
pub fn is_ip_or_cidr(value: &str) -> bool {
    cidr_regex().is_match(value)
}

/// Hostname made of alphanumeric/hyphen labels, optionally followed by `:port`.
#[must_use]
pub fn is_domain(value: &str) -> bool {
    domain_regex().is_match(value)
}

/// Splits a comma-separated target list and checks every entry.
///
/// Entries are trimmed. The whole list is rejected if any entry fails, or if
/// the list is empty; the error names the first offending entry.
pub fn parse_target_list(raw: &str) -> Result<Vec<String>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("Target list is empty".to_string());
    }

    let mut targets = Vec::new();
    for entry in trimmed.split(',') {
        let entry = entry.trim();
        if !is_ip_or_cidr(entry) {
            return Err(format!("Invalid target: '{entry}'"));
        }
        targets.push(entry.to_string());
    }

    Ok(targets)
}

/// Registrable ("effective") domain: public suffix plus one label.
///
/// Any `:port` suffix is ignored. Names without a registrable part (a bare
/// suffix or a single label) are returned lowercased as-is.
#[must_use]
pub fn registrable_domain(domain: &str) -> String {
    let host = domain
        .rsplit_once(':')
        .map_or(domain, |(host, _)| host)
        .trim_end_matches('.')
        .to_ascii_lowercase();

    psl::domain_str(&host).map_or_else(|| host.clone(), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_ip() {
        assert!(is_ip("10.0.0.1"));
        assert!(is_ip("255.255.255.255"));
        assert!(is_ip("0.0.0.0"));
        assert!(!is_ip("10.0.0.256"));
        assert!(!is_ip("10.0.0"));
        assert!(!is_ip("10.0.0.1/24"));
        assert!(!is_ip("010.0.0.1"));
        assert!(!is_ip(" 10.0.0.1"));
        assert!(!is_ip("10.0.0.1\n"));
    }

    #[test]
    fn test_is_ip_or_cidr() {
        assert!(is_ip_or_cidr("10.0.0.1/24"));
        assert!(is_ip_or_cidr("10.0.0.1"));
        assert!(is_ip_or_cidr("192.168.0.0/0"));
        assert!(is_ip_or_cidr("192.168.0.0/32"));
        assert!(!is_ip_or_cidr("192.168.0.0/33"));
        assert!(!is_ip_or_cidr("10.0.0.256"));
        assert!(!is_ip_or_cidr("10.0.0.1/"));
    }

    #[test]
    fn test_is_domain() {
        assert!(is_domain("example.com"));
        assert!(is_domain("sub.example.com:8080"));
        assert!(is_domain("a-b.example.co.uk"));
        assert!(is_domain("localhost"));
        assert!(is_domain("host:65535"));
        assert!(!is_domain("exa_mple.com"));
        assert!(!is_domain("-example.com"));
        assert!(!is_domain("example-.com"));
        assert!(!is_domain("example..com"));
        assert!(!is_domain("example.com:0"));
        assert!(!is_domain("example.com:65536"));
        assert!(!is_domain(""));
    }

    #[test]
    fn test_parse_target_list() {
        assert_eq!(
            parse_target_list("10.0.0.1, 10.0.1.0/24").unwrap(),
            vec!["10.0.0.1".to_string(), "10.0.1.0/24".to_string()]
        );
        assert!(parse_target_list("10.0.0.1,nope").is_err());
        assert!(parse_target_list("10.0.0.1,").is_err());
        assert!(parse_target_list("   ").is_err());
    }

    #[test]
    fn test_registrable_domain() {
        assert_eq!(registrable_domain("www.example.com"), "example.com");
        assert_eq!(registrable_domain("a.b.example.co.uk"), "example.co.uk");
        assert_eq!(registrable_domain("api.Example.com:8443"), "example.com");
        assert_eq!(registrable_domain("example.com"), "example.com");
    }
}
