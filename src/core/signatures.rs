// src/core/signatures.rs

//! Banner signature database and the service classifier built on it.
//!
//! Rules are evaluated in declaration order and the first match wins, so
//! the order of `RULES` is part of the classifier's observable behaviour.

use crate::core::models::ServiceFingerprint;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Maximum number of characters of a response kept in `raw_detail`.
pub const RAW_DETAIL_LIMIT: usize = 100;

const UNKNOWN: &str = "unknown";

/// Protocol families the rule table is grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ServiceFamily {
    Ssh,
    Ftp,
    Smtp,
    Http,
    Mysql,
    Postgresql,
    Redis,
}

/// A single banner signature: a pattern and the product it identifies.
/// Capture groups of the pattern form the version.
struct SignatureRule<'a> {
    family: ServiceFamily,
    product: &'a str,
    pattern: &'a Lazy<Regex>,
}

// Statically compiled, case-insensitive signatures.
static RE_OPENSSH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)SSH-(\d+\.\d+)-OpenSSH[_-](\S+)").unwrap());
static RE_SSH_GENERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)SSH-(\d+\.\d+)-(\S+)").unwrap());
static RE_PROFTPD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)220.*ProFTPD (\S+)").unwrap());
static RE_FILEZILLA: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)220.*FileZilla Server (\S+)").unwrap());
static RE_VSFTPD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)220.*vsftpd (\S+)").unwrap());
static RE_MS_FTP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)220 Microsoft FTP Service").unwrap());
static RE_POSTFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)220.*ESMTP Postfix").unwrap());
static RE_SENDMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)220.*ESMTP Sendmail (\S+)").unwrap());
static RE_EXCHANGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)220.*Microsoft ESMTP MAIL").unwrap());
static RE_NGINX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Server: nginx/(\S+)").unwrap());
static RE_APACHE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Server: Apache/(\S+)").unwrap());
static RE_IIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Server: Microsoft-IIS/(\S+)").unwrap());
static RE_LIGHTTPD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Server: lighttpd/(\S+)").unwrap());
static RE_MARIADB: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+\.\d+\.\d+)-MariaDB").unwrap());
static RE_MYSQL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+\.\d+\.\d+)-MySQL").unwrap());
static RE_POSTGRESQL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)PostgreSQL (\S+)").unwrap());
static RE_REDIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\$\d+\r\nredis_version:(\S+)").unwrap());

/// The master list of banner signatures, grouped by family.
static RULES: &[SignatureRule] = &[
    SignatureRule { family: ServiceFamily::Ssh, product: "OpenSSH", pattern: &RE_OPENSSH },
    SignatureRule { family: ServiceFamily::Ssh, product: "SSH Server", pattern: &RE_SSH_GENERIC },
    SignatureRule { family: ServiceFamily::Ftp, product: "ProFTPD", pattern: &RE_PROFTPD },
    SignatureRule { family: ServiceFamily::Ftp, product: "FileZilla", pattern: &RE_FILEZILLA },
    SignatureRule { family: ServiceFamily::Ftp, product: "vsftpd", pattern: &RE_VSFTPD },
    SignatureRule { family: ServiceFamily::Ftp, product: "Microsoft FTP", pattern: &RE_MS_FTP },
    SignatureRule { family: ServiceFamily::Smtp, product: "Postfix", pattern: &RE_POSTFIX },
    SignatureRule { family: ServiceFamily::Smtp, product: "Sendmail", pattern: &RE_SENDMAIL },
    SignatureRule { family: ServiceFamily::Smtp, product: "Microsoft Exchange", pattern: &RE_EXCHANGE },
    SignatureRule { family: ServiceFamily::Http, product: "nginx", pattern: &RE_NGINX },
    SignatureRule { family: ServiceFamily::Http, product: "Apache", pattern: &RE_APACHE },
    SignatureRule { family: ServiceFamily::Http, product: "IIS", pattern: &RE_IIS },
    SignatureRule { family: ServiceFamily::Http, product: "lighttpd", pattern: &RE_LIGHTTPD },
    SignatureRule { family: ServiceFamily::Mysql, product: "MariaDB", pattern: &RE_MARIADB },
    SignatureRule { family: ServiceFamily::Mysql, product: "MySQL", pattern: &RE_MYSQL },
    SignatureRule { family: ServiceFamily::Postgresql, product: "PostgreSQL", pattern: &RE_POSTGRESQL },
    SignatureRule { family: ServiceFamily::Redis, product: "Redis", pattern: &RE_REDIS },
];

/// A banner that matched one of the signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureMatch {
    pub family: ServiceFamily,
    pub product: &'static str,
    /// Capture groups joined with a single space; `None` for patterns
    /// without groups.
    pub version: Option<String>,
}

/// Finds the first signature matching `banner`.
///
/// Rules are tried in table order and the search stops at the first hit,
/// even when a later family would also match.
pub fn match_signature(banner: &str) -> Option<SignatureMatch> {
    RULES.iter().find_map(|rule| {
        rule.pattern.captures(banner).map(|caps| {
            let groups: Vec<&str> = caps.iter().skip(1).flatten().map(|m| m.as_str()).collect();
            SignatureMatch {
                family: rule.family,
                product: rule.product,
                version: (!groups.is_empty()).then(|| groups.join(" ")),
            }
        })
    })
}

/// Service conventionally found on a port, used when no signature matches.
pub fn port_service(port: u16) -> Option<&'static str> {
    let service = match port {
        21 => "ftp",
        22 => "ssh",
        23 => "telnet",
        25 => "smtp",
        53 => "dns",
        80 => "http",
        110 => "pop3",
        143 => "imap",
        443 => "https",
        445 => "smb",
        3306 => "mysql",
        3389 => "rdp",
        5432 => "postgresql",
        5900 => "vnc",
        6379 => "redis",
        8080 => "http-proxy",
        8443 => "https-alt",
        27017 => "mongodb",
        _ => return None,
    };
    Some(service)
}

/// Classifies a port from its optional banner.
///
/// The port table gives the baseline service; a matching signature
/// overrides it with the product name and captured version. `raw_detail`
/// always carries the truncated banner so unmatched services can still be
/// identified by hand.
pub fn classify(port: u16, banner: Option<&str>) -> ServiceFingerprint {
    let mut fingerprint = ServiceFingerprint {
        port,
        service: port_service(port).unwrap_or(UNKNOWN).to_string(),
        version: UNKNOWN.to_string(),
        raw_detail: String::new(),
    };

    let Some(banner) = banner.filter(|b| !b.is_empty()) else {
        return fingerprint;
    };
    fingerprint.raw_detail = truncate_chars(banner, RAW_DETAIL_LIMIT);

    if let Some(matched) = match_signature(banner) {
        fingerprint.service = matched.product.to_string();
        if let Some(version) = matched.version {
            fingerprint.version = version;
        }
    }
    fingerprint
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
