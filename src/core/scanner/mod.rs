// src/core/scanner/mod.rs

// Public interface of the `scanner` module: one sub-module per probe kind
// plus the orchestration that runs them together.
pub mod ct_scanner;
pub mod dns_scanner;
pub mod fingerprint_scanner;
pub mod port_scanner;
pub mod subdomain_scanner;
pub mod zone_transfer;

#[cfg(test)]
pub(crate) mod testing;

use crate::config::AppConfig;
use crate::core::dispatcher::CancelToken;
use crate::core::errors::ConfigError;
use crate::core::models::ScanReport;
use crate::core::ports::parse_port_spec;
use chrono::Utc;
use std::net::IpAddr;
use tracing::{info, warn};
use url::Url;

/// A parsed scan request: what to scan and which ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub target: String,
    pub ports: Vec<u16>,
}

impl ScanRequest {
    /// Parses `"<target> [port-spec]"`.
    ///
    /// The target may be a bare host, an IP literal or a URL; only the host
    /// part is kept. Without a port spec `default_ports` is used.
    pub fn parse(input: &str, default_ports: &str) -> Result<Self, ConfigError> {
        let mut parts = input.split_whitespace();
        let raw_target = parts.next().ok_or(ConfigError::EmptyTarget)?;
        let spec = parts.collect::<Vec<_>>().join("");
        let ports = if spec.is_empty() {
            parse_port_spec(default_ports)?
        } else {
            parse_port_spec(&spec)?
        };
        Ok(Self { target: extract_host(raw_target)?, ports })
    }

    /// True when the target is a domain name rather than an IP literal.
    pub fn is_domain(&self) -> bool {
        self.target.parse::<IpAddr>().is_err()
    }
}

fn extract_host(raw: &str) -> Result<String, ConfigError> {
    if let Ok(ip) = raw.trim_matches(|c| c == '[' || c == ']').parse::<IpAddr>() {
        return Ok(ip.to_string());
    }
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let host = Url::parse(&with_scheme)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.trim_matches(|c| c == '[' || c == ']').to_string()))
        .unwrap_or_else(|| raw.to_string());
    let host = host.trim_end_matches('.').to_ascii_lowercase();

    if host.is_empty() {
        Err(ConfigError::EmptyTarget)
    } else {
        Ok(host)
    }
}

/// Runs the port scan and, for domain targets, subdomain enumeration
/// concurrently, and aggregates both into a single report.
///
/// Never fails as a whole: a port scan that cannot start is recorded as
/// its error message, and a cancelled run still reports what finished.
pub async fn run_full_scan(request: &ScanRequest, config: &AppConfig, cancel: &CancelToken) -> ScanReport {
    let started_at = Utc::now();
    info!(target = %request.target, ports = request.ports.len(), "Starting full scan.");

    let port_scan = async {
        let scanner = config.port_scanner()?;
        scanner
            .scan(&request.target, request.ports.clone(), cancel)
            .await
    };
    let subdomain_scan = async {
        if !request.is_domain() {
            return None;
        }
        match config.subdomain_enumerator() {
            Ok(enumerator) => Some(enumerator.enumerate(&request.target, cancel).await),
            Err(e) => {
                warn!(error = %e, "Subdomain enumeration not started.");
                None
            }
        }
    };

    let (ports, subdomains) = tokio::join!(port_scan, subdomain_scan);
    let ports = ports.map_err(|e: crate::core::errors::ScanError| e.to_string());

    let cancelled = cancel.is_cancelled()
        || ports.as_ref().is_ok_and(|report| report.cancelled)
        || subdomains.as_ref().is_some_and(|report| report.cancelled);

    let report = ScanReport {
        target: request.target.clone(),
        started_at,
        finished_at: Utc::now(),
        ports,
        subdomains,
        cancelled,
    };
    info!(target = %report.target, cancelled, "Full scan finished.");
    report
}
