// src/core/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

// --- Port Scanner Models ---

/// A port that accepted a TCP handshake.
///
/// `service_name` is the banner-derived product when a signature matched,
/// otherwise the static port label, otherwise `"Unknown"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpenPortRecord {
    pub port: u16,
    pub service_name: String,
    pub banner: Option<String>,
}

/// Result of the second, classifier-driven probing pass over an open port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceFingerprint {
    pub port: u16,
    pub service: String,
    pub version: String,
    /// At most `RAW_DETAIL_LIMIT` characters of the probe response.
    pub raw_detail: String,
}

/// Aggregate counts of one dispatcher batch.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchStats {
    pub submitted: usize,
    pub succeeded: usize,
    pub absent: usize,
    pub failed: usize,
    pub timed_out: usize,
    /// Probes that never produced an outcome because the batch was cancelled.
    pub abandoned: usize,
}

impl DispatchStats {
    pub fn completed(&self) -> usize {
        self.succeeded + self.absent + self.failed + self.timed_out
    }
}

// A struct that aggregates the results of a port scan against a single host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortScanReport {
    pub target: String,
    pub ip: IpAddr,
    pub open_ports: Vec<OpenPortRecord>,
    pub fingerprints: Vec<ServiceFingerprint>,
    pub stats: DispatchStats,
    pub cancelled: bool,
}

// --- Subdomain Models ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, strum::Display)]
pub enum DnsRecordKind {
    #[strum(serialize = "A")]
    #[serde(rename = "A")]
    A,
    #[strum(serialize = "CNAME")]
    #[serde(rename = "CNAME")]
    Cname,
}

/// Where a subdomain was first seen.
///
/// The declaration order is also the merge precedence order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, strum::Display)]
pub enum DiscoverySource {
    #[strum(serialize = "Zone Transfer")]
    ZoneTransfer,
    #[strum(serialize = "Certificate Transparency")]
    CertTransparency,
    #[strum(serialize = "Brute Force")]
    BruteForce,
}

/// A discovered host name under the queried root domain.
///
/// For `DnsRecordKind::Cname` records `resolved_ips` holds the canonical
/// names the alias points to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubdomainRecord {
    pub name: String,
    pub resolved_ips: Vec<String>,
    pub record_type: DnsRecordKind,
    pub source: DiscoverySource,
    pub resolving: bool,
    /// Nameservers that handed this name out in a zone transfer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nameservers: Vec<String>,
}

impl SubdomainRecord {
    /// A name that is known to exist somewhere but did not resolve now.
    pub fn unresolved(name: impl Into<String>, source: DiscoverySource) -> Self {
        Self {
            name: name.into(),
            resolved_ips: Vec::new(),
            record_type: DnsRecordKind::A,
            source,
            resolving: false,
            nameservers: Vec::new(),
        }
    }
}

/// Merged subdomain findings, one sub-list per source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubdomainReport {
    pub domain: String,
    pub zone_transfer: Vec<SubdomainRecord>,
    pub cert_transparency: Vec<SubdomainRecord>,
    pub brute_force: Vec<SubdomainRecord>,
    pub total_found: usize,
    pub cancelled: bool,
}

impl SubdomainReport {
    /// Iterates all records in merge precedence order.
    pub fn all(&self) -> impl Iterator<Item = &SubdomainRecord> {
        self.zone_transfer
            .iter()
            .chain(self.cert_transparency.iter())
            .chain(self.brute_force.iter())
    }
}

// --- Main Report ---

// The structured result surface handed to whatever writes the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub ports: Result<PortScanReport, String>,
    pub subdomains: Option<SubdomainReport>,
    pub cancelled: bool,
}
