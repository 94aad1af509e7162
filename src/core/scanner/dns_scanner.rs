// src/core/scanner/dns_scanner.rs

use tracing::debug;

use crate::core::models::{DiscoverySource, DnsRecordKind, SubdomainRecord};
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::proto::rr::{RData, RecordType};
use std::net::IpAddr;
use std::time::Duration;

/// Why a name did or did not resolve.
///
/// Only for diagnostics: every variant except `Resolved` is reported to
/// callers of `resolve_name` as the same "absent" result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsDiagnostic {
    Resolved,
    /// The resolver answered NXDOMAIN.
    NxDomain,
    /// The name exists but has neither an A nor a CNAME record.
    NoAnswer,
    /// Timeout, SERVFAIL, network failure or anything else.
    Transient(String),
}

/// Resolver settings for subdomain probes.
///
/// Holds configuration only. Each lookup builds its own resolver so no
/// resolver handle or socket is shared between concurrent probes.
#[derive(Debug, Clone)]
pub struct DnsProbe {
    config: ResolverConfig,
    opts: ResolverOpts,
}

impl DnsProbe {
    /// Uses the library's default upstream resolvers.
    pub fn new(timeout: Duration) -> Self {
        Self::with_config(ResolverConfig::default(), timeout)
    }

    /// Uses the given nameservers over plain UDP/TCP.
    pub fn with_nameservers(nameservers: &[IpAddr], port: u16, timeout: Duration) -> Self {
        let group = NameServerConfigGroup::from_ips_clear(nameservers, port, true);
        Self::with_config(ResolverConfig::from_parts(None, vec![], group), timeout)
    }

    pub fn with_config(config: ResolverConfig, timeout: Duration) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 1;
        Self { config, opts }
    }

    pub fn timeout(&self) -> Duration {
        self.opts.timeout
    }

    pub(crate) fn resolver(&self) -> TokioAsyncResolver {
        TokioAsyncResolver::tokio(self.config.clone(), self.opts.clone())
    }

    /// Probes `<label>.<root_domain>`.
    pub async fn probe_subdomain(&self, label: &str, root_domain: &str) -> Option<SubdomainRecord> {
        let fqdn = format!("{label}.{root_domain}");
        self.resolve_name(&fqdn, DiscoverySource::BruteForce).await
    }

    /// Resolves a fully-qualified name, tagging the record with `source`.
    pub async fn resolve_name(&self, fqdn: &str, source: DiscoverySource) -> Option<SubdomainRecord> {
        self.resolve_diagnosed(fqdn, source).await.0
    }

    /// Resolves a name and also reports why it was absent.
    ///
    /// Queries A first. NXDOMAIN rejects immediately; an empty A answer
    /// falls back to a CNAME query. Any other resolver error ends the
    /// probe as absent.
    pub async fn resolve_diagnosed(
        &self,
        fqdn: &str,
        source: DiscoverySource,
    ) -> (Option<SubdomainRecord>, DnsDiagnostic) {
        let name = fqdn.trim_end_matches('.').to_ascii_lowercase();
        let query = format!("{name}.");
        let resolver = self.resolver();

        debug!(name = %name, "Looking up A record.");
        match resolver.lookup(query.as_str(), RecordType::A).await {
            Ok(lookup) => {
                let ips: Vec<String> = lookup
                    .iter()
                    .filter_map(|rdata| match rdata {
                        RData::A(a) => Some(a.to_string()),
                        _ => None,
                    })
                    .collect();
                if !ips.is_empty() {
                    debug!(name = %name, count = ips.len(), "A record found.");
                    return (Some(record(name, ips, DnsRecordKind::A, source)), DnsDiagnostic::Resolved);
                }
            }
            Err(e) => match classify_error(&e) {
                DnsDiagnostic::NoAnswer => {}
                diagnostic => {
                    debug!(name = %name, error = %e, "A lookup gave no result.");
                    return (None, diagnostic);
                }
            },
        }

        debug!(name = %name, "No A answer, trying CNAME.");
        match resolver.lookup(query.as_str(), RecordType::CNAME).await {
            Ok(lookup) => {
                let targets: Vec<String> = lookup
                    .iter()
                    .filter_map(|rdata| match rdata {
                        RData::CNAME(cname) => Some(cname.to_string().trim_end_matches('.').to_string()),
                        _ => None,
                    })
                    .collect();
                if targets.is_empty() {
                    (None, DnsDiagnostic::NoAnswer)
                } else {
                    debug!(name = %name, "CNAME record found.");
                    (Some(record(name, targets, DnsRecordKind::Cname, source)), DnsDiagnostic::Resolved)
                }
            }
            Err(e) => {
                debug!(name = %name, error = %e, "CNAME lookup gave no result.");
                (None, classify_error(&e))
            }
        }
    }
}

fn record(name: String, resolved: Vec<String>, kind: DnsRecordKind, source: DiscoverySource) -> SubdomainRecord {
    SubdomainRecord {
        name,
        resolved_ips: resolved,
        record_type: kind,
        source,
        resolving: true,
        nameservers: Vec::new(),
    }
}

fn classify_error(error: &ResolveError) -> DnsDiagnostic {
    match error.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } if *response_code == ResponseCode::NXDomain => {
            DnsDiagnostic::NxDomain
        }
        ResolveErrorKind::NoRecordsFound { .. } => DnsDiagnostic::NoAnswer,
        _ => DnsDiagnostic::Transient(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scanner::testing::FakeDns;

    #[tokio::test]
    async fn resolves_a_record() {
        let dns = FakeDns::builder().a("www.example.test", [192, 0, 2, 7]).spawn().await;
        let (record, diagnostic) = dns
            .probe()
            .resolve_diagnosed("www.example.test", DiscoverySource::BruteForce)
            .await;

        let record = record.unwrap();
        assert_eq!(diagnostic, DnsDiagnostic::Resolved);
        assert_eq!(record.name, "www.example.test");
        assert_eq!(record.resolved_ips, vec!["192.0.2.7".to_string()]);
        assert_eq!(record.record_type, DnsRecordKind::A);
        assert!(record.resolving);
    }

    #[tokio::test]
    async fn nxdomain_is_absent_without_cname_query() {
        let dns = FakeDns::builder().spawn().await;
        let (record, diagnostic) = dns
            .probe()
            .resolve_diagnosed("nope.example.test", DiscoverySource::BruteForce)
            .await;

        assert!(record.is_none());
        assert_eq!(diagnostic, DnsDiagnostic::NxDomain);
        assert_eq!(dns.queries_for(RecordType::CNAME), 0);
    }

    #[tokio::test]
    async fn falls_back_to_cname_when_a_is_empty() {
        let dns = FakeDns::builder()
            .cname("alias.example.test", "target.elsewhere.test")
            .spawn()
            .await;
        let record = dns.probe().probe_subdomain("alias", "example.test").await.unwrap();

        assert_eq!(record.record_type, DnsRecordKind::Cname);
        assert_eq!(record.resolved_ips, vec!["target.elsewhere.test".to_string()]);
        assert_eq!(record.source, DiscoverySource::BruteForce);
        assert_eq!(dns.queries_for(RecordType::CNAME), 1);
    }

    #[tokio::test]
    async fn unreachable_resolver_is_folded_into_absent() {
        let probe = DnsProbe::with_nameservers(
            &[IpAddr::from([127, 0, 0, 1])],
            crate::core::scanner::testing::closed_udp_port().await,
            Duration::from_millis(200),
        );
        let (record, diagnostic) = probe.resolve_diagnosed("www.example.test", DiscoverySource::BruteForce).await;

        assert!(record.is_none());
        assert!(matches!(diagnostic, DnsDiagnostic::Transient(_)));
        assert!(probe.resolve_name("www.example.test", DiscoverySource::BruteForce).await.is_none());
    }
}
