// src/core/scanner/subdomain_scanner.rs

use crate::core::dispatcher::{CancelToken, Dispatcher};
use crate::core::merge::merge;
use crate::core::models::{SubdomainRecord, SubdomainReport};
use crate::core::scanner::ct_scanner::CtCorrelator;
use crate::core::scanner::dns_scanner::DnsProbe;
use crate::core::scanner::zone_transfer::ZoneTransferProbe;
use tracing::info;

/// Labels tried when no wordlist is configured.
pub const COMMON_SUBDOMAINS: &[&str] = &[
    "www", "mail", "ftp", "localhost", "webmail", "smtp", "pop", "ns1", "webdisk",
    "ns2", "cpanel", "whm", "autodiscover", "autoconfig", "m", "imap", "test",
    "ns", "blog", "pop3", "dev", "www2", "admin", "forum", "news", "vpn", "ns3",
    "mail2", "new", "mysql", "old", "lists", "support", "mobile", "mx", "static",
    "docs", "beta", "shop", "sql", "secure", "demo", "cp", "calendar", "wiki",
    "web", "media", "email", "images", "img", "www1", "intranet", "portal", "video",
    "sip", "dns2", "api", "cdn", "stats", "dns1", "ns4", "www3", "dns", "search",
    "staging", "server", "mx1", "chat", "wap", "my", "svn", "mail1", "sites",
    "proxy", "ads", "host", "crm", "cms", "backup", "mx2", "lyncdiscover", "info",
    "apps", "download", "remote", "db", "forums", "store", "relay", "files",
    "newsletter", "app", "live", "owa", "en", "start", "sms", "office", "exchange",
    "ipv4", "gateway", "public", "prod", "production", "sandbox", "alpha",
];

/// Discovers the subdomains of one root domain from three sources.
#[derive(Debug, Clone)]
pub struct SubdomainEnumerator {
    dns: DnsProbe,
    dispatcher: Dispatcher,
    wordlist: Vec<String>,
    zone_transfer: Option<ZoneTransferProbe>,
    cert_transparency: Option<CtCorrelator>,
}

impl SubdomainEnumerator {
    /// Brute force only, over the built-in wordlist.
    pub fn new(dns: DnsProbe, dispatcher: Dispatcher) -> Self {
        Self {
            dns,
            dispatcher,
            wordlist: COMMON_SUBDOMAINS.iter().map(|label| label.to_string()).collect(),
            zone_transfer: None,
            cert_transparency: None,
        }
    }

    /// Replaces the built-in labels. An empty list keeps them.
    pub fn with_wordlist(mut self, wordlist: Vec<String>) -> Self {
        if !wordlist.is_empty() {
            self.wordlist = wordlist;
        }
        self
    }

    pub fn with_zone_transfer(mut self, probe: ZoneTransferProbe) -> Self {
        self.zone_transfer = Some(probe);
        self
    }

    pub fn with_cert_transparency(mut self, correlator: CtCorrelator) -> Self {
        self.cert_transparency = Some(correlator);
        self
    }

    pub fn wordlist(&self) -> &[String] {
        &self.wordlist
    }

    /// Resolves `<label>.<root>` for every wordlist entry. Only names
    /// that resolve are returned, sorted by name.
    pub async fn brute_force(&self, root_domain: &str, cancel: &CancelToken) -> Vec<SubdomainRecord> {
        let root = root_domain.to_string();
        let dns = self.dns.clone();
        let dispatch = self
            .dispatcher
            .dispatch_until(
                self.wordlist.clone(),
                move |label: String| {
                    let dns = dns.clone();
                    let root = root.clone();
                    async move { Ok(dns.probe_subdomain(&label, &root).await) }
                },
                cancel.cancelled(),
            )
            .await;

        let mut records = dispatch.into_payloads();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    /// Runs every enabled source concurrently and merges them.
    ///
    /// A source that fails contributes an empty list; the report is built
    /// from whatever the others found.
    pub async fn enumerate(&self, root_domain: &str, cancel: &CancelToken) -> SubdomainReport {
        let root = root_domain.trim().trim_end_matches('.').to_ascii_lowercase();
        info!(domain = %root, labels = self.wordlist.len(), "Starting subdomain enumeration.");

        let zone_transfer = async {
            match &self.zone_transfer {
                Some(probe) => tokio::select! {
                    biased;
                    records = probe.attempt_zone_transfer(&root) => records,
                    _ = cancel.cancelled() => Vec::new(),
                },
                None => Vec::new(),
            }
        };
        // Verification observes the token itself and returns what it has.
        let cert_transparency = async {
            match &self.cert_transparency {
                Some(correlator) => correlator.correlate_ct(&root, &self.dns, self.dispatcher, cancel).await,
                None => Vec::new(),
            }
        };
        let brute_force = self.brute_force(&root, cancel);

        let (zone_transfer, cert_transparency, brute_force) = tokio::join!(zone_transfer, cert_transparency, brute_force);

        let mut report = merge(&root, zone_transfer, cert_transparency, brute_force);
        report.cancelled = cancel.is_cancelled();
        info!(
            domain = %report.domain,
            zone_transfer = report.zone_transfer.len(),
            cert_transparency = report.cert_transparency.len(),
            brute_force = report.brute_force.len(),
            total = report.total_found,
            "Subdomain enumeration finished."
        );
        report
    }
}
