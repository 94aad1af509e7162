// src/core/scanner/ct_scanner.rs

use crate::core::dispatcher::{CancelToken, Dispatcher, ProbeStatus};
use crate::core::errors::ProbeError;
use crate::core::merge::is_within;
use crate::core::models::{DiscoverySource, SubdomainRecord};
use crate::core::scanner::dns_scanner::DnsProbe;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Public crt.sh JSON endpoint.
pub const DEFAULT_CT_ENDPOINT: &str = "https://crt.sh/";

/// The only field of a crt.sh entry we need: newline-separated subject names.
#[derive(Debug, Clone, Deserialize)]
pub struct CtEntry {
    #[serde(default)]
    pub name_value: String,
}

/// Mines certificate transparency logs for names under a domain.
#[derive(Debug, Clone)]
pub struct CtCorrelator {
    client: reqwest::Client,
    endpoint: Url,
}

impl CtCorrelator {
    pub fn new(endpoint: &str, query_timeout: Duration) -> Result<Self, ProbeError> {
        let endpoint = Url::parse(endpoint).map_err(|e| ProbeError::Http(format!("invalid endpoint: {e}")))?;
        let client = reqwest::Client::builder()
            .user_agent("VanguardRecon/0.1")
            .timeout(query_timeout)
            .build()
            .map_err(|e| ProbeError::Http(e.to_string()))?;
        Ok(Self { client, endpoint })
    }

    /// Queries the aggregator once for `%.<root_domain>`.
    pub async fn fetch_entries(&self, root_domain: &str) -> Result<Vec<CtEntry>, ProbeError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("q", &format!("%.{root_domain}"))
            .append_pair("output", "json");

        debug!(url = %url, "Querying CT log aggregator.");
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ProbeError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProbeError::Http(format!("aggregator answered {}", response.status())));
        }
        response
            .json::<Vec<CtEntry>>()
            .await
            .map_err(|e| ProbeError::Malformed(e.to_string()))
    }

    /// Returns every CT-derived name with its current DNS status.
    ///
    /// Names that no longer resolve are still reported, with
    /// `resolving = false`. An unreachable aggregator contributes nothing.
    pub async fn correlate_ct(
        &self,
        root_domain: &str,
        dns: &DnsProbe,
        dispatcher: Dispatcher,
        cancel: &CancelToken,
    ) -> Vec<SubdomainRecord> {
        let root = root_domain.trim_end_matches('.').to_ascii_lowercase();
        let entries = match self.fetch_entries(&root).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(domain = %root, error = %e, "CT lookup failed, source contributes nothing.");
                return Vec::new();
            }
        };

        let candidates = extract_candidates(&entries, &root);
        info!(domain = %root, certificates = entries.len(), candidates = candidates.len(), "CT candidates extracted.");

        let dns = dns.clone();
        let verified = dispatcher
            .with_failures(true)
            .dispatch_until(
                candidates.into_iter().collect(),
                move |name: String| {
                    let dns = dns.clone();
                    async move { Ok(dns.resolve_name(&name, DiscoverySource::CertTransparency).await) }
                },
                cancel.cancelled(),
            )
            .await;

        let mut records: Vec<SubdomainRecord> = verified
            .outcomes
            .into_iter()
            .map(|outcome| match outcome.status {
                ProbeStatus::Success(record) => record,
                _ => SubdomainRecord::unresolved(outcome.target, DiscoverySource::CertTransparency),
            })
            .collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }
}

/// Extracts the distinct host names under `root` from CT entries.
///
/// Each subject field may hold several names separated by newlines; names
/// are lowercased and a leading wildcard label is removed.
pub fn extract_candidates(entries: &[CtEntry], root: &str) -> BTreeSet<String> {
    entries
        .iter()
        .flat_map(|entry| entry.name_value.split('\n'))
        .map(|raw| {
            let name = raw.trim().to_ascii_lowercase();
            name.strip_prefix("*.").map(str::to_string).unwrap_or(name)
        })
        .filter(|name| is_within(name, root))
        .collect()
}
