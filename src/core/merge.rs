// src/core/merge.rs

use crate::core::models::{SubdomainRecord, SubdomainReport};
use std::collections::HashSet;
use tracing::debug;

/// Folds the three discovery sources into one report.
///
/// Sources are processed in a fixed order: zone transfer, then certificate
/// transparency, then brute force. A name keeps the record of the first
/// source that reported it; later sightings, including duplicates inside
/// one source, are dropped. Names outside `domain` are discarded.
pub fn merge(
    domain: &str,
    zone_transfer: Vec<SubdomainRecord>,
    cert_transparency: Vec<SubdomainRecord>,
    brute_force: Vec<SubdomainRecord>,
) -> SubdomainReport {
    let domain = domain.trim_end_matches('.').to_ascii_lowercase();
    let mut seen = HashSet::new();

    let mut keep_first = |records: Vec<SubdomainRecord>| -> Vec<SubdomainRecord> {
        records
            .into_iter()
            .filter_map(|mut record| {
                record.name = record.name.trim_end_matches('.').to_ascii_lowercase();
                if !is_within(&record.name, &domain) {
                    debug!(name = %record.name, "Dropping record outside the root domain.");
                    return None;
                }
                if !seen.insert(record.name.clone()) {
                    debug!(name = %record.name, source = %record.source, "Duplicate discovery discarded.");
                    return None;
                }
                Some(record)
            })
            .collect()
    };

    let zone_transfer = keep_first(zone_transfer);
    let cert_transparency = keep_first(cert_transparency);
    let brute_force = keep_first(brute_force);

    SubdomainReport {
        total_found: seen.len(),
        domain,
        zone_transfer,
        cert_transparency,
        brute_force,
        cancelled: false,
    }
}

/// True when `name` is `domain` itself or any name below it.
pub fn is_within(name: &str, domain: &str) -> bool {
    name == domain
        || name
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{DiscoverySource, DnsRecordKind};

    fn record(name: &str, source: DiscoverySource) -> SubdomainRecord {
        SubdomainRecord {
            name: name.to_string(),
            resolved_ips: vec!["192.0.2.1".to_string()],
            record_type: DnsRecordKind::A,
            source,
            resolving: true,
            nameservers: Vec::new(),
        }
    }

    #[test]
    fn earlier_source_wins_for_shared_names() {
        let report = merge(
            "example.com",
            vec![record("www.example.com", DiscoverySource::ZoneTransfer)],
            vec![],
            vec![
                record("www.example.com", DiscoverySource::BruteForce),
                record("mail.example.com", DiscoverySource::BruteForce),
            ],
        );

        assert_eq!(report.total_found, 2);
        assert_eq!(report.zone_transfer.len(), 1);
        assert_eq!(report.zone_transfer[0].source, DiscoverySource::ZoneTransfer);
        assert_eq!(report.brute_force.len(), 1);
        assert_eq!(report.brute_force[0].name, "mail.example.com");
    }

    #[test]
    fn ct_precedes_brute_force() {
        let mut dead = SubdomainRecord::unresolved("old.example.com", DiscoverySource::CertTransparency);
        dead.name = "OLD.example.com.".to_string();
        let report = merge(
            "example.com",
            vec![],
            vec![dead],
            vec![record("old.example.com", DiscoverySource::BruteForce)],
        );

        assert_eq!(report.total_found, 1);
        assert_eq!(report.cert_transparency[0].name, "old.example.com");
        assert!(!report.cert_transparency[0].resolving);
        assert!(report.brute_force.is_empty());
    }

    #[test]
    fn within_source_duplicates_keep_first() {
        let mut first = record("api.example.com", DiscoverySource::BruteForce);
        first.resolved_ips = vec!["192.0.2.10".into()];
        let mut second = record("api.example.com", DiscoverySource::BruteForce);
        second.resolved_ips = vec!["192.0.2.20".into()];

        let report = merge("example.com", vec![], vec![], vec![first, second]);
        assert_eq!(report.brute_force.len(), 1);
        assert_eq!(report.brute_force[0].resolved_ips, vec!["192.0.2.10".to_string()]);
    }

    #[test]
    fn foreign_names_are_dropped() {
        let report = merge(
            "example.com",
            vec![record("evilexample.com", DiscoverySource::ZoneTransfer)],
            vec![record("example.com", DiscoverySource::CertTransparency)],
            vec![],
        );
        assert!(report.zone_transfer.is_empty());
        assert_eq!(report.total_found, 1);
    }

    #[test]
    fn empty_sources_give_empty_report() {
        let report = merge("example.com", vec![], vec![], vec![]);
        assert_eq!(report.total_found, 0);
        assert_eq!(report.all().count(), 0);
    }

    #[test]
    fn within_checks_label_boundary() {
        assert!(is_within("a.b.example.com", "example.com"));
        assert!(is_within("example.com", "example.com"));
        assert!(!is_within("badexample.com", "example.com"));
    }
}
