// src/core/scanner/zone_transfer.rs

use crate::core::errors::ProbeError;
use crate::core::merge::is_within;
use crate::core::models::{DiscoverySource, DnsRecordKind, SubdomainRecord};
use crate::core::scanner::dns_scanner::DnsProbe;
use hickory_resolver::proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_resolver::proto::rr::{Name, RData, Record, RecordType};
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

const DNS_PORT: u16 = 53;
/// Upper bound on response messages read from one transfer stream.
const MAX_XFR_MESSAGES: usize = 4096;

/// Attempts AXFR against every authoritative nameserver of a domain.
///
/// Runs outside the dispatcher: there are only a handful of nameservers
/// and the attempt happens once per domain.
#[derive(Debug, Clone)]
pub struct ZoneTransferProbe {
    dns: DnsProbe,
    port: u16,
    transfer_timeout: Duration,
}

impl ZoneTransferProbe {
    pub fn new(dns: DnsProbe, transfer_timeout: Duration) -> Self {
        Self { dns, port: DNS_PORT, transfer_timeout }
    }

    /// Sends transfers to `port` instead of 53.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Returns the records of every transfer that succeeded.
    ///
    /// A nameserver that cannot be resolved or refuses the transfer is
    /// skipped. When all of them refuse, the result is empty.
    pub async fn attempt_zone_transfer(&self, root_domain: &str) -> Vec<SubdomainRecord> {
        let root = root_domain.trim_end_matches('.').to_ascii_lowercase();
        let resolver = self.dns.resolver();

        let nameservers: Vec<String> = match resolver.ns_lookup(format!("{root}.").as_str()).await {
            Ok(lookup) => lookup
                .iter()
                .map(|ns| ns.to_string().trim_end_matches('.').to_ascii_lowercase())
                .collect(),
            Err(e) => {
                debug!(domain = %root, error = %e, "NS lookup failed, skipping zone transfer.");
                return Vec::new();
            }
        };
        info!(domain = %root, nameservers = nameservers.len(), "Attempting zone transfers.");

        let mut transferred = Vec::new();
        for nameserver in nameservers {
            let ip = match resolver.ipv4_lookup(nameserver.as_str()).await {
                Ok(lookup) => match lookup.iter().next() {
                    Some(a) => IpAddr::V4(a.0),
                    None => continue,
                },
                Err(e) => {
                    debug!(nameserver = %nameserver, error = %e, "Could not resolve nameserver.");
                    continue;
                }
            };

            match self.transfer_from(ip, &root).await {
                Ok(records) => {
                    info!(nameserver = %nameserver, records = records.len(), "Zone transfer succeeded.");
                    transferred.push((nameserver, records));
                }
                Err(e) => debug!(nameserver = %nameserver, error = %e, "Zone transfer refused."),
            }
        }

        records_from_zone(&root, &transferred)
    }

    async fn transfer_from(&self, ip: IpAddr, root: &str) -> Result<Vec<Record>, ProbeError> {
        timeout(self.transfer_timeout, self.read_transfer(ip, root))
            .await
            .map_err(|_| ProbeError::Dns("zone transfer timed out".to_string()))?
    }

    async fn read_transfer(&self, ip: IpAddr, root: &str) -> Result<Vec<Record>, ProbeError> {
        let zone = Name::from_ascii(format!("{root}.")).map_err(|e| ProbeError::Dns(e.to_string()))?;
        let mut request = Message::new();
        request
            .set_id(rand::random())
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(false)
            .add_query(Query::query(zone, RecordType::AXFR));
        let payload = request.to_vec().map_err(|e| ProbeError::Malformed(e.to_string()))?;
        let length = u16::try_from(payload.len()).map_err(|_| ProbeError::Malformed("request too large".into()))?;

        let mut stream = TcpStream::connect((ip, self.port)).await?;
        stream.write_u16(length).await?;
        stream.write_all(&payload).await?;

        let mut records = Vec::new();
        let mut soa_seen = 0;
        for _ in 0..MAX_XFR_MESSAGES {
            let len = stream.read_u16().await? as usize;
            let mut buf = vec![0u8; len];
            stream.read_exact(&mut buf).await?;
            let response = Message::from_vec(&buf).map_err(|e| ProbeError::Malformed(e.to_string()))?;

            if response.response_code() != ResponseCode::NoError {
                return Err(ProbeError::Dns(format!("transfer answered {}", response.response_code())));
            }
            if response.answers().is_empty() {
                break;
            }
            for record in response.answers() {
                if record.record_type() == RecordType::SOA {
                    soa_seen += 1;
                }
                records.push(record.clone());
            }
            // A complete transfer is bracketed by two SOA records.
            if soa_seen >= 2 {
                break;
            }
        }

        if soa_seen == 0 {
            return Err(ProbeError::Dns("transfer returned no SOA".to_string()));
        }
        Ok(records)
    }
}

#[derive(Default)]
struct ZoneEntry {
    cname: bool,
    addresses: Vec<String>,
    targets: Vec<String>,
    nameservers: BTreeSet<String>,
}

fn push_unique(values: &mut Vec<String>, value: String) {
    if !values.contains(&value) {
        values.push(value);
    }
}

/// Collapses transferred resource records into one record per name.
///
/// `transfers` pairs each nameserver with the records it served. Address
/// records (A and AAAA) become `resolved_ips`; a name holding a CNAME is
/// tagged CNAME with its targets instead. Values repeated across
/// nameservers are kept once, in first-seen order, and every nameserver
/// that served a name is listed on it. Names outside the root domain are
/// ignored. Output is ordered by name.
pub fn records_from_zone(root: &str, transfers: &[(String, Vec<Record>)]) -> Vec<SubdomainRecord> {
    let mut by_name: BTreeMap<String, ZoneEntry> = BTreeMap::new();

    for (nameserver, records) in transfers {
        for record in records {
            let name = record.name().to_ascii().trim_end_matches('.').to_ascii_lowercase();
            if !is_within(&name, root) {
                continue;
            }
            let entry = by_name.entry(name).or_default();
            entry.nameservers.insert(nameserver.clone());
            match record.data() {
                Some(RData::A(a)) => push_unique(&mut entry.addresses, a.to_string()),
                Some(RData::AAAA(aaaa)) => push_unique(&mut entry.addresses, aaaa.to_string()),
                Some(RData::CNAME(cname)) => {
                    entry.cname = true;
                    push_unique(&mut entry.targets, cname.to_string().trim_end_matches('.').to_string());
                }
                _ => {}
            }
        }
    }

    by_name
        .into_iter()
        .map(|(name, entry)| {
            let (record_type, resolved_ips) = if entry.cname {
                (DnsRecordKind::Cname, entry.targets)
            } else {
                (DnsRecordKind::A, entry.addresses)
            };
            SubdomainRecord {
                name,
                resolved_ips,
                record_type,
                source: DiscoverySource::ZoneTransfer,
                resolving: true,
                nameservers: entry.nameservers.into_iter().collect(),
            }
        })
        .collect()
}
