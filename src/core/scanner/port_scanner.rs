// src/core/scanner/port_scanner.rs

use crate::core::dispatcher::{CancelToken, Dispatcher};
use crate::core::errors::{ConfigError, ScanError};
use crate::core::models::{OpenPortRecord, PortScanReport};
use crate::core::ports::common_port_label;
use crate::core::scanner::fingerprint_scanner::FingerprintScanner;
use crate::core::signatures::match_signature;
use std::net::IpAddr;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpStream, lookup_host};
use tokio::time::timeout;
use tracing::{debug, info};

const BANNER_BUFFER: usize = 1024;
/// Extra time the dispatcher allows on top of the probe's own timeouts.
const DISPATCH_SLACK: Duration = Duration::from_millis(250);

/// Tests a single TCP port.
///
/// A completed handshake is the only liveness signal: refusal, reset and
/// timeout all yield `None`. When `banner_timeout` is set, a separately
/// timed read follows; its failure still returns the open port.
pub async fn probe_port(
    ip: IpAddr,
    port: u16,
    connect_timeout: Duration,
    banner_timeout: Option<Duration>,
) -> Option<OpenPortRecord> {
    let stream = match timeout(connect_timeout, TcpStream::connect((ip, port))).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            debug!(port, error = %e, "Port not open.");
            return None;
        }
        Err(_) => {
            debug!(port, "Connect timed out.");
            return None;
        }
    };

    let banner = match banner_timeout {
        Some(limit) => read_banner(stream, limit).await,
        None => None,
    };
    let service_name = banner
        .as_deref()
        .and_then(match_signature)
        .map(|matched| matched.product)
        .or_else(|| common_port_label(port))
        .unwrap_or("Unknown")
        .to_string();

    debug!(port, service = %service_name, "Port open.");
    Some(OpenPortRecord { port, service_name, banner })
}

/// Waits for an unsolicited greeting on an already connected stream.
async fn read_banner(mut stream: TcpStream, limit: Duration) -> Option<String> {
    let mut buf = vec![0u8; BANNER_BUFFER];
    match timeout(limit, stream.read(&mut buf)).await {
        Ok(Ok(count)) if count > 0 => {
            let banner = String::from_utf8_lossy(&buf[..count]).trim().to_string();
            (!banner.is_empty()).then_some(banner)
        }
        _ => None,
    }
}

/// Resolves a host name or IP literal, preferring IPv4.
pub async fn resolve_target(target: &str) -> Result<IpAddr, ScanError> {
    let target = target.trim();
    if target.is_empty() {
        return Err(ConfigError::EmptyTarget.into());
    }
    if let Ok(ip) = target.parse::<IpAddr>() {
        return Ok(ip);
    }

    let unresolvable = |reason: String| ScanError::Unresolvable { target: target.to_string(), reason };
    let addrs: Vec<IpAddr> = lookup_host((target, 0))
        .await
        .map_err(|e| unresolvable(e.to_string()))?
        .map(|addr| addr.ip())
        .collect();
    addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| unresolvable("no addresses".to_string()))
}

/// Scans a host's ports and optionally fingerprints the open ones.
#[derive(Debug, Clone)]
pub struct PortScanner {
    dispatcher: Dispatcher,
    connect_timeout: Duration,
    banner_timeout: Option<Duration>,
    fingerprinter: Option<FingerprintScanner>,
}

impl PortScanner {
    /// `banner_timeout = None` disables banner capture.
    pub fn new(
        concurrency: usize,
        connect_timeout: Duration,
        banner_timeout: Option<Duration>,
    ) -> Result<Self, ConfigError> {
        if connect_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("connect"));
        }
        let budget = connect_timeout + banner_timeout.unwrap_or_default() + DISPATCH_SLACK;
        Ok(Self {
            dispatcher: Dispatcher::new(concurrency, budget)?,
            connect_timeout,
            banner_timeout,
            fingerprinter: None,
        })
    }

    pub fn with_fingerprinting(mut self, fingerprinter: FingerprintScanner) -> Self {
        self.fingerprinter = Some(fingerprinter);
        self
    }

    pub async fn scan(&self, target: &str, ports: Vec<u16>, cancel: &CancelToken) -> Result<PortScanReport, ScanError> {
        let ip = resolve_target(target).await?;
        info!(target, %ip, ports = ports.len(), "Starting port scan.");

        let connect_timeout = self.connect_timeout;
        let banner_timeout = self.banner_timeout;
        let dispatch = self
            .dispatcher
            .dispatch_until(
                ports,
                move |port| async move { Ok(probe_port(ip, port, connect_timeout, banner_timeout).await) },
                cancel.cancelled(),
            )
            .await;

        let stats = dispatch.stats;
        let mut cancelled = dispatch.cancelled;
        let mut open_ports = dispatch.into_payloads();
        open_ports.sort_by_key(|record| record.port);
        info!(target, open = open_ports.len(), "Port scan finished.");

        let fingerprints = match &self.fingerprinter {
            Some(fingerprinter) if !open_ports.is_empty() && !cancel.is_cancelled() => {
                let ports = open_ports.iter().map(|record| record.port).collect();
                let (fingerprints, fp_cancelled) = fingerprinter.fingerprint(ip, ports, cancel).await;
                cancelled |= fp_cancelled;
                fingerprints
            }
            _ => Vec::new(),
        };

        Ok(PortScanReport {
            target: target.to_string(),
            ip,
            open_ports,
            fingerprints,
            stats,
            cancelled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scanner::testing::localhost;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    async fn greeting_server(greeting: &'static [u8]) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let _ = stream.write_all(greeting).await;
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        });
        port
    }

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn open_port_with_banner_uses_matched_product() {
        let port = greeting_server(b"SSH-2.0-OpenSSH_8.9\r\n").await;
        let record = probe_port(localhost(), port, Duration::from_secs(1), Some(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(record.port, port);
        assert_eq!(record.service_name, "OpenSSH");
        assert_eq!(record.banner.as_deref(), Some("SSH-2.0-OpenSSH_8.9"));
    }

    #[tokio::test]
    async fn silent_port_is_still_open() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let record = probe_port(localhost(), port, Duration::from_secs(1), Some(Duration::from_millis(100)))
            .await
            .unwrap();
        assert!(record.banner.is_none());
        assert_eq!(record.service_name, "Unknown");
        drop(listener);
    }

    #[tokio::test]
    async fn closed_port_is_absent() {
        let port = closed_port().await;
        assert!(probe_port(localhost(), port, Duration::from_secs(1), None).await.is_none());
    }

    #[tokio::test]
    async fn resolve_target_rejects_empty_and_accepts_literals() {
        assert!(matches!(
            resolve_target("  ").await,
            Err(ScanError::Config(ConfigError::EmptyTarget))
        ));
        assert_eq!(resolve_target("127.0.0.1").await.unwrap(), localhost());
    }

    #[test]
    fn zero_connect_timeout_is_rejected() {
        assert!(matches!(
            PortScanner::new(10, Duration::ZERO, None),
            Err(ConfigError::ZeroTimeout("connect"))
        ));
        assert!(matches!(
            PortScanner::new(0, Duration::from_secs(1), None),
            Err(ConfigError::NonPositiveConcurrency)
        ));
    }

    #[tokio::test]
    async fn scan_reports_only_open_ports_sorted() {
        let open = greeting_server(b"220 ProFTPD 1.3.5 Server ready\r\n").await;
        let closed = closed_port().await;
        let scanner = PortScanner::new(8, Duration::from_millis(500), Some(Duration::from_millis(500)))
            .unwrap()
            .with_fingerprinting(FingerprintScanner::new(4, Duration::from_secs(1)).unwrap());

        let report = scanner
            .scan("127.0.0.1", vec![closed, open], &CancelToken::never())
            .await
            .unwrap();

        assert_eq!(report.open_ports.len(), 1);
        assert_eq!(report.open_ports[0].port, open);
        assert_eq!(report.open_ports[0].service_name, "ProFTPD");
        assert_eq!(report.stats.submitted, 2);
        assert_eq!(report.stats.succeeded, 1);
        assert_eq!(report.fingerprints.len(), 1);
        assert_eq!(report.fingerprints[0].service, "ProFTPD");
        assert_eq!(report.fingerprints[0].version, "1.3.5");
        assert!(!report.cancelled);
    }
}
