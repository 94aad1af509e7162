// src/core/scanner/fingerprint_scanner.rs

use tracing::{debug, info};
use crate::core::dispatcher::{CancelToken, Dispatcher};
use crate::core::errors::{ConfigError, ProbeError};
use crate::core::models::ServiceFingerprint;
use crate::core::ports::is_http_port;
use crate::core::signatures::classify;
use std::net::IpAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout, timeout_at};

/// Bytes kept from a service's response.
const RESPONSE_BUFFER: usize = 4096;

/// Identifies the service and version behind open ports.
///
/// Ports in the HTTP table get a `HEAD /` request; every other port is
/// expected to greet first and is only read from.
#[derive(Debug, Clone, Copy)]
pub struct FingerprintScanner {
    dispatcher: Dispatcher,
    probe_timeout: Duration,
}

impl FingerprintScanner {
    pub fn new(concurrency: usize, probe_timeout: Duration) -> Result<Self, ConfigError> {
        if probe_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("fingerprint"));
        }
        Ok(Self {
            dispatcher: Dispatcher::new(concurrency, probe_timeout + probe_timeout / 4)?,
            probe_timeout,
        })
    }

    /// Fingerprints every port, sorted by port number.
    ///
    /// Returns the fingerprints and whether the pass was cut short.
    pub async fn fingerprint(
        &self,
        ip: IpAddr,
        ports: Vec<u16>,
        cancel: &CancelToken,
    ) -> (Vec<ServiceFingerprint>, bool) {
        info!(%ip, ports = ports.len(), "Starting service fingerprinting.");
        let probe_timeout = self.probe_timeout;
        let dispatch = self
            .dispatcher
            .dispatch_until(
                ports,
                move |port| async move { Ok(Some(fingerprint_port(ip, port, probe_timeout).await)) },
                cancel.cancelled(),
            )
            .await;

        let cancelled = dispatch.cancelled;
        let mut fingerprints = dispatch.into_payloads();
        fingerprints.sort_by_key(|fingerprint| fingerprint.port);
        (fingerprints, cancelled)
    }
}

/// Fingerprints one port. Never fails: an unreachable or silent service
/// is classified from the port number alone.
pub async fn fingerprint_port(ip: IpAddr, port: u16, probe_timeout: Duration) -> ServiceFingerprint {
    let response = match fetch_banner(ip, port, is_http_port(port), probe_timeout).await {
        Ok(response) => response,
        Err(e) => {
            debug!(port, error = %e, "No response to fingerprint.");
            None
        }
    };
    let fingerprint = classify(port, response.as_deref());
    debug!(port, service = %fingerprint.service, version = %fingerprint.version, "Port fingerprinted.");
    fingerprint
}

async fn fetch_banner(ip: IpAddr, port: u16, http: bool, limit: Duration) -> Result<Option<String>, ProbeError> {
    let deadline = Instant::now() + limit;
    let mut stream = timeout(limit, TcpStream::connect((ip, port)))
        .await
        .map_err(|_| ProbeError::Io(std::io::ErrorKind::TimedOut.into()))??;

    let mut buf = vec![0u8; RESPONSE_BUFFER];
    let mut filled = 0;

    if http {
        let request = format!("HEAD / HTTP/1.0\r\nHost: {ip}\r\n\r\n");
        stream.write_all(request.as_bytes()).await?;
        // Read the whole header block; whatever arrived before the
        // deadline is kept.
        while filled < buf.len() {
            match timeout_at(deadline, stream.read(&mut buf[filled..])).await {
                Ok(Ok(0)) | Err(_) => break,
                Ok(Ok(count)) => filled += count,
                Ok(Err(e)) if filled == 0 => return Err(e.into()),
                Ok(Err(_)) => break,
            }
        }
    } else if let Ok(read) = timeout_at(deadline, stream.read(&mut buf)).await {
        filled = read?;
    }

    let text = String::from_utf8_lossy(&buf[..filled]).trim().to_string();
    Ok((!text.is_empty()).then_some(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scanner::testing::localhost;
    use tokio::net::TcpListener;

    /// Greets with `reply`, or answers the first request with it when
    /// `wait_for_request` is set.
    async fn service(reply: &'static str, wait_for_request: bool) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                if wait_for_request {
                    let mut buf = vec![0u8; 1024];
                    let _ = stream.read(&mut buf).await;
                }
                let _ = stream.write_all(reply.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        port
    }

    #[tokio::test]
    async fn greeting_service_is_classified() {
        let port = service("220 mail.example.test ESMTP Postfix (Ubuntu)\r\n", false).await;
        let fp = fingerprint_port(localhost(), port, Duration::from_secs(1)).await;
        assert_eq!(fp.port, port);
        assert_eq!(fp.service, "Postfix");
        assert_eq!(fp.version, "unknown");
        assert!(fp.raw_detail.starts_with("220 mail.example.test"));
    }

    #[tokio::test]
    async fn http_request_response_is_read_until_close() {
        let port = service("HTTP/1.0 200 OK\r\nServer: nginx/1.24.0\r\nContent-Length: 0\r\n\r\n", true).await;
        let response = fetch_banner(localhost(), port, true, Duration::from_secs(1)).await.unwrap().unwrap();
        assert!(response.contains("Server: nginx/1.24.0"));

        let fp = crate::core::signatures::classify(80, Some(&response));
        assert_eq!(fp.service, "nginx");
        assert_eq!(fp.version, "1.24.0");
    }

    #[tokio::test]
    async fn silent_service_falls_back_to_port_table() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let fp = fingerprint_port(localhost(), port, Duration::from_millis(150)).await;
        assert_eq!(fp.service, "unknown");
        assert!(fp.raw_detail.is_empty());
        drop(listener);
    }

    #[tokio::test]
    async fn fingerprints_are_sorted_by_port() {
        let first = service("SSH-2.0-OpenSSH_9.6\r\n", false).await;
        let second = service("220 (vsFTPd 3.0.5)\r\n", false).await;
        let scanner = FingerprintScanner::new(2, Duration::from_secs(1)).unwrap();

        let mut ports = vec![first, second];
        let (fingerprints, cancelled) = scanner.fingerprint(localhost(), ports.clone(), &CancelToken::never()).await;

        ports.sort();
        assert!(!cancelled);
        assert_eq!(fingerprints.iter().map(|fp| fp.port).collect::<Vec<_>>(), ports);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(matches!(
            FingerprintScanner::new(4, Duration::ZERO),
            Err(ConfigError::ZeroTimeout("fingerprint"))
        ));
    }
}
