// src/core/ports.rs

use crate::core::errors::ConfigError;
use std::collections::BTreeSet;

/// Ports scanned when the user does not supply a specification.
pub const DEFAULT_PORTS: &str = "21,22,23,25,53,80,110,143,443,445,3306,3389,5432,8080";

/// Ports that only answer once they receive an HTTP request.
pub const HTTP_PORTS: &[u16] = &[80, 443, 8080, 8000, 8443];

/// Parses a port specification such as `"22,80-82,443"`.
///
/// Accepts single ports, comma lists, `start-end` ranges and mixtures of
/// them. The result is strictly increasing and free of duplicates.
///
/// # Errors
/// Any empty element, non-numeric token, port outside `1..=65535` or range
/// whose start is greater than its end is a `ConfigError`.
pub fn parse_port_spec(spec: &str) -> Result<Vec<u16>, ConfigError> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(ConfigError::EmptyPortSpec);
    }

    let mut ports = BTreeSet::new();
    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(ConfigError::EmptyPortSpec);
        }
        match part.split_once('-') {
            Some((start, end)) => {
                let start = parse_port(start)?;
                let end = parse_port(end)?;
                if start > end {
                    return Err(ConfigError::InvertedRange { start, end });
                }
                ports.extend(start..=end);
            }
            None => {
                ports.insert(parse_port(part)?);
            }
        }
    }
    Ok(ports.into_iter().collect())
}

fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ConfigError::InvalidPort(raw.to_string()));
    }
    // Digits only, so the only possible parse failure is overflow.
    let value: u64 = raw.parse().unwrap_or(u64::MAX);
    match u16::try_from(value) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ConfigError::PortOutOfRange(value)),
    }
}

/// Label used for an open port before any banner is considered.
pub fn common_port_label(port: u16) -> Option<&'static str> {
    let label = match port {
        20 => "FTP-DATA",
        21 => "FTP",
        22 => "SSH",
        23 => "Telnet",
        25 => "SMTP",
        53 => "DNS",
        80 => "HTTP",
        110 => "POP3",
        143 => "IMAP",
        443 => "HTTPS",
        445 => "SMB",
        3306 => "MySQL",
        3389 => "RDP",
        5432 => "PostgreSQL",
        5900 => "VNC",
        6379 => "Redis",
        8080 => "HTTP-Proxy",
        8443 => "HTTPS-Alt",
        27017 => "MongoDB",
        _ => return None,
    };
    Some(label)
}

pub fn is_http_port(port: u16) -> bool {
    HTTP_PORTS.contains(&port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_specification() {
        assert_eq!(parse_port_spec("22,80-82,443").unwrap(), vec![22, 80, 81, 82, 443]);
    }

    #[test]
    fn output_is_sorted_and_deduplicated() {
        assert_eq!(parse_port_spec("443, 80-81,22,81,80").unwrap(), vec![22, 80, 81, 443]);
        assert_eq!(parse_port_spec("5-5").unwrap(), vec![5]);
    }

    #[test]
    fn accepts_full_range_bounds() {
        let ports = parse_port_spec("1-65535").unwrap();
        assert_eq!(ports.len(), 65535);
        assert_eq!(ports.first(), Some(&1));
        assert_eq!(ports.last(), Some(&65535));
    }

    #[test]
    fn rejects_inverted_range() {
        assert_eq!(
            parse_port_spec("100-20"),
            Err(ConfigError::InvertedRange { start: 100, end: 20 })
        );
    }

    #[test]
    fn rejects_non_numeric_tokens() {
        assert_eq!(parse_port_spec("http"), Err(ConfigError::InvalidPort("http".into())));
        assert_eq!(parse_port_spec("80-"), Err(ConfigError::InvalidPort(String::new())));
        assert!(matches!(parse_port_spec("-5"), Err(ConfigError::InvalidPort(_))));
        assert!(matches!(parse_port_spec("1-2-3"), Err(ConfigError::InvalidPort(_))));
    }

    #[test]
    fn rejects_out_of_range_ports() {
        assert_eq!(parse_port_spec("0"), Err(ConfigError::PortOutOfRange(0)));
        assert_eq!(parse_port_spec("65536"), Err(ConfigError::PortOutOfRange(65536)));
        assert!(matches!(
            parse_port_spec("99999999999999999999999"),
            Err(ConfigError::PortOutOfRange(_))
        ));
    }

    #[test]
    fn rejects_empty_elements() {
        assert_eq!(parse_port_spec(""), Err(ConfigError::EmptyPortSpec));
        assert_eq!(parse_port_spec("22,,80"), Err(ConfigError::EmptyPortSpec));
    }

    #[test]
    fn default_ports_parse() {
        assert_eq!(parse_port_spec(DEFAULT_PORTS).unwrap().len(), 14);
    }

    #[test]
    fn labels_common_ports() {
        assert_eq!(common_port_label(22), Some("SSH"));
        assert_eq!(common_port_label(31337), None);
        assert!(is_http_port(8000));
        assert!(!is_http_port(22));
    }
}
