// src/config.rs

//! Application settings, read from `config.json` in the platform config
//! directory. Missing files and missing fields fall back to defaults.

use crate::core::errors::ConfigError;
use crate::core::ports::{DEFAULT_PORTS, parse_port_spec};
use crate::core::dispatcher::Dispatcher;
use crate::core::scanner::ct_scanner::{CtCorrelator, DEFAULT_CT_ENDPOINT};
use crate::core::scanner::dns_scanner::DnsProbe;
use crate::core::scanner::fingerprint_scanner::FingerprintScanner;
use crate::core::scanner::port_scanner::PortScanner;
use crate::core::scanner::subdomain_scanner::SubdomainEnumerator;
use crate::core::scanner::zone_transfer::ZoneTransferProbe;
use crate::logging::get_config_dir;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ports: PortSettings,
    pub subdomains: SubdomainSettings,
    pub resolver: ResolverSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortSettings {
    /// Port specification used when the request names none.
    pub default_ports: String,
    pub concurrency: usize,
    pub connect_timeout_ms: u64,
    pub grab_banners: bool,
    pub banner_timeout_ms: u64,
    /// Run the second, fingerprinting pass over open ports.
    pub fingerprint: bool,
    pub fingerprint_concurrency: usize,
    pub fingerprint_timeout_ms: u64,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            default_ports: DEFAULT_PORTS.to_string(),
            concurrency: 50,
            connect_timeout_ms: 1000,
            grab_banners: true,
            banner_timeout_ms: 2000,
            fingerprint: true,
            fingerprint_concurrency: 20,
            fingerprint_timeout_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubdomainSettings {
    pub concurrency: usize,
    pub resolver_timeout_ms: u64,
    /// One label per line. The built-in list is used when unset.
    pub wordlist: Option<PathBuf>,
    pub zone_transfer: bool,
    pub zone_transfer_timeout_ms: u64,
    pub cert_transparency: bool,
    pub ct_endpoint: String,
    pub ct_timeout_ms: u64,
}

impl Default for SubdomainSettings {
    fn default() -> Self {
        Self {
            concurrency: 20,
            resolver_timeout_ms: 2000,
            wordlist: None,
            zone_transfer: true,
            zone_transfer_timeout_ms: 10_000,
            cert_transparency: true,
            ct_endpoint: DEFAULT_CT_ENDPOINT.to_string(),
            ct_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Empty means the resolver library's default upstream servers.
    pub nameservers: Vec<IpAddr>,
    pub port: u16,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self { nameservers: Vec::new(), port: 53 }
    }
}

impl AppConfig {
    /// Loads `config.json` from the config directory, or the defaults when
    /// it does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&get_config_dir().join(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults.");
            return Ok(Self::default());
        }
        let load_error = |reason: String| ConfigError::Load { path: path.display().to_string(), reason };
        let raw = std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let config = Self::from_json(&raw).map_err(|e| match e {
            ConfigError::Load { reason, .. } => load_error(reason),
            other => other,
        })?;
        info!(path = %path.display(), "Configuration loaded.");
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(|e| ConfigError::Load {
            path: CONFIG_FILE.to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every setting a scan depends on, so a bad value is reported
    /// before any probe is sent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_port_spec(&self.ports.default_ports)?;
        self.port_scanner()?;
        self.dispatcher_for_subdomains()?;
        positive(self.subdomains.resolver_timeout_ms, "resolver")?;
        positive(self.subdomains.zone_transfer_timeout_ms, "zone transfer")?;
        positive(self.subdomains.ct_timeout_ms, "CT")?;
        Url::parse(&self.subdomains.ct_endpoint)
            .map_err(|_| ConfigError::InvalidEndpoint(self.subdomains.ct_endpoint.clone()))?;
        self.load_wordlist()?;
        Ok(())
    }

    /// Labels from the configured wordlist; empty when none is set.
    pub fn load_wordlist(&self) -> Result<Vec<String>, ConfigError> {
        let Some(path) = &self.subdomains.wordlist else {
            return Ok(Vec::new());
        };
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Wordlist {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(parse_wordlist(&raw))
    }

    pub fn dns_probe(&self) -> DnsProbe {
        let timeout = Duration::from_millis(self.subdomains.resolver_timeout_ms);
        if self.resolver.nameservers.is_empty() {
            DnsProbe::new(timeout)
        } else {
            DnsProbe::with_nameservers(&self.resolver.nameservers, self.resolver.port, timeout)
        }
    }

    pub fn port_scanner(&self) -> Result<PortScanner, ConfigError> {
        let ports = &self.ports;
        let banner_timeout = ports
            .grab_banners
            .then(|| positive(ports.banner_timeout_ms, "banner"))
            .transpose()?;
        let scanner = PortScanner::new(ports.concurrency, Duration::from_millis(ports.connect_timeout_ms), banner_timeout)?;
        if !ports.fingerprint {
            return Ok(scanner);
        }
        let fingerprinter = FingerprintScanner::new(
            ports.fingerprint_concurrency,
            Duration::from_millis(ports.fingerprint_timeout_ms),
        )?;
        Ok(scanner.with_fingerprinting(fingerprinter))
    }

    pub fn subdomain_enumerator(&self) -> Result<SubdomainEnumerator, ConfigError> {
        let settings = &self.subdomains;
        let dns = self.dns_probe();
        let mut enumerator =
            SubdomainEnumerator::new(dns.clone(), self.dispatcher_for_subdomains()?).with_wordlist(self.load_wordlist()?);

        if settings.zone_transfer {
            let timeout = positive(settings.zone_transfer_timeout_ms, "zone transfer")?;
            enumerator = enumerator.with_zone_transfer(ZoneTransferProbe::new(dns, timeout));
        }
        if settings.cert_transparency {
            let timeout = positive(settings.ct_timeout_ms, "CT")?;
            let correlator = CtCorrelator::new(&settings.ct_endpoint, timeout)
                .map_err(|_| ConfigError::InvalidEndpoint(settings.ct_endpoint.clone()))?;
            enumerator = enumerator.with_cert_transparency(correlator);
        }
        Ok(enumerator)
    }

    fn dispatcher_for_subdomains(&self) -> Result<Dispatcher, ConfigError> {
        // An A lookup and a CNAME fallback may both run inside one probe.
        let resolver_timeout = positive(self.subdomains.resolver_timeout_ms, "resolver")?;
        Dispatcher::new(self.subdomains.concurrency, resolver_timeout * 2 + Duration::from_millis(500))
    }
}

fn positive(millis: u64, what: &'static str) -> Result<Duration, ConfigError> {
    if millis == 0 {
        Err(ConfigError::ZeroTimeout(what))
    } else {
        Ok(Duration::from_millis(millis))
    }
}

/// One label per line; blank lines and `#` comments are skipped.
pub fn parse_wordlist(raw: &str) -> Vec<String> {
    let mut labels: Vec<String> = raw
        .lines()
        .map(|line| line.trim().to_ascii_lowercase())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect();
    let mut seen = std::collections::HashSet::new();
    labels.retain(|label| seen.insert(label.clone()));
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ports.concurrency, 50);
        assert_eq!(config.subdomains.ct_endpoint, "https://crt.sh/");
        assert_eq!(config.resolver.port, 53);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config = AppConfig::from_json(r#"{"ports": {"concurrency": 5}, "resolver": {"nameservers": ["9.9.9.9"]}}"#).unwrap();
        assert_eq!(config.ports.concurrency, 5);
        assert_eq!(config.ports.connect_timeout_ms, 1000);
        assert_eq!(config.resolver.nameservers, vec!["9.9.9.9".parse::<IpAddr>().unwrap()]);
        assert!(config.subdomains.zone_transfer);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert_eq!(
            AppConfig::from_json(r#"{"ports": {"concurrency": 0}}"#),
            Err(ConfigError::NonPositiveConcurrency)
        );
        assert_eq!(
            AppConfig::from_json(r#"{"ports": {"default_ports": "80-22"}}"#),
            Err(ConfigError::InvertedRange { start: 80, end: 22 })
        );
        assert_eq!(
            AppConfig::from_json(r#"{"subdomains": {"resolver_timeout_ms": 0}}"#),
            Err(ConfigError::ZeroTimeout("resolver"))
        );
        assert!(matches!(
            AppConfig::from_json(r#"{"subdomains": {"ct_endpoint": "not a url"}}"#),
            Err(ConfigError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            AppConfig::from_json(r#"{"ports": {"concurrency": -3}}"#),
            Err(ConfigError::Load { .. })
        ));
    }

    #[test]
    fn disabled_banners_skip_banner_timeout_check() {
        let config = AppConfig::from_json(r#"{"ports": {"grab_banners": false, "banner_timeout_ms": 0}}"#);
        assert!(config.is_ok());
    }

    #[test]
    fn unreadable_wordlist_is_a_config_error() {
        let mut config = AppConfig::default();
        config.subdomains.wordlist = Some(PathBuf::from("/definitely/not/here.txt"));
        assert!(matches!(config.validate(), Err(ConfigError::Wordlist { .. })));
    }

    #[test]
    fn wordlist_file_is_parsed() {
        let path = std::env::temp_dir().join(format!("vanguard-recon-wordlist-{}.txt", std::process::id()));
        std::fs::write(&path, "www\n# comment\n\nAPI\napi\n  vpn  \n").unwrap();
        let mut config = AppConfig::default();
        config.subdomains.wordlist = Some(path.clone());

        assert_eq!(config.load_wordlist().unwrap(), vec!["www", "api", "vpn"]);
        assert_eq!(config.subdomain_enumerator().unwrap().wordlist().len(), 3);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_file_loads_defaults() {
        let config = AppConfig::load_from(Path::new("/definitely/not/config.json")).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
