// src/core/errors.rs

use thiserror::Error;

/// Invalid scan settings. Reported before any probe is sent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("port specification is empty")]
    EmptyPortSpec,
    #[error("invalid port `{0}`: not a number")]
    InvalidPort(String),
    #[error("port {0} is out of range (1-65535)")]
    PortOutOfRange(u64),
    #[error("inverted port range `{start}-{end}`")]
    InvertedRange { start: u16, end: u16 },
    #[error("concurrency must be a positive integer")]
    NonPositiveConcurrency,
    #[error("{0} timeout must be greater than zero")]
    ZeroTimeout(&'static str),
    #[error("target must not be empty")]
    EmptyTarget,
    #[error("could not read wordlist `{path}`: {reason}")]
    Wordlist { path: String, reason: String },
    #[error("invalid CT endpoint `{0}`")]
    InvalidEndpoint(String),
    #[error("could not load configuration `{path}`: {reason}")]
    Load { path: String, reason: String },
}

/// Why a single probe failed. Never crosses the dispatcher boundary as an
/// error; it is folded into the probe's outcome.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("dns error: {0}")]
    Dns(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("probe panicked: {0}")]
    Panicked(String),
}

/// Errors that stop a scan operation before it starts.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not resolve target `{target}`: {reason}")]
    Unresolvable { target: String, reason: String },
}
