// src/core/mod.rs

// The engine. The `mod.rs` file acts as the root of the `core` module,
// exposing its sub-modules to the crate and the front-end.

/// Data structures produced by the scanners, such as `ScanReport`,
/// `PortScanReport` and `SubdomainRecord`.
pub mod models;

/// Configuration, probe and scan error types.
pub mod errors;

/// Port specification parsing and the static port tables.
pub mod ports;

/// Bounded fan-out of probes with per-probe timeouts and cancellation.
pub mod dispatcher;

/// Banner signatures and the service classifier.
pub mod signatures;

/// Cross-source deduplication of discovered subdomains.
pub mod merge;

/// Houses the probes (TCP, DNS, zone transfer, CT) and the orchestration
/// that runs a full scan.
pub mod scanner;
