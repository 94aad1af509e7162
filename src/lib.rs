// src/lib.rs

//! Concurrent reconnaissance engine: bounded-concurrency port scanning with
//! banner-based service fingerprinting, and subdomain discovery merged from
//! wordlist brute force, DNS zone transfer and certificate transparency.

pub mod config;
pub mod core;
pub mod logging;
