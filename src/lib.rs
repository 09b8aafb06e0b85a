//! This crate exposes the discovery engine behind the `piscan` command.
//!
//! `piscan` walks an IPv4 range, finds hosts with an open SSH port, logs into
//! each one and runs a command that confirms it is a Raspberry Pi. The result
//! is an inventory of confirmed nodes, ordered by address.
//!
//! ## Architecture Overview
//!
//! The scan is driven by [`Scanner`](crate::scanner::Scanner). Every address
//! goes through its own worker, at most `batch_size` at a time:
//!
//! 1. **Enumeration**: [`AddressRange`](crate::address::AddressRange) expands
//!    the CIDR range, skipping network and broadcast addresses
//! 2. **Probe**: a [`HostProbe`](crate::probe::HostProbe) checks the SSH port
//!    and looks up the hostname, which is then matched against the filter
//! 3. **Authentication**: the [`CredentialSet`](crate::credentials::CredentialSet)
//!    strategies are tried in order through a
//!    [`RemoteExecutor`](crate::remote::RemoteExecutor): the key first, then
//!    every `user:pass` pair
//! 4. **Verification**: one command runs on the first session that opens
//! 5. **Aggregation**: the [`Aggregator`](crate::aggregate::Aggregator) keeps
//!    the verified nodes and sorts them
//!
//! Per-host failures never escape their worker. The only error that ends a
//! run is a malformed range, reported before anything is scanned.
//!
//! ## Basic Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use piscan::credentials::parse_basic_auth;
//! use piscan::probe::TcpProbe;
//! use piscan::remote::SshExecutor;
//! use piscan::request::ScanRequest;
//! use piscan::scanner::{ScanOptions, Scanner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let request = ScanRequest {
//!         range: "192.168.1.0/24".to_owned(),
//!         hostname_filter: "pi".to_owned(),
//!         credentials: parse_basic_auth(&["pi:raspberry"]),
//!         ..ScanRequest::default()
//!     };
//!     let options = ScanOptions::default();
//!
//!     let probe = Arc::new(TcpProbe::with_resolver(request.ssh.port, &None).await);
//!     let executor = Arc::new(SshExecutor::new(request.ssh.port, options.timeouts.auth));
//!     let scanner = Scanner::new(request, options, probe, executor)?;
//!
//!     for node in scanner.run().await.nodes {
//!         println!("{} {} {:?}", node.address, node.hostname, node.model);
//!     }
//!     Ok(())
//! }
//! ```
#![allow(clippy::needless_doctest_main)]

pub mod tui;

pub mod input;

pub mod request;

pub mod error;

pub mod address;

pub mod probe;

pub mod credentials;

pub mod remote;

pub mod scanner;

pub mod node;

pub mod aggregate;
