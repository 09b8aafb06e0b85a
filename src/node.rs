//! Scan outcomes.
use std::fmt;
use std::net::IpAddr;

use serde_derive::Serialize;

use crate::credentials::AuthMethod;
use crate::error::HostError;

/// Where a host's pipeline stopped.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum HostState {
    Unreachable,
    ExcludedByFilter,
    AuthFailed,
    VerifyFailed,
    Verified,
    /// The run was cancelled while this host was in flight.
    Cancelled,
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unreachable => "unreachable",
            Self::ExcludedByFilter => "excluded-by-filter",
            Self::AuthFailed => "auth-failed",
            Self::VerifyFailed => "verify-failed",
            Self::Verified => "verified",
            Self::Cancelled => "cancelled",
        })
    }
}

/// One host's result. Built by the worker that scanned it and not changed
/// afterwards.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub address: IpAddr,
    pub hostname: String,
    pub state: HostState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Node {
    pub(crate) fn new(address: IpAddr, hostname: impl Into<String>, state: HostState) -> Self {
        Self {
            address,
            hostname: hostname.into(),
            state,
            auth: None,
            model: None,
            error: None,
        }
    }

    pub(crate) fn with_error(mut self, err: &HostError) -> Self {
        self.error = Some(err.to_string());
        self
    }

    pub const fn is_verified(&self) -> bool {
        matches!(self.state, HostState::Verified)
    }
}

/// How many hosts ended in each state.
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub unreachable: usize,
    pub excluded_by_filter: usize,
    pub auth_failed: usize,
    pub verify_failed: usize,
    pub verified: usize,
    pub cancelled: usize,
}

impl Tally {
    pub fn record(&mut self, state: HostState) {
        let slot = match state {
            HostState::Unreachable => &mut self.unreachable,
            HostState::ExcludedByFilter => &mut self.excluded_by_filter,
            HostState::AuthFailed => &mut self.auth_failed,
            HostState::VerifyFailed => &mut self.verify_failed,
            HostState::Verified => &mut self.verified,
            HostState::Cancelled => &mut self.cancelled,
        };
        *slot += 1;
    }

    pub const fn total(&self) -> usize {
        self.unreachable
            + self.excluded_by_filter
            + self.auth_failed
            + self.verify_failed
            + self.verified
            + self.cancelled
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} hosts: {} verified, {} verify-failed, {} auth-failed, {} excluded, {} unreachable, {} cancelled",
            self.total(),
            self.verified,
            self.verify_failed,
            self.auth_failed,
            self.excluded_by_filter,
            self.unreachable,
            self.cancelled,
        )
    }
}

/// The finished inventory, ordered by ascending address.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub nodes: Vec<Node>,
    #[serde(skip)]
    pub tally: Tally,
}

impl ScanResult {
    pub fn addresses(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.nodes.iter().map(|n| n.address)
    }
}
