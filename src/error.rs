//! Error types shared by the scanning engine.
use thiserror::Error;

/// The range notation could not be turned into a set of addresses.
///
/// This is the only error that aborts a whole run; it is raised before any
/// host is contacted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid range {range:?}: {reason}")]
pub struct RangeParseError {
    pub range: String,
    pub reason: String,
}

impl RangeParseError {
    pub(crate) fn new(range: &str, reason: impl Into<String>) -> Self {
        Self {
            range: range.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Per-host failures. None of these leave the worker that produced them;
/// they end up recorded on the host's [`Node`](crate::node::Node).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("probe timed out")]
    ProbeTimeout,

    #[error("unreachable: {0}")]
    Unreachable(String),

    #[error("authentication rejected for user {user:?}")]
    AuthRejected { user: String },

    #[error("connection failed: {0}")]
    ConnectFailure(String),

    #[error("verification failed: {0}")]
    VerifyFailure(String),

    #[error("cancelled")]
    Cancelled,
}

impl HostError {
    /// Whether the next credential strategy should be tried after this error.
    ///
    /// Only a rejected credential moves on; a broken transport will not get
    /// better with another password.
    pub const fn advances_strategy(&self) -> bool {
        matches!(self, Self::AuthRejected { .. })
    }
}
