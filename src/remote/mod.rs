//! Opening authenticated sessions and running the verification command.
//!
//! The engine only depends on the two traits here. [`ssh::SshExecutor`] is
//! the production implementation; tests plug in their own.
pub mod ssh;

use std::net::IpAddr;

use async_trait::async_trait;

use crate::credentials::Credential;
use crate::error::HostError;

pub use ssh::SshExecutor;

/// What a remote command printed and how it exited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<u32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Constructs sessions. Passed to the scanner explicitly so the transport
/// can be swapped without touching the orchestration.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Connects to `address` and authenticates with `credential`.
    ///
    /// Returns [`HostError::AuthRejected`] when the server refused the
    /// credential and [`HostError::ConnectFailure`] for anything else.
    async fn open(
        &self,
        address: IpAddr,
        credential: &Credential,
    ) -> Result<Box<dyn Session>, HostError>;
}

/// An authenticated session, owned by exactly one worker.
///
/// Dropping a session must release it; `close` is the graceful path.
#[async_trait]
pub trait Session: Send {
    async fn run(&mut self, command: &str) -> Result<CommandOutput, HostError>;

    async fn close(self: Box<Self>);
}
