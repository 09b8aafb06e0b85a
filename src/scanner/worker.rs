use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::time;
use tokio_util::sync::CancellationToken;

use super::{Timeouts, Verification};
use crate::credentials::{Credential, CredentialSet};
use crate::error::HostError;
use crate::node::{HostState, Node};
use crate::probe::HostProbe;
use crate::remote::{RemoteExecutor, Session};
use crate::request::ScanRequest;

/// Upper bound on a graceful session close. Past it the session is dropped,
/// which tears the connection down anyway.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Drives one address through probe, filter, authentication and
/// verification. Shared read-only by every in-flight host.
pub(super) struct HostWorker {
    pub(super) request: Arc<ScanRequest>,
    pub(super) credentials: Arc<CredentialSet>,
    pub(super) probe: Arc<dyn HostProbe>,
    pub(super) executor: Arc<dyn RemoteExecutor>,
    pub(super) timeouts: Timeouts,
    pub(super) verification: Verification,
    pub(super) cancel: CancellationToken,
}

impl HostWorker {
    pub(super) async fn scan_host(&self, address: IpAddr) -> Node {
        let probe = self.probe.probe(address, self.timeouts.probe);
        let hostname = match self.guard(self.timeouts.probe, HostError::ProbeTimeout, probe).await {
            Ok(hostname) => hostname,
            Err(HostError::Cancelled) => return Node::new(address, "", HostState::Cancelled),
            Err(e) => {
                debug!("{address} unreachable: {e}");
                return Node::new(address, "", HostState::Unreachable).with_error(&e);
            }
        };

        if !self.request.matches_hostname(&hostname) {
            debug!("{address} ({hostname:?}) excluded by hostname filter");
            return Node::new(address, hostname, HostState::ExcludedByFilter);
        }

        let (mut session, credential) = match self.authenticate(address).await {
            Ok(opened) => opened,
            Err(HostError::Cancelled) => return Node::new(address, hostname, HostState::Cancelled),
            Err(e) => {
                debug!("{address} ({hostname:?}) authentication failed: {e}");
                return Node::new(address, hostname, HostState::AuthFailed).with_error(&e);
            }
        };

        let verdict = self.verify(session.as_mut()).await;
        close(session, address).await;

        let mut node = match verdict {
            Ok(model) => {
                debug!("{address} ({hostname:?}) verified: {model}");
                let mut node = Node::new(address, hostname, HostState::Verified);
                node.model = Some(model);
                node
            }
            Err(HostError::Cancelled) => Node::new(address, hostname, HostState::Cancelled),
            Err(e) => {
                debug!("{address} ({hostname:?}) verification failed: {e}");
                Node::new(address, hostname, HostState::VerifyFailed).with_error(&e)
            }
        };
        node.auth = Some(credential.method());
        node
    }

    /// Tries each strategy in order. Moves on only when a credential was
    /// rejected; any other failure ends the attempts for this host.
    async fn authenticate(
        &self,
        address: IpAddr,
    ) -> Result<(Box<dyn Session>, &Credential), HostError> {
        let mut last_rejection = None;

        for credential in self.credentials.iter() {
            let timed_out = HostError::ConnectFailure("authentication timed out".to_owned());
            let open = self.executor.open(address, credential);

            match self.guard(self.timeouts.auth, timed_out, open).await {
                Ok(session) => return Ok((session, credential)),
                Err(e) if e.advances_strategy() => {
                    debug!("{address} rejected {credential}");
                    last_rejection = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_rejection.unwrap_or_else(|| HostError::AuthRejected {
            user: self.request.ssh.user.clone(),
        }))
    }

    async fn verify(&self, session: &mut dyn Session) -> Result<String, HostError> {
        let timed_out = HostError::VerifyFailure("verification command timed out".to_owned());
        let run = session.run(&self.verification.command);
        let output = self.guard(self.timeouts.exec, timed_out, run).await?;

        self.verification.check(&output)
    }

    /// Bounds `op` by `limit` and by the run's cancellation token.
    async fn guard<T, F>(&self, limit: Duration, on_timeout: HostError, op: F) -> Result<T, HostError>
    where
        F: Future<Output = Result<T, HostError>>,
    {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(HostError::Cancelled),
            result = time::timeout(limit, op) => result.unwrap_or(Err(on_timeout)),
        }
    }
}

async fn close(session: Box<dyn Session>, address: IpAddr) {
    if time::timeout(CLOSE_GRACE, session.close()).await.is_err() {
        debug!("Closing session to {address} timed out, dropping it");
    }
}
