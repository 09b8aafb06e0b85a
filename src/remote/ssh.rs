//! SSH transport backed by `russh`.
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use log::debug;
use russh::client;
use russh_keys::key::{KeyPair, PublicKey};
use tokio::{net::TcpStream, time};

use super::{CommandOutput, RemoteExecutor, Session};
use crate::credentials::Credential;
use crate::error::HostError;

/// Hosts are discovered, not known in advance, so every server key is
/// accepted.
struct ClientHandler;

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Opens one SSH connection per credential attempt.
pub struct SshExecutor {
    port: u16,
    connect_timeout: Duration,
    config: Arc<client::Config>,
}

impl SshExecutor {
    pub fn new(port: u16, connect_timeout: Duration) -> Self {
        let config = client::Config {
            inactivity_timeout: Some(connect_timeout.max(Duration::from_secs(5))),
            ..Default::default()
        };

        Self {
            port,
            connect_timeout,
            config: Arc::new(config),
        }
    }

    async fn connect(&self, socket: SocketAddr) -> Result<client::Handle<ClientHandler>, HostError> {
        let stream = time::timeout(self.connect_timeout, TcpStream::connect(socket))
            .await
            .map_err(|_| HostError::ConnectFailure(format!("connecting to {socket} timed out")))?
            .map_err(|e| HostError::ConnectFailure(e.to_string()))?;

        client::connect_stream(Arc::clone(&self.config), stream, ClientHandler)
            .await
            .map_err(|e| HostError::ConnectFailure(format!("handshake with {socket}: {e}")))
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn open(
        &self,
        address: IpAddr,
        credential: &Credential,
    ) -> Result<Box<dyn Session>, HostError> {
        let rejected = || HostError::AuthRejected {
            user: credential.user().to_owned(),
        };

        // An unusable key is a credential problem, not a transport one:
        // skip straight to the next strategy without connecting.
        let key = match credential {
            Credential::Key { path, .. } => match load_private_key(path).await {
                Ok(key) => Some(key),
                Err(e) => {
                    debug!("Skipping key strategy for {address}: {e:#}");
                    return Err(rejected());
                }
            },
            Credential::Password { .. } => None,
        };

        let socket = SocketAddr::new(address, self.port);
        let mut handle = self.connect(socket).await?;

        let authenticated = match (credential, key) {
            (Credential::Key { user, .. }, Some(key)) => {
                handle.authenticate_publickey(user.as_str(), Arc::new(key)).await
            }
            (Credential::Password { user, password }, _) => {
                handle
                    .authenticate_password(user.as_str(), password.expose())
                    .await
            }
            (Credential::Key { .. }, None) => Ok(false),
        }
        .map_err(|e| HostError::ConnectFailure(format!("authenticating to {socket}: {e}")))?;

        if !authenticated {
            disconnect(&handle, address).await;
            return Err(rejected());
        }

        debug!("Authenticated to {socket} with {credential}");
        Ok(Box::new(SshSession { handle, address }))
    }
}

struct SshSession {
    handle: client::Handle<ClientHandler>,
    address: IpAddr,
}

#[async_trait]
impl Session for SshSession {
    async fn run(&mut self, command: &str) -> Result<CommandOutput, HostError> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| HostError::VerifyFailure(format!("opening channel: {e}")))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| HostError::VerifyFailure(format!("exec: {e}")))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = None;

        loop {
            match channel.wait().await {
                Some(russh::ChannelMsg::Data { data }) => stdout.extend_from_slice(&data),
                Some(russh::ChannelMsg::ExtendedData { data, ext }) => {
                    if ext == 1 {
                        stderr.extend_from_slice(&data);
                    }
                }
                Some(russh::ChannelMsg::ExitStatus { exit_status }) => exit_code = Some(exit_status),
                Some(russh::ChannelMsg::Close) | None => break,
                Some(_) => {}
            }
        }

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code,
        })
    }

    async fn close(self: Box<Self>) {
        disconnect(&self.handle, self.address).await;
    }
}

async fn disconnect(handle: &client::Handle<ClientHandler>, address: IpAddr) {
    if let Err(e) = handle
        .disconnect(russh::Disconnect::ByApplication, "", "en")
        .await
    {
        debug!("Disconnect from {address} failed: {e}");
    }
}

async fn load_private_key(path: &Path) -> anyhow::Result<KeyPair> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading key file {}", path.display()))?;

    russh_keys::decode_secret_key(&content, None)
        .with_context(|| format!("decoding private key {}", path.display()))
}
