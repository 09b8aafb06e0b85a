//! Reachability and hostname probing for a single address.
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::{
    config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts},
    TokioAsyncResolver,
};
use log::{debug, warn};
use tokio::{
    fs, io,
    io::AsyncWriteExt,
    net::TcpStream,
    time::{self, Instant},
};

use crate::error::HostError;

/// Decides whether a host is worth talking to and what it calls itself.
///
/// Implementations are shared by every worker and must return within the
/// timeout they are given. There are no retries: one failed attempt marks the
/// host unreachable for the run.
#[async_trait]
pub trait HostProbe: Send + Sync {
    /// On success returns the host's name, which may be empty when it could
    /// not be resolved. That is not an error.
    async fn probe(&self, address: IpAddr, timeout: Duration) -> Result<String, HostError>;
}

/// Probes by completing a TCP handshake with the SSH port, then asks DNS for
/// the address's PTR record within whatever time is left.
pub struct TcpProbe {
    port: u16,
    resolver: TokioAsyncResolver,
}

impl TcpProbe {
    pub const fn new(port: u16, resolver: TokioAsyncResolver) -> Self {
        Self { port, resolver }
    }

    /// Builds the probe with a resolver derived from `--resolver`.
    pub async fn with_resolver(port: u16, resolver: &Option<String>) -> Self {
        Self::new(port, get_resolver(resolver).await)
    }

    async fn reverse_lookup(&self, address: IpAddr) -> Option<String> {
        let lookup = match self.resolver.reverse_lookup(address).await {
            Ok(lookup) => lookup,
            Err(e) => {
                debug!("No PTR record for {address}: {e}");
                return None;
            }
        };

        lookup
            .iter()
            .map(|name| name.to_string().trim_end_matches('.').to_owned())
            .find(|name| !name.is_empty())
    }
}

#[async_trait]
impl HostProbe for TcpProbe {
    async fn probe(&self, address: IpAddr, timeout: Duration) -> Result<String, HostError> {
        let deadline = Instant::now() + timeout;
        let socket = SocketAddr::new(address, self.port);

        let stream = match time::timeout_at(deadline, TcpStream::connect(socket)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                if e.to_string().to_lowercase().contains("too many open files") {
                    warn!("Too many open files while probing {socket}. Reduce --batch-size or raise --ulimit.");
                }
                return Err(HostError::Unreachable(e.to_string()));
            }
            Err(_) => return Err(HostError::ProbeTimeout),
        };

        if let Err(e) = { stream }.shutdown().await {
            debug!("Shutdown stream error {e}");
        }

        let hostname = time::timeout_at(deadline, self.reverse_lookup(address))
            .await
            .ok()
            .flatten()
            .unwrap_or_default();

        debug!("{socket} is reachable, hostname {hostname:?}");
        Ok(hostname)
    }
}

/// Derive a DNS resolver.
///
/// 1. if the `resolver` parameter has been set:
///     1. assume the parameter is a path and attempt to read IPs.
///     2. parse the input as a comma-separated list of IPs.
/// 2. if `resolver` is not set:
///    1. attempt to derive a resolver from the system config. (e.g.
///       `/etc/resolv.conf` on *nix).
///    2. finally, build a CloudFlare-based resolver.
pub async fn get_resolver(resolver: &Option<String>) -> TokioAsyncResolver {
    let mut opts = ResolverOpts::default();
    opts.attempts = 1;

    match resolver {
        Some(r) => {
            let mut config = ResolverConfig::new();
            let resolver_ips = match read_resolver_from_file(r).await {
                Ok(ips) => ips,
                Err(_) => r
                    .split(',')
                    .filter_map(|r| IpAddr::from_str(r.trim()).ok())
                    .collect::<Vec<_>>(),
            };
            for ip in resolver_ips {
                config.add_name_server(NameServerConfig::new(
                    SocketAddr::new(ip, 53),
                    Protocol::Udp,
                ));
            }
            TokioAsyncResolver::tokio(config, opts)
        }
        None => TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|_| {
            TokioAsyncResolver::tokio(ResolverConfig::cloudflare_tls(), opts)
        }),
    }
}

/// Reads one resolver IP per line; lines that are not IPs are skipped.
async fn read_resolver_from_file(path: &str) -> io::Result<Vec<IpAddr>> {
    let ips = fs::read_to_string(path)
        .await?
        .lines()
        .filter_map(|line| IpAddr::from_str(line.trim()).ok())
        .collect();

    Ok(ips)
}
