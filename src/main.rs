#![deny(clippy::all)]
#![warn(clippy::pedantic)]

use anyhow::Context;
use log::debug;
use piscan::input::{Config, Opts};
use piscan::probe::TcpProbe;
use piscan::remote::SshExecutor;
use piscan::scanner::Scanner;
use piscan::{detail, output, warning};

use std::sync::Arc;
use std::time::Instant;

#[cfg(unix)]
const DEFAULT_FILE_DESCRIPTORS_LIMIT: u64 = 8000;
// Head room for stdio, the resolver and the runtime itself.
#[cfg(unix)]
const RESERVED_FILE_DESCRIPTORS: u64 = 100;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut opts = Opts::read();
    let config = Config::read(opts.config_path.clone()).context("reading configuration file")?;
    opts.merge(&config);

    #[cfg(unix)]
    let batch_size = infer_batch_size(&opts, adjust_ulimit_size(&opts));
    #[cfg(not(unix))]
    let batch_size = opts.batch_size.max(1);

    let request = opts.scan_request();
    let mut options = opts.scan_options();
    options.batch_size = usize::from(batch_size);
    debug!(
        "Scanning {} with filter {:?}, {} credential pair(s), options {options:?}",
        request.range,
        request.hostname_filter,
        request.credentials.len(),
    );

    let probe = Arc::new(TcpProbe::with_resolver(request.ssh.port, &opts.resolver).await);
    let executor = Arc::new(SshExecutor::new(request.ssh.port, options.timeouts.auth));
    let scanner = Scanner::new(request, options, probe, executor)
        .context("failed to scan for Raspberries")?;

    let cancel = scanner.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    detail!(
        format!("Scanning {} hosts in {}", scanner.range().len(), opts.range),
        opts.greppable,
        opts.accessible
    );

    let start = Instant::now();
    let result = scanner.run().await;

    if scanner.cancellation_token().is_cancelled() {
        warning!(
            "Scan stopped early, the inventory is partial.",
            opts.greppable,
            opts.accessible
        );
    }
    output!(
        format!(
            "Found {} node(s) in {:.2?}. {}",
            result.nodes.len(),
            start.elapsed(),
            result.tally
        ),
        opts.greppable,
        opts.accessible
    );

    if opts.greppable {
        for node in &result.nodes {
            println!("{} {}", node.address, node.hostname);
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&result.nodes)?);
    }

    Ok(())
}

#[cfg(unix)]
fn adjust_ulimit_size(opts: &Opts) -> u64 {
    use rlimit::Resource;

    if let Some(limit) = opts.ulimit {
        if Resource::NOFILE.set(limit, limit).is_ok() {
            detail!(
                format!("Automatically increasing ulimit value to {limit}."),
                opts.greppable,
                opts.accessible
            );
        } else {
            warning!(
                "ERROR. Failed to set ulimit value.",
                opts.greppable,
                opts.accessible
            );
        }
    }

    Resource::NOFILE
        .get()
        .map_or(DEFAULT_FILE_DESCRIPTORS_LIMIT, |(soft, _)| soft)
}

/// Every in-flight host holds at most one socket, so the pool must fit in
/// the open file limit.
#[cfg(unix)]
fn infer_batch_size(opts: &Opts, ulimit: u64) -> u16 {
    let requested = opts.batch_size.max(1);
    let available = ulimit.saturating_sub(RESERVED_FILE_DESCRIPTORS).max(1);

    if available >= u64::from(requested) {
        return requested;
    }

    let lowered = u16::try_from(available).unwrap_or(u16::MAX);
    warning!(
        format!(
            "File limit {ulimit} is lower than the batch size {requested}. Lowering it to {lowered}, consider --ulimit."
        ),
        opts.greppable,
        opts.accessible
    );
    lowered
}
