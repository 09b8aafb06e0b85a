//! Core functionality for actual scanning behaviour.
use crate::address::AddressRange;
use crate::aggregate::{Aggregator, ReportPolicy};
use crate::credentials::CredentialSet;
use crate::error::{HostError, RangeParseError};
use crate::input::ScanOrder;
use crate::node::ScanResult;
use crate::probe::HostProbe;
use crate::remote::{CommandOutput, RemoteExecutor};
use crate::request::ScanRequest;
use log::{debug, info, warn};

mod worker;
use worker::HostWorker;

use futures::{future, stream, StreamExt};
use std::{sync::Arc, time::Duration};
use tokio::time;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_BATCH_SIZE: usize = 64;
pub const DEFAULT_VERIFY_COMMAND: &str = "cat /proc/device-tree/model";
pub const DEFAULT_VERIFY_MARKER: &str = "Raspberry Pi";

/// Per-step time limits. Every suspension point of a worker is bounded by
/// one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub probe: Duration,
    pub auth: Duration,
    pub exec: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            probe: Duration::from_millis(1_000),
            auth: Duration::from_millis(5_000),
            exec: Duration::from_millis(5_000),
        }
    }
}

/// The command that proves a host belongs to the fleet, and the text its
/// output must contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub command: String,
    pub marker: String,
}

impl Default for Verification {
    fn default() -> Self {
        Self {
            command: DEFAULT_VERIFY_COMMAND.to_owned(),
            marker: DEFAULT_VERIFY_MARKER.to_owned(),
        }
    }
}

impl Verification {
    /// On success returns the cleaned-up output, e.g. the board model.
    ///
    /// The device-tree model string is NUL terminated, so NULs are stripped
    /// before matching. The marker is matched case-insensitively; an empty
    /// marker accepts any successful output.
    pub fn check(&self, output: &CommandOutput) -> Result<String, HostError> {
        if !output.success() {
            return Err(HostError::VerifyFailure(format!(
                "command exited with {:?}: {}",
                output.exit_code,
                output.stderr.trim()
            )));
        }

        let model = output.stdout.replace('\0', "").trim().to_owned();
        if model.to_lowercase().contains(&self.marker.to_lowercase()) {
            Ok(model)
        } else {
            Err(HostError::VerifyFailure(format!("unexpected output {model:?}")))
        }
    }
}

/// How a run is carried out, as opposed to what it scans.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub batch_size: usize,
    pub timeouts: Timeouts,
    pub deadline: Option<Duration>,
    pub scan_order: ScanOrder,
    pub policy: ReportPolicy,
    pub verification: Verification,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            timeouts: Timeouts::default(),
            deadline: None,
            scan_order: ScanOrder::Serial,
            policy: ReportPolicy::default(),
            verification: Verification::default(),
        }
    }
}

/// The scanner drives every address of the range through its own worker.
///
/// At most `batch_size` hosts are in flight at once, whatever the size of
/// the range, which bounds open connections and file descriptors. Workers
/// share the request and credentials read-only; their results come back on
/// a single stream consumed by the aggregator.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use piscan::probe::TcpProbe;
/// # use piscan::remote::SshExecutor;
/// # use piscan::request::ScanRequest;
/// # use piscan::scanner::{ScanOptions, Scanner};
/// # async fn scan() -> Result<(), Box<dyn std::error::Error>> {
/// let request = ScanRequest::default();
/// let options = ScanOptions::default();
/// let probe = Arc::new(TcpProbe::with_resolver(request.ssh.port, &None).await);
/// let executor = Arc::new(SshExecutor::new(request.ssh.port, options.timeouts.auth));
///
/// let scanner = Scanner::new(request, options, probe, executor)?;
/// let result = scanner.run().await;
/// println!("{} nodes", result.nodes.len());
/// # Ok(())
/// # }
/// ```
pub struct Scanner {
    range: AddressRange,
    batch_size: usize,
    deadline: Option<Duration>,
    scan_order: ScanOrder,
    policy: ReportPolicy,
    cancel: CancellationToken,
    worker: Arc<HostWorker>,
}

impl Scanner {
    /// Validates the range up front: a malformed range fails here, before
    /// any host is contacted.
    pub fn new(
        request: ScanRequest,
        options: ScanOptions,
        probe: Arc<dyn HostProbe>,
        executor: Arc<dyn RemoteExecutor>,
    ) -> Result<Self, RangeParseError> {
        let range = AddressRange::parse(&request.range)?;
        let credentials = CredentialSet::resolve(&request.ssh, &request.credentials);
        let cancel = CancellationToken::new();

        Ok(Self {
            range,
            batch_size: options.batch_size.max(1),
            deadline: options.deadline,
            scan_order: options.scan_order,
            policy: options.policy,
            cancel: cancel.clone(),
            worker: Arc::new(HostWorker {
                request: Arc::new(request),
                credentials: Arc::new(credentials),
                probe,
                executor,
                timeouts: options.timeouts,
                verification: options.verification,
                cancel,
            }),
        })
    }

    pub const fn range(&self) -> AddressRange {
        self.range
    }

    /// Cancelling this token stops new hosts from being dispatched and makes
    /// in-flight workers give up at their next suspension point.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Scans the whole range and returns the ordered inventory.
    pub async fn run(&self) -> ScanResult {
        let timer = self.deadline.map(|deadline| {
            let token = self.cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    () = time::sleep(deadline) => {
                        info!("Deadline of {deadline:?} reached, stopping dispatch");
                        token.cancel();
                    }
                    () = token.cancelled() => {}
                }
            })
        });

        debug!(
            "Start scanning hosts.\nBatch size {}\nRange {} - {} ({} hosts)\nOrder {:?}",
            self.batch_size,
            self.range.first(),
            self.range.last(),
            self.range.len(),
            self.scan_order,
        );

        let cancel = self.cancel.clone();
        let mut outcomes = stream::iter(self.range.dispatch(self.scan_order))
            .take_while(move |_| future::ready(!cancel.is_cancelled()))
            .map(|address| {
                let worker = Arc::clone(&self.worker);
                tokio::spawn(async move { worker.scan_host(address).await })
            })
            .buffer_unordered(self.batch_size);

        let mut aggregator = Aggregator::new(self.policy);
        while let Some(joined) = outcomes.next().await {
            match joined {
                Ok(node) => aggregator.push(node),
                Err(e) => warn!("Host worker failed: {e}"),
            }
        }

        if let Some(timer) = timer {
            timer.abort();
        }

        let result = aggregator.finish();
        info!("Scan finished. {}", result.tally);
        result
    }
}
