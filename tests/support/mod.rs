//! In-memory stand-ins for the network so the scanner can be driven
//! deterministically.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use piscan::credentials::Credential;
use piscan::error::HostError;
use piscan::probe::HostProbe;
use piscan::remote::{CommandOutput, RemoteExecutor, Session};
use piscan::request::{ScanRequest, SshSettings};
use piscan::scanner::{ScanOptions, Scanner, Timeouts};
use tokio::time;

pub const PI_MODEL: &str = "Raspberry Pi 4 Model B Rev 1.4\0";

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// Answers probes from a fixed table of reachable hosts.
#[derive(Default)]
pub struct FakeProbe {
    hosts: HashMap<IpAddr, String>,
    every_host: Option<String>,
    delay: Duration,
    pub probed: AtomicUsize,
    in_flight: AtomicUsize,
    pub peak: AtomicUsize,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, address: &str, hostname: &str) -> Self {
        self.hosts.insert(ip(address), hostname.to_owned());
        self
    }

    /// Every address answers with this hostname.
    pub fn all_up(mut self, hostname: &str) -> Self {
        self.every_host = Some(hostname.to_owned());
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn probed(&self) -> usize {
        self.probed.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostProbe for FakeProbe {
    async fn probe(&self, address: IpAddr, timeout: Duration) -> Result<String, HostError> {
        self.probed.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let outcome = if self.delay > timeout {
            time::sleep(timeout).await;
            Err(HostError::ProbeTimeout)
        } else {
            time::sleep(self.delay).await;
            self.hosts
                .get(&address)
                .or(self.every_host.as_ref())
                .cloned()
                .ok_or_else(|| HostError::Unreachable("connection refused".to_owned()))
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Accept,
    Reject,
    Fail,
}

/// Authenticates from a table keyed by address and strategy
/// (`key:root`, `password:pi`, ...). Unknown pairs are rejected.
pub struct FakeExecutor {
    answers: HashMap<(IpAddr, String), Answer>,
    default_answer: Answer,
    stdout: String,
    open_delay: Duration,
    exec_delay: Duration,
    attempts: Mutex<Vec<(IpAddr, String)>>,
    pub open_sessions: Arc<AtomicUsize>,
    pub opened: AtomicUsize,
}

impl Default for FakeExecutor {
    fn default() -> Self {
        Self {
            answers: HashMap::new(),
            default_answer: Answer::Reject,
            stdout: PI_MODEL.to_owned(),
            open_delay: Duration::ZERO,
            exec_delay: Duration::ZERO,
            attempts: Mutex::new(Vec::new()),
            open_sessions: Arc::new(AtomicUsize::new(0)),
            opened: AtomicUsize::new(0),
        }
    }
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, address: &str, strategy: &str, answer: Answer) -> Self {
        self.answers.insert((ip(address), strategy.to_owned()), answer);
        self
    }

    pub fn otherwise(mut self, answer: Answer) -> Self {
        self.default_answer = answer;
        self
    }

    pub fn stdout(mut self, stdout: &str) -> Self {
        self.stdout = stdout.to_owned();
        self
    }

    /// Every `open` stalls this long before answering.
    pub fn open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    pub fn exec_delay(mut self, delay: Duration) -> Self {
        self.exec_delay = delay;
        self
    }

    pub fn attempts_for(&self, address: &str) -> Vec<String> {
        let address = ip(address);
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|(a, _)| *a == address)
            .map(|(_, s)| s.clone())
            .collect()
    }

    pub fn total_attempts(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteExecutor for FakeExecutor {
    async fn open(
        &self,
        address: IpAddr,
        credential: &Credential,
    ) -> Result<Box<dyn Session>, HostError> {
        let strategy = credential.to_string();
        self.attempts.lock().unwrap().push((address, strategy.clone()));
        time::sleep(self.open_delay).await;

        let answer = self
            .answers
            .get(&(address, strategy))
            .copied()
            .unwrap_or(self.default_answer);

        match answer {
            Answer::Accept => {
                self.opened.fetch_add(1, Ordering::SeqCst);
                self.open_sessions.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(FakeSession {
                    open: Arc::clone(&self.open_sessions),
                    stdout: self.stdout.clone(),
                    delay: self.exec_delay,
                }))
            }
            Answer::Reject => Err(HostError::AuthRejected {
                user: credential.user().to_owned(),
            }),
            Answer::Fail => Err(HostError::ConnectFailure("connection reset by peer".to_owned())),
        }
    }
}

struct FakeSession {
    open: Arc<AtomicUsize>,
    stdout: String,
    delay: Duration,
}

#[async_trait]
impl Session for FakeSession {
    async fn run(&mut self, _command: &str) -> Result<CommandOutput, HostError> {
        time::sleep(self.delay).await;
        Ok(CommandOutput {
            stdout: self.stdout.clone(),
            stderr: String::new(),
            exit_code: Some(0),
        })
    }

    async fn close(self: Box<Self>) {}
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn request(range: &str, filter: &str, pairs: &[&str]) -> ScanRequest {
    ScanRequest {
        range: range.to_owned(),
        hostname_filter: filter.to_owned(),
        ssh: SshSettings {
            key_path: "/nonexistent/id_rsa".into(),
            user: "root".to_owned(),
            port: 22,
        },
        credentials: piscan::credentials::parse_basic_auth(pairs),
    }
}

pub fn options(batch_size: usize) -> ScanOptions {
    ScanOptions {
        batch_size,
        timeouts: Timeouts {
            probe: Duration::from_millis(500),
            auth: Duration::from_millis(500),
            exec: Duration::from_millis(500),
        },
        ..ScanOptions::default()
    }
}

pub fn scanner(
    request: ScanRequest,
    options: ScanOptions,
    probe: &Arc<FakeProbe>,
    executor: &Arc<FakeExecutor>,
) -> Scanner {
    Scanner::new(request, options, probe.clone(), executor.clone()).unwrap()
}
