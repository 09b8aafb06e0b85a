//! Provides a means to read, parse and hold configuration options for scans.
use clap::{Parser, ValueEnum};
use serde_derive::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::aggregate::ReportPolicy;
use crate::credentials::parse_basic_auth;
use crate::request::{
    expand_home, ScanRequest, SshSettings, DEFAULT_RANGE, DEFAULT_SSH_KEY, DEFAULT_SSH_PORT,
    DEFAULT_SSH_USER,
};
use crate::scanner::{ScanOptions, Timeouts, Verification, DEFAULT_VERIFY_COMMAND, DEFAULT_VERIFY_MARKER};

/// Represents the order in which addresses are handed to workers.
///   - Serial will run from the first host address to the last.
///   - Random will visit every address once, in a shuffled order.
///
/// The inventory is sorted by address either way.
#[derive(Deserialize, Debug, ValueEnum, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    Serial,
    Random,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "piscan",
    version = env!("CARGO_PKG_VERSION"),
    max_term_width = 120,
    help_template = "{bin} {version}\n{about}\n\nUSAGE:\n    {usage}\n\nOPTIONS:\n{options}",
)]
#[allow(clippy::struct_excessive_bools)]
/// Finds Raspberry Pi nodes on a local network and confirms them over SSH.
/// Every reachable host matching the hostname filter is logged into with the
/// SSH key first, then each --basic-auth pair in order.
pub struct Opts {
    /// CIDR range to scan for members.
    #[arg(short, long, default_value = DEFAULT_RANGE)]
    pub range: String,

    /// Substring that should be part of the hostname. Case-insensitive; empty matches every host.
    #[arg(short = 's', long = "substr", default_value = "")]
    pub hostname_filter: String,

    /// Username and password separated by a single ':' for authentication. Comma-delimited or repeated.
    #[arg(long, value_delimiter = ',')]
    pub basic_auth: Vec<String>,

    /// User for key-based authentication.
    #[arg(short, long, default_value = DEFAULT_SSH_USER)]
    pub user: String,

    /// Private key used for the first authentication attempt.
    #[arg(long, default_value = DEFAULT_SSH_KEY)]
    pub ssh_key: String,

    /// SSH port, also used to check reachability.
    #[arg(long, default_value_t = DEFAULT_SSH_PORT)]
    pub ssh_port: u16,

    /// Whether to ignore the configuration file or not.
    #[arg(short, long)]
    pub no_config: bool,

    /// Custom path to config file
    #[arg(short, long, value_parser)]
    pub config_path: Option<PathBuf>,

    /// Greppable mode. Only output "address hostname" lines, no JSON.
    #[arg(short, long)]
    pub greppable: bool,

    /// Accessible mode. Turns off features which negatively affect screen readers.
    #[arg(long)]
    pub accessible: bool,

    /// A comma-delimited list or file of DNS resolvers used for hostname lookups.
    #[arg(long)]
    pub resolver: Option<String>,

    /// How many hosts are scanned at the same time. Each one holds at most
    /// one connection, so this is bounded by the open file limit of your OS.
    #[arg(short, long, default_value = "64")]
    pub batch_size: u16,

    /// The timeout in milliseconds before a host is assumed to be unreachable.
    #[arg(short, long, default_value = "1000")]
    pub timeout: u32,

    /// The timeout in milliseconds for connecting and authenticating with one credential.
    #[arg(long, default_value = "5000")]
    pub auth_timeout: u32,

    /// The timeout in milliseconds for the verification command.
    #[arg(long, default_value = "5000")]
    pub exec_timeout: u32,

    /// Stop dispatching new hosts after this many seconds.
    #[arg(long)]
    pub deadline: Option<u64>,

    /// Automatically ups the ULIMIT with the value you provided.
    #[arg(long)]
    pub ulimit: Option<u64>,

    /// The order in which addresses are scanned.
    #[arg(long, value_enum, ignore_case = true, default_value = "serial")]
    pub scan_order: ScanOrder,

    /// Command whose output confirms a host belongs to the fleet.
    #[arg(long, default_value = DEFAULT_VERIFY_COMMAND)]
    pub verify_command: String,

    /// Text the verification output must contain (case-insensitive).
    #[arg(long, default_value = DEFAULT_VERIFY_MARKER)]
    pub verify_marker: String,

    /// Also report hosts that matched the filter but failed authentication or verification.
    #[arg(long)]
    pub include_failed: bool,
}

#[cfg(not(tarpaulin_include))]
impl Opts {
    pub fn read() -> Self {
        Self::parse()
    }

    /// Merge values found within the user configuration file into the
    /// command line options.
    pub fn merge(&mut self, config: &Config) {
        if !self.no_config {
            self.merge_required(config);
            self.merge_optional(config);
        }
    }

    fn merge_required(&mut self, config: &Config) {
        macro_rules! merge_required {
            ($($field: ident),+) => {
                $(
                    if let Some(e) = &config.$field {
                        self.$field = e.clone();
                    }
                )+
            }
        }

        merge_required!(
            range, hostname_filter, basic_auth, user, ssh_key, ssh_port, greppable, accessible,
            batch_size, timeout, auth_timeout, exec_timeout, scan_order, verify_command,
            verify_marker, include_failed
        );
    }

    fn merge_optional(&mut self, config: &Config) {
        macro_rules! merge_optional {
            ($($field: ident),+) => {
                $(
                    if config.$field.is_some() {
                        self.$field = config.$field.clone();
                    }
                )+
            }
        }

        merge_optional!(resolver, ulimit, deadline);
    }

    /// What to scan. Malformed `--basic-auth` entries are dropped here.
    pub fn scan_request(&self) -> ScanRequest {
        ScanRequest {
            range: self.range.clone(),
            hostname_filter: self.hostname_filter.clone(),
            ssh: SshSettings {
                key_path: expand_home(&self.ssh_key),
                user: self.user.clone(),
                port: self.ssh_port,
            },
            credentials: parse_basic_auth(&self.basic_auth),
        }
    }

    /// How to scan it.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            batch_size: usize::from(self.batch_size),
            timeouts: Timeouts {
                probe: Duration::from_millis(self.timeout.into()),
                auth: Duration::from_millis(self.auth_timeout.into()),
                exec: Duration::from_millis(self.exec_timeout.into()),
            },
            deadline: self.deadline.map(Duration::from_secs),
            scan_order: self.scan_order,
            policy: if self.include_failed {
                ReportPolicy::IncludeFailed
            } else {
                ReportPolicy::VerifiedOnly
            },
            verification: Verification {
                command: self.verify_command.clone(),
                marker: self.verify_marker.clone(),
            },
        }
    }
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            range: DEFAULT_RANGE.to_owned(),
            hostname_filter: String::new(),
            basic_auth: vec![],
            user: DEFAULT_SSH_USER.to_owned(),
            ssh_key: DEFAULT_SSH_KEY.to_owned(),
            ssh_port: DEFAULT_SSH_PORT,
            no_config: true,
            config_path: None,
            greppable: true,
            accessible: false,
            resolver: None,
            batch_size: 0,
            timeout: 0,
            auth_timeout: 0,
            exec_timeout: 0,
            deadline: None,
            ulimit: None,
            scan_order: ScanOrder::Serial,
            verify_command: DEFAULT_VERIFY_COMMAND.to_owned(),
            verify_marker: DEFAULT_VERIFY_MARKER.to_owned(),
            include_failed: false,
        }
    }
}

/// Struct used to deserialize the options specified within our config file.
/// These will be further merged with our command line arguments in order to
/// generate the final Opts struct.
#[cfg(not(tarpaulin_include))]
#[derive(Debug, Deserialize)]
pub struct Config {
    range: Option<String>,
    hostname_filter: Option<String>,
    basic_auth: Option<Vec<String>>,
    user: Option<String>,
    ssh_key: Option<String>,
    ssh_port: Option<u16>,
    greppable: Option<bool>,
    accessible: Option<bool>,
    batch_size: Option<u16>,
    timeout: Option<u32>,
    auth_timeout: Option<u32>,
    exec_timeout: Option<u32>,
    deadline: Option<u64>,
    ulimit: Option<u64>,
    resolver: Option<String>,
    scan_order: Option<ScanOrder>,
    verify_command: Option<String>,
    verify_marker: Option<String>,
    include_failed: Option<bool>,
}

#[cfg(not(tarpaulin_include))]
impl Config {
    /// Reads the configuration file with TOML format and parses it into a
    /// Config struct. A missing file is the same as an empty one.
    ///
    /// # Format
    ///
    /// range = "10.0.0.0/24"
    /// hostname_filter = "pi"
    /// basic_auth = ["pi:raspberry"]
    /// batch_size = 128
    /// scan_order = "Random"
    ///
    pub fn read(custom_config_path: Option<PathBuf>) -> Result<Self, toml::de::Error> {
        let mut content = String::new();
        let config_path = custom_config_path.unwrap_or_else(default_config_path);
        if config_path.exists() {
            content = fs::read_to_string(config_path).unwrap_or_default();
        }

        toml::from_str(&content)
    }
}

/// Constructs default path to config toml
pub fn default_config_path() -> PathBuf {
    let mut config_path = dirs::home_dir().unwrap_or_default();
    config_path.push(".piscan.toml");
    config_path
}
