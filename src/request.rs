//! The immutable description of one scan run.
use std::path::{Path, PathBuf};

use crate::credentials::UserCredential;

pub const DEFAULT_RANGE: &str = "192.168.1.0/24";
pub const DEFAULT_SSH_USER: &str = "root";
pub const DEFAULT_SSH_KEY: &str = "~/.ssh/id_rsa";
pub const DEFAULT_SSH_PORT: u16 = 22;

/// The key-based strategy and the port every SSH connection goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshSettings {
    pub key_path: PathBuf,
    pub user: String,
    pub port: u16,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            key_path: expand_home(DEFAULT_SSH_KEY),
            user: DEFAULT_SSH_USER.to_owned(),
            port: DEFAULT_SSH_PORT,
        }
    }
}

/// Everything a run needs to know about *what* to scan.
///
/// Built once by the entry point and then only ever shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub range: String,
    pub hostname_filter: String,
    pub ssh: SshSettings,
    pub credentials: Vec<UserCredential>,
}

impl Default for ScanRequest {
    fn default() -> Self {
        Self {
            range: DEFAULT_RANGE.to_owned(),
            hostname_filter: String::new(),
            ssh: SshSettings::default(),
            credentials: Vec::new(),
        }
    }
}

impl ScanRequest {
    /// Case-insensitive substring match. An empty filter matches every host,
    /// including ones whose name could not be resolved.
    pub fn matches_hostname(&self, hostname: &str) -> bool {
        self.hostname_filter.is_empty()
            || hostname
                .to_lowercase()
                .contains(&self.hostname_filter.to_lowercase())
    }
}

/// Replaces a leading `~` with the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    Path::new(path).to_path_buf()
}
