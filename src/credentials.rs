//! Credential handling: parsing `user:pass` pairs and ordering the
//! authentication strategies tried against every host.
use std::fmt;
use std::path::PathBuf;

use serde_derive::Serialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::request::SshSettings;

/// A password. Zeroed on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The plaintext. Keep the borrow short and never log it.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

/// One `user:pass` pair supplied by the user.
#[derive(Debug, Clone)]
pub struct UserCredential {
    pub user: String,
    pub password: Secret,
}

/// Parses `user:pass` entries, keeping the order they were given in.
///
/// An entry is kept only when it holds exactly one `:`. The user may be
/// empty and neither side is trimmed. A user named twice keeps its first
/// position and its last password.
pub fn parse_basic_auth<S: AsRef<str>>(entries: &[S]) -> Vec<UserCredential> {
    let mut credentials: Vec<UserCredential> = Vec::with_capacity(entries.len());

    for entry in entries {
        let Some((user, password)) = entry.as_ref().split_once(':') else {
            continue;
        };
        if password.contains(':') {
            continue;
        }

        match credentials.iter_mut().find(|c| c.user == user) {
            Some(existing) => existing.password = Secret::new(password),
            None => credentials.push(UserCredential {
                user: user.to_owned(),
                password: Secret::new(password),
            }),
        }
    }

    credentials
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AuthKind {
    Key,
    Password,
}

/// Which strategy got a session open, safe to record and print.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthMethod {
    pub kind: AuthKind,
    pub user: String,
}

/// A single authentication strategy.
#[derive(Debug, Clone)]
pub enum Credential {
    Key { user: String, path: PathBuf },
    Password { user: String, password: Secret },
}

impl Credential {
    pub fn user(&self) -> &str {
        match self {
            Self::Key { user, .. } | Self::Password { user, .. } => user,
        }
    }

    pub const fn kind(&self) -> AuthKind {
        match self {
            Self::Key { .. } => AuthKind::Key,
            Self::Password { .. } => AuthKind::Password,
        }
    }

    pub fn method(&self) -> AuthMethod {
        AuthMethod {
            kind: self.kind(),
            user: self.user().to_owned(),
        }
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            AuthKind::Key => write!(f, "key:{}", self.user()),
            AuthKind::Password => write!(f, "password:{}", self.user()),
        }
    }
}

/// The ordered strategies for a run: the key from [`SshSettings`] first,
/// then every user pair in the order it was supplied.
///
/// Built once and shared read-only by every worker, so each host sees the
/// same order.
#[derive(Debug, Clone)]
pub struct CredentialSet {
    strategies: Vec<Credential>,
}

impl CredentialSet {
    pub fn resolve(ssh: &SshSettings, users: &[UserCredential]) -> Self {
        let key = Credential::Key {
            user: ssh.user.clone(),
            path: ssh.key_path.clone(),
        };
        let passwords = users.iter().map(|c| Credential::Password {
            user: c.user.clone(),
            password: c.password.clone(),
        });

        Self {
            strategies: std::iter::once(key).chain(passwords).collect(),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Credential> {
        self.strategies.iter()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl<'a> IntoIterator for &'a CredentialSet {
    type Item = &'a Credential;
    type IntoIter = std::slice::Iter<'a, Credential>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SshSettings {
        SshSettings {
            key_path: PathBuf::from("/home/ops/.ssh/id_rsa"),
            user: "root".to_owned(),
            port: 22,
        }
    }

    #[test]
    fn parse_keeps_input_order() {
        let parsed = parse_basic_auth(&["pi:raspberry", "admin:hunter2", "ubuntu:ubuntu"]);
        let users = parsed.iter().map(|c| c.user.as_str()).collect::<Vec<_>>();

        assert_eq!(users, ["pi", "admin", "ubuntu"]);
        assert_eq!(parsed[0].password.expose(), "raspberry");
    }

    #[test]
    fn parse_drops_entries_without_exactly_one_colon() {
        let parsed = parse_basic_auth(&["nocolon", "pi:pa:ss", "pi:raspberry", "", "a:b:"]);

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].user, "pi");
        assert_eq!(parsed[0].password.expose(), "raspberry");
    }

    #[test]
    fn parse_keeps_empty_user_and_untrimmed_sides() {
        let parsed = parse_basic_auth(&[":empty", " pi :raspberry "]);
        let users = parsed.iter().map(|c| c.user.as_str()).collect::<Vec<_>>();

        assert_eq!(users, ["", " pi "]);
        assert_eq!(parsed[0].password.expose(), "empty");
        assert_eq!(parsed[1].password.expose(), "raspberry ");
    }

    #[test]
    fn parse_allows_empty_password() {
        let parsed = parse_basic_auth(&["pi:"]);

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].password.expose(), "");
    }

    #[test]
    fn parse_repeated_user_keeps_position_and_last_password() {
        let parsed = parse_basic_auth(&["pi:old", "admin:x", "pi:new"]);
        let users = parsed.iter().map(|c| c.user.as_str()).collect::<Vec<_>>();

        assert_eq!(users, ["pi", "admin"]);
        assert_eq!(parsed[0].password.expose(), "new");
    }

    #[test]
    fn key_strategy_comes_first() {
        let users = parse_basic_auth(&["pi:raspberry", "admin:admin"]);
        let set = CredentialSet::resolve(&settings(), &users);
        let order = set.iter().map(ToString::to_string).collect::<Vec<_>>();

        assert_eq!(order, ["key:root", "password:pi", "password:admin"]);
    }

    #[test]
    fn resolve_without_pairs_is_key_only() {
        let set = CredentialSet::resolve(&settings(), &[]);

        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().next().map(Credential::kind), Some(AuthKind::Key));
    }

    #[test]
    fn secrets_stay_out_of_debug_output() {
        let users = parse_basic_auth(&["pi:raspberry"]);
        let set = CredentialSet::resolve(&settings(), &users);
        let debug = format!("{set:?} {users:?}");

        assert!(!debug.contains("raspberry"));
        assert!(debug.contains("REDACTED"));
    }
}
