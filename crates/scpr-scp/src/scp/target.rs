// ── TargetSpec – `[user@]host:path` or a local path ──────────────────────────

use crate::scp::types::TransferDirection;
use scpr_core::ParseError;
use std::fmt;
use std::str::FromStr;

/// A parsed copy source or destination.
///
/// An empty `host` means the target is local, in which case `user` is empty
/// as well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    path: String,
    host: String,
    user: String,
}

impl TargetSpec {
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            host: String::new(),
            user: String::new(),
        }
    }

    /// Splits on the first `:` and then the first `@`; later separators stay
    /// in the path or host untouched. `X:\` at the start is a Windows drive,
    /// not a host separator.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        if raw.is_empty() {
            return Err(ParseError::Empty);
        }
        if raw.get(1..3) == Some(":\\") {
            return Ok(Self::local(raw));
        }
        let Some((user_host, path)) = raw.split_once(':') else {
            return Ok(Self::local(raw));
        };
        let (user, host) = match user_host.split_once('@') {
            Some((user, host)) => (user, host),
            None => ("", user_host),
        };
        if host.is_empty() {
            return Err(ParseError::MissingHost(raw.to_string()));
        }
        Ok(Self {
            path: path.to_string(),
            host: host.to_string(),
            user: user.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn is_remote(&self) -> bool {
        !self.host.is_empty()
    }
}

impl FromStr for TargetSpec {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.host.is_empty(), self.user.is_empty()) {
            (true, _) => f.write_str(&self.path),
            (false, true) => write!(f, "{}:{}", self.host, self.path),
            (false, false) => write!(f, "{}@{}:{}", self.user, self.host, self.path),
        }
    }
}

impl TransferDirection {
    pub fn between(src: &TargetSpec, dst: &TargetSpec) -> Self {
        match (src.is_remote(), dst.is_remote()) {
            (false, false) => TransferDirection::LocalToLocal,
            (false, true) => TransferDirection::LocalToRemote,
            (true, false) => TransferDirection::RemoteToLocal,
            (true, true) => TransferDirection::RemoteToRemote,
        }
    }
}
