//! Typed error hierarchy for scpr.
//!
//! Each layer returns its own error enum so callers can match on the failure
//! category instead of parsing message strings. [`ScpError`] is the umbrella
//! type returned by the orchestrator; [`ScpError::phase`] names the stage that
//! failed so the binary can print a useful diagnostic.

use std::fmt;
use std::io;
use thiserror::Error;

pub type ScpResult<T> = Result<T, ScpError>;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The stage of an invocation a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Parse,
    Auth,
    Dial,
    Transfer,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Parse => "parse",
            Phase::Auth => "auth",
            Phase::Dial => "dial",
            Phase::Transfer => "transfer",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Layer errors
// ---------------------------------------------------------------------------

/// A copy source or destination argument could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty target")]
    Empty,
    #[error("missing host in remote target '{0}'")]
    MissingHost(String),
}

/// Credential assembly or server authentication failed.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Strict host-key checking was requested but no home directory is known.
    #[error("cannot locate home directory for known_hosts lookup")]
    NoHomeDir,

    #[error("failed to read known_hosts file {path}: {message}")]
    KnownHosts { path: String, message: String },

    #[error("host key for {host} not found in known_hosts")]
    UnknownHost { host: String },

    #[error("host key mismatch for {host}")]
    HostKeyMismatch { host: String },

    #[error("unable to read key file {path}: {message}")]
    KeyFile { path: String, message: String },

    #[error("ssh agent unavailable: {0}")]
    Agent(String),

    #[error("password prompt failed: {0}")]
    Prompt(String),

    /// The server refused every assembled method.
    #[error("all authentication methods exhausted for user '{user}'")]
    Rejected { user: String },
}

/// Dial or session failures reported by the SSH transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("cannot resolve {addr}: {message}")]
    Resolve { addr: String, message: String },

    #[error("TCP connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("SSH handshake failed: {0}")]
    Handshake(String),

    #[error("SSH channel error: {0}")]
    Channel(String),

    #[error("remote command '{command}' could not be started: {message}")]
    Exec { command: String, message: String },
}

/// Violations of the rcp/scp wire framing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("{0}: not a regular file")]
    NotRegularFile(String),

    #[error("malformed protocol header: {0:?}")]
    MalformedHeader(String),

    #[error("unexpected frame type {0:?}")]
    UnexpectedFrame(char),

    #[error("invalid file name in header: {0:?}")]
    InvalidName(String),

    /// The stream ended before the declared payload length was consumed.
    #[error("truncated payload for {name}: declared {expected} bytes, received {received}")]
    Truncated {
        name: String,
        expected: u64,
        received: u64,
    },

    /// The byte after the declared payload was not the zero terminator.
    #[error("size mismatch for {name}: no terminator after {expected} bytes")]
    MissingTerminator { name: String, expected: u64 },

    #[error("directory end without matching directory begin")]
    UnbalancedDirEnd,

    #[error("received directory {0:?} but recursive mode is off")]
    UnexpectedDirectory(String),

    /// Fatal message sent by the remote peer (`0x02` record).
    #[error("remote: {0}")]
    Remote(String),
}

// ---------------------------------------------------------------------------
// Umbrella error
// ---------------------------------------------------------------------------

/// Every failure an scpr invocation can surface to its caller.
#[derive(Debug, Error)]
pub enum ScpError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Remote-to-remote copies are rejected before any session is opened.
    #[error("remote to remote copy is not supported")]
    UnsupportedDirection,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Local file access failure.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("remote scp exited with status {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    RemoteFailed {
        status: i32,
        message: Option<String>,
    },

    #[error("transfer cancelled")]
    Cancelled,

    /// A worker task panicked or was aborted.
    #[error("transfer task failed: {0}")]
    Task(String),
}

impl ScpError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        ScpError::Io {
            context: context.into(),
            source,
        }
    }

    /// The stage this error belongs to.
    pub fn phase(&self) -> Phase {
        match self {
            ScpError::Parse(_) | ScpError::UnsupportedDirection => Phase::Parse,
            ScpError::Auth(_) => Phase::Auth,
            ScpError::Transport(_) => Phase::Dial,
            ScpError::Protocol(_)
            | ScpError::Io { .. }
            | ScpError::RemoteFailed { .. }
            | ScpError::Cancelled
            | ScpError::Task(_) => Phase::Transfer,
        }
    }

    /// One-line diagnostic naming the phase and the underlying cause.
    pub fn diagnostic(&self) -> String {
        format!("{} failed: {}", self.phase(), self)
    }
}
