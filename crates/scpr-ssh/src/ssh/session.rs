// ── Remote session abstraction ───────────────────────────────────────────────

use crate::ssh::auth::AuthResolution;
use async_trait::async_trait;
use scpr_core::{CancelToken, ScpError, TransportError};
use std::io::{Read, Write};
use std::time::Duration;

/// Where to dial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

impl ConnectTarget {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A command running on the remote peer.
///
/// Writing feeds the command's stdin, reading drains its stdout. The methods
/// block, so callers drive a command from a blocking task and hand ownership
/// between tasks rather than sharing it. A blocked call returns an
/// `Interrupted` error once the token given to [`RemoteSession::exec`] fires.
pub trait RemoteCommand: Read + Write + Send {
    /// Signals end of input; the peer sees EOF on stdin.
    fn close_input(&mut self) -> Result<(), TransportError>;

    /// Waits for the command to exit and returns its exit status.
    fn wait(&mut self) -> Result<i32, TransportError>;
}

/// An authenticated session able to run commands on the peer.
#[async_trait]
pub trait RemoteSession: Send {
    async fn exec(
        &mut self,
        command: &str,
        cancel: &CancelToken,
    ) -> Result<Box<dyn RemoteCommand>, TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Dials and authenticates sessions.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(
        &self,
        target: &ConnectTarget,
        auth: AuthResolution,
    ) -> Result<Box<dyn RemoteSession>, ScpError>;
}
