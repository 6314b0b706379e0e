// ── Types ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which endpoints are remote, derived from the two targets' hosts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TransferDirection {
    LocalToLocal,
    LocalToRemote,
    RemoteToLocal,
    /// Rejected before any session is opened.
    RemoteToRemote,
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferDirection::LocalToLocal => "local->local",
            TransferDirection::LocalToRemote => "local->remote",
            TransferDirection::RemoteToLocal => "remote->local",
            TransferDirection::RemoteToRemote => "remote->remote",
        };
        f.write_str(s)
    }
}

/// Orchestrator lifecycle.
///
/// `Idle → ParsingTargets → (LocalPath | AuthResolving → SessionOpen) →
/// Transferring → Closed`. A local copy goes from `LocalPath` straight to
/// `Transferring`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TransferState {
    Idle,
    ParsingTargets,
    LocalPath,
    AuthResolving,
    SessionOpen,
    Transferring,
    Closed { success: bool },
}

impl TransferState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Closed { .. })
    }
}

/// Counters accumulated by an engine run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransferStats {
    pub files: u64,
    pub directories: u64,
    pub bytes: u64,
}

/// Outcome of a successful copy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CopyReport {
    pub direction: TransferDirection,
    pub stats: TransferStats,
    /// Non-fatal `0x01` messages sent by the remote peer.
    #[serde(default)]
    pub warnings: Vec<String>,
    pub duration_ms: u64,
}
