//! # scpr – SCP
//!
//! The classic rcp/scp copy protocol over an SSH session:
//!   • `[user@]host:path` target parsing and transfer-direction matrix
//!   • Wire frames (`C`, `D`, `E`, `T`) and the remote `scp -t` / `-f` command
//!   • Send engine: recursive walk interleaved with framing
//!   • Receive engine: frame parser that materializes files and directories
//!   • Local-to-local copy
//!   • `ScpCopier`, the per-invocation orchestrator state machine

pub mod scp;

pub use scp::*;
