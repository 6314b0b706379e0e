// ── scpr-scp / scp module ─────────────────────────────────────────────────────
//
//   • types        – direction, orchestrator state, transfer statistics
//   • target       – TargetSpec parser
//   • protocol     – wire frames and remote command line
//   • send         – upload engine (source side)
//   • receive      – download engine (sink side)
//   • local        – local-to-local copy
//   • orchestrator – ScpCopier

pub mod local;
pub mod orchestrator;
pub mod protocol;
pub mod receive;
pub mod send;
pub mod target;
pub mod types;

pub use orchestrator::ScpCopier;
pub use protocol::{remote_command, ProtocolFrame, RemoteRole};
pub use target::TargetSpec;
pub use types::*;

use scpr_core::{is_cancelled_error, ScpError};

/// Maps a local I/O failure, keeping cancellation distinct.
pub(crate) fn io_error(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> ScpError {
    let context = context.into();
    move |e| {
        if is_cancelled_error(&e) {
            ScpError::Cancelled
        } else {
            ScpError::io(context, e)
        }
    }
}
