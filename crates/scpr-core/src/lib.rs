//! # scpr – Core
//!
//! Shared building blocks for the scpr workspace:
//!   • Typed error taxonomy with per-phase diagnostics
//!   • The plain configuration record consumed by the transfer core
//!   • Optional YAML configuration file
//!   • Progress sink interface and a terminal progress bar
//!   • Cooperative cancellation token

pub mod cancel;
pub mod config;
pub mod error;
pub mod progress;

pub use cancel::{cancelled_error, is_cancelled_error, CancelToken};
pub use config::{ConfigFile, ConfigFileError, ScpConfig};
pub use error::{
    AuthError, ParseError, Phase, ProtocolError, ScpError, ScpResult, TransportError,
};
pub use progress::{NoProgress, ProgressBar, ProgressSink};
