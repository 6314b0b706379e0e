//! # scpr – SSH
//!
//! Credential assembly and remote sessions for the scp transfer core:
//!   • Auth-method resolution (key file, ssh-agent, interactive password)
//!   • Host-key verification policy (known_hosts or accept-any)
//!   • The `RemoteSession` / `RemoteCommand` abstraction the transfer engine
//!     writes through
//!   • An `ssh2`-backed session factory

pub mod ssh;

pub use ssh::*;
