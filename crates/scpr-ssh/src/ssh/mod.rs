// ── scpr-ssh / ssh module ─────────────────────────────────────────────────────
//
//   • env      – process environment snapshot (agent socket, home, user)
//   • signer   – key-file and agent-identity signers
//   • agent    – ssh-agent client
//   • password – lazily prompted, cached password method
//   • auth     – AuthResolver: ordered methods + host-key policy
//   • session  – RemoteSession / RemoteCommand / SessionFactory traits
//   • service  – ssh2 implementation of the session traits

pub mod agent;
pub mod auth;
pub mod env;
pub mod password;
pub mod service;
pub mod session;
pub mod signer;

pub use agent::{AgentClient, Ssh2Agent};
pub use auth::{AuthMethod, AuthResolution, AuthResolver, HostKeyPolicy};
pub use env::AuthEnvironment;
pub use password::{PasswordMethod, PasswordPrompt, TerminalPrompt};
pub use service::Ssh2SessionFactory;
pub use session::{ConnectTarget, RemoteCommand, RemoteSession, SessionFactory};
pub use signer::{AgentIdentity, KeySigner, Signer};
