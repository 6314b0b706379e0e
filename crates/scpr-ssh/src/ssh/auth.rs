// ── AuthResolver – ordered auth methods + host-key policy ────────────────────

use crate::ssh::agent::{AgentClient, Ssh2Agent};
use crate::ssh::env::AuthEnvironment;
use crate::ssh::password::{PasswordMethod, PasswordPrompt, TerminalPrompt};
use crate::ssh::signer::{KeySigner, Signer};
use log::{debug, info, warn};
use scpr_core::{AuthError, ScpConfig};
use std::path::PathBuf;
use std::sync::Arc;

/// One way of proving identity to the server, tried in list order.
#[derive(Debug)]
pub enum AuthMethod {
    PublicKey(Vec<Signer>),
    Password(PasswordMethod),
}

impl AuthMethod {
    pub fn name(&self) -> &'static str {
        match self {
            AuthMethod::PublicKey(_) => "publickey",
            AuthMethod::Password(_) => "password",
        }
    }
}

/// How the server's host key is verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Only keys listed in this OpenSSH known_hosts file are accepted.
    Strict(PathBuf),
    InsecureAcceptAny,
}

/// Everything the session factory needs to authenticate.
#[derive(Debug)]
pub struct AuthResolution {
    pub user: String,
    pub methods: Vec<AuthMethod>,
    pub host_key_policy: HostKeyPolicy,
}

impl AuthResolution {
    pub fn method_names(&self) -> Vec<&'static str> {
        self.methods.iter().map(AuthMethod::name).collect()
    }
}

/// Assembles auth methods from configuration and the environment.
///
/// Resolution only assembles; it succeeds even when no usable credential was
/// found and leaves the final verdict to the server.
pub struct AuthResolver {
    env: AuthEnvironment,
    agent: Arc<dyn AgentClient>,
    prompt: Arc<dyn PasswordPrompt>,
}

impl AuthResolver {
    pub fn new(env: AuthEnvironment, agent: Arc<dyn AgentClient>, prompt: Arc<dyn PasswordPrompt>) -> Self {
        Self { env, agent, prompt }
    }

    /// Resolver wired to the real process environment, libssh2's agent
    /// client and a terminal prompt.
    pub fn from_process() -> Self {
        Self::new(
            AuthEnvironment::from_process(),
            Arc::new(Ssh2Agent),
            Arc::new(TerminalPrompt),
        )
    }

    pub fn env(&self) -> &AuthEnvironment {
        &self.env
    }

    pub fn resolve(&self, config: &ScpConfig, user: &str, host: &str) -> Result<AuthResolution, AuthError> {
        let user = self.env.effective_user(user);
        let mut methods = Vec::new();

        let signers = self.public_key_signers(config);
        if !signers.is_empty() {
            methods.push(AuthMethod::PublicKey(signers));
        }

        if config.password {
            methods.push(AuthMethod::Password(PasswordMethod::new(
                user.clone(),
                host,
                self.prompt.clone(),
            )));
        }

        let host_key_policy = if config.check_known_hosts {
            let path = self.env.known_hosts_path().ok_or(AuthError::NoHomeDir)?;
            HostKeyPolicy::Strict(path)
        } else {
            warn!("Host key verification disabled for {}; accepting any key", host);
            HostKeyPolicy::InsecureAcceptAny
        };

        let resolution = AuthResolution {
            user,
            methods,
            host_key_policy,
        };
        info!(
            "Auth for {}@{}: methods {:?}",
            resolution.user,
            host,
            resolution.method_names()
        );
        Ok(resolution)
    }

    /// Key file first; the agent only when no key file is configured.
    fn public_key_signers(&self, config: &ScpConfig) -> Vec<Signer> {
        if let Some(ref key_file) = config.key_file {
            return match KeySigner::load(key_file) {
                Ok(signer) => {
                    debug!(
                        "Loaded {} key {} ({})",
                        signer.algorithm(),
                        key_file.display(),
                        signer.fingerprint().unwrap_or("no fingerprint")
                    );
                    vec![Signer::Key(signer)]
                }
                Err(e) => {
                    warn!("Error loading key file ({})", e);
                    Vec::new()
                }
            };
        }

        let Some(ref socket) = self.env.agent_socket else {
            warn!("Could not load ssh-agent because SSH_AUTH_SOCK is not set");
            return Vec::new();
        };
        match self.agent.identities(socket) {
            Ok(identities) => identities.into_iter().map(Signer::Agent).collect(),
            Err(e) => {
                warn!("Error starting agent ({})", e);
                Vec::new()
            }
        }
    }
}
