// ── ssh-agent client ─────────────────────────────────────────────────────────

use crate::ssh::signer::AgentIdentity;
use log::debug;
use scpr_core::AuthError;
use ssh2::Session;

/// Lists the identities an ssh-agent offers.
pub trait AgentClient: Send + Sync {
    fn identities(&self, socket: &str) -> Result<Vec<AgentIdentity>, AuthError>;
}

/// Agent client backed by libssh2.
///
/// libssh2 dials the socket named by `SSH_AUTH_SOCK`; `socket` is the value
/// the caller read from that variable and is only checked for existence.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ssh2Agent;

impl AgentClient for Ssh2Agent {
    fn identities(&self, socket: &str) -> Result<Vec<AgentIdentity>, AuthError> {
        #[cfg(unix)]
        if !std::path::Path::new(socket).exists() {
            return Err(AuthError::Agent(format!("socket {} does not exist", socket)));
        }

        let session = Session::new().map_err(|e| AuthError::Agent(e.to_string()))?;
        let mut agent = session
            .agent()
            .map_err(|e| AuthError::Agent(e.to_string()))?;
        agent
            .connect()
            .map_err(|e| AuthError::Agent(format!("connect to {}: {}", socket, e)))?;
        agent
            .list_identities()
            .map_err(|e| AuthError::Agent(e.to_string()))?;
        let identities = agent
            .identities()
            .map_err(|e| AuthError::Agent(e.to_string()))?
            .into_iter()
            .map(|key| AgentIdentity {
                comment: key.comment().to_string(),
                blob: key.blob().to_vec(),
            })
            .collect::<Vec<_>>();
        let _ = agent.disconnect();

        debug!("ssh-agent at {} offers {} identities", socket, identities.len());
        Ok(identities)
    }
}
