// ── Process environment snapshot ─────────────────────────────────────────────

use std::path::PathBuf;

/// Environment variable naming the ssh-agent socket.
pub const AGENT_SOCKET_VAR: &str = "SSH_AUTH_SOCK";

/// The parts of the process environment auth resolution depends on.
///
/// Captured once so resolution itself never reads globals and tests can pass
/// a fabricated environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthEnvironment {
    pub agent_socket: Option<String>,
    pub home_dir: Option<PathBuf>,
    pub local_user: Option<String>,
}

impl AuthEnvironment {
    pub fn from_process() -> Self {
        Self {
            agent_socket: non_empty_var(AGENT_SOCKET_VAR),
            home_dir: dirs::home_dir(),
            local_user: non_empty_var("USER").or_else(|| non_empty_var("USERNAME")),
        }
    }

    /// The target user, or the local user when the target names none.
    pub fn effective_user(&self, user: &str) -> String {
        if !user.is_empty() {
            return user.to_string();
        }
        let local = self.local_user.clone().unwrap_or_default();
        // Windows reports DOMAIN\user
        match local.split_once('\\') {
            Some((_, name)) => name.to_string(),
            None => local,
        }
    }

    pub fn known_hosts_path(&self) -> Option<PathBuf> {
        self.home_dir
            .as_ref()
            .map(|home| home.join(".ssh").join("known_hosts"))
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
