// ── Interactive password method ──────────────────────────────────────────────

use scpr_core::AuthError;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Asks the operator for a password.
pub trait PasswordPrompt: Send + Sync {
    fn prompt(&self, user: &str, host: &str) -> Result<String, AuthError>;
}

/// Reads the password from the controlling terminal without echo.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl PasswordPrompt for TerminalPrompt {
    fn prompt(&self, user: &str, host: &str) -> Result<String, AuthError> {
        rpassword::prompt_password(format!("{}@{}'s password: ", user, host))
            .map_err(|e| AuthError::Prompt(e.to_string()))
    }
}

/// Password auth for one `(user, host)` pair.
///
/// The prompt runs the first time the transport asks for the password; the
/// answer is kept for the lifetime of this value so a transfer never
/// re-prompts.
pub struct PasswordMethod {
    user: String,
    host: String,
    prompt: Arc<dyn PasswordPrompt>,
    cached: Mutex<Option<SecretString>>,
}

impl PasswordMethod {
    pub fn new(user: impl Into<String>, host: impl Into<String>, prompt: Arc<dyn PasswordPrompt>) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
            prompt,
            cached: Mutex::new(None),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_cached(&self) -> bool {
        self.cached.lock().map(|c| c.is_some()).unwrap_or(false)
    }

    /// Runs `f` with the password, prompting on first use.
    pub fn with_password<T>(&self, f: impl FnOnce(&str) -> T) -> Result<T, AuthError> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| AuthError::Prompt("password cache poisoned".into()))?;
        if cached.is_none() {
            let entered = self.prompt.prompt(&self.user, &self.host)?;
            *cached = Some(SecretString::new(entered));
        }
        match cached.as_ref() {
            Some(secret) => Ok(f(secret.expose_secret())),
            None => Err(AuthError::Prompt("no password entered".into())),
        }
    }
}

impl fmt::Debug for PasswordMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordMethod")
            .field("user", &self.user)
            .field("host", &self.host)
            .field("cached", &self.is_cached())
            .finish()
    }
}
