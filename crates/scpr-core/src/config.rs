// ── Configuration ─────────────────────────────────────────────────────────────

use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ── Serde default helpers ────────────────────────────────────────────────────

fn default_port() -> u16 {
    22
}
fn default_remote_binary() -> String {
    "/usr/bin/scp".to_string()
}
fn default_connect_timeout_secs() -> u64 {
    30
}

/// Name of the optional per-user config file in the home directory.
pub const DEFAULT_CONFIG_NAME: &str = ".scpr.yaml";

/// Options consumed by the transfer core for one invocation.
///
/// This is a plain value: every operation receives it explicitly and nothing
/// mutates it once the invocation has started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScpConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub recursive: bool,
    /// Passes `-q` to the remote side and hides the progress meter.
    #[serde(default)]
    pub quiet: bool,
    #[serde(default)]
    pub verbose: bool,
    /// Verify the server key against `~/.ssh/known_hosts` instead of
    /// accepting any key.
    #[serde(default)]
    pub check_known_hosts: bool,
    #[serde(default, alias = "keyfile")]
    pub key_file: Option<PathBuf>,
    /// Prompt interactively for a password as an extra auth method.
    #[serde(default)]
    pub password: bool,
    #[serde(default = "default_remote_binary")]
    pub remote_binary: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for ScpConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            recursive: false,
            quiet: false,
            verbose: false,
            check_known_hosts: false,
            key_file: None,
            password: false,
            remote_binary: default_remote_binary(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// On-disk layout of the YAML config file; settings live under `scp:`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub scp: ScpConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl ConfigFile {
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let parsed = Self::from_yaml_str(&text).map_err(|source| ConfigFileError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        debug!("Using config file: {}", path.display());
        Ok(parsed)
    }

    /// Loads `~/.scpr.yaml` when it exists; a missing file yields defaults.
    pub fn load_default() -> Result<Self, ConfigFileError> {
        match dirs::home_dir().map(|home| home.join(DEFAULT_CONFIG_NAME)) {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}
