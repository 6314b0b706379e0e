// ── Command line ─────────────────────────────────────────────────────────────

use clap::Parser;
use scpr_core::{ConfigFile, ConfigFileError, ScpConfig};
use std::path::PathBuf;

/// Copy files to, from or between hosts using the classic scp protocol.
#[derive(Debug, Parser)]
#[command(name = "scpr", version, about)]
pub struct Cli {
    /// `[[user@]host:]path` to copy from
    pub source: String,

    /// `[[user@]host:]path` to copy to
    pub destination: String,

    /// Recursively copy entire directories
    #[arg(short, long)]
    pub recursive: bool,

    /// Port to connect to on the remote host
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// Quiet mode: no progress meter
    #[arg(short, long)]
    pub quiet: bool,

    /// Log protocol frames and connection details
    #[arg(short, long)]
    pub verbose: bool,

    /// Verify the server key against ~/.ssh/known_hosts
    #[arg(short = 'c', long)]
    pub check_known_hosts: bool,

    /// Private key file used for public key authentication
    #[arg(short = 'i', long, value_name = "FILE")]
    pub key_file: Option<PathBuf>,

    /// Prompt for a password if key authentication fails
    #[arg(long)]
    pub password: bool,

    /// YAML config file (defaults to ~/.scpr.yaml when present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// The effective configuration: the config file, then the flags on top.
    pub fn load_config(&self) -> Result<ScpConfig, ConfigFileError> {
        let file = match &self.config {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::load_default()?,
        };
        Ok(self.apply(file.scp))
    }

    /// Boolean flags can only switch a setting on; `--port` and
    /// `--key-file` replace the file's values.
    pub fn apply(&self, mut config: ScpConfig) -> ScpConfig {
        config.recursive |= self.recursive;
        config.quiet |= self.quiet;
        config.verbose |= self.verbose;
        config.check_known_hosts |= self.check_known_hosts;
        config.password |= self.password;
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(key_file) = &self.key_file {
            config.key_file = Some(key_file.clone());
        }
        config
    }
}
