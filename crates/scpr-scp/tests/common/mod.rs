// In-memory stand-ins for the SSH transport.

#![allow(dead_code)]

use async_trait::async_trait;
use scpr_core::{cancelled_error, AuthError, CancelToken, ScpConfig, ScpError, TransportError};
use scpr_scp::ScpCopier;
use scpr_ssh::{
    AuthEnvironment, AuthResolution, AuthResolver, ConnectTarget, RemoteCommand, RemoteSession,
    SessionFactory, Ssh2Agent, TerminalPrompt,
};
use std::io::{self, Cursor, Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Everything the fakes observed.
#[derive(Debug, Default)]
pub struct SessionLog {
    pub opened: usize,
    pub closed: usize,
    pub targets: Vec<ConnectTarget>,
    pub users: Vec<String>,
    pub commands: Vec<String>,
    pub written: Vec<u8>,
    pub input_closed: bool,
    pub waited: bool,
    pub write_after_close: bool,
}

pub type SharedLog = Arc<Mutex<SessionLog>>;

pub struct FakeFactory {
    pub log: SharedLog,
    /// Bytes the remote command writes to its stdout.
    pub remote_output: Vec<u8>,
    pub exit_status: i32,
    pub reject_auth: bool,
    /// `wait` blocks this long and ignores the cancel token.
    pub hang_wait: Option<Duration>,
    /// Writes block until the cancel token fires.
    pub stall_writes: bool,
}

impl FakeFactory {
    pub fn new(remote_output: &[u8], exit_status: i32) -> Self {
        Self {
            log: SharedLog::default(),
            remote_output: remote_output.to_vec(),
            exit_status,
            reject_auth: false,
            hang_wait: None,
            stall_writes: false,
        }
    }

    pub fn log(&self) -> SharedLog {
        self.log.clone()
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn open(
        &self,
        target: &ConnectTarget,
        auth: AuthResolution,
    ) -> Result<Box<dyn RemoteSession>, ScpError> {
        if self.reject_auth {
            return Err(AuthError::Rejected { user: auth.user }.into());
        }
        let mut log = self.log.lock().unwrap();
        log.opened += 1;
        log.targets.push(target.clone());
        log.users.push(auth.user.clone());
        Ok(Box::new(FakeSession {
            log: self.log.clone(),
            remote_output: self.remote_output.clone(),
            exit_status: self.exit_status,
            hang_wait: self.hang_wait,
            stall_writes: self.stall_writes,
        }))
    }
}

struct FakeSession {
    log: SharedLog,
    remote_output: Vec<u8>,
    exit_status: i32,
    hang_wait: Option<Duration>,
    stall_writes: bool,
}

#[async_trait]
impl RemoteSession for FakeSession {
    async fn exec(
        &mut self,
        command: &str,
        cancel: &CancelToken,
    ) -> Result<Box<dyn RemoteCommand>, TransportError> {
        self.log.lock().unwrap().commands.push(command.to_string());
        Ok(Box::new(FakeCommand {
            log: self.log.clone(),
            output: Cursor::new(self.remote_output.clone()),
            exit_status: self.exit_status,
            hang_wait: self.hang_wait,
            stall_writes: self.stall_writes,
            cancel: cancel.clone(),
        }))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.log.lock().unwrap().closed += 1;
        Ok(())
    }
}

struct FakeCommand {
    log: SharedLog,
    output: Cursor<Vec<u8>>,
    exit_status: i32,
    hang_wait: Option<Duration>,
    stall_writes: bool,
    cancel: CancelToken,
}

impl Read for FakeCommand {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.output.read(buf)
    }
}

impl Write for FakeCommand {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.stall_writes {
            // A peer that stopped reading: block like a full channel window.
            let started = Instant::now();
            while !self.cancel.is_cancelled() {
                if started.elapsed() > Duration::from_secs(10) {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "stalled write"));
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            return Err(cancelled_error());
        }
        let mut log = self.log.lock().unwrap();
        if log.input_closed {
            log.write_after_close = true;
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "input closed"));
        }
        log.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl RemoteCommand for FakeCommand {
    fn close_input(&mut self) -> Result<(), TransportError> {
        self.log.lock().unwrap().input_closed = true;
        Ok(())
    }

    fn wait(&mut self) -> Result<i32, TransportError> {
        if let Some(hang) = self.hang_wait {
            std::thread::sleep(hang);
        }
        let mut log = self.log.lock().unwrap();
        if !log.input_closed {
            return Err(TransportError::Channel("waited before closing input".into()));
        }
        log.waited = true;
        Ok(self.exit_status)
    }
}

/// A resolver with no agent, no key and `alice` as the local user.
pub fn resolver(home: &Path) -> AuthResolver {
    AuthResolver::new(
        AuthEnvironment {
            agent_socket: None,
            home_dir: Some(home.to_path_buf()),
            local_user: Some("alice".into()),
        },
        Arc::new(Ssh2Agent),
        Arc::new(TerminalPrompt),
    )
}

pub fn copier(config: ScpConfig, factory: FakeFactory, home: &Path) -> ScpCopier {
    ScpCopier::new(config, resolver(home), Arc::new(factory))
}

#[cfg(unix)]
pub fn chmod(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).unwrap();
}

#[cfg(not(unix))]
pub fn chmod(_path: &Path, _mode: u32) {}
