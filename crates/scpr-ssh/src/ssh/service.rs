// ── Ssh2SessionFactory – libssh2-backed sessions ─────────────────────────────

use crate::ssh::auth::{AuthMethod, AuthResolution, HostKeyPolicy};
use crate::ssh::session::{ConnectTarget, RemoteCommand, RemoteSession, SessionFactory};
use crate::ssh::signer::{AgentIdentity, KeySigner, Signer};
use async_trait::async_trait;
use log::{debug, info, warn};
use scpr_core::{AuthError, CancelToken, ScpError, TransportError};
use ssh2::{CheckResult, ErrorCode, KnownHostFileKind, Session};
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

/// How long a blocking channel call waits before it re-checks the cancel
/// token. Applies once the command is running.
const IO_POLL_TIMEOUT_MS: u32 = 1000;

const LIBSSH2_ERROR_TIMEOUT: i32 = -9;
const LIBSSH2_ERROR_EAGAIN: i32 = -37;

/// Opens sessions over TCP with libssh2.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ssh2SessionFactory;

#[async_trait]
impl SessionFactory for Ssh2SessionFactory {
    async fn open(
        &self,
        target: &ConnectTarget,
        auth: AuthResolution,
    ) -> Result<Box<dyn RemoteSession>, ScpError> {
        let target = target.clone();
        let session = tokio::task::spawn_blocking(move || connect(&target, &auth))
            .await
            .map_err(|e| ScpError::Task(e.to_string()))??;
        Ok(Box::new(session))
    }
}

// ── Connect ──────────────────────────────────────────────────────────────────

fn connect(target: &ConnectTarget, auth: &AuthResolution) -> Result<Ssh2Session, ScpError> {
    let addr = target.addr();
    info!("Connecting to {}", addr);

    let socket_addr = (target.host.as_str(), target.port)
        .to_socket_addrs()
        .map_err(|e| TransportError::Resolve {
            addr: addr.clone(),
            message: e.to_string(),
        })?
        .next()
        .ok_or_else(|| TransportError::Resolve {
            addr: addr.clone(),
            message: "no addresses found".into(),
        })?;

    let tcp = TcpStream::connect_timeout(&socket_addr, target.timeout).map_err(|source| {
        TransportError::Connect {
            addr: addr.clone(),
            source,
        }
    })?;

    let mut session =
        Session::new().map_err(|e| TransportError::Handshake(e.to_string()))?;
    // Bounded while dialing and while the command channel is set up.
    session.set_timeout(target.timeout.as_millis().min(u32::MAX as u128) as u32);
    session.set_tcp_stream(tcp);
    session
        .handshake()
        .map_err(|e| TransportError::Handshake(e.to_string()))?;

    verify_host_key(&session, target, &auth.host_key_policy)?;

    let method = authenticate(&session, auth)?;
    info!("Authenticated to {} as {} via {}", addr, auth.user, method);

    Ok(Ssh2Session { session, addr })
}

fn verify_host_key(
    session: &Session,
    target: &ConnectTarget,
    policy: &HostKeyPolicy,
) -> Result<(), AuthError> {
    let path = match policy {
        HostKeyPolicy::InsecureAcceptAny => return Ok(()),
        HostKeyPolicy::Strict(path) => path,
    };
    let known_hosts_err = |message: String| AuthError::KnownHosts {
        path: path.display().to_string(),
        message,
    };

    let (key, _) = session
        .host_key()
        .ok_or_else(|| known_hosts_err("server presented no host key".into()))?;
    let mut known_hosts = session
        .known_hosts()
        .map_err(|e| known_hosts_err(e.to_string()))?;
    known_hosts
        .read_file(path, KnownHostFileKind::OpenSSH)
        .map_err(|e| known_hosts_err(e.to_string()))?;

    match known_hosts.check_port(&target.host, target.port, key) {
        CheckResult::Match => {
            debug!("Host key for {} matches {}", target.host, path.display());
            Ok(())
        }
        CheckResult::NotFound => Err(AuthError::UnknownHost {
            host: target.host.clone(),
        }),
        CheckResult::Mismatch => Err(AuthError::HostKeyMismatch {
            host: target.host.clone(),
        }),
        CheckResult::Failure => Err(known_hosts_err("host key check failed".into())),
    }
}

// ── Authentication ───────────────────────────────────────────────────────────

/// Tries each method in order and returns the name of the one that worked.
fn authenticate(session: &Session, auth: &AuthResolution) -> Result<String, AuthError> {
    let user = auth.user.as_str();

    for method in &auth.methods {
        match method {
            AuthMethod::PublicKey(signers) => {
                for signer in signers {
                    let accepted = match signer {
                        Signer::Key(key) => auth_with_key(session, user, key),
                        Signer::Agent(identity) => auth_with_agent(session, user, identity),
                    };
                    match accepted {
                        Ok(()) if session.authenticated() => return Ok(signer.describe()),
                        Ok(()) => {}
                        Err(e) => debug!("{} rejected for {}: {}", signer.describe(), user, e),
                    }
                }
                warn!("Public key auth failed for {}", user);
            }
            AuthMethod::Password(password) => {
                let result = password.with_password(|pw| session.userauth_password(user, pw))?;
                if result.is_ok() && session.authenticated() {
                    return Ok("password".into());
                }
                warn!("Password auth failed for {}", user);
            }
        }
    }

    Err(AuthError::Rejected {
        user: user.to_string(),
    })
}

fn auth_with_key(session: &Session, user: &str, key: &KeySigner) -> Result<(), ssh2::Error> {
    session.userauth_pubkey_memory(user, None, key.key_text(), None)
}

fn auth_with_agent(
    session: &Session,
    user: &str,
    identity: &AgentIdentity,
) -> Result<(), ssh2::Error> {
    let mut agent = session.agent()?;
    agent.connect()?;
    agent.list_identities()?;
    let result = match agent
        .identities()?
        .iter()
        .find(|key| key.blob() == identity.blob.as_slice())
    {
        Some(key) => agent.userauth(user, key),
        None => Err(ssh2::Error::new(
            ssh2::ErrorCode::Session(-18),
            "identity no longer offered by agent",
        )),
    };
    let _ = agent.disconnect();
    result
}

// ── Session ──────────────────────────────────────────────────────────────────

/// An authenticated libssh2 session.
pub struct Ssh2Session {
    session: Session,
    addr: String,
}

#[async_trait]
impl RemoteSession for Ssh2Session {
    async fn exec(
        &mut self,
        command: &str,
        cancel: &CancelToken,
    ) -> Result<Box<dyn RemoteCommand>, TransportError> {
        let session = self.session.clone();
        let command = command.to_string();
        debug!("Executing on {}: {}", self.addr, command);
        let channel = tokio::task::spawn_blocking(move || {
            let mut channel = session
                .channel_session()
                .map_err(|e| TransportError::Channel(e.to_string()))?;
            channel.exec(&command).map_err(|e| TransportError::Exec {
                command: command.clone(),
                message: e.to_string(),
            })?;
            session.set_timeout(IO_POLL_TIMEOUT_MS);
            Ok::<_, TransportError>(channel)
        })
        .await
        .map_err(|e| TransportError::Channel(e.to_string()))??;
        Ok(Box::new(Ssh2Command {
            channel,
            cancel: cancel.clone(),
        }))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        info!("Disconnecting from {}", self.addr);
        let session = self.session.clone();
        tokio::task::spawn_blocking(move || session.disconnect(None, "scpr done", None))
            .await
            .map_err(|e| TransportError::Channel(e.to_string()))?
            .map_err(|e| TransportError::Channel(e.to_string()))
    }
}

/// A remote command on one libssh2 channel.
pub struct Ssh2Command {
    channel: ssh2::Channel,
    cancel: CancelToken,
}

impl Read for Ssh2Command {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let channel = &mut self.channel;
        retry_until_cancelled(&self.cancel, || channel.read(buf))
    }
}

impl Write for Ssh2Command {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let channel = &mut self.channel;
        retry_until_cancelled(&self.cancel, || channel.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        let channel = &mut self.channel;
        retry_until_cancelled(&self.cancel, || channel.flush())
    }
}

impl RemoteCommand for Ssh2Command {
    fn close_input(&mut self) -> Result<(), TransportError> {
        let channel = &mut self.channel;
        retry_until_cancelled(&self.cancel, || channel.send_eof().map_err(ssh_io))
            .map_err(channel_err)
    }

    fn wait(&mut self) -> Result<i32, TransportError> {
        let cancel = &self.cancel;
        let channel = &mut self.channel;
        retry_until_cancelled(cancel, || channel.wait_eof().map_err(ssh_io)).map_err(channel_err)?;
        retry_until_cancelled(cancel, || channel.close().map_err(ssh_io)).map_err(channel_err)?;
        retry_until_cancelled(cancel, || channel.wait_close().map_err(ssh_io))
            .map_err(channel_err)?;
        channel.exit_status().map_err(|e| channel_err(ssh_io(e)))
    }
}

fn ssh_io(e: ssh2::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

fn channel_err(e: io::Error) -> TransportError {
    TransportError::Channel(e.to_string())
}

/// True for the error libssh2 returns when its poll timeout lapses.
fn is_poll_timeout(e: &io::Error) -> bool {
    if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) {
        return true;
    }
    e.get_ref()
        .and_then(|inner| inner.downcast_ref::<ssh2::Error>())
        .map_or(false, |ssh| {
            matches!(
                ssh.code(),
                ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT) | ErrorCode::Session(LIBSSH2_ERROR_EAGAIN)
            )
        })
}

/// Re-issues a blocking channel call after each poll timeout until it
/// completes, fails for another reason, or `cancel` fires.
fn retry_until_cancelled<T>(
    cancel: &CancelToken,
    mut op: impl FnMut() -> io::Result<T>,
) -> io::Result<T> {
    loop {
        match op() {
            Err(e) if is_poll_timeout(&e) => cancel.check()?,
            other => return other,
        }
    }
}
