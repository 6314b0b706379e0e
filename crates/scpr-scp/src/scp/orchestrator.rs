// ── ScpCopier – per-invocation orchestration ─────────────────────────────────

use crate::scp::local::copy_local;
use crate::scp::protocol::{read_replies, remote_command, RemoteRole};
use crate::scp::receive::receive;
use crate::scp::send::send;
use crate::scp::target::TargetSpec;
use crate::scp::types::{CopyReport, TransferDirection, TransferState, TransferStats};
use log::{debug, info, warn};
use scpr_core::{CancelToken, NoProgress, ProgressSink, ScpConfig, ScpError};
use scpr_ssh::{AuthResolver, ConnectTarget, RemoteCommand, RemoteSession, SessionFactory, Ssh2SessionFactory};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long a cancelled producer gets to notice the token before the
/// transfer is abandoned.
const CANCEL_GRACE: Duration = Duration::from_secs(5);

/// Upper bound on the disconnect once the transfer is over.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// What the producer task hands back once it is done with the command.
struct ProducerOutcome {
    command: Box<dyn RemoteCommand>,
    progress: Box<dyn ProgressSink>,
    result: Result<(TransferStats, Vec<String>), ScpError>,
}

/// Copies one source to one destination.
///
/// Holds the immutable configuration and its collaborators; every call to
/// [`copy`](Self::copy) walks the state machine from `Idle` to `Closed`.
pub struct ScpCopier {
    config: ScpConfig,
    resolver: AuthResolver,
    factory: Arc<dyn SessionFactory>,
    progress: Option<Box<dyn ProgressSink>>,
    state: TransferState,
    history: Vec<TransferState>,
}

impl ScpCopier {
    pub fn new(config: ScpConfig, resolver: AuthResolver, factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            config,
            resolver,
            factory,
            progress: None,
            state: TransferState::Idle,
            history: vec![TransferState::Idle],
        }
    }

    /// Copier using the process environment and real SSH sessions.
    pub fn from_process(config: ScpConfig) -> Self {
        Self::new(
            config,
            AuthResolver::from_process(),
            Arc::new(Ssh2SessionFactory),
        )
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressSink>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &ScpConfig {
        &self.config
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Every state entered during the last [`copy`](Self::copy), in order.
    pub fn history(&self) -> &[TransferState] {
        &self.history
    }

    pub async fn copy(
        &mut self,
        src: &str,
        dst: &str,
        cancel: &CancelToken,
    ) -> Result<CopyReport, ScpError> {
        self.state = TransferState::Idle;
        self.history = vec![TransferState::Idle];
        let started = Instant::now();

        let result = self.run(src, dst, cancel).await;
        self.transition(TransferState::Closed {
            success: result.is_ok(),
        });

        let (direction, stats, warnings) = result?;
        let report = CopyReport {
            direction,
            stats,
            warnings,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            "Copy {} finished: {} files, {} bytes in {} ms",
            report.direction, report.stats.files, report.stats.bytes, report.duration_ms
        );
        Ok(report)
    }

    fn transition(&mut self, next: TransferState) {
        debug!("State {:?} -> {:?}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    async fn run(
        &mut self,
        src: &str,
        dst: &str,
        cancel: &CancelToken,
    ) -> Result<(TransferDirection, TransferStats, Vec<String>), ScpError> {
        self.transition(TransferState::ParsingTargets);
        let src = TargetSpec::parse(src)?;
        let dst = TargetSpec::parse(dst)?;
        let direction = TransferDirection::between(&src, &dst);
        info!("Copying {} to {} ({})", src, dst, direction);

        match direction {
            TransferDirection::RemoteToRemote => Err(ScpError::UnsupportedDirection),
            TransferDirection::LocalToLocal => {
                self.transition(TransferState::LocalPath);
                let stats = self.copy_local(&src, &dst, cancel).await?;
                Ok((direction, stats, Vec::new()))
            }
            TransferDirection::LocalToRemote => {
                let (stats, warnings) = self.copy_remote(RemoteRole::Sink, &dst, &src, cancel).await?;
                Ok((direction, stats, warnings))
            }
            TransferDirection::RemoteToLocal => {
                let (stats, warnings) = self.copy_remote(RemoteRole::Source, &src, &dst, cancel).await?;
                Ok((direction, stats, warnings))
            }
        }
    }

    async fn copy_local(
        &mut self,
        src: &TargetSpec,
        dst: &TargetSpec,
        cancel: &CancelToken,
    ) -> Result<TransferStats, ScpError> {
        self.transition(TransferState::Transferring);
        let src = PathBuf::from(src.path());
        let dst = PathBuf::from(dst.path());
        let recursive = self.config.recursive;
        let mut progress = self.take_progress();
        let cancel = cancel.clone();

        let (progress, result) = tokio::task::spawn_blocking(move || {
            let result = copy_local(&src, &dst, recursive, &mut *progress, &cancel);
            (progress, result)
        })
        .await
        .map_err(|e| ScpError::Task(e.to_string()))?;
        self.progress = Some(progress);
        result
    }

    /// `remote` is the endpoint on the peer, `local` the one on this host.
    async fn copy_remote(
        &mut self,
        role: RemoteRole,
        remote: &TargetSpec,
        local: &TargetSpec,
        cancel: &CancelToken,
    ) -> Result<(TransferStats, Vec<String>), ScpError> {
        self.transition(TransferState::AuthResolving);
        let resolution = self
            .resolver
            .resolve(&self.config, remote.user(), remote.host())?;
        let target = ConnectTarget::new(
            remote.host(),
            self.config.port,
            Duration::from_secs(self.config.connect_timeout_secs),
        );

        let mut session = tokio::select! {
            opened = self.factory.open(&target, resolution) => opened?,
            _ = cancel.cancelled() => return Err(ScpError::Cancelled),
        };
        self.transition(TransferState::SessionOpen);

        let result = self
            .transfer(session.as_mut(), role, remote, local, cancel)
            .await;

        match tokio::time::timeout(CLOSE_TIMEOUT, session.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Error closing session to {} ({})", target.addr(), e),
            Err(_) => warn!("Timed out closing session to {}", target.addr()),
        }
        result
    }

    async fn transfer(
        &mut self,
        session: &mut dyn RemoteSession,
        role: RemoteRole,
        remote: &TargetSpec,
        local: &TargetSpec,
        cancel: &CancelToken,
    ) -> Result<(TransferStats, Vec<String>), ScpError> {
        self.transition(TransferState::Transferring);

        let local_path = PathBuf::from(local.path());
        let remote_path = match role {
            RemoteRole::Sink => default_remote_path(remote.path(), &local_path),
            // An empty source path means the remote login directory.
            RemoteRole::Source if remote.path().is_empty() => ".".to_string(),
            RemoteRole::Source => remote.path().to_string(),
        };
        let command_line = remote_command(
            &self.config.remote_binary,
            role,
            self.config.quiet,
            self.config.recursive,
            &remote_path,
        );
        let command = session.exec(&command_line, cancel).await?;

        let outcome = self
            .run_producer(command, role, local_path, cancel)
            .await?;
        self.progress = Some(outcome.progress);
        let (stats, warnings) = outcome.result?;

        let mut command = outcome.command;
        let waiter = tokio::task::spawn_blocking(move || command.wait());
        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ScpError::Cancelled),
            joined = waiter => joined.map_err(|e| ScpError::Task(e.to_string()))??,
        };
        debug!("Remote command exited with status {}", status);

        if status != 0 {
            return Err(ScpError::RemoteFailed {
                status,
                message: warnings.last().cloned(),
            });
        }
        if role == RemoteRole::Sink {
            for warning in &warnings {
                warn!("remote: {}", warning);
            }
        }
        Ok((stats, warnings))
    }

    /// Runs the engine on a blocking task that owns the command until it has
    /// closed the command's input.
    async fn run_producer(
        &mut self,
        mut command: Box<dyn RemoteCommand>,
        role: RemoteRole,
        local_path: PathBuf,
        cancel: &CancelToken,
    ) -> Result<ProducerOutcome, ScpError> {
        let recursive = self.config.recursive;
        let mut progress = self.take_progress();
        let token = cancel.clone();

        let producer = tokio::task::spawn_blocking(move || {
            let result = match role {
                RemoteRole::Sink => send(
                    &mut *command,
                    &local_path,
                    recursive,
                    &mut *progress,
                    &token,
                )
                .map(|stats| (stats, Vec::new())),
                RemoteRole::Source => receive(
                    &mut *command,
                    &local_path,
                    recursive,
                    &mut *progress,
                    &token,
                )
                .map(|received| (received.stats, received.warnings)),
            };

            // The peer only exits once it sees EOF on its input.
            let closed = command.close_input();
            let replies = match (role, &closed) {
                (RemoteRole::Sink, Ok(())) => read_replies(&mut *command),
                _ => Ok(Vec::new()),
            };
            let result = match (result, closed, replies) {
                (Ok((stats, mut warnings)), Ok(()), Ok(replies)) => {
                    warnings.extend(replies);
                    Ok((stats, warnings))
                }
                (Ok(_), Err(e), _) => Err(e.into()),
                (Ok(_), Ok(()), Err(e)) => Err(e),
                (Err(e), _, replies) => {
                    for reply in replies.unwrap_or_default() {
                        warn!("remote: {}", reply);
                    }
                    Err(e)
                }
            };

            ProducerOutcome {
                command,
                progress,
                result,
            }
        });
        tokio::pin!(producer);

        let joined = tokio::select! {
            joined = &mut producer => joined,
            _ = cancel.cancelled() => {
                info!("Cancellation requested; waiting for the transfer to stop");
                match tokio::time::timeout(CANCEL_GRACE, &mut producer).await {
                    Ok(joined) => joined,
                    Err(_) => return Err(ScpError::Cancelled),
                }
            }
        };
        joined.map_err(|e| ScpError::Task(e.to_string()))
    }

    fn take_progress(&mut self) -> Box<dyn ProgressSink> {
        self.progress.take().unwrap_or_else(|| Box::new(NoProgress))
    }
}

/// Upload destination: the given path, or the source's base name when the
/// target was just `host:`.
fn default_remote_path(remote: &str, local: &Path) -> String {
    if !remote.is_empty() {
        return remote.to_string();
    }
    local
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string())
}
