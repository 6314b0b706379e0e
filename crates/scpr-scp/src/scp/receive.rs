// ── Receive engine – scp source → local tree ─────────────────────────────────

use crate::scp::io_error;
use crate::scp::protocol::{
    decode_name, display_name, read_byte, read_line, read_message, validate_name,
    ProtocolFrame, ACK_FATAL, ACK_OK, ACK_WARNING,
};
use crate::scp::send::CHUNK_SIZE;
use crate::scp::types::TransferStats;
use log::{debug, info, warn};
use scpr_core::{CancelToken, ProgressSink, ProtocolError, ScpError};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// What a receive run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Received {
    pub stats: TransferStats,
    /// `0x01` messages from the peer, in arrival order.
    pub warnings: Vec<String>,
}

/// Reads scp frames from `stream` and materializes them under `dest`.
///
/// When `dest` is an existing directory each top-level entry lands inside
/// it under its own name; otherwise the single top-level entry is written to
/// `dest` itself. Directories are refused unless `recursive` is set.
pub fn receive<S: Read + Write + ?Sized>(
    stream: &mut S,
    dest: &Path,
    recursive: bool,
    progress: &mut dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<Received, ScpError> {
    let mut receiver = Receiver {
        stream,
        progress,
        cancel,
        recursive,
        dest_is_dir: dest.is_dir(),
        dest: dest.to_path_buf(),
        stack: Vec::new(),
        received: Received::default(),
    };
    receiver.run()?;

    let stats = &receiver.received.stats;
    info!(
        "Received {} files, {} directories, {} bytes into {}",
        stats.files,
        stats.directories,
        stats.bytes,
        dest.display()
    );
    Ok(receiver.received)
}

struct Receiver<'a, S: Read + Write + ?Sized> {
    stream: &'a mut S,
    progress: &'a mut dyn ProgressSink,
    cancel: &'a CancelToken,
    recursive: bool,
    dest: PathBuf,
    dest_is_dir: bool,
    /// Open directories and the mode each gets once its `E` arrives.
    stack: Vec<(PathBuf, u32)>,
    received: Received,
}

impl<S: Read + Write + ?Sized> Receiver<'_, S> {
    fn run(&mut self) -> Result<(), ScpError> {
        self.ack()?;
        loop {
            self.cancel.check().map_err(io_error("receive"))?;
            let first = match read_byte(&mut *self.stream).map_err(io_error("read from remote"))? {
                Some(b) => b,
                None => break,
            };
            match first {
                ACK_WARNING => {
                    let message = read_message(&mut *self.stream)?;
                    warn!("remote: {}", message);
                    self.received.warnings.push(message);
                }
                ACK_FATAL => {
                    let message = read_message(&mut *self.stream)?;
                    return Err(ProtocolError::Remote(message).into());
                }
                _ => {
                    let mut line = vec![first];
                    line.extend(read_line(&mut *self.stream)?);
                    debug!("<- {}", display_name(&line));
                    let frame = ProtocolFrame::parse(&line)?;
                    self.handle(frame)?;
                }
            }
        }
        if let Some((open, _)) = self.stack.last() {
            return Err(ProtocolError::MalformedHeader(format!(
                "stream ended inside directory {}",
                open.display()
            ))
            .into());
        }
        Ok(())
    }

    fn handle(&mut self, frame: ProtocolFrame) -> Result<(), ScpError> {
        match frame {
            ProtocolFrame::Time { .. } => self.ack(),
            ProtocolFrame::DirBegin { mode, name } => {
                if !self.recursive {
                    return Err(ProtocolError::UnexpectedDirectory(display_name(&name)).into());
                }
                validate_name(&name)?;
                let path = self.entry_path(&name)?;
                if !path.is_dir() {
                    fs::create_dir(&path).map_err(io_error(format!(
                        "cannot create directory {}",
                        path.display()
                    )))?;
                }
                // Keep the owner able to write the children that follow.
                set_mode(&path, mode | 0o700)?;
                self.stack.push((path, mode));
                self.received.stats.directories += 1;
                self.ack()
            }
            ProtocolFrame::DirEnd => {
                let (path, mode) = self.stack.pop().ok_or(ProtocolError::UnbalancedDirEnd)?;
                set_mode(&path, mode)?;
                self.ack()
            }
            ProtocolFrame::FileBegin { mode, size, name } => {
                validate_name(&name)?;
                let path = self.entry_path(&name)?;
                self.receive_file(&path, &display_name(&name), mode, size)
            }
        }
    }

    fn receive_file(&mut self, path: &Path, name: &str, mode: u32, size: u64) -> Result<(), ScpError> {
        let mut file =
            File::create(path).map_err(io_error(format!("cannot create {}", path.display())))?;
        self.ack()?;

        self.progress.begin(name, size);
        self.progress.report(0, size);

        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut received: u64 = 0;
        while received < size {
            let want = (size - received).min(buf.len() as u64) as usize;
            let n = self
                .stream
                .read(&mut buf[..want])
                .map_err(io_error("read from remote"))?;
            if n == 0 {
                return Err(ProtocolError::Truncated {
                    name: name.to_string(),
                    expected: size,
                    received,
                }
                .into());
            }
            file.write_all(&buf[..n])
                .map_err(io_error(format!("write error on {}", path.display())))?;
            received += n as u64;
            self.progress.report(received, size);
            self.cancel.check().map_err(io_error("receive"))?;
        }

        match read_byte(&mut *self.stream).map_err(io_error("read from remote"))? {
            Some(ACK_OK) => {}
            _ => {
                return Err(ProtocolError::MissingTerminator {
                    name: name.to_string(),
                    expected: size,
                }
                .into())
            }
        }
        file.flush()
            .map_err(io_error(format!("write error on {}", path.display())))?;
        drop(file);
        set_mode(path, mode)?;
        self.progress.finish();

        self.received.stats.files += 1;
        self.received.stats.bytes += size;
        self.ack()
    }

    fn entry_path(&self, name: &[u8]) -> Result<PathBuf, ScpError> {
        let name = decode_name(name)?;
        Ok(match self.stack.last() {
            Some((parent, _)) => parent.join(name),
            None if self.dest_is_dir => self.dest.join(name),
            None => self.dest.clone(),
        })
    }

    fn ack(&mut self) -> Result<(), ScpError> {
        self.stream
            .write_all(&[ACK_OK])
            .map_err(io_error("write to remote"))?;
        self.stream.flush().map_err(io_error("write to remote"))
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), ScpError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
        .map_err(io_error(format!("cannot set mode on {}", path.display())))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), ScpError> {
    Ok(())
}
