// ── Send engine – local tree → scp sink ──────────────────────────────────────

use crate::scp::io_error;
use crate::scp::protocol::{display_name, encode_name, ProtocolFrame, ACK_OK, MODE_MASK};
use crate::scp::types::TransferStats;
use log::{debug, info};
use scpr_core::{CancelToken, ProgressSink, ProtocolError, ScpError};
use std::fs::{self, File, Metadata};
use std::io::{self, Read, Write};
use std::path::Path;
use walkdir::WalkDir;

/// Read buffer size for file payloads.
pub const CHUNK_SIZE: usize = 32 * 1024;

/// Streams `root` into `out` as scp frames.
///
/// A directory is only accepted when `recursive` is set; its entries are sent
/// in the order the directory listing returns them. The first I/O failure
/// aborts the whole walk; frames already written stay written.
pub fn send<W: Write + ?Sized>(
    out: &mut W,
    root: &Path,
    recursive: bool,
    progress: &mut dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<TransferStats, ScpError> {
    let meta = fs::metadata(root).map_err(io_error(root.display().to_string()))?;
    if meta.is_dir() && !recursive {
        return Err(ProtocolError::NotRegularFile(root.display().to_string()).into());
    }
    let root_name = base_name(root)?;

    let mut sender = Sender {
        out,
        progress,
        cancel,
        stats: TransferStats::default(),
    };
    sender.walk(root, root_name)?;
    sender
        .out
        .flush()
        .map_err(io_error("flush to remote"))?;

    info!(
        "Sent {} files, {} directories, {} bytes from {}",
        sender.stats.files,
        sender.stats.directories,
        sender.stats.bytes,
        root.display()
    );
    Ok(sender.stats)
}

struct Sender<'a, W: Write + ?Sized> {
    out: &'a mut W,
    progress: &'a mut dyn ProgressSink,
    cancel: &'a CancelToken,
    stats: TransferStats,
}

impl<W: Write + ?Sized> Sender<'_, W> {
    /// Depth-first, pre-order. Each directory's `E` goes out as soon as the
    /// walk climbs back above it.
    fn walk(&mut self, root: &Path, root_name: Vec<u8>) -> Result<(), ScpError> {
        // Depths of the directories whose `E` is still owed.
        let mut open: Vec<usize> = Vec::new();

        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(walk_error)?;
            let path = entry.path();
            self.cancel
                .check()
                .map_err(io_error(path.display().to_string()))?;

            while open.last().map_or(false, |&depth| depth >= entry.depth()) {
                open.pop();
                self.emit(&ProtocolFrame::DirEnd)?;
            }

            let name = if entry.depth() == 0 {
                root_name.clone()
            } else {
                encode_name(entry.file_name())?
            };
            let meta = entry.metadata().map_err(walk_error)?;
            if meta.is_dir() {
                self.emit(&ProtocolFrame::DirBegin {
                    mode: permission_bits(&meta),
                    name,
                })?;
                self.stats.directories += 1;
                open.push(entry.depth());
            } else if meta.is_file() {
                self.send_file(path, name, &meta)?;
            } else {
                return Err(ProtocolError::NotRegularFile(path.display().to_string()).into());
            }
        }

        for _ in open {
            self.emit(&ProtocolFrame::DirEnd)?;
        }
        Ok(())
    }

    fn send_file(&mut self, path: &Path, name: Vec<u8>, meta: &Metadata) -> Result<(), ScpError> {
        let size = meta.len();
        let file = File::open(path).map_err(io_error(format!("cannot open {}", path.display())))?;
        let subject = display_name(&name);

        self.emit(&ProtocolFrame::FileBegin {
            mode: permission_bits(meta),
            size,
            name,
        })?;

        self.progress.begin(&subject, size);
        self.progress.report(0, size);

        // Never send more than the declared size, even if the file grew.
        let mut reader = file.take(size);
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut sent: u64 = 0;
        loop {
            let n = reader
                .read(&mut buf)
                .map_err(io_error(format!("read error on {}", path.display())))?;
            if n == 0 {
                break;
            }
            self.out
                .write_all(&buf[..n])
                .map_err(io_error("write to remote"))?;
            sent += n as u64;
            self.progress.report(sent, size);
            self.cancel.check().map_err(io_error(path.display().to_string()))?;
        }
        if sent != size {
            return Err(ScpError::io(
                path.display().to_string(),
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("file shrank while sending: {} of {} bytes", sent, size),
                ),
            ));
        }

        self.out
            .write_all(&[ACK_OK])
            .map_err(io_error("write to remote"))?;
        self.progress.finish();

        self.stats.files += 1;
        self.stats.bytes += size;
        Ok(())
    }

    fn emit(&mut self, frame: &ProtocolFrame) -> Result<(), ScpError> {
        debug!("-> {}", frame);
        frame
            .write_header(&mut *self.out)
            .map_err(io_error("write to remote"))
    }
}

pub(crate) fn walk_error(err: walkdir::Error) -> ScpError {
    let context = match err.path() {
        Some(path) => format!("cannot read {}", path.display()),
        None => "directory walk".to_string(),
    };
    ScpError::io(context, io::Error::from(err))
}

/// The final path component, resolving `.`/`..`/`/` through the filesystem.
fn base_name(path: &Path) -> Result<Vec<u8>, ScpError> {
    if let Some(name) = path.file_name() {
        return Ok(encode_name(name)?);
    }
    let canonical = fs::canonicalize(path).map_err(io_error(path.display().to_string()))?;
    match canonical.file_name() {
        Some(name) => Ok(encode_name(name)?),
        None => Err(ProtocolError::InvalidName(path.display().to_string()).into()),
    }
}

#[cfg(unix)]
fn permission_bits(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & MODE_MASK
}

#[cfg(not(unix))]
fn permission_bits(meta: &Metadata) -> u32 {
    let mode = match (meta.is_dir(), meta.permissions().readonly()) {
        (true, false) => 0o755,
        (true, true) => 0o555,
        (false, false) => 0o644,
        (false, true) => 0o444,
    };
    mode & MODE_MASK
}
