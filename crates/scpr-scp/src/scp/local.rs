// ── Local-to-local copy ──────────────────────────────────────────────────────

use crate::scp::io_error;
use crate::scp::send::{walk_error, CHUNK_SIZE};
use crate::scp::types::TransferStats;
use log::{debug, info};
use scpr_core::{CancelToken, ProgressSink, ProtocolError, ScpError};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Copies `src` to `dst` on the local filesystem.
///
/// An existing directory at `dst` receives the source under its own name.
/// Files are truncated on overwrite. Directories need `recursive` and are
/// walked in listing order.
pub fn copy_local(
    src: &Path,
    dst: &Path,
    recursive: bool,
    progress: &mut dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<TransferStats, ScpError> {
    let meta = fs::metadata(src).map_err(io_error(src.display().to_string()))?;
    if meta.is_dir() && !recursive {
        return Err(ProtocolError::NotRegularFile(src.display().to_string()).into());
    }

    let target = resolve_target(src, dst);
    if meta.is_dir() {
        refuse_copy_into_self(src, &target)?;
    }

    let mut stats = TransferStats::default();
    // Destination directory for each depth of the walk.
    let mut parents: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry.map_err(walk_error)?;
        cancel
            .check()
            .map_err(io_error(entry.path().display().to_string()))?;

        parents.truncate(entry.depth());
        let dst = match parents.last() {
            Some(parent) => parent.join(entry.file_name()),
            None => target.clone(),
        };
        let meta = entry.metadata().map_err(walk_error)?;
        if meta.is_dir() {
            make_dir(&dst)?;
            stats.directories += 1;
            parents.push(dst);
        } else if meta.is_file() {
            stats.bytes += copy_file(entry.path(), &dst, meta.len(), progress, cancel)?;
            stats.files += 1;
        } else {
            return Err(ProtocolError::NotRegularFile(entry.path().display().to_string()).into());
        }
    }
    info!(
        "Copied {} files, {} bytes from {} to {}",
        stats.files,
        stats.bytes,
        src.display(),
        target.display()
    );
    Ok(stats)
}

fn resolve_target(src: &Path, dst: &Path) -> PathBuf {
    match src.file_name() {
        Some(name) if dst.is_dir() => dst.join(name),
        _ => dst.to_path_buf(),
    }
}

fn refuse_copy_into_self(src: &Path, target: &Path) -> Result<(), ScpError> {
    let src = fs::canonicalize(src).map_err(io_error(src.display().to_string()))?;
    // The target may not exist yet; its parent does.
    let anchor = target.parent().unwrap_or(target);
    if let Ok(parent) = fs::canonicalize(anchor) {
        if parent.starts_with(&src) {
            return Err(ScpError::io(
                target.display().to_string(),
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("cannot copy {} into itself", src.display()),
                ),
            ));
        }
    }
    Ok(())
}

fn make_dir(dst: &Path) -> Result<(), ScpError> {
    debug!("mkdir {}", dst.display());
    if dst.is_dir() {
        return Ok(());
    }
    fs::create_dir(dst).map_err(io_error(format!("cannot create directory {}", dst.display())))
}

/// Copies one regular file and returns the number of bytes written.
fn copy_file(
    src: &Path,
    dst: &Path,
    size: u64,
    progress: &mut dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<u64, ScpError> {
    let mut reader =
        File::open(src).map_err(io_error(format!("cannot open {}", src.display())))?;
    let mut writer =
        File::create(dst).map_err(io_error(format!("cannot create {}", dst.display())))?;

    let subject = src
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| src.display().to_string());
    progress.begin(&subject, size);
    progress.report(0, size);

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut copied: u64 = 0;
    loop {
        let n = reader
            .read(&mut buf)
            .map_err(io_error(format!("read error on {}", src.display())))?;
        if n == 0 {
            break;
        }
        writer
            .write_all(&buf[..n])
            .map_err(io_error(format!("write error on {}", dst.display())))?;
        copied += n as u64;
        progress.report(copied, size.max(copied));
        cancel.check().map_err(io_error(src.display().to_string()))?;
    }
    progress.finish();
    Ok(copied)
}
