// ── Wire frames ──────────────────────────────────────────────────────────────
//
//   D<mode> 0 <name>\n            directory begin
//   C<mode> <size> <name>\n       file begin, then <size> bytes, then 0x00
//   E\n                           directory end
//   T<mtime> 0 <atime> 0\n        timestamps for the next C/D (sink side only)
//
// Modes are four octal digits. Each record is answered by a one-byte status:
// 0x00 ok, 0x01 warning line, 0x02 fatal line.

use crate::scp::io_error;
use scpr_core::{is_cancelled_error, ProtocolError, ScpError};
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::{self, Read, Write};

/// Permission bits carried in `C`/`D` headers.
pub const MODE_MASK: u32 = 0o7777;

/// Status byte acknowledging a record.
pub const ACK_OK: u8 = 0x00;
/// Status byte introducing a warning line.
pub const ACK_WARNING: u8 = 0x01;
/// Status byte introducing a fatal error line.
pub const ACK_FATAL: u8 = 0x02;

/// Longest header or message line accepted from the peer.
const MAX_LINE: usize = 64 * 1024;

/// One header record. Names are raw bytes; the protocol does not define an
/// encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolFrame {
    DirBegin { mode: u32, name: Vec<u8> },
    FileBegin { mode: u32, size: u64, name: Vec<u8> },
    DirEnd,
    Time { mtime: u64, atime: u64 },
}

impl ProtocolFrame {
    /// The header line, including the trailing newline.
    pub fn header(&self) -> Vec<u8> {
        let (prefix, name) = match self {
            ProtocolFrame::DirBegin { mode, name } => {
                (format!("D{:04o} 0 ", mode & MODE_MASK), name.as_slice())
            }
            ProtocolFrame::FileBegin { mode, size, name } => {
                (format!("C{:04o} {} ", mode & MODE_MASK, size), name.as_slice())
            }
            ProtocolFrame::DirEnd => return b"E\n".to_vec(),
            ProtocolFrame::Time { mtime, atime } => {
                return format!("T{} 0 {} 0\n", mtime, atime).into_bytes()
            }
        };
        let mut line = prefix.into_bytes();
        line.extend_from_slice(name);
        line.push(b'\n');
        line
    }

    pub fn write_header<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(&self.header())
    }

    /// Parses one header line, without its trailing newline.
    pub fn parse(line: &[u8]) -> Result<Self, ProtocolError> {
        let malformed = || ProtocolError::MalformedHeader(String::from_utf8_lossy(line).into_owned());
        let (&kind, rest) = line.split_first().ok_or_else(malformed)?;

        match kind {
            b'C' | b'D' => {
                let mut fields = rest.splitn(3, |&b| b == b' ');
                let (mode, size, name) = match (fields.next(), fields.next(), fields.next()) {
                    (Some(mode), Some(size), Some(name)) => (mode, size, name),
                    _ => return Err(malformed()),
                };
                if mode.len() != 4 {
                    return Err(malformed());
                }
                let mode = std::str::from_utf8(mode)
                    .ok()
                    .and_then(|m| u32::from_str_radix(m, 8).ok())
                    .ok_or_else(malformed)?;
                let size: u64 = std::str::from_utf8(size)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(malformed)?;
                let name = name.to_vec();
                if kind == b'D' {
                    Ok(ProtocolFrame::DirBegin { mode, name })
                } else {
                    Ok(ProtocolFrame::FileBegin { mode, size, name })
                }
            }
            b'E' if rest.is_empty() => Ok(ProtocolFrame::DirEnd),
            b'E' => Err(malformed()),
            b'T' => {
                let text = std::str::from_utf8(rest).map_err(|_| malformed())?;
                let fields: Vec<&str> = text.split(' ').collect();
                match fields.as_slice() {
                    [mtime, _, atime, _] => Ok(ProtocolFrame::Time {
                        mtime: mtime.parse().map_err(|_| malformed())?,
                        atime: atime.parse().map_err(|_| malformed())?,
                    }),
                    _ => Err(malformed()),
                }
            }
            other => Err(ProtocolError::UnexpectedFrame(other as char)),
        }
    }
}

impl fmt::Display for ProtocolFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = self.header();
        f.write_str(String::from_utf8_lossy(&header).trim_end_matches('\n'))
    }
}

/// Rejects names that would escape or alias the directory being written.
pub fn validate_name(name: &[u8]) -> Result<(), ProtocolError> {
    if name.is_empty() || name == b"." || name == b".." || name.contains(&b'/') {
        return Err(ProtocolError::InvalidName(display_name(name)));
    }
    Ok(())
}

/// Printable form of a wire name for logs and errors.
pub fn display_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

/// The bytes a local file name is sent as.
#[cfg(unix)]
pub fn encode_name(name: &OsStr) -> Result<Vec<u8>, ProtocolError> {
    use std::os::unix::ffi::OsStrExt;
    Ok(name.as_bytes().to_vec())
}

/// The bytes a local file name is sent as.
#[cfg(not(unix))]
pub fn encode_name(name: &OsStr) -> Result<Vec<u8>, ProtocolError> {
    name.to_str()
        .map(|n| n.as_bytes().to_vec())
        .ok_or_else(|| ProtocolError::InvalidName(name.to_string_lossy().into_owned()))
}

/// The local file name for a name received on the wire.
#[cfg(unix)]
pub fn decode_name(name: &[u8]) -> Result<OsString, ProtocolError> {
    use std::os::unix::ffi::OsStrExt;
    Ok(OsStr::from_bytes(name).to_os_string())
}

/// The local file name for a name received on the wire.
#[cfg(not(unix))]
pub fn decode_name(name: &[u8]) -> Result<OsString, ProtocolError> {
    std::str::from_utf8(name)
        .map(OsString::from)
        .map_err(|_| ProtocolError::InvalidName(display_name(name)))
}

pub(crate) fn read_byte<R: Read + ?Sized>(r: &mut R) -> io::Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match r.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted && !is_cancelled_error(&e) => {}
            Err(e) => return Err(e),
        }
    }
}

/// Reads up to the next `\n`, which is consumed but not returned.
pub(crate) fn read_line<R: Read + ?Sized>(r: &mut R) -> Result<Vec<u8>, ScpError> {
    let mut line = Vec::new();
    loop {
        match read_byte(r).map_err(io_error("read from remote"))? {
            Some(b'\n') => break,
            Some(b) => line.push(b),
            None => {
                return Err(ProtocolError::MalformedHeader(format!(
                    "unterminated line {:?}",
                    String::from_utf8_lossy(&line)
                ))
                .into())
            }
        }
        if line.len() > MAX_LINE {
            return Err(ProtocolError::MalformedHeader("header line too long".into()).into());
        }
    }
    Ok(line)
}

/// A warning or error line from the peer, as text.
pub(crate) fn read_message<R: Read + ?Sized>(r: &mut R) -> Result<String, ScpError> {
    read_line(r).map(|line| display_name(&line))
}

/// Drains a sink's status replies until EOF.
///
/// Returns the text of every warning or fatal reply; plain acks are skipped.
pub fn read_replies<R: Read + ?Sized>(r: &mut R) -> Result<Vec<String>, ScpError> {
    let mut messages = Vec::new();
    while let Some(status) = read_byte(r).map_err(io_error("read from remote"))? {
        match status {
            ACK_OK => {}
            ACK_WARNING | ACK_FATAL => messages.push(read_message(r)?),
            other => {
                // Anything else is stray output; keep it for the diagnostic.
                let mut text = vec![other];
                text.extend(read_line(r)?);
                messages.push(display_name(&text));
            }
        }
    }
    Ok(messages)
}

/// Which end of the protocol the remote `scp` plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteRole {
    /// `-t`: the peer receives (upload).
    Sink,
    /// `-f`: the peer sends (download).
    Source,
}

/// `<binary> -t[q][r] <path>` or `<binary> -f[q][r] <path>`.
///
/// The path is passed through verbatim; the remote shell expands it.
pub fn remote_command(
    binary: &str,
    role: RemoteRole,
    quiet: bool,
    recursive: bool,
    path: &str,
) -> String {
    let mut flags = String::from(match role {
        RemoteRole::Sink => "-t",
        RemoteRole::Source => "-f",
    });
    if quiet {
        flags.push('q');
    }
    if recursive {
        flags.push('r');
    }
    format!("{} {} {}", binary, flags, path)
}
