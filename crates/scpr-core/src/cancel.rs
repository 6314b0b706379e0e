// ── Cooperative cancellation ─────────────────────────────────────────────────

use std::fmt;
use std::io;
use tokio_util::sync::CancellationToken;

/// Cancellation shared by the async supervisor and the blocking workers.
///
/// Workers call [`check`](Self::check) between chunks so a stop request comes
/// back as an `io::Error` they can propagate with `?`. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: CancellationToken,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.inner.cancelled().await
    }

    /// Returns an `Interrupted` I/O error if the token has fired.
    pub fn check(&self) -> io::Result<()> {
        if self.is_cancelled() {
            Err(cancelled_error())
        } else {
            Ok(())
        }
    }
}

#[derive(Debug)]
struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("transfer cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// The error workers return when they stop because of the token.
pub fn cancelled_error() -> io::Error {
    io::Error::new(io::ErrorKind::Interrupted, Cancelled)
}

/// True if `err` was produced by [`cancelled_error`].
pub fn is_cancelled_error(err: &io::Error) -> bool {
    err.get_ref().map_or(false, |inner| inner.is::<Cancelled>())
}
