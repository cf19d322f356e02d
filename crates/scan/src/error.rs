//! Scan Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A scan error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for scan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong, in terms of what the scan does about it.
///
/// Only [`InvalidPath`](Self::InvalidPath) and [`Store`](Self::Store) end a
/// scan; everything else costs a single file or archive, is logged, and the
/// scan carries on.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A file could not be read: permissions, vanished mid-scan, I/O failure.
    #[display("cannot read {}", _0.display())]
    FileAccess(#[error(not(source))] PathBuf),
    /// An archive could not be expanded.
    #[display("cannot extract {}", _0.display())]
    Extraction(#[error(not(source))] PathBuf),
    /// The scan target does not exist or is neither a file nor a directory.
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// The digest store could not be queried.
    #[display("digest store error")]
    Store,
}

impl ErrorKind {
    /// Returns `true` if the error ends the scan rather than skipping a file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidPath(_) | Self::Store)
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
