//! Feed Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A feed or build error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for feed and build operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Transport failure: DNS, connect, timeout, truncated body.
    #[display("network error")]
    Network,
    /// The feed answered, but not with a success status.
    #[display("unexpected status {_0} from feed")]
    Status(#[error(not(source))] u16),
    #[display("shard {_0} does not exist")]
    NoSuchShard(#[error(not(source))] u32),
    #[display("gave up after {_0} attempts")]
    RetriesExhausted(#[error(not(source))] u32),
    #[display("cancelled")]
    Cancelled,
    /// Writing to the staging store failed.
    #[display("store error")]
    Store,
    #[display("filesystem error: {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    /// The store is missing or its row count is wrong, even after rebuilding.
    #[display("digest store failed validation after {_0} build attempts")]
    Integrity(#[error(not(source))] u32),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Status(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::network(ErrorKind::Network, true)]
    #[case::status(ErrorKind::Status(503), true)]
    #[case::not_found(ErrorKind::Status(404), true)]
    #[case::no_shard(ErrorKind::NoSuchShard(600), false)]
    #[case::exhausted(ErrorKind::RetriesExhausted(3), false)]
    #[case::cancelled(ErrorKind::Cancelled, false)]
    #[case::integrity(ErrorKind::Integrity(3), false)]
    fn test_is_retryable(#[case] kind: ErrorKind, #[case] expected: bool) {
        assert_eq!(kind.is_retryable(), expected);
    }
}
