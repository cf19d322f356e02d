//! Container detection and extraction.
//!
//! A *container* is any file whose contents are other files: ZIP archives
//! and TAR archives (optionally wrapped in a compression layer). This crate
//! answers two questions for the scanner:
//!
//! - **Is this file a container?** Detection is done from magic bytes, never
//!   from the file extension ([`Container::from_magic_bytes`],
//!   [`Container::detect`]). A compressed stream only counts as a container
//!   when the decompressed head is a TAR header; a lone `.gz` of a single
//!   binary is an ordinary file and gets digested like any other.
//! - **What's inside?** [`Container::extract`] unpacks every member into a
//!   destination directory (the scanner's scratch storage), refusing entries
//!   that would escape it.
//!
//! Everything here is blocking I/O. Callers in async code are expected to
//! run it on a blocking thread.

mod compression;
mod detect;
pub mod error;
mod extract;
mod peekable;

use derive_more::Display;
use std::fmt::{Display as FmtDisplay, Formatter, Result as FmtResult};

use crate::peekable::PeekableReader;

/// Compression layer wrapped around a TAR archive.
///
/// Variants gated behind feature flags (`xz`, `zstd`) are only available
/// when the corresponding feature is enabled. Defaults to
/// [`None`](Self::None) (a plain `.tar`).
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash)]
pub enum Compression {
    #[default]
    #[display("none")]
    None,
    #[display("bzip2")]
    Bzip2,
    #[display("gzip")]
    Gzip,
    #[cfg(feature = "xz")]
    #[display("xz")]
    Xz,
    #[cfg(feature = "zstd")]
    #[display("zstd")]
    Zstd,
}

/// A recognized container format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Container {
    /// PKZIP archive (also covers JAR, APK, DOCX and friends).
    Zip,
    /// POSIX/GNU tar archive, optionally compressed.
    Tar(Compression),
}

impl FmtDisplay for Container {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Container::Zip => f.write_str("zip"),
            Container::Tar(Compression::None) => f.write_str("tar"),
            Container::Tar(compression) => write!(f, "tar+{compression}"),
        }
    }
}
