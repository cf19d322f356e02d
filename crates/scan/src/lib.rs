//! Scanning files against the digest store.
//!
//! [`scan`] takes a path (a file, a container, or a directory), digests
//! every regular file it can reach, looks each digest up in a
//! [`vigil_store::HashStore`], and streams back a [`ScanEvent`] per match
//! or problem. Containers (ZIP, TAR and compressed TAR, see
//! [`vigil_archive`]) are extracted into scratch directories and their
//! contents scanned in turn, however deeply nested, up to a depth limit.
//!
//! Problems with individual files or archives never stop a scan: they are
//! logged and reported as [`ScanEvent::Skipped`].

mod digest;
mod engine;
pub mod error;
mod scheduler;
mod scratch;
mod task;
mod walk;

pub use crate::digest::{CHUNK_SIZE, digest_file, digest_reader};
pub use crate::engine::scan_file;
pub use crate::scheduler::{ScanEvent, ScanOptions, ScanSummary, scan};
pub use crate::task::{Match, ScanContext, ScanTask};
pub use vigil_config::{HashingMode, ScanPolicy};
