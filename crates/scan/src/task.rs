use crate::scratch::ScratchDir;
use derive_more::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a scanned file came from, as shown in match reports.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScanContext {
    /// The scan target itself, a single file.
    #[display("file")]
    File,
    /// Found while walking a directory.
    #[display("directory")]
    Directory,
    /// Extracted from an archive, however deeply nested.
    #[display("archive")]
    Archive,
}

impl ScanContext {
    pub fn label(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Archive => "archive",
        }
    }
}

/// One file to digest and look up, processed exactly once.
///
/// Files extracted from an archive keep that archive's scratch directory
/// alive until the task is dropped.
#[derive(Clone, Debug)]
pub struct ScanTask {
    /// Where the bytes are on disk.
    pub path: PathBuf,
    /// What to call the file in reports. For archive members this is the
    /// archive's display path joined with the member's path inside it.
    pub display: PathBuf,
    pub context: ScanContext,
    /// Number of archives this file is nested in.
    pub depth: usize,
    pub(crate) scratch: Option<Arc<ScratchDir>>,
}

impl ScanTask {
    pub fn new(path: impl Into<PathBuf>, context: ScanContext) -> Self {
        let path = path.into();
        Self {
            display: path.clone(),
            path,
            context,
            depth: 0,
            scratch: None,
        }
    }

    /// A file extracted into `scratch` from the archive scanned as `archive`.
    pub(crate) fn member(archive: &ScanTask, scratch: &Arc<ScratchDir>, path: PathBuf) -> Self {
        let relative = path.strip_prefix(scratch.path()).unwrap_or(&path);
        Self {
            display: archive.display.join(relative),
            path,
            context: ScanContext::Archive,
            depth: archive.depth + 1,
            scratch: Some(Arc::clone(scratch)),
        }
    }

    pub fn display(&self) -> &Path {
        &self.display
    }
}

/// A file whose digest is in the store.
#[derive(Clone, Debug, Display, PartialEq, Eq, Hash)]
#[display("Match found in {}: {}", context.label(), path.display())]
pub struct Match {
    /// Display path of the file.
    pub path: PathBuf,
    pub context: ScanContext,
    pub digest: String,
}
