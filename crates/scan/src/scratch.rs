use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const PREFIX: &str = "vigil-";

/// Temporary directory holding one archive's extracted contents.
///
/// Shared (through an [`Arc`]) by every task extracted into it and by the
/// scratch directories of archives nested inside it, so it outlives all of
/// them. Removed when the last reference goes away, whatever the outcome of
/// the scan.
#[derive(Debug)]
pub struct ScratchDir {
    dir: Option<TempDir>,
    archive: PathBuf,
    _parent: Option<Arc<ScratchDir>>,
}

impl ScratchDir {
    /// Create a scratch directory for `archive` (a display path, for logs),
    /// inside `root` or the system temporary directory.
    pub fn create(root: Option<&Path>, archive: &Path, parent: Option<Arc<ScratchDir>>) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(PREFIX);
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        tracing::debug!(archive = %archive.display(), scratch = %dir.path().display(), "Created scratch directory");
        Ok(Self {
            dir: Some(dir),
            archive: archive.to_path_buf(),
            _parent: parent,
        })
    }

    pub fn path(&self) -> &Path {
        // Only ever `None` while dropping.
        self.dir.as_ref().map_or_else(|| Path::new(""), TempDir::path)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        let path = dir.path().to_path_buf();
        match dir.close() {
            Ok(()) => tracing::debug!(archive = %self.archive.display(), scratch = %path.display(), "Removed scratch directory"),
            Err(e) => tracing::warn!(
                archive = %self.archive.display(),
                scratch = %path.display(),
                error = %e,
                "Could not remove scratch directory"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(Some(root.path()), Path::new("outer.zip"), None).unwrap();
        let path = scratch.path().to_path_buf();
        std::fs::create_dir_all(path.join("nested/deeper")).unwrap();
        std::fs::write(path.join("nested/deeper/file.bin"), b"payload").unwrap();
        assert!(path.starts_with(root.path()));
        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn test_parent_outlives_child() {
        let root = tempfile::tempdir().unwrap();
        let parent = Arc::new(ScratchDir::create(Some(root.path()), Path::new("outer.zip"), None).unwrap());
        let parent_path = parent.path().to_path_buf();
        let child = ScratchDir::create(Some(root.path()), Path::new("outer.zip/inner.zip"), Some(Arc::clone(&parent)))
            .unwrap();
        drop(parent);
        assert!(parent_path.exists(), "still referenced by the nested scratch directory");
        drop(child);
        assert!(!parent_path.exists());
    }
}
