use crate::error::{ErrorKind, Result};
use async_stream::stream;
use futures::Stream;
use std::path::{Path, PathBuf};
use tokio::fs;

enum WalkEntry {
    File(PathBuf),
    Descend(PathBuf),
    Skip,
}

/// Every regular file under `root`, depth first.
///
/// Symbolic links are never followed (nor reported), and neither are
/// sockets, pipes or devices. A directory that can't be read yields an error
/// and the walk moves on to the next one.
pub(crate) fn walk(root: &Path) -> impl Stream<Item = Result<PathBuf>> + use<> {
    let mut stack = vec![root.to_path_buf()];
    stream! {
        'dirs: while let Some(current) = stack.pop() {
            let mut entries = match fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(_) => {
                    yield Err(exn::Exn::from(ErrorKind::FileAccess(current)));
                    continue 'dirs;
                }
            };
            'entries: loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break 'entries,
                    Err(_) => { yield Err(exn::Exn::from(ErrorKind::FileAccess(current.clone()))); break 'entries; },
                };
                match process_entry(&entry).await {
                    Ok(WalkEntry::File(f)) => yield Ok(f),
                    Ok(WalkEntry::Descend(d)) => stack.push(d),
                    Ok(WalkEntry::Skip) => {},
                    Err(e) => yield Err(e),
                }
            }
        }
    }
}

async fn process_entry(entry: &fs::DirEntry) -> Result<WalkEntry> {
    let path = entry.path();
    // Unlike `metadata()`, this does not follow symlinks.
    let Ok(file_type) = entry.file_type().await else {
        exn::bail!(ErrorKind::FileAccess(path));
    };
    if file_type.is_dir() {
        return Ok(WalkEntry::Descend(path));
    }
    if file_type.is_file() {
        return Ok(WalkEntry::File(path));
    }
    tracing::debug!(path = %path.display(), "Skipping symlink or special file");
    Ok(WalkEntry::Skip)
}
