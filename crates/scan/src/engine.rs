use crate::digest::digest_file;
use crate::error::{ErrorKind, Result};
use crate::task::{Match, ScanTask};
use exn::ResultExt;
use vigil_config::HashingMode;
use vigil_store::HashStore;

/// Digest one file and look it up.
///
/// Read failures are [`ErrorKind::FileAccess`], for the caller to skip.
/// Lookup failures are [`ErrorKind::Store`].
pub async fn scan_file(store: &HashStore, task: &ScanTask, mode: HashingMode) -> Result<Option<Match>> {
    let digest = digest_file(&task.path, mode).await?;
    if !store.lookup(&digest).await.or_raise(|| ErrorKind::Store)? {
        return Ok(None);
    }
    tracing::debug!(path = %task.display.display(), digest, "Digest found in store");
    Ok(Some(Match {
        path: task.display.clone(),
        context: task.context,
        digest,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::ScanContext;
    use vigil_store::Database;

    #[tokio::test]
    async fn test_scan_file() {
        let db = Database::connect_in_memory().await.unwrap();
        let store = HashStore::from(&db);
        // MD5 of "abc".
        store.insert_batch(&["900150983cd24fb0d6963f7d28e17f72".to_string()]).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.txt");
        let good = dir.path().join("good.txt");
        std::fs::write(&bad, b"abc").unwrap();
        std::fs::write(&good, b"abcd").unwrap();

        let found = scan_file(&store, &ScanTask::new(&bad, ScanContext::Directory), HashingMode::Inline)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.path, bad);
        assert_eq!(found.context, ScanContext::Directory);
        assert_eq!(found.digest, "900150983cd24fb0d6963f7d28e17f72");

        let clean = scan_file(&store, &ScanTask::new(&good, ScanContext::Directory), HashingMode::Threaded).await;
        assert!(clean.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_file_never_matches() {
        let db = Database::connect_in_memory().await.unwrap();
        let store = HashStore::from(&db);
        store.insert_batch(&[vigil_store::BLANK_DIGEST.to_string()]).await.unwrap();
        store.remove_sentinel().await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty");
        std::fs::write(&empty, b"").unwrap();
        let result = scan_file(&store, &ScanTask::new(&empty, ScanContext::File), HashingMode::Inline).await;
        assert!(result.unwrap().is_none());
    }
}
