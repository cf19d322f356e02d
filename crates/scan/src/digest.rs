//! Streaming MD5 of file contents.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use md5::{Digest, Md5};
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::instrument;
use vigil_config::HashingMode;

/// Files are read, and hashed, this many bytes at a time.
pub const CHUNK_SIZE: usize = 16 * 1024;

/// Lowercase hex MD5 of the file at `path`.
///
/// [`HashingMode::Inline`] reads through `tokio::fs` and hashes on the async
/// worker. [`HashingMode::Threaded`] moves the whole read-and-hash onto the
/// blocking thread pool, which keeps large files from starving everything
/// else on the runtime.
#[instrument(level = "trace", skip(path), fields(path = %path.as_ref().display()))]
pub async fn digest_file(path: impl AsRef<Path>, mode: HashingMode) -> Result<String> {
    let path = path.as_ref();
    match mode {
        HashingMode::Inline => digest_inline(path).await.or_raise(|| ErrorKind::FileAccess(path.to_path_buf())),
        HashingMode::Threaded => {
            let owned: PathBuf = path.to_path_buf();
            let result = tokio::task::spawn_blocking(move || {
                let file = std::fs::File::open(&owned)?;
                digest_reader(file)
            })
            .await
            .or_raise(|| ErrorKind::FileAccess(path.to_path_buf()))?;
            result.or_raise(|| ErrorKind::FileAccess(path.to_path_buf()))
        },
    }
}

/// Lowercase hex MD5 of everything `reader` yields.
pub fn digest_reader(mut reader: impl Read) -> std::io::Result<String> {
    let mut hasher = Md5::new();
    let mut buffer = vec![0; CHUNK_SIZE];
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

async fn digest_inline(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Md5::new();
    let mut buffer = vec![0; CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const EICAR: &[u8] = br"X5O!P%@AP[4\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

    #[rstest]
    #[case::empty(b"", "d41d8cd98f00b204e9800998ecf8427e")]
    #[case::abc(b"abc", "900150983cd24fb0d6963f7d28e17f72")]
    #[case::eicar(EICAR, "44d88612fea8a8f36de82e1278abb02f")]
    fn test_digest_reader(#[case] data: &[u8], #[case] expected: &str) {
        assert_eq!(digest_reader(data).unwrap(), expected);
    }

    #[rstest]
    #[case::inline(HashingMode::Inline)]
    #[case::threaded(HashingMode::Threaded)]
    #[tokio::test]
    async fn test_modes_agree_across_chunk_boundaries(#[case] mode: HashingMode) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("large.bin");
        // Not a multiple of the chunk size, so the last read is short.
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 123)).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();
        assert_eq!(digest_file(&path, mode).await.unwrap(), digest_reader(data.as_slice()).unwrap());
    }

    #[rstest]
    #[case::inline(HashingMode::Inline)]
    #[case::threaded(HashingMode::Threaded)]
    #[tokio::test]
    async fn test_missing_file(#[case] mode: HashingMode) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.bin");
        let err = digest_file(&path, mode).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::FileAccess(p) if *p == path));
    }
}
