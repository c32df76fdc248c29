//! Content hashing. The SHA-256 digest of a file's bytes is its stable
//! identity: the deduplication key and the object-storage path segment.

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

const CHUNK_SIZE: usize = 64 * 1024;

/// Stream a file through SHA-256 and return the lowercase hex digest.
/// The file is never loaded fully into memory.
pub async fn sha256_hex_of_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_known_digest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hello.bin");
        tokio::fs::write(&path, b"hello world").await.unwrap();

        let digest = sha256_hex_of_file(&path).await.unwrap();
        assert_eq!(
            digest,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[tokio::test]
    async fn test_identical_bytes_identical_digest() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.mp4");
        let b = dir.path().join("b.mp4");
        let payload = vec![0xabu8; 3 * CHUNK_SIZE + 17];
        tokio::fs::write(&a, &payload).await.unwrap();
        tokio::fs::write(&b, &payload).await.unwrap();

        assert_eq!(
            sha256_hex_of_file(&a).await.unwrap(),
            sha256_hex_of_file(&b).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let result = sha256_hex_of_file(&dir.path().join("nope.mp4")).await;
        assert!(matches!(result, Err(crate::error::Error::Io(_))));
    }
}
