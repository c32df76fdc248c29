use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStorePort: Send + Sync {
    /// Probe a remote key. `false` only for a clean "not found"; any other
    /// transport error propagates.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Upload a local file to the remote key, verifying the store accepted
    /// it (key + integrity tag present in the response).
    async fn upload(&self, local_path: &Path, key: &str) -> Result<()>;

    /// Best-effort removal of everything under a prefix. Per-object delete
    /// failures are logged, not returned; listing/transport errors are.
    async fn delete_prefix(&self, prefix: &str) -> Result<()>;
}

/// Idempotent upload: skip the transfer when the key is already present.
/// Safe to retry a whole ingestion without re-pushing finished renditions.
pub async fn upload_if_absent<S: ObjectStorePort + ?Sized>(
    storage: &S,
    local_path: &Path,
    key: &str,
) -> Result<()> {
    if storage.exists(key).await? {
        tracing::debug!(key, "object already present, skipping upload");
        return Ok(());
    }
    storage.upload(local_path, key).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_upload_if_absent_skips_existing_key() {
        let mut storage = MockObjectStorePort::new();
        storage.expect_exists().times(1).returning(|_| Ok(true));
        storage.expect_upload().never();

        upload_if_absent(&storage, &PathBuf::from("/tmp/_720p.mp4"), "vod/abc/_720p.mp4")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upload_if_absent_uploads_missing_key() {
        let mut storage = MockObjectStorePort::new();
        storage.expect_exists().times(1).returning(|_| Ok(false));
        storage
            .expect_upload()
            .times(1)
            .withf(|_, key| key == "vod/abc/_720p.mp4")
            .returning(|_, _| Ok(()));

        upload_if_absent(&storage, &PathBuf::from("/tmp/_720p.mp4"), "vod/abc/_720p.mp4")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upload_if_absent_propagates_probe_errors() {
        let mut storage = MockObjectStorePort::new();
        storage
            .expect_exists()
            .returning(|_| Err(crate::error::Error::Storage("connection refused".into())));
        storage.expect_upload().never();

        let result =
            upload_if_absent(&storage, &PathBuf::from("/tmp/x"), "vod/abc/_720p.mp4").await;
        assert!(matches!(result, Err(crate::error::Error::Storage(_))));
    }
}
