//! Scratch-directory handling for ingestion jobs.

use crate::error::Result;
use std::path::{Path, PathBuf};

/// A working directory created for one ingestion, removed when the guard
/// drops, on success and failure paths alike.
#[derive(Debug)]
pub struct ScopedDir {
    path: PathBuf,
}

impl ScopedDir {
    /// Create `{root}/{name}` (idempotent, recursive).
    pub async fn create(root: &Path, name: &str) -> Result<Self> {
        let path = root.join(name);
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove scratch dir");
            }
        }
    }
}

/// True when the path exists and is reachable.
pub async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Remove a spooled upload (file or directory), logging instead of failing:
/// cleanup must never mask the ingestion outcome.
pub async fn remove_quietly(path: &Path) {
    let result = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove temporary path");
    }
}
