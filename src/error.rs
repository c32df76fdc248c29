//! Error taxonomy for the ingestion pipeline.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("{0} not found")]
    MissingRecord(String),

    #[error("no primary video stream in source file")]
    NoPrimaryVideoStream,

    /// The content hash already exists in the catalog. Fatal by design:
    /// deduplication is an invariant, not an exceptional condition.
    #[error("duplicate content: hash {0} already ingested")]
    DuplicateContent(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("encoder failed: {0}")]
    EncodeFailure(String),

    #[error("upload of {key} failed: {reason}")]
    UploadFailure { key: String, reason: String },

    #[error("probe failed: {0}")]
    Probe(String),

    #[error("cover image processing failed: {0}")]
    CoverImage(String),

    #[error("object storage error: {0}")]
    Storage(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
