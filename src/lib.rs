//! reelvault - VOD ingestion and transcoding service
//!
//! Hexagonal architecture:
//! - domain/: pure ingestion logic (hashing, ladder, stream selection,
//!   encoder args, subtitle naming, catalog types)
//! - ports/: trait definitions for the external collaborators
//! - adapters/: concrete implementations (ffmpeg/ffprobe subprocesses,
//!   S3-compatible store, scratch dirs)
//! - application/: services generic over ports (transcode orchestrator,
//!   cover pipeline, per-content-type ingestion coordinators)
//! - db/: Postgres access used inside the coordinators' transactions
//! - tasks: progress registry polled by the API layer

pub mod adapters;
pub mod application;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod ports;
pub mod tasks;

// Re-exports for convenience
pub use config::AppConfig;
pub use error::{Error, Result};
