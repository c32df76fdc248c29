//! Adapters - concrete implementations of ports.

pub mod ffmpeg;
pub mod fs;
pub mod s3;
