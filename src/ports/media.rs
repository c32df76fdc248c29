use crate::domain::media::MediaInfo;
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Per-invocation progress callback, percent complete in 0..=100.
pub type Progress<'a> = dyn Fn(u32) + Send + Sync + 'a;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProbePort: Send + Sync {
    /// Inspect a local media file and return its stream/format metadata.
    async fn probe(&self, path: &Path) -> Result<MediaInfo>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscodePort: Send + Sync {
    /// Run the external encoder with the given output parameters, producing
    /// one output file and reporting percent-complete along the way.
    async fn encode<'cb>(
        &self,
        input: &Path,
        output: &Path,
        output_args: &[String],
        on_progress: &Progress<'cb>,
    ) -> Result<()>;

    /// Extract the n-th subtitle stream (type-relative ordinal) to a
    /// standalone WebVTT file.
    async fn extract_subtitle(&self, input: &Path, ordinal: usize, output: &Path) -> Result<()>;
}
