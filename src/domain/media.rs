//! Probed media metadata and stream selection.
//!
//! The structures mirror the JSON that `ffprobe -print_format json` emits;
//! the selection functions decide which streams an ingestion actually uses.

use crate::error::{Error, Result};
use serde::Deserialize;

/// Real video codecs eligible to be the primary stream. Cover-art streams
/// (mjpeg, png) embedded in media files are excluded on purpose.
pub const PRIMARY_VIDEO_CODECS: &[&str] = &["h264", "hevc", "vp9", "av1", "mpeg4", "theora"];

/// Audio codecs the MP4 container can carry without surprises.
pub const MP4_AUDIO_CODECS: &[&str] = &["aac", "mp3", "opus", "ac3"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamTags {
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamDisposition {
    #[serde(default)]
    pub forced: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbedStream {
    pub index: usize,
    pub codec_type: String,
    #[serde(default)]
    pub codec_name: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    /// ffprobe reports stream durations as decimal strings
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub tags: Option<StreamTags>,
    #[serde(default)]
    pub disposition: Option<StreamDisposition>,
}

impl ProbedStream {
    pub fn language(&self) -> &str {
        self.tags
            .as_ref()
            .and_then(|t| t.language.as_deref())
            .unwrap_or("und")
    }

    pub fn is_forced(&self) -> bool {
        self.disposition.as_ref().map(|d| d.forced == 1).unwrap_or(false)
    }

    fn codec_in(&self, allow_list: &[&str]) -> bool {
        self.codec_name
            .as_deref()
            .map(|name| allow_list.contains(&name))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbedFormat {
    #[serde(default)]
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub streams: Vec<ProbedStream>,
    #[serde(default)]
    pub format: ProbedFormat,
}

impl MediaInfo {
    /// Source duration in seconds: the primary stream's own duration when
    /// present, else the container-level one.
    pub fn duration_seconds(&self, primary: &ProbedStream) -> f64 {
        primary
            .duration
            .as_deref()
            .or(self.format.duration.as_deref())
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0)
    }
}

/// First video stream with a real playback codec. Absence aborts ingestion.
pub fn select_primary_video(info: &MediaInfo) -> Result<&ProbedStream> {
    info.streams
        .iter()
        .find(|s| s.codec_type == "video" && s.codec_in(PRIMARY_VIDEO_CODECS))
        .ok_or(Error::NoPrimaryVideoStream)
}

/// Position of the primary stream among video-type streams, as used by
/// ffmpeg's `0:v:<n>` selector.
pub fn video_stream_ordinal(info: &MediaInfo, absolute_index: usize) -> usize {
    info.streams
        .iter()
        .filter(|s| s.codec_type == "video")
        .position(|s| s.index == absolute_index)
        .unwrap_or(0)
}

/// All audio streams the output container can carry. An empty result is a
/// warning at the call site, not a failure: the renditions go out silent.
pub fn compatible_audio_streams(info: &MediaInfo) -> Vec<&ProbedStream> {
    info.streams
        .iter()
        .filter(|s| s.codec_type == "audio" && s.codec_in(MP4_AUDIO_CODECS))
        .collect()
}

/// All subtitle streams, in probe order.
pub fn subtitle_streams(info: &MediaInfo) -> Vec<&ProbedStream> {
    info.streams
        .iter()
        .filter(|s| s.codec_type == "subtitle")
        .collect()
}
