//! ffprobe / ffmpeg subprocess adapters.
//!
//! The encoder is driven as a child process; progress comes from parsing
//! the `time=` ticker on stderr against the `Duration:` header ffmpeg
//! prints for the input.

use crate::domain::media::MediaInfo;
use crate::error::{Error, Result};
use crate::ports::media::{MediaProbePort, Progress, TranscodePort};
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// How many trailing stderr lines to keep for the failure message.
const STDERR_TAIL: usize = 12;

#[derive(Clone, Copy, Default)]
pub struct FfprobeAdapter;

impl FfprobeAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaProbePort for FfprobeAdapter {
    async fn probe(&self, path: &Path) -> Result<MediaInfo> {
        let output = Command::new("ffprobe")
            .arg("-v")
            .arg("error")
            .arg("-show_format")
            .arg("-show_streams")
            .arg("-print_format")
            .arg("json")
            .arg(path)
            .output()
            .await?;

        if !output.status.success() {
            return Err(Error::Probe(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::Probe(format!("unreadable ffprobe output: {}", e)))
    }
}

#[derive(Clone, Copy, Default)]
pub struct FfmpegAdapter;

impl FfmpegAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TranscodePort for FfmpegAdapter {
    async fn encode<'cb>(
        &self,
        input: &Path,
        output: &Path,
        output_args: &[String],
        on_progress: &Progress<'cb>,
    ) -> Result<()> {
        let mut child = Command::new("ffmpeg")
            .arg("-y")
            .arg("-i")
            .arg(input)
            .args(output_args)
            .arg(output)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut tail: Vec<String> = Vec::new();
        let mut duration_secs: Option<f64> = None;

        // stderr is consumed to EOF before waiting, so the callback can stay
        // a plain borrow instead of moving into a task.
        if let Some(stderr) = child.stderr.take() {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if duration_secs.is_none() {
                    if let Some(total) = parse_duration_line(&line) {
                        duration_secs = Some(total);
                    }
                }
                if let Some(total) = duration_secs {
                    if let Some(current) = parse_progress_time(&line) {
                        let percent = ((current / total) * 100.0).clamp(0.0, 100.0);
                        on_progress(percent.round() as u32);
                    }
                }

                tail.push(line);
                if tail.len() > STDERR_TAIL {
                    tail.remove(0);
                }
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(Error::EncodeFailure(format!(
                "ffmpeg exited with {}: {}",
                status.code().unwrap_or(-1),
                tail.join("\n")
            )));
        }

        on_progress(100);
        Ok(())
    }

    async fn extract_subtitle(&self, input: &Path, ordinal: usize, output: &Path) -> Result<()> {
        let result = Command::new("ffmpeg")
            .arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-map")
            .arg(format!("0:s:{}?", ordinal))
            .arg("-c:s")
            .arg("webvtt")
            .arg(output)
            .output()
            .await?;

        if !result.status.success() {
            return Err(Error::EncodeFailure(format!(
                "subtitle extraction for track {} failed: {}",
                ordinal,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// `  Duration: 00:01:02.34, start: ...` → total seconds.
fn parse_duration_line(line: &str) -> Option<f64> {
    let re = Regex::new(r"Duration:\s*(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").ok()?;
    parse_hms(&re, line)
}

/// `frame= 1234 ... time=00:00:41.36 bitrate=...` → seconds elapsed.
fn parse_progress_time(line: &str) -> Option<f64> {
    let re = Regex::new(r"time=\s*(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").ok()?;
    parse_hms(&re, line)
}

fn parse_hms(re: &Regex, line: &str) -> Option<f64> {
    let caps = re.captures(line)?;
    let hours: f64 = caps[1].parse().ok()?;
    let minutes: f64 = caps[2].parse().ok()?;
    let seconds: f64 = caps[3].parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}
