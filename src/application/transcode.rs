//! Transcode orchestration: produce every active rendition for one source,
//! upload each as it completes, then extract and upload subtitle tracks.
//!
//! Renditions run strictly sequentially. That bounds local disk and CPU to
//! one encode at a time and keeps the aggregated progress monotonic.

use crate::adapters::fs::ScopedDir;
use crate::domain::encode::output_args;
use crate::domain::ladder::plan_ladder;
use crate::domain::media::{
    compatible_audio_streams, select_primary_video, subtitle_streams, video_stream_ordinal,
};
use crate::domain::subtitles::SubtitleNamer;
use crate::error::{Error, Result};
use crate::ports::media::{MediaProbePort, Progress, TranscodePort};
use crate::ports::storage::{upload_if_absent, ObjectStorePort};
use std::path::{Path, PathBuf};

/// What the coordinator persists after a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeOutcome {
    pub available_resolutions: Vec<i32>,
    pub available_subtitles: Vec<String>,
    pub duration: f64,
}

pub struct Transcoder<P, E, S> {
    probe: P,
    encoder: E,
    storage: S,
    tmp_root: PathBuf,
    video_prefix: String,
}

impl<P, E, S> Transcoder<P, E, S>
where
    P: MediaProbePort,
    E: TranscodePort,
    S: ObjectStorePort,
{
    pub fn new(
        probe: P,
        encoder: E,
        storage: S,
        tmp_root: impl Into<PathBuf>,
        video_prefix: impl Into<String>,
    ) -> Self {
        Self {
            probe,
            encoder,
            storage,
            tmp_root: tmp_root.into(),
            video_prefix: video_prefix.into(),
        }
    }

    /// Transcode `source` into its full rendition ladder under the content
    /// hash's remote prefix. Any rung failing fails the whole run; the
    /// scratch directory is removed on every exit path.
    pub async fn transcode(
        &self,
        source: &Path,
        content_hash: &str,
        on_progress: &Progress<'_>,
    ) -> Result<TranscodeOutcome> {
        let workdir = ScopedDir::create(&self.tmp_root, content_hash).await?;

        let info = self.probe.probe(source).await?;
        let primary = select_primary_video(&info)?;
        let width = primary
            .width
            .ok_or_else(|| Error::Probe("primary video stream missing width".into()))?;
        let height = primary
            .height
            .ok_or_else(|| Error::Probe("primary video stream missing height".into()))?;
        let primary_ordinal = video_stream_ordinal(&info, primary.index);
        let duration = info.duration_seconds(primary);

        let audio = compatible_audio_streams(&info);
        if audio.is_empty() {
            tracing::warn!(content_hash, "no compatible audio streams; renditions will be silent");
        }
        let subs = subtitle_streams(&info);
        if subs.is_empty() {
            tracing::debug!(content_hash, "no subtitle streams to extract");
        }

        let rungs = plan_ladder(width, height);
        let depth = rungs.len();
        tracing::info!(content_hash, width, height, depth, "starting rendition ladder");

        let mut available_resolutions = Vec::with_capacity(depth);
        for (index, rung) in rungs.iter().enumerate() {
            let file_name = format!("_{}p.mp4", rung.height);
            let output = workdir.path().join(&file_name);
            let args = output_args(rung, index, depth, primary_ordinal, &audio, &subs);

            tracing::info!(
                content_hash,
                height = rung.height,
                "encoding rendition {}/{}",
                index + 1,
                depth
            );
            let rung_progress = move |rung_pct: u32| {
                let overall = ((index as f64 + rung_pct as f64 / 100.0) / depth as f64) * 100.0;
                on_progress(overall.round() as u32);
            };
            self.encoder
                .encode(source, &output, &args, &rung_progress)
                .await?;

            let key = format!("{}/{}/{}", self.video_prefix, content_hash, file_name);
            upload_if_absent(&self.storage, &output, &key).await?;
            available_resolutions.push(rung.height as i32);
        }

        let mut available_subtitles = Vec::with_capacity(subs.len());
        let mut namer = SubtitleNamer::new();
        for (ordinal, sub) in subs.iter().enumerate() {
            let stem = namer.next_stem(sub.language(), sub.is_forced());
            let file_name = SubtitleNamer::file_name(&stem);
            let output = workdir.path().join(&file_name);

            self.encoder.extract_subtitle(source, ordinal, &output).await?;

            let key = format!("{}/{}/{}", self.video_prefix, content_hash, file_name);
            upload_if_absent(&self.storage, &output, &key).await?;
            available_subtitles.push(stem);
        }

        Ok(TranscodeOutcome {
            available_resolutions,
            available_subtitles,
            duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::media::MediaInfo;
    use crate::ports::media::{MockMediaProbePort, MockTranscodePort};
    use crate::ports::storage::MockObjectStorePort;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    const HASH: &str = "cafebabe";

    fn probe_returning(value: serde_json::Value) -> MockMediaProbePort {
        let info: MediaInfo = serde_json::from_value(value).unwrap();
        let mut probe = MockMediaProbePort::new();
        probe.expect_probe().times(1).returning(move |_| Ok(info.clone()));
        probe
    }

    fn hd_source() -> serde_json::Value {
        json!({
            "streams": [
                { "index": 0, "codec_type": "video", "codec_name": "h264",
                  "width": 1280, "height": 720, "duration": "60.0" },
                { "index": 1, "codec_type": "audio", "codec_name": "aac" },
            ],
            "format": { "duration": "60.0" }
        })
    }

    fn noop_progress() -> impl Fn(u32) + Send + Sync {
        |_| {}
    }

    #[tokio::test]
    async fn test_hd_source_yields_two_uploaded_renditions() {
        let tmp = tempdir().unwrap();
        let probe = probe_returning(hd_source());

        let mut encoder = MockTranscodePort::new();
        encoder
            .expect_encode()
            .times(2)
            .returning(|_, _, _, _| Ok(()));
        encoder.expect_extract_subtitle().never();

        let mut storage = MockObjectStorePort::new();
        storage.expect_exists().times(2).returning(|_| Ok(false));
        storage
            .expect_upload()
            .times(1)
            .withf(|_, key| key == "vod/cafebabe/_480p.mp4")
            .returning(|_, _| Ok(()));
        storage
            .expect_upload()
            .times(1)
            .withf(|_, key| key == "vod/cafebabe/_720p.mp4")
            .returning(|_, _| Ok(()));

        let transcoder = Transcoder::new(probe, encoder, storage, tmp.path(), "vod");
        let outcome = transcoder
            .transcode(Path::new("/spool/in.mkv"), HASH, &noop_progress())
            .await
            .unwrap();

        assert_eq!(outcome.available_resolutions, vec![480, 720]);
        assert!(outcome.available_subtitles.is_empty());
        assert_eq!(outcome.duration, 60.0);
    }

    #[tokio::test]
    async fn test_top_rung_encodes_at_native_resolution() {
        let tmp = tempdir().unwrap();
        let probe = probe_returning(hd_source());

        let mut encoder = MockTranscodePort::new();
        encoder
            .expect_encode()
            .times(1)
            .withf(|_, output, args, _| {
                output.ends_with("_480p.mp4")
                    && args.contains(&"scale=854:480".to_string())
                    && args.contains(&"main".to_string())
            })
            .returning(|_, _, _, _| Ok(()));
        encoder
            .expect_encode()
            .times(1)
            .withf(|_, output, args, _| {
                output.ends_with("_720p.mp4")
                    && args.contains(&"scale=1280:720".to_string())
                    && args.contains(&"high".to_string())
            })
            .returning(|_, _, _, _| Ok(()));

        let mut storage = MockObjectStorePort::new();
        storage.expect_exists().returning(|_| Ok(false));
        storage.expect_upload().returning(|_, _| Ok(()));

        let transcoder = Transcoder::new(probe, encoder, storage, tmp.path(), "vod");
        transcoder
            .transcode(Path::new("/spool/in.mkv"), HASH, &noop_progress())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_encoder_failure_aborts_remaining_rungs() {
        let tmp = tempdir().unwrap();
        let probe = probe_returning(hd_source());

        let mut encoder = MockTranscodePort::new();
        encoder
            .expect_encode()
            .withf(|_, output, _, _| output.ends_with("_480p.mp4"))
            .returning(|_, _, _, _| Ok(()));
        encoder
            .expect_encode()
            .withf(|_, output, _, _| output.ends_with("_720p.mp4"))
            .returning(|_, _, _, _| Err(Error::EncodeFailure("boom".into())));

        let mut storage = MockObjectStorePort::new();
        storage.expect_exists().times(1).returning(|_| Ok(false));
        // only the rung that finished gets uploaded
        storage.expect_upload().times(1).returning(|_, _| Ok(()));

        let transcoder = Transcoder::new(probe, encoder, storage, tmp.path(), "vod");
        let result = transcoder
            .transcode(Path::new("/spool/in.mkv"), HASH, &noop_progress())
            .await;

        assert!(matches!(result, Err(Error::EncodeFailure(_))));
    }

    #[tokio::test]
    async fn test_source_without_compatible_audio_encodes_video_only() {
        let tmp = tempdir().unwrap();
        let probe = probe_returning(json!({
            "streams": [
                { "index": 0, "codec_type": "video", "codec_name": "h264",
                  "width": 640, "height": 360, "duration": "10.0" },
                { "index": 1, "codec_type": "audio", "codec_name": "dts" },
            ]
        }));

        let mut encoder = MockTranscodePort::new();
        encoder
            .expect_encode()
            .times(1)
            .withf(|_, _, args, _| {
                !args.contains(&"-c:a".to_string()) && args.contains(&"-sn".to_string())
            })
            .returning(|_, _, _, _| Ok(()));

        let mut storage = MockObjectStorePort::new();
        storage.expect_exists().returning(|_| Ok(false));
        storage.expect_upload().returning(|_, _| Ok(()));

        let transcoder = Transcoder::new(probe, encoder, storage, tmp.path(), "vod");
        let outcome = transcoder
            .transcode(Path::new("/spool/in.mkv"), HASH, &noop_progress())
            .await
            .unwrap();

        assert_eq!(outcome.available_resolutions, vec![360]);
    }

    #[tokio::test]
    async fn test_subtitles_extracted_named_and_uploaded() {
        let tmp = tempdir().unwrap();
        let probe = probe_returning(json!({
            "streams": [
                { "index": 0, "codec_type": "video", "codec_name": "h264",
                  "width": 640, "height": 480, "duration": "10.0" },
                { "index": 1, "codec_type": "subtitle", "codec_name": "subrip",
                  "tags": { "language": "en" } },
                { "index": 2, "codec_type": "subtitle", "codec_name": "subrip",
                  "tags": { "language": "en" } },
                { "index": 3, "codec_type": "subtitle", "codec_name": "subrip",
                  "tags": { "language": "en" },
                  "disposition": { "forced": 1 } },
            ]
        }));

        let mut encoder = MockTranscodePort::new();
        encoder.expect_encode().times(1).returning(|_, _, _, _| Ok(()));
        for (ordinal, name) in [(0, "en.vtt"), (1, "en_2.vtt"), (2, "forced-en.vtt")] {
            encoder
                .expect_extract_subtitle()
                .times(1)
                .withf(move |_, o, output| *o == ordinal && output.ends_with(name))
                .returning(|_, _, _| Ok(()));
        }

        let mut storage = MockObjectStorePort::new();
        storage.expect_exists().returning(|_| Ok(false));
        storage.expect_upload().times(4).returning(|_, _| Ok(()));

        let transcoder = Transcoder::new(probe, encoder, storage, tmp.path(), "vod");
        let outcome = transcoder
            .transcode(Path::new("/spool/in.mkv"), HASH, &noop_progress())
            .await
            .unwrap();

        assert_eq!(outcome.available_subtitles, vec!["en", "en_2", "forced-en"]);
    }

    #[tokio::test]
    async fn test_progress_aggregates_across_rungs() {
        let tmp = tempdir().unwrap();
        let probe = probe_returning(hd_source());

        let mut encoder = MockTranscodePort::new();
        encoder.expect_encode().times(2).returning(|_, _, _, cb| {
            cb(50);
            Ok(())
        });

        let mut storage = MockObjectStorePort::new();
        storage.expect_exists().returning(|_| Ok(false));
        storage.expect_upload().returning(|_, _| Ok(()));

        let seen: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let collector = move |pct: u32| sink.lock().unwrap().push(pct);

        let transcoder = Transcoder::new(probe, encoder, storage, tmp.path(), "vod");
        transcoder
            .transcode(Path::new("/spool/in.mkv"), HASH, &collector)
            .await
            .unwrap();

        // halfway through rung 0 of 2 is 25% overall; rung 1 of 2 is 75%
        assert_eq!(*seen.lock().unwrap(), vec![25, 75]);
    }

    #[tokio::test]
    async fn test_already_uploaded_rendition_is_skipped_not_repushed() {
        let tmp = tempdir().unwrap();
        let probe = probe_returning(json!({
            "streams": [
                { "index": 0, "codec_type": "video", "codec_name": "h264",
                  "width": 640, "height": 360, "duration": "10.0" },
            ]
        }));

        let mut encoder = MockTranscodePort::new();
        encoder.expect_encode().times(1).returning(|_, _, _, _| Ok(()));

        let mut storage = MockObjectStorePort::new();
        storage.expect_exists().times(1).returning(|_| Ok(true));
        storage.expect_upload().never();

        let transcoder = Transcoder::new(probe, encoder, storage, tmp.path(), "vod");
        let outcome = transcoder
            .transcode(Path::new("/spool/in.mkv"), HASH, &noop_progress())
            .await
            .unwrap();

        assert_eq!(outcome.available_resolutions, vec![360]);
    }

    #[tokio::test]
    async fn test_source_without_video_stream_fails() {
        let tmp = tempdir().unwrap();
        let probe = probe_returning(json!({
            "streams": [
                { "index": 0, "codec_type": "audio", "codec_name": "aac" },
            ]
        }));

        let mut encoder = MockTranscodePort::new();
        encoder.expect_encode().never();
        let mut storage = MockObjectStorePort::new();
        storage.expect_upload().never();

        let transcoder = Transcoder::new(probe, encoder, storage, tmp.path(), "vod");
        let result = transcoder
            .transcode(Path::new("/spool/in.mkv"), HASH, &noop_progress())
            .await;

        assert!(matches!(result, Err(Error::NoPrimaryVideoStream)));
    }
}
