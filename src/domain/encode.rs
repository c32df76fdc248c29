//! Encoder parameter construction for one rendition.
//!
//! Pure functions of the rung and the selected streams; no side effects.
//! The top (last) rung gets the high-fidelity profile/CRF pair, everything
//! below it the standard pair.

use super::ladder::Rung;
use super::media::ProbedStream;

pub const VIDEO_CODEC: &str = "h264";
pub const PROFILE_HIGH: &str = "high";
pub const PROFILE_STANDARD: &str = "main";
pub const CRF_HIGH: u32 = 18;
pub const CRF_STANDARD: u32 = 24;

fn push(args: &mut Vec<String>, flag: &str, value: impl ToString) {
    args.push(flag.to_string());
    args.push(value.to_string());
}

/// Video options for one rung. `primary_video_ordinal` is the stream's
/// position among video streams (ffmpeg's `0:v:<n>` selector).
pub fn video_args(rung: &Rung, index: usize, depth: usize, primary_video_ordinal: usize) -> Vec<String> {
    let is_top_rung = index == depth - 1;
    let mut args = Vec::new();

    push(&mut args, "-c:v", VIDEO_CODEC);
    push(
        &mut args,
        "-profile:v",
        if is_top_rung { PROFILE_HIGH } else { PROFILE_STANDARD },
    );
    push(&mut args, "-map", format!("0:v:{}", primary_video_ordinal));
    push(&mut args, "-vf", format!("scale={}:{}", rung.width, rung.height));
    // 4:2:0 for broad decoder compatibility
    push(&mut args, "-pix_fmt", "yuv420p");
    push(&mut args, "-crf", if is_top_rung { CRF_HIGH } else { CRF_STANDARD });
    push(&mut args, "-maxrate", format!("{}k", rung.video_bitrate_kbps));
    push(&mut args, "-bufsize", format!("{}k", rung.video_bitrate_kbps));

    args
}

/// Audio options: remux everything compatible to stereo AAC at the rung's
/// bitrate, or nothing at all when no compatible stream exists.
pub fn audio_args(audio_streams: &[&ProbedStream], rung: &Rung) -> Vec<String> {
    let mut args = Vec::new();
    if !audio_streams.is_empty() {
        push(&mut args, "-map", "0:a");
        push(&mut args, "-c:a", "aac");
        push(&mut args, "-ac", 2);
        push(&mut args, "-b:a", format!("{}k", rung.audio_bitrate_kbps));
    }
    args
}

/// Subtitle options: soft subtitles as mov_text when any stream exists,
/// otherwise an explicit `-sn` so nothing leaks into the output.
pub fn subtitle_args(subtitle_streams: &[&ProbedStream]) -> Vec<String> {
    let mut args = Vec::new();
    if subtitle_streams.is_empty() {
        args.push("-sn".to_string());
    } else {
        push(&mut args, "-map", "0:s");
        push(&mut args, "-c:s", "mov_text");
    }
    args
}

/// The full ordered output-parameter list for one rendition.
pub fn output_args(
    rung: &Rung,
    index: usize,
    depth: usize,
    primary_video_ordinal: usize,
    audio_streams: &[&ProbedStream],
    subtitle_streams: &[&ProbedStream],
) -> Vec<String> {
    let mut args = video_args(rung, index, depth, primary_video_ordinal);
    args.extend(audio_args(audio_streams, rung));
    args.extend(subtitle_args(subtitle_streams));
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::media::MediaInfo;
    use serde_json::json;

    fn rung() -> Rung {
        Rung {
            width: 1280,
            height: 720,
            video_bitrate_kbps: 2800,
            audio_bitrate_kbps: 160,
        }
    }

    fn info_with_audio_and_subs() -> MediaInfo {
        serde_json::from_value(json!({
            "streams": [
                { "index": 0, "codec_type": "video", "codec_name": "h264" },
                { "index": 1, "codec_type": "audio", "codec_name": "aac" },
                { "index": 2, "codec_type": "subtitle", "codec_name": "subrip" },
            ]
        }))
        .unwrap()
    }

    fn pairs(args: &[String]) -> Vec<(String, String)> {
        args.chunks(2)
            .filter(|c| c.len() == 2)
            .map(|c| (c[0].clone(), c[1].clone()))
            .collect()
    }

    #[test]
    fn test_top_rung_uses_high_preset() {
        let args = video_args(&rung(), 2, 3, 0);
        let pairs = pairs(&args);
        assert!(pairs.contains(&("-profile:v".into(), "high".into())));
        assert!(pairs.contains(&("-crf".into(), "18".into())));
    }

    #[test]
    fn test_lower_rungs_use_standard_preset() {
        let args = video_args(&rung(), 1, 3, 0);
        let pairs = pairs(&args);
        assert!(pairs.contains(&("-profile:v".into(), "main".into())));
        assert!(pairs.contains(&("-crf".into(), "24".into())));
        assert!(pairs.contains(&("-vf".into(), "scale=1280:720".into())));
        assert!(pairs.contains(&("-pix_fmt".into(), "yuv420p".into())));
        assert!(pairs.contains(&("-maxrate".into(), "2800k".into())));
        assert!(pairs.contains(&("-bufsize".into(), "2800k".into())));
    }

    #[test]
    fn test_single_rung_ladder_is_its_own_top() {
        let args = video_args(&rung(), 0, 1, 0);
        assert!(pairs(&args).contains(&("-profile:v".into(), "high".into())));
    }

    #[test]
    fn test_video_map_uses_ordinal() {
        let args = video_args(&rung(), 0, 1, 1);
        assert!(pairs(&args).contains(&("-map".into(), "0:v:1".into())));
    }

    #[test]
    fn test_no_compatible_audio_omits_audio_entirely() {
        let args = audio_args(&[], &rung());
        assert!(args.is_empty());

        let info = info_with_audio_and_subs();
        let full = output_args(&rung(), 0, 1, 0, &[], &crate::domain::media::subtitle_streams(&info));
        assert!(!full.iter().any(|a| a == "-c:a"));
        assert!(!full.iter().any(|a| a == "0:a"));
    }

    #[test]
    fn test_audio_present_remuxes_to_stereo_aac() {
        let info = info_with_audio_and_subs();
        let audio = crate::domain::media::compatible_audio_streams(&info);
        let args = audio_args(&audio, &rung());
        let pairs = pairs(&args);
        assert!(pairs.contains(&("-map".into(), "0:a".into())));
        assert!(pairs.contains(&("-c:a".into(), "aac".into())));
        assert!(pairs.contains(&("-ac".into(), "2".into())));
        assert!(pairs.contains(&("-b:a".into(), "160k".into())));
    }

    #[test]
    fn test_subtitles_soft_or_suppressed() {
        let info = info_with_audio_and_subs();
        let subs = crate::domain::media::subtitle_streams(&info);
        let with = subtitle_args(&subs);
        assert!(pairs(&with).contains(&("-c:s".into(), "mov_text".into())));

        let without = subtitle_args(&[]);
        assert_eq!(without, vec!["-sn".to_string()]);
    }

    #[test]
    fn test_output_args_order_video_audio_subtitles() {
        let info = info_with_audio_and_subs();
        let audio = crate::domain::media::compatible_audio_streams(&info);
        let subs = crate::domain::media::subtitle_streams(&info);
        let args = output_args(&rung(), 0, 1, 0, &audio, &subs);

        let cv = args.iter().position(|a| a == "-c:v").unwrap();
        let ca = args.iter().position(|a| a == "-c:a").unwrap();
        let cs = args.iter().position(|a| a == "-c:s").unwrap();
        assert!(cv < ca && ca < cs);
    }
}
