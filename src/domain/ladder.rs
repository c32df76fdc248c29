//! Adaptive-bitrate ladder planning.
//!
//! A fixed base ladder of target heights carries predefined bitrate pairs;
//! how many rungs apply depends on the source's native height, and the top
//! active rung always keeps the source's exact dimensions so the
//! "original quality" rendition loses nothing to rounding.

/// One output quality level: resolution plus video/audio bitrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rung {
    pub width: u32,
    pub height: u32,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
}

/// (height, video kbps, audio kbps), ascending quality.
const BASE_LADDER: [(u32, u32, u32); 5] = [
    (480, 1400, 128),
    (720, 2800, 160),
    (1080, 5000, 192),
    (1440, 8000, 256),  // 2K
    (2160, 12000, 320), // 4K
];

/// Number of ladder rungs a source of this height justifies.
pub fn ladder_depth(source_height: u32) -> usize {
    if source_height >= 2160 {
        5
    } else if source_height >= 1440 {
        4
    } else if source_height >= 1080 {
        3
    } else if source_height >= 720 {
        2
    } else {
        1
    }
}

/// Compute the active rungs for a source, ascending quality order.
///
/// Widths follow the source aspect ratio, bumped to the next even integer
/// (4:2:0 chroma subsampling requires even dimensions). The last rung is
/// overridden to the source's native width and height.
pub fn plan_ladder(source_width: u32, source_height: u32) -> Vec<Rung> {
    let aspect = source_width as f64 / source_height as f64;
    let depth = ladder_depth(source_height);

    let mut rungs: Vec<Rung> = BASE_LADDER
        .iter()
        .take(depth)
        .map(|&(height, vbr, abr)| {
            let mut width = (height as f64 * aspect).round() as u32;
            if width % 2 != 0 {
                width += 1;
            }
            Rung {
                width,
                height,
                video_bitrate_kbps: vbr,
                audio_bitrate_kbps: abr,
            }
        })
        .collect();

    if let Some(top) = rungs.last_mut() {
        top.width = source_width;
        top.height = source_height;
    }

    rungs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_thresholds() {
        assert_eq!(ladder_depth(360), 1);
        assert_eq!(ladder_depth(480), 1);
        assert_eq!(ladder_depth(719), 1);
        assert_eq!(ladder_depth(720), 2);
        assert_eq!(ladder_depth(1080), 3);
        assert_eq!(ladder_depth(1440), 4);
        assert_eq!(ladder_depth(2160), 5);
        assert_eq!(ladder_depth(4320), 5);
    }

    #[test]
    fn test_depth_monotonic_and_bounded() {
        let mut previous = 0;
        for height in (0..5000).step_by(8) {
            let depth = ladder_depth(height);
            assert!((1..=5).contains(&depth));
            assert!(depth >= previous, "depth regressed at height {}", height);
            previous = depth;
        }
    }

    #[test]
    fn test_uhd_source_gets_full_ladder_with_native_top() {
        let rungs = plan_ladder(3840, 2160);
        assert_eq!(rungs.len(), 5);
        let heights: Vec<u32> = rungs.iter().map(|r| r.height).collect();
        assert_eq!(heights, vec![480, 720, 1080, 1440, 2160]);

        let top = rungs.last().unwrap();
        assert_eq!((top.width, top.height), (3840, 2160));
        assert_eq!(top.video_bitrate_kbps, 12000);
        assert_eq!(top.audio_bitrate_kbps, 320);
    }

    #[test]
    fn test_computed_widths_are_even() {
        // awkward aspect ratios that round to odd widths; the top rung is
        // exempt because it carries the source's native dimensions
        for (w, h) in [(1279u32, 720u32), (683, 1080), (1999, 1441), (3841, 2161)] {
            let rungs = plan_ladder(w, h);
            for rung in &rungs[..rungs.len() - 1] {
                assert_eq!(
                    rung.width % 2,
                    0,
                    "odd width for {}x{} at height {}",
                    w,
                    h,
                    rung.height
                );
            }
        }
    }

    #[test]
    fn test_sub_ladder_source_keeps_native_dimensions() {
        // A 640x360 source sits below the lowest base rung; the single
        // active rung is overridden to the native size.
        let rungs = plan_ladder(640, 360);
        assert_eq!(rungs.len(), 1);
        assert_eq!((rungs[0].width, rungs[0].height), (640, 360));
        assert_eq!(rungs[0].video_bitrate_kbps, 1400);
    }

    #[test]
    fn test_intermediate_rungs_follow_aspect_ratio() {
        let rungs = plan_ladder(1920, 1080);
        assert_eq!(rungs.len(), 3);
        assert_eq!((rungs[0].width, rungs[0].height), (854, 480));
        assert_eq!((rungs[1].width, rungs[1].height), (1280, 720));
        // top rung: native, not recomputed
        assert_eq!((rungs[2].width, rungs[2].height), (1920, 1080));
    }
}
