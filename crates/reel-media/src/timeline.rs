//! Timeline assembly: duration-matched clips and concatenation.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use reel_models::{EncodingConfig, Segment};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{filter_caption, filter_concat, filter_normalize};
use crate::mixer::loop_count;
use crate::probe::probe_media;
use crate::scratch::ScratchDir;

/// A produced visual clip for one segment.
#[derive(Debug, Clone)]
pub struct SegmentClip {
    /// Index of the segment this clip was cut for.
    pub index: usize,
    /// Clip file inside the scratch directory.
    pub path: PathBuf,
    /// Clip duration; equals the segment duration exactly.
    pub duration: f64,
}

/// Total visual-track duration for a set of clip durations plus the
/// trailing pad.
pub fn expected_track_duration(clip_durations: &[f64], pad_secs: f64) -> f64 {
    clip_durations.iter().sum::<f64>() + pad_secs
}

/// Cut one duration-matched, resolution-normalized clip for a segment.
///
/// Footage longer than the narration window is trimmed to `[0, duration]`;
/// shorter footage is looped until coverage reaches the window, then
/// trimmed to exactly the window. Captions are burned in when requested;
/// a caption failure (typically no usable font) falls back to the
/// uncaptioned clip rather than dropping the segment.
pub async fn create_segment_clip(
    scratch: &ScratchDir,
    segment: &Segment,
    source: &Path,
    add_subtitles: bool,
    encoding: &EncodingConfig,
) -> MediaResult<SegmentClip> {
    let target_secs = segment.duration();
    let output = scratch.path(format!("clip_{:03}.mp4", segment.index));

    let source_info = probe_media(source).await?;
    if !source_info.has_video {
        return Err(MediaError::InvalidMedia(format!(
            "footage for segment {} has no video stream",
            segment.index
        )));
    }

    let loops = loop_count(source_info.duration, target_secs);
    info!(
        segment = segment.index,
        source_secs = source_info.duration,
        target_secs,
        loops,
        "Creating segment clip"
    );

    let caption = (add_subtitles && !segment.text.trim().is_empty())
        .then(|| filter_caption(segment.text.trim()));

    if let Some(caption) = caption {
        let filter = format!("{},{}", filter_normalize(), caption);
        match run_clip_encode(source, &output, loops, target_secs, &filter, encoding).await {
            Ok(()) => {
                return Ok(SegmentClip {
                    index: segment.index,
                    path: output,
                    duration: target_secs,
                })
            }
            Err(e) => {
                warn!(
                    segment = segment.index,
                    "Caption rendering failed, producing uncaptioned clip: {}",
                    e.detail()
                );
            }
        }
    }

    run_clip_encode(source, &output, loops, target_secs, &filter_normalize(), encoding).await?;

    Ok(SegmentClip {
        index: segment.index,
        path: output,
        duration: target_secs,
    })
}

async fn run_clip_encode(
    source: &Path,
    output: &Path,
    loops: u32,
    target_secs: f64,
    filter: &str,
    encoding: &EncodingConfig,
) -> MediaResult<()> {
    let mut cmd = FfmpegCommand::new(output).input(source);
    if loops > 0 {
        cmd = cmd.stream_loop(loops);
    }
    let cmd = cmd
        .video_filter(filter)
        .no_audio()
        .output_args(encoding.video_args())
        .limit_duration(target_secs);

    FfmpegRunner::new().run(&cmd).await
}

/// Concatenate clips, in order, into one continuous visual track with a
/// trailing pad cloning the last frame.
///
/// Returns the track path and its total duration (sum of clip durations
/// plus the pad; clips were cut to exact durations so no probing is
/// needed).
pub async fn assemble_track(
    scratch: &ScratchDir,
    clips: &[SegmentClip],
    pad_secs: f64,
    encoding: &EncodingConfig,
) -> MediaResult<(PathBuf, f64)> {
    if clips.is_empty() {
        return Err(MediaError::InvalidMedia(
            "no clips to assemble".to_string(),
        ));
    }

    let output = scratch.path("track.mp4");
    let durations: Vec<f64> = clips.iter().map(|c| c.duration).collect();
    let total = expected_track_duration(&durations, pad_secs);

    info!(
        clips = clips.len(),
        total_secs = total,
        "Assembling visual track"
    );

    let mut cmd = FfmpegCommand::new(&output);
    for clip in clips {
        cmd = cmd.input(&clip.path);
    }
    let cmd = cmd
        .filter_complex(filter_concat(clips.len(), pad_secs))
        .map("[vout]")
        .no_audio()
        .output_args(encoding.video_args());

    FfmpegRunner::new().run(&cmd).await?;

    Ok((output, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_track_duration() {
        let total = expected_track_duration(&[3.0, 3.0, 1.5], 2.0);
        assert!((total - 9.5).abs() < 1e-9);
    }

    #[test]
    fn test_expected_track_duration_no_pad() {
        let total = expected_track_duration(&[2.5], 0.0);
        assert!((total - 2.5).abs() < 1e-9);
    }
}
