//! Audio mixing with automatic music ducking.
//!
//! The final audio track is the voice-over at full level plus background
//! music whose gain follows a ducking envelope: quiet while narration is
//! active, louder in the gaps, with short linear fades between the two
//! levels so there are no hard volume cuts.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use reel_models::EncodingConfig;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::filters::filter_afade_out;
use crate::probe::probe_duration;
use crate::scratch::ScratchDir;

/// Music level outside narration.
pub const DEFAULT_MUSIC_VOLUME: f64 = 0.7;
/// Music level while narration is active.
pub const DUCKED_MUSIC_VOLUME: f64 = 0.2;
/// Width of the linear fade between the two levels, seconds.
pub const DUCK_FADE_SECS: f64 = 0.3;
/// Music fade-out applied at the tail of the track, seconds.
pub const MUSIC_TAIL_FADE_SECS: f64 = 2.0;

/// Merge narration intervals into a minimal disjoint, time-sorted set.
///
/// Overlapping or touching intervals collapse into one. Merging an
/// already-merged set returns the same set.
pub fn merge_intervals(mut intervals: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    intervals.retain(|(s, e)| e > s);
    intervals.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut merged: Vec<(f64, f64)> = Vec::with_capacity(intervals.len());
    for (start, end) in intervals {
        match merged.last_mut() {
            Some((_, current_end)) if start <= *current_end => {
                *current_end = current_end.max(end);
            }
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// The ducking schedule: disjoint narration intervals plus the volume
/// levels and fade width. Queried as `volume(t)` and rendered to an FFmpeg
/// volume expression evaluated per frame.
#[derive(Debug, Clone)]
pub struct DuckingEnvelope {
    intervals: Vec<(f64, f64)>,
    default_volume: f64,
    ducked_volume: f64,
    fade_secs: f64,
}

impl DuckingEnvelope {
    /// Build an envelope from raw narration intervals (merged internally).
    pub fn new(intervals: Vec<(f64, f64)>) -> Self {
        Self {
            intervals: merge_intervals(intervals),
            default_volume: DEFAULT_MUSIC_VOLUME,
            ducked_volume: DUCKED_MUSIC_VOLUME,
            fade_secs: DUCK_FADE_SECS,
        }
    }

    /// Override the volume levels and fade width.
    pub fn with_levels(mut self, default_volume: f64, ducked_volume: f64, fade_secs: f64) -> Self {
        self.default_volume = default_volume;
        self.ducked_volume = ducked_volume;
        self.fade_secs = fade_secs;
        self
    }

    /// Merged narration intervals backing this envelope.
    pub fn intervals(&self) -> &[(f64, f64)] {
        &self.intervals
    }

    /// Music gain at time `t`.
    ///
    /// Per interval the gain is the ducked level plus the level span scaled
    /// by the clamped distance outside the interval, in fade widths; the
    /// envelope is the minimum over all intervals. Piecewise linear and
    /// continuous everywhere.
    pub fn volume(&self, t: f64) -> f64 {
        let span = self.default_volume - self.ducked_volume;
        self.intervals
            .iter()
            .map(|&(start, end)| {
                let outside = (start - t).max(t - end);
                let ratio = (outside / self.fade_secs).clamp(0.0, 1.0);
                self.ducked_volume + span * ratio
            })
            .fold(self.default_volume, f64::min)
    }

    /// Render `volume(t)` as an FFmpeg expression (for `volume=...:eval=frame`).
    pub fn to_expr(&self) -> String {
        let span = self.default_volume - self.ducked_volume;
        let mut expr = format!("{:.4}", self.default_volume);
        for &(start, end) in &self.intervals {
            expr = format!(
                "min({expr},{ducked:.4}+{span:.4}*min(1,max(0,max({start:.4}-t,t-{end:.4})/{fade:.4})))",
                ducked = self.ducked_volume,
                fade = self.fade_secs,
            );
        }
        expr
    }
}

/// How many extra repeats (`-stream_loop` value) a source of `source_secs`
/// needs so total coverage reaches `target_secs`.
pub fn loop_count(source_secs: f64, target_secs: f64) -> u32 {
    if source_secs <= 0.0 || source_secs >= target_secs {
        return 0;
    }
    (target_secs / source_secs).ceil() as u32 - 1
}

/// Parameters for one mix invocation.
#[derive(Debug, Clone)]
pub struct MixParams {
    /// Total duration of the assembled visual track, seconds.
    pub track_duration: f64,
    /// Fixed voice-over alignment offset: positive delays the voice,
    /// negative trims its head. Compensates encoder-specific mux latency.
    pub voice_offset_secs: f64,
}

/// Mix the final audio track into `mixed.m4a` inside the scratch directory.
///
/// Voice-over plays at full level. Music, when present, is looped to cover
/// the track, trimmed to exactly the track duration, shaped by the ducking
/// envelope and faded out over the last two seconds. Every music-side
/// failure degrades to voice-only audio; only a voice-side failure is fatal.
pub async fn mix_audio(
    scratch: &ScratchDir,
    voice: &Path,
    music: Option<&Path>,
    envelope: &DuckingEnvelope,
    params: &MixParams,
    encoding: &EncodingConfig,
) -> MediaResult<PathBuf> {
    let output = scratch.path("mixed.m4a");

    if let Some(music) = music {
        match mix_with_music(voice, music, &output, envelope, params, encoding).await {
            Ok(()) => return Ok(output),
            Err(e) => {
                warn!(
                    "Music mix failed, continuing with voice-over only: {}",
                    e.detail()
                );
            }
        }
    }

    mix_voice_only(voice, &output, params, encoding).await?;
    Ok(output)
}

/// Chain applied to the voice input to realize the alignment offset.
fn voice_chain(offset_secs: f64) -> String {
    if offset_secs > 0.0 {
        let ms = (offset_secs * 1000.0).round() as i64;
        format!("adelay={ms}:all=1")
    } else if offset_secs < 0.0 {
        format!("atrim=start={:.3},asetpts=PTS-STARTPTS", -offset_secs)
    } else {
        "anull".to_string()
    }
}

async fn mix_with_music(
    voice: &Path,
    music: &Path,
    output: &Path,
    envelope: &DuckingEnvelope,
    params: &MixParams,
    encoding: &EncodingConfig,
) -> MediaResult<()> {
    let duration = params.track_duration;
    let music_secs = probe_duration(music).await?;
    let loops = loop_count(music_secs, duration);

    info!(
        "Mixing audio: voice + music ({:.1}s source, {} extra loops, {:.1}s track, {} duck intervals)",
        music_secs,
        loops,
        duration,
        envelope.intervals().len()
    );

    let graph = format!(
        "[0:a]{voice}[vo];\
         [1:a]atrim=0:{d:.3},volume='{expr}':eval=frame,{fade}[bg];\
         [vo][bg]amix=inputs=2:duration=longest:dropout_transition=0:normalize=0,atrim=0:{d:.3}[aout]",
        voice = voice_chain(params.voice_offset_secs),
        d = duration,
        expr = envelope.to_expr(),
        fade = filter_afade_out(
            (duration - MUSIC_TAIL_FADE_SECS).max(0.0),
            MUSIC_TAIL_FADE_SECS
        ),
    );

    let mut cmd = FfmpegCommand::new(output).input(voice).input(music);
    if loops > 0 {
        cmd = cmd.stream_loop(loops);
    }
    let cmd = cmd
        .filter_complex(graph)
        .map("[aout]")
        .no_video()
        .output_args(encoding.audio_args())
        .limit_duration(duration);

    FfmpegRunner::new().run(&cmd).await
}

async fn mix_voice_only(
    voice: &Path,
    output: &Path,
    params: &MixParams,
    encoding: &EncodingConfig,
) -> MediaResult<()> {
    info!("Mixing audio: voice-over only ({:.1}s track)", params.track_duration);

    let graph = format!("[0:a]{}[aout]", voice_chain(params.voice_offset_secs));

    let cmd = FfmpegCommand::new(output)
        .input(voice)
        .filter_complex(graph)
        .map("[aout]")
        .no_video()
        .output_args(encoding.audio_args())
        .limit_duration(params.track_duration);

    FfmpegRunner::new().run(&cmd).await
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_merge_overlapping_intervals() {
        let merged = merge_intervals(vec![(0.0, 3.0), (2.0, 5.0), (7.0, 8.0)]);
        assert_eq!(merged, vec![(0.0, 5.0), (7.0, 8.0)]);
    }

    #[test]
    fn test_merge_touching_intervals() {
        let merged = merge_intervals(vec![(0.0, 3.0), (3.0, 6.0)]);
        assert_eq!(merged, vec![(0.0, 6.0)]);
    }

    #[test]
    fn test_merge_unsorted_input() {
        let merged = merge_intervals(vec![(7.0, 8.0), (0.0, 3.0), (2.5, 4.0)]);
        assert_eq!(merged, vec![(0.0, 4.0), (7.0, 8.0)]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let once = merge_intervals(vec![(0.0, 3.0), (2.0, 5.0), (7.0, 9.0)]);
        let twice = merge_intervals(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_drops_degenerate_intervals() {
        let merged = merge_intervals(vec![(1.0, 1.0), (2.0, 1.5), (3.0, 4.0)]);
        assert_eq!(merged, vec![(3.0, 4.0)]);
    }

    #[test]
    fn test_envelope_levels() {
        let env = DuckingEnvelope::new(vec![(2.0, 5.0), (8.0, 10.0)]);

        // Strictly inside, beyond the fade margin
        assert!((env.volume(3.5) - DUCKED_MUSIC_VOLUME).abs() < EPS);
        assert!((env.volume(9.0) - DUCKED_MUSIC_VOLUME).abs() < EPS);

        // More than a fade width outside all intervals
        assert!((env.volume(0.5) - DEFAULT_MUSIC_VOLUME).abs() < EPS);
        assert!((env.volume(6.5) - DEFAULT_MUSIC_VOLUME).abs() < EPS);
        assert!((env.volume(20.0) - DEFAULT_MUSIC_VOLUME).abs() < EPS);
    }

    #[test]
    fn test_envelope_fade_is_linear() {
        let env = DuckingEnvelope::new(vec![(2.0, 5.0)]);
        // Halfway through the entry fade
        let mid = env.volume(2.0 - DUCK_FADE_SECS / 2.0);
        let expected = (DEFAULT_MUSIC_VOLUME + DUCKED_MUSIC_VOLUME) / 2.0;
        assert!((mid - expected).abs() < EPS);
    }

    #[test]
    fn test_envelope_continuous_at_boundaries() {
        let env = DuckingEnvelope::new(vec![(2.0, 5.0)]);
        let step = 1e-6;
        for boundary in [
            2.0 - DUCK_FADE_SECS,
            2.0,
            5.0,
            5.0 + DUCK_FADE_SECS,
        ] {
            let before = env.volume(boundary - step);
            let after = env.volume(boundary + step);
            assert!(
                (before - after).abs() < 1e-4,
                "discontinuity at t={boundary}: {before} vs {after}"
            );
        }
    }

    #[test]
    fn test_envelope_continuous_between_close_intervals() {
        // Gap narrower than two fade widths; the min over intervals must
        // still be continuous and never rise above the default level.
        let env = DuckingEnvelope::new(vec![(0.0, 2.0), (2.4, 4.0)]);
        let mut prev = env.volume(1.9);
        let mut t = 1.9;
        while t < 2.5 {
            t += 0.01;
            let v = env.volume(t);
            assert!(v <= DEFAULT_MUSIC_VOLUME + EPS);
            assert!((v - prev).abs() < 0.05, "jump at t={t}");
            prev = v;
        }
    }

    #[test]
    fn test_envelope_without_intervals_is_flat() {
        let env = DuckingEnvelope::new(vec![]);
        assert!((env.volume(0.0) - DEFAULT_MUSIC_VOLUME).abs() < EPS);
        assert_eq!(env.to_expr(), format!("{DEFAULT_MUSIC_VOLUME:.4}"));
    }

    #[test]
    fn test_expr_mentions_every_interval() {
        let env = DuckingEnvelope::new(vec![(0.0, 3.0), (5.0, 6.0)]);
        let expr = env.to_expr();
        assert_eq!(expr.matches("min(").count(), 4); // outer fold + inner clamp, per interval
        assert!(expr.contains("t-3.0000"));
        assert!(expr.contains("5.0000-t"));
    }

    #[test]
    fn test_loop_count_music_shorter_than_track() {
        // 4s music under a 6s track: one extra loop covers 8s >= 6s,
        // then the mix trims to exactly 6s.
        assert_eq!(loop_count(4.0, 6.0), 1);
    }

    #[test]
    fn test_loop_count_music_covers_track() {
        assert_eq!(loop_count(10.0, 6.0), 0);
        assert_eq!(loop_count(6.0, 6.0), 0);
    }

    #[test]
    fn test_loop_count_many_repeats() {
        let loops = loop_count(1.5, 10.0);
        assert_eq!(loops, 6); // 7 plays, 10.5s coverage
        assert!(1.5 * f64::from(loops + 1) >= 10.0);
    }

    #[test]
    fn test_voice_chain_offsets() {
        assert_eq!(voice_chain(0.0), "anull");
        assert_eq!(voice_chain(1.5), "adelay=1500:all=1");
        assert_eq!(voice_chain(-2.0), "atrim=start=2.000,asetpts=PTS-STARTPTS");
    }
}
