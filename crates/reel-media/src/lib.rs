#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for the Storyreel render pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building (multi-input) and execution
//! - Progress parsing from `-progress pipe:2`
//! - Timeline assembly (duration-matched clips, captions, concatenation)
//! - Audio mixing with automatic music ducking
//! - Final MP4 encoding and scratch-directory lifecycle

pub mod command;
pub mod encode;
pub mod error;
pub mod filters;
pub mod mixer;
pub mod probe;
pub mod progress;
pub mod scratch;
pub mod timeline;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use encode::{encode_output, move_output};
pub use error::{MediaError, MediaResult};
pub use mixer::{loop_count, merge_intervals, mix_audio, DuckingEnvelope, MixParams};
pub use probe::{probe_duration, probe_media, MediaInfo};
pub use progress::FfmpegProgress;
pub use scratch::ScratchDir;
pub use timeline::{assemble_track, create_segment_clip, expected_track_duration, SegmentClip};
