//! Output encoding configuration.
//!
//! The pipeline produces one fixed output profile: MP4 container, H.264
//! video, AAC audio, 24 fps, 1920x1080. The knobs here exist so embedders
//! can trade encode speed for quality, not to change the profile.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default video codec (H.264).
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec.
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset.
pub const DEFAULT_PRESET: &str = "fast";
/// Default CRF (quality, 0-51, lower is better).
pub const DEFAULT_CRF: u8 = 23;
/// Default audio bitrate.
pub const DEFAULT_AUDIO_BITRATE: &str = "192k";

/// Output frame rate.
pub const OUTPUT_FPS: u32 = 24;
/// Output frame width.
pub const OUTPUT_WIDTH: u32 = 1920;
/// Output frame height.
pub const OUTPUT_HEIGHT: u32 = 1080;

/// Encoding configuration for clip and output encodes.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264").
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "fast", "medium", "slow").
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor.
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Audio codec.
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate.
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
        }
    }
}

impl EncodingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Video encoder arguments for FFmpeg.
    pub fn video_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-r".to_string(),
            OUTPUT_FPS.to_string(),
        ]
    }

    /// Audio encoder arguments for FFmpeg.
    pub fn audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EncodingConfig::default();
        assert_eq!(config.codec, "libx264");
        assert_eq!(config.audio_codec, "aac");
    }

    #[test]
    fn test_video_args_fix_frame_rate() {
        let args = EncodingConfig::default().video_args();
        assert!(args.contains(&"-crf".to_string()));
        let r_pos = args.iter().position(|a| a == "-r").unwrap();
        assert_eq!(args[r_pos + 1], "24");
    }
}
