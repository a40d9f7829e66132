//! Render pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use reel_models::EncodingConfig;

/// Render pipeline configuration.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Work directory for per-task scratch directories
    pub work_dir: PathBuf,
    /// Directory the finished MP4 is moved into
    pub output_dir: PathBuf,
    /// Maximum concurrent asset downloads per render
    pub max_download_parallel: usize,
    /// Timeout for a single asset download
    pub download_timeout: Duration,
    /// Trailing pad appended to the visual track, seconds
    pub trailing_pad_secs: f64,
    /// Fixed voice-over alignment offset, seconds (0 disables)
    pub voice_offset_secs: f64,
    /// Output encoding profile
    pub encoding: EncodingConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/reel"),
            output_dir: PathBuf::from("output"),
            max_download_parallel: 4,
            download_timeout: Duration::from_secs(60),
            trailing_pad_secs: 2.0,
            voice_offset_secs: 0.0,
            encoding: EncodingConfig::default(),
        }
    }
}

impl RenderConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("REEL_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/reel")),
            output_dir: std::env::var("REEL_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("output")),
            max_download_parallel: std::env::var("REEL_MAX_DOWNLOAD_PARALLEL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(4),
            download_timeout: Duration::from_secs(
                std::env::var("REEL_DOWNLOAD_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            trailing_pad_secs: std::env::var("REEL_TRAILING_PAD_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2.0),
            voice_offset_secs: std::env::var("REEL_VOICE_OFFSET_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.0),
            encoding: EncodingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RenderConfig::default();
        assert_eq!(config.max_download_parallel, 4);
        assert_eq!(config.trailing_pad_secs, 2.0);
        assert_eq!(config.voice_offset_secs, 0.0);
    }
}
