//! Render request payloads.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

use crate::error::ModelError;
use crate::segment::Segment;

/// A media input that is either already on disk or fetched over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaSource {
    /// Local file path; must exist before the render starts.
    Path(PathBuf),
    /// Remote URL, downloaded into the render's scratch directory.
    Url(String),
}

impl MediaSource {
    /// Classify a raw reference: `http(s)` schemes become URLs, anything
    /// else is treated as a local path.
    pub fn parse(reference: impl AsRef<str>) -> Result<Self, ModelError> {
        let reference = reference.as_ref().trim();
        if reference.is_empty() {
            return Err(ModelError::InvalidSource("empty reference".into()));
        }
        if reference.starts_with("http://") || reference.starts_with("https://") {
            Url::parse(reference)
                .map_err(|e| ModelError::InvalidSource(format!("{reference}: {e}")))?;
            return Ok(Self::Url(reference.to_string()));
        }
        Ok(Self::Path(PathBuf::from(reference)))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Url(_))
    }
}

/// Render behavior flags.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct RenderOptions {
    /// Burn narration text into each clip as a caption.
    #[serde(default = "default_true")]
    pub add_subtitles: bool,
    /// Mix background music under the voice-over.
    #[serde(default = "default_true")]
    pub include_audio: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            add_subtitles: true,
            include_audio: true,
        }
    }
}

/// Everything the pipeline needs to produce one video.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RenderRequest {
    /// Project the output belongs to (used in the output file name).
    pub project_id: String,
    /// Narration segments; validated and sorted by the pipeline.
    pub segments: Vec<Segment>,
    /// Voice-over track.
    pub voice_over: MediaSource,
    /// Optional background music.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music: Option<MediaSource>,
    /// Behavior flags.
    #[serde(default)]
    pub options: RenderOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url_source() {
        let src = MediaSource::parse("https://cdn.example.com/music.mp3").unwrap();
        assert!(src.is_remote());
    }

    #[test]
    fn test_parse_path_source() {
        let src = MediaSource::parse("/data/voice.mp3").unwrap();
        assert_eq!(src, MediaSource::Path(PathBuf::from("/data/voice.mp3")));
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(MediaSource::parse("  ").is_err());
    }

    #[test]
    fn test_parse_rejects_malformed_url() {
        assert!(MediaSource::parse("http://[bad").is_err());
    }

    #[test]
    fn test_options_default_on() {
        let opts = RenderOptions::default();
        assert!(opts.add_subtitles);
        assert!(opts.include_audio);
    }
}
