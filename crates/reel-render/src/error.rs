//! Render pipeline error types.

use reel_media::MediaError;
use reel_models::{ModelError, StateError};
use thiserror::Error;

/// Errors that abort a render.
///
/// Per-segment download and clip failures are tolerated inside the
/// pipeline and never surface here; these variants are the fatal ones
/// that mark the task `Failed`.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("No footage could be downloaded for any segment")]
    NoFootage,

    #[error("No segment clips could be produced")]
    NoClips,

    #[error("Voice-over audio is unavailable: {0}")]
    VoiceOverUnavailable(String),

    #[error("Download failed for {url}: {message}")]
    DownloadFailed { url: String, message: String },

    #[error("Invalid render request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("Task store error: {0}")]
    Store(#[from] StoreError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Human-readable failure message for the task record, including
    /// encoder stderr when the failure came out of FFmpeg.
    pub fn detail(&self) -> String {
        match self {
            RenderError::Media(e) => e.detail(),
            other => other.to_string(),
        }
    }
}

/// Task repository errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task already exists: {0}")]
    AlreadyExists(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

pub type RenderResult<T> = Result<T, RenderError>;
