//! Model validation errors.

use thiserror::Error;

/// Errors produced when validating inputs at the ingestion boundary.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Invalid segment {index}: {message}")]
    InvalidSegment { index: usize, message: String },

    #[error("Invalid media source: {0}")]
    InvalidSource(String),
}

impl ModelError {
    pub fn invalid_segment(index: usize, message: impl Into<String>) -> Self {
        Self::InvalidSegment {
            index,
            message: message.into(),
        }
    }
}
