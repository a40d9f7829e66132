//! Narration segment value type.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// A timed unit of narration text paired with a footage reference.
///
/// Segments are immutable once handed to the pipeline. Timing is expressed
/// in seconds from the start of the voice-over track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Segment {
    /// Position of this segment in the narration (stable across sorting).
    pub index: usize,

    /// Narration text; empty text disables the caption for this segment.
    #[serde(default)]
    pub text: String,

    /// Start of the narration window, seconds, >= 0.
    pub start_time: f64,

    /// End of the narration window, seconds, > start_time.
    pub end_time: f64,

    /// Footage to show during this window. Absent means the segment is
    /// skipped during asset fetch with a warning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footage_url: Option<String>,
}

impl Segment {
    /// Build a validated segment, rejecting malformed timing early.
    pub fn new(
        index: usize,
        text: impl Into<String>,
        start_time: f64,
        end_time: f64,
        footage_url: Option<String>,
    ) -> Result<Self, ModelError> {
        let segment = Self {
            index,
            text: text.into(),
            start_time,
            end_time,
            footage_url: footage_url.filter(|u| !u.trim().is_empty()),
        };
        segment
            .validate()
            .map_err(|msg| ModelError::invalid_segment(index, msg))?;
        Ok(segment)
    }

    /// Validate timing invariants.
    pub fn validate(&self) -> Result<(), String> {
        if !self.start_time.is_finite() || !self.end_time.is_finite() {
            return Err("segment times must be finite".to_string());
        }
        if self.start_time < 0.0 {
            return Err(format!("start_time must be >= 0, got {}", self.start_time));
        }
        if self.end_time <= self.start_time {
            return Err(format!(
                "end_time ({}) must be after start_time ({})",
                self.end_time, self.start_time
            ));
        }
        Ok(())
    }

    /// Narration window length in seconds. Always > 0 for a valid segment.
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Whether this segment carries a usable footage reference.
    pub fn has_footage(&self) -> bool {
        self.footage_url
            .as_deref()
            .is_some_and(|u| !u.trim().is_empty())
    }
}

/// Sort a working set of segments by start time, index as tie-breaker.
pub fn sort_by_start(segments: &mut [Segment]) {
    segments.sort_by(|a, b| {
        a.start_time
            .partial_cmp(&b.start_time)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.index.cmp(&b.index))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_duration() {
        let s = Segment::new(0, "hello", 1.5, 4.0, None).unwrap();
        assert!((s.duration() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_reversed_times() {
        assert!(Segment::new(0, "x", 4.0, 1.5, None).is_err());
        assert!(Segment::new(0, "x", 4.0, 4.0, None).is_err());
    }

    #[test]
    fn test_rejects_negative_start() {
        assert!(Segment::new(0, "x", -0.5, 1.0, None).is_err());
    }

    #[test]
    fn test_rejects_non_finite_times() {
        assert!(Segment::new(0, "x", f64::NAN, 1.0, None).is_err());
        assert!(Segment::new(0, "x", 0.0, f64::INFINITY, None).is_err());
    }

    #[test]
    fn test_blank_footage_url_treated_as_absent() {
        let s = Segment::new(0, "x", 0.0, 1.0, Some("   ".into())).unwrap();
        assert!(!s.has_footage());
        let s = Segment::new(0, "x", 0.0, 1.0, Some("https://a/b.mp4".into())).unwrap();
        assert!(s.has_footage());
    }

    #[test]
    fn test_sort_by_start() {
        let mut segments = vec![
            Segment::new(2, "c", 6.0, 9.0, None).unwrap(),
            Segment::new(0, "a", 0.0, 3.0, None).unwrap(),
            Segment::new(1, "b", 3.0, 6.0, None).unwrap(),
        ];
        sort_by_start(&mut segments);
        let order: Vec<usize> = segments.iter().map(|s| s.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }
}
