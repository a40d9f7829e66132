//! Render task lifecycle state machine.
//!
//! A `RenderTask` tracks one render invocation from submission to its
//! terminal state. The pipeline is the single writer for the duration of a
//! run; every transition is written through to a repository immediately so
//! pollers see near-real-time status.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a render task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a new random task ID.
    pub fn new() -> Self {
        Self(format!("task-{}", Uuid::new_v4()))
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Render task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum RenderStatus {
    /// Task created, waiting for the pipeline to pick it up.
    #[default]
    Pending,
    /// Pipeline is actively rendering.
    Processing,
    /// Render finished; output path recorded.
    Complete,
    /// Render aborted; error message recorded.
    Failed,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::Pending => "pending",
            RenderStatus::Processing => "processing",
            RenderStatus::Complete => "complete",
            RenderStatus::Failed => "failed",
        }
    }

    /// Terminal states accept no further transitions except `fail`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RenderStatus::Complete | RenderStatus::Failed)
    }
}

impl fmt::Display for RenderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejected state-machine transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("Cannot {action} a task in {from} state")]
    InvalidTransition {
        from: RenderStatus,
        action: &'static str,
    },
}

/// The unit of work and persisted lifecycle for one render execution.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RenderTask {
    /// Unique task ID.
    pub id: TaskId,
    /// Project this render belongs to.
    pub project_id: String,
    /// Current lifecycle state.
    pub status: RenderStatus,
    /// Progress percentage (0-100), reported at phase boundaries.
    pub progress: u8,
    /// Path to the rendered output, set on completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    /// Error message, set on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// When the task was last updated.
    pub updated_at: DateTime<Utc>,
}

impl RenderTask {
    /// Create a new pending task for a project.
    pub fn new(project_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            project_id: project_id.into(),
            status: RenderStatus::Pending,
            progress: 0,
            output_path: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move the task from `Pending` to `Processing`.
    ///
    /// Resets progress and clears any error left over from a previous
    /// repository record. Rejected once the task is terminal.
    pub fn start_processing(&mut self) -> Result<(), StateError> {
        if self.status != RenderStatus::Pending {
            return Err(StateError::InvalidTransition {
                from: self.status,
                action: "start processing",
            });
        }
        self.status = RenderStatus::Processing;
        self.progress = 0;
        self.error = None;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Update progress while processing. Values above 100 are clamped.
    pub fn update_progress(&mut self, progress: u8) -> Result<(), StateError> {
        if self.status != RenderStatus::Processing {
            return Err(StateError::InvalidTransition {
                from: self.status,
                action: "update progress of",
            });
        }
        self.progress = progress.min(100);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark the task complete with the output location. Terminal.
    pub fn complete(&mut self, output_path: impl Into<String>) -> Result<(), StateError> {
        if self.status.is_terminal() {
            return Err(StateError::InvalidTransition {
                from: self.status,
                action: "complete",
            });
        }
        self.status = RenderStatus::Complete;
        self.progress = 100;
        self.output_path = Some(output_path.into());
        self.error = None;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark the task failed with a human-readable message. Terminal.
    ///
    /// Allowed from any state so a crash after completion can still be
    /// surfaced to pollers.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = RenderStatus::Failed;
        self.error = Some(error.into());
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_is_pending() {
        let task = RenderTask::new("proj-1");
        assert_eq!(task.status, RenderStatus::Pending);
        assert_eq!(task.progress, 0);
        assert!(!task.is_terminal());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut task = RenderTask::new("proj-1");
        task.start_processing().unwrap();
        assert_eq!(task.status, RenderStatus::Processing);

        task.update_progress(50).unwrap();
        assert_eq!(task.progress, 50);

        task.complete("/out/final.mp4").unwrap();
        assert_eq!(task.status, RenderStatus::Complete);
        assert_eq!(task.progress, 100);
        assert_eq!(task.output_path.as_deref(), Some("/out/final.mp4"));
        assert!(task.error.is_none());
        assert!(task.is_terminal());
    }

    #[test]
    fn test_progress_rejected_before_start() {
        let mut task = RenderTask::new("proj-1");
        assert!(task.update_progress(10).is_err());
        assert_eq!(task.progress, 0);
    }

    #[test]
    fn test_progress_clamped() {
        let mut task = RenderTask::new("proj-1");
        task.start_processing().unwrap();
        task.update_progress(250).unwrap();
        assert_eq!(task.progress, 100);
    }

    #[test]
    fn test_terminal_states_reject_restart() {
        let mut task = RenderTask::new("proj-1");
        task.start_processing().unwrap();
        task.complete("/out/a.mp4").unwrap();

        assert!(task.start_processing().is_err());
        assert!(task.update_progress(1).is_err());
        assert!(task.complete("/out/b.mp4").is_err());
    }

    #[test]
    fn test_complete_allowed_from_pending() {
        // Degenerate but legal: complete from any non-terminal state.
        let mut task = RenderTask::new("proj-1");
        task.complete("/out/a.mp4").unwrap();
        assert_eq!(task.status, RenderStatus::Complete);
    }

    #[test]
    fn test_fail_allowed_from_any_state() {
        let mut task = RenderTask::new("proj-1");
        task.fail("early failure");
        assert_eq!(task.status, RenderStatus::Failed);

        let mut task = RenderTask::new("proj-1");
        task.start_processing().unwrap();
        task.complete("/out/a.mp4").unwrap();
        task.fail("post-completion crash");
        assert_eq!(task.status, RenderStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("post-completion crash"));
    }

    #[test]
    fn test_start_clears_previous_error() {
        let mut task = RenderTask::new("proj-1");
        task.error = Some("stale".into());
        task.start_processing().unwrap();
        assert!(task.error.is_none());
        assert_eq!(task.progress, 0);
    }
}
