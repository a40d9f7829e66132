//! Structured render-task logging.
//!
//! Every log line carries the task and project IDs so interleaved
//! concurrent renders stay attributable.

use tracing::{error, info, warn, Span};

use reel_models::TaskId;

/// Task-scoped logger with consistent formatting.
#[derive(Debug, Clone)]
pub struct TaskLogger {
    task_id: String,
    project_id: String,
}

impl TaskLogger {
    /// Create a logger for one render task.
    pub fn new(task_id: &TaskId, project_id: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            project_id: project_id.to_string(),
        }
    }

    /// Log the start of a pipeline phase.
    pub fn phase(&self, phase: &str) {
        info!(
            task_id = %self.task_id,
            project_id = %self.project_id,
            "Render phase: {}", phase
        );
    }

    pub fn info(&self, message: &str) {
        info!(
            task_id = %self.task_id,
            project_id = %self.project_id,
            "{}", message
        );
    }

    pub fn warning(&self, message: &str) {
        warn!(
            task_id = %self.task_id,
            project_id = %self.project_id,
            "{}", message
        );
    }

    pub fn error(&self, message: &str) {
        error!(
            task_id = %self.task_id,
            project_id = %self.project_id,
            "{}", message
        );
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Tracing span covering the whole render run.
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "render",
            task_id = %self.task_id,
            project_id = %self.project_id
        )
    }
}
