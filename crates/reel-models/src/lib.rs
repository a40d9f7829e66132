//! Shared data models for the Storyreel render pipeline.
//!
//! This crate defines the value types that cross crate boundaries:
//! narration segments, render requests, and the render-task state machine.

pub mod encoding;
pub mod error;
pub mod options;
pub mod render_task;
pub mod segment;

pub use encoding::{EncodingConfig, OUTPUT_FPS, OUTPUT_HEIGHT, OUTPUT_WIDTH};
pub use error::ModelError;
pub use options::{MediaSource, RenderOptions, RenderRequest};
pub use render_task::{RenderStatus, RenderTask, StateError, TaskId};
pub use segment::{sort_by_start, Segment};
