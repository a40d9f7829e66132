//! Storyreel render pipeline.
//!
//! Turns a narrated-video render request (timed narration segments with
//! footage URLs, a voice-over and optional music) into a finished MP4:
//! - Concurrent asset fetching with per-segment failure tolerance
//! - Timeline assembly with trim/loop duration matching and captions
//! - Auto-ducked audio mixing
//! - Task lifecycle with write-through persistence and guaranteed
//!   scratch cleanup

pub mod config;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod pipeline;
pub mod repository;
pub mod worker;

pub use config::RenderConfig;
pub use error::{RenderError, RenderResult, StoreError};
pub use fetcher::{AssetFetcher, FetchedAssets};
pub use logging::TaskLogger;
pub use pipeline::{ProgressSink, RenderContext, RenderPipeline};
pub use repository::{InMemoryTaskStore, RenderTaskRepository};
pub use worker::spawn_render;
