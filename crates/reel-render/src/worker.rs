//! Background render execution.
//!
//! Submitting a render registers a pending task and spawns the pipeline
//! onto the runtime; the returned task is the handle callers poll through
//! the repository. The pipeline records its own terminal state, so the
//! spawned future's error is already persisted by the time it surfaces
//! here.

use std::sync::Arc;

use tracing::debug;

use reel_models::{RenderRequest, RenderTask};

use crate::error::RenderResult;
use crate::pipeline::{RenderContext, RenderPipeline};

/// Register a render task and start it in the background.
///
/// Returns the pending task immediately. Concurrent submissions for the
/// same project run independently; each gets its own task and scratch
/// directory.
pub async fn spawn_render(
    ctx: Arc<RenderContext>,
    request: RenderRequest,
) -> RenderResult<RenderTask> {
    let task = RenderTask::new(request.project_id.clone());
    ctx.repository.create(&task).await?;

    let pipeline = RenderPipeline::new(Arc::clone(&ctx))?;
    let running = task.clone();
    tokio::spawn(async move {
        if let Err(e) = pipeline.run(running, request).await {
            debug!("Background render ended in failure: {e}");
        }
    });

    Ok(task)
}
