//! The render pipeline.
//!
//! Drives one render task through its four phases: fetch assets, assemble
//! the visual track, mix audio, encode and place the output. Every state
//! transition is written through to the task repository as it happens,
//! and the scratch directory is cleaned up on every exit path.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{warn, Instrument};

use reel_media::{
    assemble_track, create_segment_clip, encode_output, mix_audio, move_output, DuckingEnvelope,
    MixParams, ScratchDir, SegmentClip,
};
use reel_models::{sort_by_start, RenderRequest, RenderTask, Segment};

use crate::config::RenderConfig;
use crate::error::{RenderError, RenderResult};
use crate::fetcher::{AssetFetcher, FetchedAssets};
use crate::logging::TaskLogger;
use crate::repository::RenderTaskRepository;

/// Progress checkpoints, reported at phase boundaries.
const PROGRESS_FETCHED: u8 = 50;
const PROGRESS_ASSEMBLED: u8 = 80;
const PROGRESS_MIXED: u8 = 90;

/// Optional observer for progress checkpoints.
pub type ProgressSink = Arc<dyn Fn(u8) + Send + Sync>;

/// Shared dependencies of every render run.
pub struct RenderContext {
    pub config: RenderConfig,
    pub repository: Arc<dyn RenderTaskRepository>,
}

/// Executes render tasks.
pub struct RenderPipeline {
    ctx: Arc<RenderContext>,
    fetcher: AssetFetcher,
    progress_sink: Option<ProgressSink>,
}

impl RenderPipeline {
    pub fn new(ctx: Arc<RenderContext>) -> RenderResult<Self> {
        let fetcher = AssetFetcher::new(
            ctx.config.max_download_parallel,
            ctx.config.download_timeout,
        )?;
        Ok(Self {
            ctx,
            fetcher,
            progress_sink: None,
        })
    }

    /// Attach an observer that receives each progress checkpoint.
    pub fn with_progress_sink(mut self, sink: ProgressSink) -> Self {
        self.progress_sink = Some(sink);
        self
    }

    /// Run one render to a terminal state.
    ///
    /// On success the task is `Complete` and the returned path points at
    /// the final MP4 in the output directory. On failure the task is
    /// `Failed` with a human-readable message. Either way the scratch
    /// directory has been cleaned up before this returns.
    pub async fn run(&self, mut task: RenderTask, request: RenderRequest) -> RenderResult<PathBuf> {
        let logger = TaskLogger::new(&task.id, &request.project_id);

        task.start_processing()?;
        self.persist(&task, &logger).await;

        let result = self
            .run_phases(&mut task, &request, &logger)
            .instrument(logger.span())
            .await;

        match result {
            Ok(output) => {
                task.complete(output.display().to_string())?;
                self.persist(&task, &logger).await;
                logger.info(&format!("Render complete: {}", output.display()));
                Ok(output)
            }
            Err(e) => {
                let detail = e.detail();
                logger.error(&format!("Render failed: {detail}"));
                task.fail(detail);
                self.persist(&task, &logger).await;
                Err(e)
            }
        }
    }

    async fn run_phases(
        &self,
        task: &mut RenderTask,
        request: &RenderRequest,
        logger: &TaskLogger,
    ) -> RenderResult<PathBuf> {
        let segments = validated_segments(request)?;

        let scratch = ScratchDir::create(&self.ctx.config.work_dir, task.id.as_str()).await?;
        let result = self
            .run_phases_in_scratch(task, request, &segments, &scratch, logger)
            .await;
        scratch.cleanup().await;
        result
    }

    async fn run_phases_in_scratch(
        &self,
        task: &mut RenderTask,
        request: &RenderRequest,
        segments: &[Segment],
        scratch: &ScratchDir,
        logger: &TaskLogger,
    ) -> RenderResult<PathBuf> {
        let config = &self.ctx.config;

        logger.phase("fetch");
        let assets = self
            .fetcher
            .fetch_all(
                scratch,
                segments,
                &request.voice_over,
                request.music.as_ref(),
            )
            .await?;
        self.report(task, PROGRESS_FETCHED, logger).await;

        logger.phase("assemble");
        let clips = self
            .cut_clips(scratch, segments, &assets, request, logger)
            .await?;
        let (track, track_duration) =
            assemble_track(scratch, &clips, config.trailing_pad_secs, &config.encoding).await?;
        self.report(task, PROGRESS_ASSEMBLED, logger).await;

        logger.phase("mix");
        let audio = if request.options.include_audio {
            let intervals = segments
                .iter()
                .map(|s| (s.start_time, s.end_time))
                .collect();
            let envelope = DuckingEnvelope::new(intervals);
            let params = MixParams {
                track_duration,
                voice_offset_secs: config.voice_offset_secs,
            };
            Some(
                mix_audio(
                    scratch,
                    &assets.voice,
                    assets.music.as_deref(),
                    &envelope,
                    &params,
                    &config.encoding,
                )
                .await?,
            )
        } else {
            logger.info("Audio disabled, producing silent video");
            None
        };
        self.report(task, PROGRESS_MIXED, logger).await;

        logger.phase("encode");
        let staged = scratch.path("final.mp4");
        encode_output(&track, audio.as_deref(), &staged).await?;

        let output = config.output_dir.join(output_file_name(&request.project_id));
        move_output(&staged, &output).await?;
        Ok(output)
    }

    /// Cut one clip per segment that has footage, in timeline order.
    ///
    /// A clip failure drops that segment with a warning; losing every
    /// segment aborts the render.
    async fn cut_clips(
        &self,
        scratch: &ScratchDir,
        segments: &[Segment],
        assets: &FetchedAssets,
        request: &RenderRequest,
        logger: &TaskLogger,
    ) -> RenderResult<Vec<SegmentClip>> {
        let mut clips = Vec::new();
        for segment in segments {
            let Some(source) = assets.footage.get(&segment.index) else {
                continue;
            };
            match create_segment_clip(
                scratch,
                segment,
                source,
                request.options.add_subtitles,
                &self.ctx.config.encoding,
            )
            .await
            {
                Ok(clip) => clips.push(clip),
                Err(e) => {
                    logger.warning(&format!(
                        "Skipping segment {}: clip creation failed: {}",
                        segment.index,
                        e.detail()
                    ));
                }
            }
        }

        if clips.is_empty() {
            return Err(RenderError::NoClips);
        }
        Ok(clips)
    }

    /// Record a progress checkpoint on the task, write it through and
    /// notify the sink.
    async fn report(&self, task: &mut RenderTask, progress: u8, logger: &TaskLogger) {
        if let Err(e) = task.update_progress(progress) {
            warn!(task_id = %task.id, "Progress update rejected: {e}");
            return;
        }
        self.persist(task, logger).await;
        if let Some(sink) = &self.progress_sink {
            sink(progress);
        }
    }

    /// Write the task through to the repository.
    ///
    /// Persistence failures are logged, not propagated: a flaky store must
    /// not abort a render that is otherwise producing output.
    async fn persist(&self, task: &RenderTask, logger: &TaskLogger) {
        if let Err(e) = self.ctx.repository.update(task).await {
            logger.warning(&format!("Failed to persist task state: {e}"));
        }
    }
}

/// Validate and order the request's segments.
///
/// Indices must be unique: they key both the download destinations and
/// the fetched-footage map, so a collision would collapse two segments
/// into one.
fn validated_segments(request: &RenderRequest) -> RenderResult<Vec<Segment>> {
    if request.segments.is_empty() {
        return Err(RenderError::InvalidRequest(
            "request contains no segments".to_string(),
        ));
    }
    let mut seen = std::collections::HashSet::new();
    for segment in &request.segments {
        segment
            .validate()
            .map_err(RenderError::InvalidRequest)?;
        if !seen.insert(segment.index) {
            return Err(RenderError::InvalidRequest(format!(
                "duplicate segment index {}",
                segment.index
            )));
        }
    }
    let mut segments = request.segments.clone();
    sort_by_start(&mut segments);
    Ok(segments)
}

/// Output file name: `{project_id}_{timestamp}.mp4`.
fn output_file_name(project_id: &str) -> String {
    format!("{}_{}.mp4", project_id, Utc::now().format("%Y%m%d_%H%M%S"))
}
