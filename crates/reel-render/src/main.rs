//! Render worker binary.
//!
//! Reads a render request from a JSON file, runs it to completion and
//! prints the output location. Status pollers are served by embedding the
//! library; this binary is the standalone path.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_media::{check_ffmpeg, check_ffprobe};
use reel_models::{RenderRequest, RenderTask};
use reel_render::{InMemoryTaskStore, RenderConfig, RenderContext, RenderPipeline};

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::from_default_env()
        .add_directive("reel=info".parse().expect("valid directive"));
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(true)
                .with_target(true)
                .with_file(false)
                .with_line_number(false),
        )
        .with(env_filter)
        .init();

    let Some(request_path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        eprintln!("usage: reel-render <request.json>");
        return ExitCode::FAILURE;
    };

    if let Err(e) = check_ffmpeg().and_then(|_| check_ffprobe()) {
        error!("Startup check failed: {e}");
        return ExitCode::FAILURE;
    }

    let request: RenderRequest = match load_request(&request_path) {
        Ok(request) => request,
        Err(e) => {
            error!(
                "Failed to load render request {}: {e}",
                request_path.display()
            );
            return ExitCode::FAILURE;
        }
    };

    let config = RenderConfig::from_env();
    info!("Render config: {:?}", config);

    let ctx = Arc::new(RenderContext {
        config,
        repository: InMemoryTaskStore::shared(),
    });

    let task = RenderTask::new(request.project_id.clone());
    if let Err(e) = ctx.repository.create(&task).await {
        error!("Failed to register task: {e}");
        return ExitCode::FAILURE;
    }

    let pipeline = match RenderPipeline::new(Arc::clone(&ctx)) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("Failed to build pipeline: {e}");
            return ExitCode::FAILURE;
        }
    };

    match pipeline.run(task, request).await {
        Ok(output) => {
            info!("Rendered {}", output.display());
            println!("{}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Render failed: {}", e.detail());
            ExitCode::FAILURE
        }
    }
}

fn load_request(path: &std::path::Path) -> Result<RenderRequest, String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    serde_json::from_slice(&bytes).map_err(|e| e.to_string())
}
