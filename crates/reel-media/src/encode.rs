//! Final output encoding and artifact placement.

use std::path::Path;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Mux the assembled visual track and mixed audio into the final MP4.
///
/// Both inputs were already encoded to the output profile (H.264 at 24 fps,
/// AAC), so this is a stream-copy mux. `audio == None` produces a silent
/// video.
pub async fn encode_output(
    visual: &Path,
    audio: Option<&Path>,
    output: &Path,
) -> MediaResult<()> {
    info!(
        "Encoding output: {} (+{}) -> {}",
        visual.display(),
        audio.map(|a| a.display().to_string()).unwrap_or_else(|| "silent".into()),
        output.display()
    );

    let cmd = match audio {
        Some(audio) => FfmpegCommand::new(output)
            .input(visual)
            .input(audio)
            .map("0:v")
            .map("1:a")
            .output_args(["-c:v", "copy", "-c:a", "copy", "-shortest"])
            .output_args(["-movflags", "+faststart"]),
        None => FfmpegCommand::new(output)
            .input(visual)
            .map("0:v")
            .no_audio()
            .output_args(["-c:v", "copy"])
            .output_args(["-movflags", "+faststart"]),
    };

    FfmpegRunner::new().run(&cmd).await
}

/// Move the finished artifact out of the scratch directory, handling
/// cross-device moves.
///
/// A plain rename is attempted first; on EXDEV the file is copied to a
/// temp name on the destination filesystem and renamed into place.
pub async fn move_output(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            debug!(
                "Cross-device rename detected, falling back to copy+delete: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Check if an IO error is EXDEV (cross-device link).
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    // Copy to a temp file next to dst so the final rename is atomic on the
    // destination filesystem.
    let tmp_dst = dst.with_extension("tmp");

    fs::copy(src, &tmp_dst).await?;

    if let Err(e) = fs::rename(&tmp_dst, dst).await {
        let _ = fs::remove_file(&tmp_dst).await;
        return Err(MediaError::from(e));
    }

    if let Err(e) = fs::remove_file(src).await {
        warn!(
            "Failed to remove source file after cross-device move: {}: {}",
            src.display(),
            e
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_output_same_filesystem() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("final.mp4");
        let dst = dir.path().join("out").join("final.mp4");

        fs::write(&src, b"video bytes").await.unwrap();
        move_output(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"video bytes");
    }

    #[tokio::test]
    async fn test_move_output_overwrites_destination() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("new.mp4");
        let dst = dir.path().join("old.mp4");

        fs::write(&src, b"new").await.unwrap();
        fs::write(&dst, b"old").await.unwrap();

        move_output(&src, &dst).await.unwrap();
        assert_eq!(fs::read(&dst).await.unwrap(), b"new");
    }

    #[test]
    fn test_is_cross_device_error() {
        assert!(is_cross_device_error(&std::io::Error::from_raw_os_error(18)));
        assert!(!is_cross_device_error(&std::io::Error::from_raw_os_error(2)));
    }
}
