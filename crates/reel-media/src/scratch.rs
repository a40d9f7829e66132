//! Per-render scratch directory lifecycle.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::MediaResult;

/// A temporary, per-render filesystem area holding downloaded and
/// intermediate assets.
///
/// The directory is keyed by the render-task id so concurrent renders of
/// different tasks never collide. `cleanup` must run on every exit path;
/// its failures are logged only and never mask the render result.
#[derive(Debug)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    /// Create (or reuse) the scratch directory for a render task.
    ///
    /// Reuse keeps retried renders idempotent: already-downloaded assets
    /// in the directory are picked up instead of re-fetched.
    pub async fn create(work_dir: impl AsRef<Path>, task_id: &str) -> MediaResult<Self> {
        let root = work_dir.as_ref().join(format!("render-{task_id}"));
        fs::create_dir_all(&root).await?;
        debug!("Created scratch directory {}", root.display());
        Ok(Self { root })
    }

    /// Scratch directory root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a named artifact inside the scratch directory.
    pub fn path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.root.join(name)
    }

    /// Delete every file in the scratch directory, then remove the
    /// directory if and only if it ended up empty.
    ///
    /// Failures are logged, never returned: by the time cleanup runs the
    /// render outcome is already recorded and must not be overwritten.
    pub async fn cleanup(&self) {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    "Failed to list scratch directory {}: {}",
                    self.root.display(),
                    e
                );
                return;
            }
        };

        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    let is_file = entry
                        .file_type()
                        .await
                        .map(|t| t.is_file())
                        .unwrap_or(false);
                    if !is_file {
                        continue;
                    }
                    if let Err(e) = fs::remove_file(&path).await {
                        warn!("Failed to remove scratch file {}: {}", path.display(), e);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Error walking scratch directory: {}", e);
                    break;
                }
            }
        }

        // Removal only succeeds when the directory is empty; anything left
        // behind (e.g. an unexpected subdirectory) keeps it in place.
        match fs::remove_dir(&self.root).await {
            Ok(()) => debug!("Removed scratch directory {}", self.root.display()),
            Err(e) => debug!(
                "Leaving scratch directory {} in place: {}",
                self.root.display(),
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_and_cleanup_removes_everything() {
        let work = TempDir::new().unwrap();
        let scratch = ScratchDir::create(work.path(), "task-1").await.unwrap();

        fs::write(scratch.path("segment_0.mp4"), b"a").await.unwrap();
        fs::write(scratch.path("mixed.m4a"), b"b").await.unwrap();

        scratch.cleanup().await;

        assert!(!scratch.root().exists());
    }

    #[tokio::test]
    async fn test_cleanup_keeps_nonempty_directory() {
        let work = TempDir::new().unwrap();
        let scratch = ScratchDir::create(work.path(), "task-2").await.unwrap();

        fs::create_dir(scratch.path("leftover")).await.unwrap();
        fs::write(scratch.path("clip.mp4"), b"a").await.unwrap();

        scratch.cleanup().await;

        // File removed, but the foreign subdirectory keeps the root alive.
        assert!(!scratch.path("clip.mp4").exists());
        assert!(scratch.root().exists());
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let work = TempDir::new().unwrap();
        let first = ScratchDir::create(work.path(), "task-3").await.unwrap();
        fs::write(first.path("asset.mp4"), b"a").await.unwrap();

        let second = ScratchDir::create(work.path(), "task-3").await.unwrap();
        assert!(second.path("asset.mp4").exists());
    }

    #[tokio::test]
    async fn test_distinct_tasks_get_distinct_roots() {
        let work = TempDir::new().unwrap();
        let a = ScratchDir::create(work.path(), "task-a").await.unwrap();
        let b = ScratchDir::create(work.path(), "task-b").await.unwrap();
        assert_ne!(a.root(), b.root());
    }
}
