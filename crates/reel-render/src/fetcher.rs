//! Concurrent asset acquisition.
//!
//! All remote assets for a render are fetched into the scratch directory
//! before any FFmpeg work starts. Segment footage downloads fan out with
//! bounded parallelism; a failed segment download is tolerated (the
//! segment is skipped downstream) but zero usable footage or a missing
//! voice-over aborts the render. Music is best-effort.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use reel_media::ScratchDir;
use reel_models::{MediaSource, Segment};

use crate::error::{RenderError, RenderResult};

/// Local paths of everything the assembly and mix phases consume.
#[derive(Debug)]
pub struct FetchedAssets {
    /// Segment index -> downloaded footage file. Segments whose download
    /// failed (or that declared no footage) are absent.
    pub footage: HashMap<usize, PathBuf>,
    /// Voice-over file. Always present; its absence is fatal.
    pub voice: PathBuf,
    /// Background music file, if configured and reachable.
    pub music: Option<PathBuf>,
}

/// Downloads render assets over HTTP with bounded parallelism.
pub struct AssetFetcher {
    client: reqwest::Client,
    max_parallel: usize,
}

impl AssetFetcher {
    pub fn new(max_parallel: usize, timeout: Duration) -> RenderResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            max_parallel: max_parallel.max(1),
        })
    }

    /// Fetch every asset the request references into the scratch directory.
    ///
    /// Returns the local paths of what was actually acquired. Fails only
    /// when the voice-over is unavailable or not a single segment yielded
    /// footage.
    pub async fn fetch_all(
        &self,
        scratch: &ScratchDir,
        segments: &[Segment],
        voice: &MediaSource,
        music: Option<&MediaSource>,
    ) -> RenderResult<FetchedAssets> {
        let footage = self.fetch_footage(scratch, segments).await?;
        let voice = self.resolve_voice(scratch, voice).await?;
        let music = match music {
            Some(source) => self.resolve_music(scratch, source).await,
            None => None,
        };

        Ok(FetchedAssets {
            footage,
            voice,
            music,
        })
    }

    /// Fan out footage downloads for every segment that declares a URL.
    ///
    /// Individual failures are logged and skipped. Zero successes is fatal:
    /// there would be nothing to cut the video from.
    async fn fetch_footage(
        &self,
        scratch: &ScratchDir,
        segments: &[Segment],
    ) -> RenderResult<HashMap<usize, PathBuf>> {
        let jobs: Vec<(usize, String)> = segments
            .iter()
            .filter(|s| s.has_footage())
            .map(|s| (s.index, s.footage_url.clone().unwrap_or_default()))
            .collect();

        if jobs.is_empty() {
            return Err(RenderError::NoFootage);
        }

        info!(
            count = jobs.len(),
            parallel = self.max_parallel,
            "Downloading segment footage"
        );

        let results: Vec<(usize, RenderResult<PathBuf>)> = stream::iter(jobs)
            .map(|(index, url)| {
                let dest = scratch.path(format!("segment_{index}.mp4"));
                async move {
                    let result = self.download(&url, &dest).await.map(|()| dest);
                    (index, result)
                }
            })
            .buffer_unordered(self.max_parallel)
            .collect()
            .await;

        let mut footage = HashMap::new();
        for (index, result) in results {
            match result {
                Ok(path) => {
                    footage.insert(index, path);
                }
                Err(e) => {
                    warn!(segment = index, "Footage download failed, skipping segment: {e}");
                }
            }
        }

        if footage.is_empty() {
            return Err(RenderError::NoFootage);
        }
        Ok(footage)
    }

    /// Resolve the voice-over to a local file. Any failure here is fatal.
    async fn resolve_voice(
        &self,
        scratch: &ScratchDir,
        source: &MediaSource,
    ) -> RenderResult<PathBuf> {
        match source {
            MediaSource::Path(path) => {
                if fs::metadata(path).await.is_err() {
                    return Err(RenderError::VoiceOverUnavailable(format!(
                        "file not found: {}",
                        path.display()
                    )));
                }
                Ok(path.clone())
            }
            MediaSource::Url(url) => {
                let dest = scratch.path(format!("voice.{}", url_extension(url, "mp3")));
                self.download(url, &dest)
                    .await
                    .map_err(|e| RenderError::VoiceOverUnavailable(e.to_string()))?;
                Ok(dest)
            }
        }
    }

    /// Resolve the music track, degrading to none on any failure.
    async fn resolve_music(
        &self,
        scratch: &ScratchDir,
        source: &MediaSource,
    ) -> Option<PathBuf> {
        match source {
            MediaSource::Path(path) => {
                if fs::metadata(path).await.is_ok() {
                    Some(path.clone())
                } else {
                    warn!(
                        "Music file not found, rendering without music: {}",
                        path.display()
                    );
                    None
                }
            }
            MediaSource::Url(url) => {
                let dest = scratch.path(format!("music.{}", url_extension(url, "mp3")));
                match self.download(url, &dest).await {
                    Ok(()) => Some(dest),
                    Err(e) => {
                        warn!("Music download failed, rendering without music: {e}");
                        None
                    }
                }
            }
        }
    }

    /// Stream one URL to a destination file.
    ///
    /// Skips the download when the destination already exists (retried
    /// renders reuse the scratch directory). Partial files are removed on
    /// failure so a retry never picks up a truncated asset.
    async fn download(&self, url: &str, dest: &Path) -> RenderResult<()> {
        if fs::metadata(dest).await.is_ok() {
            debug!("Asset already present, skipping download: {}", dest.display());
            return Ok(());
        }

        let failed = |message: String| RenderError::DownloadFailed {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| failed(e.to_string()))?;

        let mut file = fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    drop(file);
                    let _ = fs::remove_file(dest).await;
                    return Err(failed(e.to_string()));
                }
            };
            if let Err(e) = file.write_all(&chunk).await {
                drop(file);
                let _ = fs::remove_file(dest).await;
                return Err(RenderError::Io(e));
            }
        }
        file.flush().await?;

        debug!("Downloaded {} -> {}", url, dest.display());
        Ok(())
    }
}

/// File extension from a URL path, falling back when there is none.
fn url_extension(url: &str, fallback: &str) -> String {
    url.rsplit('/')
        .next()
        .and_then(|name| name.split('?').next())
        .and_then(|name| name.rsplit_once('.').map(|(_, ext)| ext))
        .filter(|ext| !ext.is_empty() && ext.len() <= 4 && ext.chars().all(char::is_alphanumeric))
        .map(str::to_lowercase)
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use tempfile::TempDir;

    fn segment(index: usize, url: Option<String>) -> Segment {
        Segment {
            index,
            text: format!("segment {index}"),
            start_time: index as f64 * 3.0,
            end_time: index as f64 * 3.0 + 3.0,
            footage_url: url,
        }
    }

    async fn scratch_in(dir: &TempDir) -> ScratchDir {
        ScratchDir::create(dir.path(), "task-test").await.unwrap()
    }

    fn fetcher() -> AssetFetcher {
        AssetFetcher::new(4, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_url_extension() {
        assert_eq!(url_extension("https://x.test/a/voice.MP3", "mp3"), "mp3");
        assert_eq!(url_extension("https://x.test/clip.mp4?sig=abc", "mp3"), "mp4");
        assert_eq!(url_extension("https://x.test/noext", "mp3"), "mp3");
    }

    #[tokio::test]
    async fn test_fetch_footage_fan_out() {
        let server = MockServer::start().await;
        for i in 0..3 {
            Mock::given(method("GET"))
                .and(path(format!("/footage/{i}.mp4")))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![i as u8; 64]))
                .mount(&server)
                .await;
        }

        let dir = TempDir::new().unwrap();
        let scratch = scratch_in(&dir).await;
        let segments: Vec<Segment> = (0..3)
            .map(|i| segment(i, Some(format!("{}/footage/{i}.mp4", server.uri()))))
            .collect();

        let footage = fetcher().fetch_footage(&scratch, &segments).await.unwrap();
        assert_eq!(footage.len(), 3);
        for i in 0..3 {
            assert_eq!(
                fs::read(&footage[&i]).await.unwrap(),
                vec![i as u8; 64]
            );
        }
    }

    #[tokio::test]
    async fn test_failed_segment_download_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"video".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone.mp4"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let scratch = scratch_in(&dir).await;
        let segments = vec![
            segment(0, Some(format!("{}/ok.mp4", server.uri()))),
            segment(1, Some(format!("{}/gone.mp4", server.uri()))),
        ];

        let footage = fetcher().fetch_footage(&scratch, &segments).await.unwrap();
        assert_eq!(footage.len(), 1);
        assert!(footage.contains_key(&0));
    }

    #[tokio::test]
    async fn test_zero_footage_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let scratch = scratch_in(&dir).await;
        let segments = vec![segment(0, Some(format!("{}/a.mp4", server.uri())))];

        let err = fetcher()
            .fetch_footage(&scratch, &segments)
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::NoFootage));
    }

    #[tokio::test]
    async fn test_no_footage_urls_is_fatal() {
        let dir = TempDir::new().unwrap();
        let scratch = scratch_in(&dir).await;
        let segments = vec![segment(0, None), segment(1, Some("   ".into()))];

        let err = fetcher()
            .fetch_footage(&scratch, &segments)
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::NoFootage));
    }

    #[tokio::test]
    async fn test_existing_asset_skips_download() {
        // No mock mounted: any HTTP request would fail, proving the
        // pre-seeded file short-circuits the fetch.
        let dir = TempDir::new().unwrap();
        let scratch = scratch_in(&dir).await;
        fs::write(scratch.path("segment_0.mp4"), b"cached")
            .await
            .unwrap();

        let segments = vec![segment(0, Some("http://127.0.0.1:1/unreachable.mp4".into()))];
        let footage = fetcher().fetch_footage(&scratch, &segments).await.unwrap();
        assert_eq!(
            fs::read(&footage[&0]).await.unwrap(),
            b"cached"
        );
    }

    #[tokio::test]
    async fn test_voice_download_failure_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let scratch = scratch_in(&dir).await;
        let source = MediaSource::Url(format!("{}/voice.mp3", server.uri()));

        let err = fetcher()
            .resolve_voice(&scratch, &source)
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::VoiceOverUnavailable(_)));
    }

    #[tokio::test]
    async fn test_voice_local_path_must_exist() {
        let dir = TempDir::new().unwrap();
        let scratch = scratch_in(&dir).await;
        let source = MediaSource::Path(dir.path().join("missing.mp3"));

        let err = fetcher()
            .resolve_voice(&scratch, &source)
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::VoiceOverUnavailable(_)));
    }

    #[tokio::test]
    async fn test_music_failure_degrades_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let scratch = scratch_in(&dir).await;
        let source = MediaSource::Url(format!("{}/music.mp3", server.uri()));

        assert!(fetcher().resolve_music(&scratch, &source).await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_all_happy_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/f0.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"f".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/voice.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"v".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/music.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"m".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let scratch = scratch_in(&dir).await;
        let segments = vec![segment(0, Some(format!("{}/f0.mp4", server.uri())))];
        let voice = MediaSource::Url(format!("{}/voice.mp3", server.uri()));
        let music = MediaSource::Url(format!("{}/music.mp3", server.uri()));

        let assets = fetcher()
            .fetch_all(&scratch, &segments, &voice, Some(&music))
            .await
            .unwrap();

        assert_eq!(assets.footage.len(), 1);
        assert_eq!(fs::read(&assets.voice).await.unwrap(), b"v");
        assert_eq!(
            fs::read(assets.music.as_ref().unwrap()).await.unwrap(),
            b"m"
        );
    }
}
