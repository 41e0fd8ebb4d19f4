//! Test doubles for the render side of the pipeline.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use vgen_media::{
    ClipFetcher, MediaResult, RenderBackend, RenderSettings, RenderTimeline,
};
use vgen_models::TranscriptSegment;

use crate::collaborators::Transcriber;
use crate::error::WorkerResult;

/// Writes a marker file instead of encoding and keeps the last timeline.
pub struct FakeBackend {
    duration: f64,
    rendered: Mutex<Option<RenderTimeline>>,
}

impl FakeBackend {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            rendered: Mutex::new(None),
        }
    }

    pub fn timeline(&self) -> RenderTimeline {
        self.rendered.lock().unwrap().clone().expect("nothing rendered")
    }
}

#[async_trait]
impl RenderBackend for FakeBackend {
    async fn media_duration(&self, _path: &Path) -> MediaResult<f64> {
        Ok(self.duration)
    }

    async fn validate(&self, _path: &Path) -> MediaResult<()> {
        Ok(())
    }

    async fn encode(
        &self,
        timeline: &RenderTimeline,
        _settings: &RenderSettings,
        output: &Path,
        _scratch: &Path,
    ) -> MediaResult<()> {
        *self.rendered.lock().unwrap() = Some(timeline.clone());
        tokio::fs::write(output, b"video").await?;
        Ok(())
    }
}

/// Succeeds for every reference by writing it into the destination.
#[derive(Default)]
pub struct FakeFetcher;

#[async_trait]
impl ClipFetcher for FakeFetcher {
    async fn fetch(&self, reference: &str, dest: &Path) -> MediaResult<PathBuf> {
        tokio::fs::write(dest, reference.as_bytes()).await?;
        Ok(dest.to_path_buf())
    }
}

/// Never finishes in test time.
pub struct StalledTranscriber;

#[async_trait]
impl Transcriber for StalledTranscriber {
    async fn transcribe(&self, _audio: &Path) -> WorkerResult<Vec<TranscriptSegment>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }
}
