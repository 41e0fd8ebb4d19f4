//! File-backed collaborators for offline renders.
//!
//! A manifest supplies the artifacts the external services would otherwise
//! produce: the script, the narration audio, the transcription timing and
//! the footage list. Relative paths are resolved against the manifest's
//! directory.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use vgen_models::{BackgroundInterval, CaptionChunk, RenderJob, TranscriptSegment};

use crate::collaborators::{
    Collaborators, FootageSearch, ScriptWriter, SpeechSynthesizer, Transcriber,
};
use crate::error::{WorkerError, WorkerResult};

/// One offline render job.
#[derive(Debug, Clone, Deserialize)]
pub struct JobManifest {
    pub topic: String,

    /// Template id
    #[serde(default)]
    pub template: Option<String>,

    /// Narration text; the template's script patterns are used when absent
    #[serde(default)]
    pub script: Option<String>,

    /// Narration audio file
    pub narration: PathBuf,

    /// Speech-to-text segments for the narration
    #[serde(default)]
    pub transcript: Vec<TranscriptSegment>,

    /// Footage per time range, `[[start, end], url | null]`
    #[serde(default)]
    pub background: Vec<BackgroundInterval>,

    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl JobManifest {
    /// Read and parse a manifest file.
    pub fn load(path: impl AsRef<Path>) -> WorkerResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let mut manifest: JobManifest = serde_json::from_str(&data).map_err(|e| {
            WorkerError::config_error(format!("invalid manifest {}: {}", path.display(), e))
        })?;

        if let Some(base) = path.parent() {
            manifest.resolve_paths(base);
        }
        debug!(
            manifest = %path.display(),
            segments = manifest.transcript.len(),
            background = manifest.background.len(),
            "Loaded job manifest"
        );
        Ok(manifest)
    }

    fn resolve_paths(&mut self, base: &Path) {
        if self.narration.is_relative() {
            self.narration = base.join(&self.narration);
        }
        for bg in &mut self.background {
            if let Some(clip) = bg.clip.as_mut() {
                if !clip.contains("://") && Path::new(clip.as_str()).is_relative() {
                    *clip = base.join(clip.as_str()).display().to_string();
                }
            }
        }
    }

    /// A pending job for this manifest.
    pub fn job(&self) -> RenderJob {
        let mut job = RenderJob::new(self.topic.clone(), self.template.clone());
        job.output_path = self.output.clone();
        job
    }

    /// Collaborators answering from this manifest.
    pub fn collaborators(self) -> Collaborators {
        let source = Arc::new(ManifestSource(self));
        Collaborators::new(source.clone(), source.clone(), source.clone(), source)
    }
}

struct ManifestSource(JobManifest);

#[async_trait]
impl ScriptWriter for ManifestSource {
    async fn write_script(&self, _prompt: &str) -> WorkerResult<String> {
        self.0
            .script
            .clone()
            .ok_or_else(|| WorkerError::config_error("manifest has no script"))
    }
}

#[async_trait]
impl SpeechSynthesizer for ManifestSource {
    async fn synthesize(&self, _script: &str, _voice: &str, dest: &Path) -> WorkerResult<PathBuf> {
        if !self.0.narration.is_file() {
            return Err(WorkerError::config_error(format!(
                "narration not found: {}",
                self.0.narration.display()
            )));
        }
        tokio::fs::copy(&self.0.narration, dest).await?;
        Ok(dest.to_path_buf())
    }
}

#[async_trait]
impl Transcriber for ManifestSource {
    async fn transcribe(&self, _audio: &Path) -> WorkerResult<Vec<TranscriptSegment>> {
        Ok(self.0.transcript.clone())
    }
}

#[async_trait]
impl FootageSearch for ManifestSource {
    async fn search(
        &self,
        _script: &str,
        _captions: &[CaptionChunk],
    ) -> WorkerResult<Vec<BackgroundInterval>> {
        Ok(self.0.background.clone())
    }
}
