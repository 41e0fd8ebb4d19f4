//! External services the pipeline depends on.
//!
//! Each trait covers one out-of-process concern. Implementations return
//! [`WorkerError::Collaborator`](crate::WorkerError::Collaborator) on
//! failure so the pipeline can retry them.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

use vgen_models::{BackgroundInterval, CaptionChunk, TranscriptSegment};

use crate::error::WorkerResult;

/// Turns a prompt into narration text.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ScriptWriter: Send + Sync {
    async fn write_script(&self, prompt: &str) -> WorkerResult<String>;
}

/// Turns narration text into an audio file.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Write speech for `script` to `dest` and return the written path.
    async fn synthesize(&self, script: &str, voice: &str, dest: &Path) -> WorkerResult<PathBuf>;
}

/// Speech-to-text timing for an audio file.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> WorkerResult<Vec<TranscriptSegment>>;
}

/// Stock footage for the caption timeline.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FootageSearch: Send + Sync {
    /// One entry per time range; `None` clips mark ranges with no match.
    async fn search(&self, script: &str, captions: &[CaptionChunk])
        -> WorkerResult<Vec<BackgroundInterval>>;
}

/// The full set of collaborators for a pipeline.
#[derive(Clone)]
pub struct Collaborators {
    pub script: Arc<dyn ScriptWriter>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub transcriber: Arc<dyn Transcriber>,
    pub footage: Arc<dyn FootageSearch>,
}

impl Collaborators {
    pub fn new(
        script: Arc<dyn ScriptWriter>,
        speech: Arc<dyn SpeechSynthesizer>,
        transcriber: Arc<dyn Transcriber>,
        footage: Arc<dyn FootageSearch>,
    ) -> Self {
        Self {
            script,
            speech,
            transcriber,
            footage,
        }
    }
}
