//! Per-job scratch storage.
//!
//! Every job gets its own directory so concurrent jobs never share
//! intermediate file names. The directory is removed when the workspace is
//! dropped, whatever the job outcome.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

use vgen_models::JobId;

use crate::error::MediaResult;

/// Scratch directory owned by one job.
#[derive(Debug)]
pub struct JobWorkspace {
    job_id: JobId,
    dir: TempDir,
}

impl JobWorkspace {
    /// Create `job-<id>-XXXXXX` under `root`.
    pub fn create(root: impl AsRef<Path>, job_id: &JobId) -> MediaResult<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("job-{}-", job_id.file_stem()))
            .tempdir_in(root)?;
        std::fs::create_dir_all(dir.path().join("clips"))?;

        debug!(job_id = %job_id, path = %dir.path().display(), "Created job workspace");
        Ok(Self {
            job_id: job_id.clone(),
            dir,
        })
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where fetched background clips go.
    pub fn clips_dir(&self) -> PathBuf {
        self.dir.path().join("clips")
    }

    /// Path for a fetched clip.
    pub fn clip_path(&self, index: usize, extension: &str) -> PathBuf {
        self.clips_dir().join(format!("clip-{:03}.{}", index, extension))
    }

    /// Encoder output before it is published.
    pub fn staging_output(&self) -> PathBuf {
        self.dir.path().join("render.mp4")
    }

    /// Any other scratch file.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Delete fetched clips early, keeping the workspace itself.
    pub async fn clear_clips(&self) -> MediaResult<()> {
        let clips = self.clips_dir();
        if clips.exists() {
            tokio::fs::remove_dir_all(&clips).await?;
            tokio::fs::create_dir_all(&clips).await?;
        }
        Ok(())
    }

    /// Remove the directory now and report failures.
    pub fn close(self) -> MediaResult<()> {
        self.dir.close()?;
        Ok(())
    }
}
