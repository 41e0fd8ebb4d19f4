//! Worker error types.

use thiserror::Error;

use vgen_media::MediaError;
use vgen_models::ModelError;
use vgen_templates::TemplateError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    /// An external collaborator (script, speech, transcription, footage) failed.
    #[error("{stage} failed: {message}")]
    Collaborator { stage: &'static str, message: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Job timed out after {0}s")]
    Timeout(u64),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Invalid data: {0}")]
    Model(#[from] ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn collaborator(stage: &'static str, msg: impl Into<String>) -> Self {
        Self::Collaborator {
            stage,
            message: msg.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Collaborator { .. } | WorkerError::Io(_) => true,
            WorkerError::Media(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Check if this is a permanent failure that should NOT be retried.
    ///
    /// Missing background coverage and a failed encode will fail the same
    /// way again with the same inputs.
    pub fn is_permanent_failure(&self) -> bool {
        matches!(
            self,
            WorkerError::Media(MediaError::CoverageFailure { .. })
                | WorkerError::Media(MediaError::RenderFailed { .. })
                | WorkerError::Template(TemplateError::NotFound(_))
                | WorkerError::ConfigError(_)
                | WorkerError::Cancelled
        )
    }

    /// Human-readable reason reported for a failed job.
    pub fn failure_reason(&self) -> String {
        match self {
            WorkerError::Media(MediaError::CoverageFailure { reason }) => {
                format!("No background footage could be used: {}", reason)
            }
            WorkerError::Media(MediaError::RenderFailed { reason }) => {
                format!("Video rendering failed: {}", reason)
            }
            WorkerError::Media(MediaError::Cancelled) | WorkerError::Cancelled => {
                "Job was cancelled".to_string()
            }
            WorkerError::Template(TemplateError::NotFound(id)) => {
                format!("Template '{}' does not exist", id)
            }
            other => other.to_string(),
        }
    }
}
