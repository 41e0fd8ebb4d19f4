//! Render job definitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Unique identifier for a render job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form safe for file names.
    pub fn file_stem(&self) -> String {
        self.0
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .take(36)
            .collect()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Render job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting for a worker slot
    #[default]
    Pending,
    /// Pipeline running
    Processing,
    /// Output written
    Completed,
    /// Failed with a reason
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// A request to produce one narrated video.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RenderJob {
    /// Unique job ID
    pub id: JobId,

    /// Narration topic
    pub topic: String,

    /// Template to apply
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,

    /// Current state
    #[serde(default)]
    pub state: JobState,

    /// Progress percentage (0-100)
    #[serde(default)]
    pub progress: u8,

    /// Failure reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Final output location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl RenderJob {
    /// Create a pending job.
    pub fn new(topic: impl Into<String>, template_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            topic: topic.into(),
            template_id,
            state: JobState::Pending,
            progress: 0,
            error: None,
            output_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: JobId) -> Self {
        self.id = id;
        self
    }

    /// Mark as processing.
    pub fn start(mut self) -> Self {
        self.state = JobState::Processing;
        self.updated_at = Utc::now();
        self
    }

    /// Mark as completed.
    pub fn complete(mut self, output_path: PathBuf) -> Self {
        self.state = JobState::Completed;
        self.progress = 100;
        self.output_path = Some(output_path);
        self.error = None;
        self.updated_at = Utc::now();
        self
    }

    /// Mark as failed.
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.state = JobState::Failed;
        self.error = Some(error.into());
        self.output_path = None;
        self.updated_at = Utc::now();
        self
    }

    /// Update progress; never moves backwards.
    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = progress.min(100).max(self.progress);
        self.updated_at = Utc::now();
        self
    }
}
