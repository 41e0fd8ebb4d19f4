//! Structured job logging.
//!
//! [`JobLogger`] tags every line with the job ID and stage, and doubles as
//! the [`IssueObserver`] handed to the alignment and composition stages so
//! recoverable problems are logged with job context.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn, Span};

use vgen_media::metrics::metric_names;
use vgen_models::{IssueObserver, JobId, StageIssue};

/// Per-job logger. Clones share the issue counter.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: JobId,
    stage: &'static str,
    issues: Arc<AtomicUsize>,
}

impl JobLogger {
    pub fn new(job_id: &JobId) -> Self {
        Self {
            job_id: job_id.clone(),
            stage: "job",
            issues: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A view of this logger tagged with another stage name.
    pub fn for_stage(&self, stage: &'static str) -> Self {
        Self {
            stage,
            ..self.clone()
        }
    }

    pub fn log_start(&self, topic: &str) {
        info!(job_id = %self.job_id, stage = self.stage, topic, "Render job started");
    }

    pub fn log_progress(&self, message: &str) {
        info!(job_id = %self.job_id, stage = self.stage, "{}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, stage = self.stage, "{}", message);
    }

    pub fn log_error(&self, reason: &str) {
        error!(job_id = %self.job_id, stage = self.stage, reason, "Render job failed");
    }

    pub fn log_completion(&self, output: &Path) {
        info!(
            job_id = %self.job_id,
            stage = self.stage,
            output = %output.display(),
            issues = self.issue_count(),
            "Render job completed"
        );
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    /// Recoverable issues seen so far.
    pub fn issue_count(&self) -> usize {
        self.issues.load(Ordering::Relaxed)
    }

    /// Span covering the whole job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("render_job", job_id = %self.job_id)
    }
}

impl IssueObserver for JobLogger {
    fn observe(&self, issue: StageIssue) {
        self.issues.fetch_add(1, Ordering::Relaxed);
        if matches!(issue, StageIssue::AlignmentGap { .. }) {
            metrics::counter!(metric_names::CAPTIONS_DROPPED_TOTAL).increment(1);
        }
        warn!(
            job_id = %self.job_id,
            stage = self.stage,
            kind = issue.kind(),
            "Recovered: {}", issue.describe()
        );
    }
}
