//! Recoverable stage issues.
//!
//! Stages report conditions they recovered from as [`StageIssue`] values
//! through an [`IssueObserver`]. They never become errors.

use std::sync::Mutex;

use crate::interval::TimeInterval;

/// A condition a stage recovered from locally.
#[derive(Debug, Clone, PartialEq)]
pub enum StageIssue {
    /// A caption chunk had no timestamp mapping and was dropped.
    AlignmentGap { chunk: String, offset: usize },

    /// A background clip or effect asset could not be fetched or applied.
    PartialFetchFailure {
        asset: String,
        interval: Option<TimeInterval>,
        reason: String,
    },

    /// Pause scheduling fell back to identity scaling.
    ScheduleDegenerate { reason: String },
}

impl StageIssue {
    pub fn kind(&self) -> &'static str {
        match self {
            StageIssue::AlignmentGap { .. } => "alignment_gap",
            StageIssue::PartialFetchFailure { .. } => "partial_fetch_failure",
            StageIssue::ScheduleDegenerate { .. } => "schedule_degenerate",
        }
    }

    /// Human-readable description.
    pub fn describe(&self) -> String {
        match self {
            StageIssue::AlignmentGap { chunk, offset } => {
                format!("caption chunk {:?} at offset {} has no timing; dropped", chunk, offset)
            }
            StageIssue::PartialFetchFailure {
                asset,
                interval: Some(interval),
                reason,
            } => format!("skipped {} for {}: {}", asset, interval, reason),
            StageIssue::PartialFetchFailure { asset, reason, .. } => {
                format!("skipped {}: {}", asset, reason)
            }
            StageIssue::ScheduleDegenerate { reason } => {
                format!("pause schedule degenerate ({}); using identity scaling", reason)
            }
        }
    }
}

/// Receives recoverable issues from pipeline stages.
pub trait IssueObserver: Send + Sync {
    fn observe(&self, issue: StageIssue);
}

/// Observer that writes each issue as a `tracing` warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl IssueObserver for TracingObserver {
    fn observe(&self, issue: StageIssue) {
        tracing::warn!(kind = issue.kind(), "{}", issue.describe());
    }
}

/// Observer that records issues in memory.
#[derive(Debug, Default)]
pub struct CollectingObserver {
    issues: Mutex<Vec<StageIssue>>,
}

impl CollectingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded issues.
    pub fn issues(&self) -> Vec<StageIssue> {
        self.issues
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Number of recorded issues of the given kind.
    pub fn count(&self, kind: &str) -> usize {
        self.issues().iter().filter(|i| i.kind() == kind).count()
    }
}

impl IssueObserver for CollectingObserver {
    fn observe(&self, issue: StageIssue) {
        if let Ok(mut guard) = self.issues.lock() {
            guard.push(issue);
        }
    }
}

impl<T: IssueObserver + ?Sized> IssueObserver for std::sync::Arc<T> {
    fn observe(&self, issue: StageIssue) {
        (**self).observe(issue)
    }
}
