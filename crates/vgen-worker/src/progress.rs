//! Progress delivery.
//!
//! Events for one job are only ever appended, in the order the job emits
//! them. Sinks never drop a job's terminal event silently: delivery
//! failures are logged.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use vgen_models::{JobId, JobState, Milestone, ProgressEvent, ProgressMessage};

/// Receives progress events.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn publish(&self, event: ProgressEvent);
}

/// Forwards events into a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ProgressSink for ChannelProgress {
    async fn publish(&self, event: ProgressEvent) {
        if let Err(e) = self.tx.send(event).await {
            warn!(job_id = %e.0.job_id, "Progress receiver closed, event dropped");
        }
    }
}

/// In-memory, append-only event log per job.
#[derive(Debug, Default)]
pub struct StatusBoard {
    jobs: RwLock<HashMap<JobId, Vec<ProgressEvent>>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded for a job, oldest first.
    pub fn events(&self, job_id: &JobId) -> Vec<ProgressEvent> {
        self.jobs
            .read()
            .map(|jobs| jobs.get(job_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Highest milestone percentage reached.
    pub fn percent(&self, job_id: &JobId) -> u8 {
        self.events(job_id)
            .iter()
            .filter_map(|e| match &e.message {
                ProgressMessage::Milestone { percent, .. } => Some(*percent),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// State implied by the recorded events; `None` for unknown jobs.
    pub fn state(&self, job_id: &JobId) -> Option<JobState> {
        let events = self.events(job_id);
        let last = events.last()?;
        Some(match last.message {
            ProgressMessage::Done { .. } => JobState::Completed,
            ProgressMessage::Failed { .. } => JobState::Failed,
            _ => JobState::Processing,
        })
    }
}

#[async_trait]
impl ProgressSink for StatusBoard {
    async fn publish(&self, event: ProgressEvent) {
        let Ok(mut jobs) = self.jobs.write() else {
            warn!(job_id = %event.job_id, "Status board lock poisoned, event dropped");
            return;
        };
        let log = jobs.entry(event.job_id.clone()).or_default();
        if log.last().is_some_and(|e| e.message.is_terminal()) {
            debug!(job_id = %event.job_id, "Ignoring event after terminal state");
            return;
        }
        log.push(event);
    }
}

/// Progress emitter bound to one job.
#[derive(Clone)]
pub struct JobProgress {
    job_id: JobId,
    sink: Arc<dyn ProgressSink>,
}

impl JobProgress {
    pub fn new(job_id: JobId, sink: Arc<dyn ProgressSink>) -> Self {
        Self { job_id, sink }
    }

    pub async fn log(&self, message: impl Into<String>) {
        self.emit(ProgressMessage::log(message)).await;
    }

    pub async fn milestone(&self, milestone: Milestone) {
        self.emit(ProgressMessage::milestone(milestone)).await;
    }

    pub async fn failed(&self, reason: impl Into<String>) {
        self.emit(ProgressMessage::failed(reason)).await;
    }

    pub async fn done(&self, output: &Path) {
        self.emit(ProgressMessage::done(output)).await;
    }

    async fn emit(&self, message: ProgressMessage) {
        self.sink
            .publish(ProgressEvent::new(self.job_id.clone(), message))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_status_board_is_append_only_per_job() {
        let board = Arc::new(StatusBoard::new());
        let a = JobProgress::new(JobId::from_string("a"), board.clone());
        let b = JobProgress::new(JobId::from_string("b"), board.clone());

        a.milestone(Milestone::ScriptReady).await;
        b.milestone(Milestone::ScriptReady).await;
        a.milestone(Milestone::AudioReady).await;
        a.failed("no background footage").await;
        a.log("late message").await;

        let events = board.events(&JobId::from_string("a"));
        assert_eq!(events.len(), 3);
        assert!(events[2].message.is_terminal());
        assert_eq!(board.percent(&JobId::from_string("a")), 40);
        assert_eq!(board.state(&JobId::from_string("a")), Some(JobState::Failed));
        assert_eq!(board.state(&JobId::from_string("b")), Some(JobState::Processing));
        assert_eq!(board.state(&JobId::from_string("c")), None);
    }

    #[tokio::test]
    async fn test_channel_progress_delivers_in_order() {
        let (sink, mut rx) = ChannelProgress::new(8);
        let progress = JobProgress::new(JobId::from_string("job"), Arc::new(sink));

        progress.milestone(Milestone::CaptionsReady).await;
        progress.done(Path::new("/out/video.mp4")).await;

        let first = rx.recv().await.unwrap();
        assert_eq!(first.message, ProgressMessage::milestone(Milestone::CaptionsReady));
        let second = rx.recv().await.unwrap();
        assert!(matches!(second.message, ProgressMessage::Done { .. }));
    }
}
