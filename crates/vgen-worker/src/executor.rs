//! Job executor.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

use vgen_media::metrics::metric_names;
use vgen_media::JobWorkspace;
use vgen_models::{JobId, RenderJob};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::pipeline::{JobContext, RenderPipeline};
use crate::progress::{JobProgress, ProgressSink};

type CancelMap = Arc<Mutex<HashMap<JobId, watch::Sender<bool>>>>;

/// Runs render jobs with bounded concurrency.
///
/// Every job gets its own workspace under the configured work directory,
/// removed when the job ends whatever the outcome. A job can be cancelled
/// individually or through [`JobExecutor::shutdown`].
pub struct JobExecutor {
    config: WorkerConfig,
    pipeline: Arc<RenderPipeline>,
    progress: Arc<dyn ProgressSink>,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    cancels: CancelMap,
}

impl JobExecutor {
    pub fn new(
        config: WorkerConfig,
        pipeline: Arc<RenderPipeline>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            pipeline,
            progress,
            job_semaphore,
            shutdown,
            cancels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Queue a job and return a handle resolving to its final state.
    ///
    /// Waits for a free slot before spawning.
    pub async fn submit(&self, job: RenderJob) -> WorkerResult<JoinHandle<RenderJob>> {
        if self.is_shutting_down() {
            return Err(WorkerError::job_failed("executor is shutting down"));
        }

        let permit = Arc::clone(&self.job_semaphore)
            .acquire_owned()
            .await
            .map_err(|_| WorkerError::job_failed("Semaphore closed"))?;

        let pipeline = Arc::clone(&self.pipeline);
        let progress = Arc::clone(&self.progress);
        let cancels = Arc::clone(&self.cancels);
        let config = self.config.clone();

        Ok(tokio::spawn(async move {
            let _permit = permit;
            Self::execute_job(config, pipeline, progress, cancels, job).await
        }))
    }

    /// Run one job to completion on the current task.
    pub async fn execute(&self, job: RenderJob) -> WorkerResult<RenderJob> {
        let handle = self.submit(job).await?;
        handle
            .await
            .map_err(|e| WorkerError::job_failed(format!("job task panicked: {}", e)))
    }

    /// Cancel a running job. Returns false when the job is not running.
    pub fn cancel(&self, job_id: &JobId) -> bool {
        let Ok(cancels) = self.cancels.lock() else {
            return false;
        };
        match cancels.get(job_id) {
            Some(tx) => tx.send(true).is_ok(),
            None => false,
        }
    }

    /// Stop accepting jobs and cancel the running ones.
    pub fn shutdown(&self) {
        // The flag has no subscribers; `send` would leave it unchanged.
        self.shutdown.send_replace(true);
        if let Ok(cancels) = self.cancels.lock() {
            for tx in cancels.values() {
                tx.send_replace(true);
            }
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Number of jobs currently holding a slot.
    pub fn running_jobs(&self) -> usize {
        self.config.max_concurrent_jobs - self.job_semaphore.available_permits()
    }

    /// Wait for in-flight jobs, up to the shutdown timeout. Returns false on
    /// timeout.
    pub async fn wait_for_jobs(&self) -> bool {
        let wait = async {
            while self.running_jobs() > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        };
        tokio::time::timeout(self.config.shutdown_timeout, wait)
            .await
            .is_ok()
    }

    async fn execute_job(
        config: WorkerConfig,
        pipeline: Arc<RenderPipeline>,
        sink: Arc<dyn ProgressSink>,
        cancels: CancelMap,
        job: RenderJob,
    ) -> RenderJob {
        let job_id = job.id.clone();
        let logger = JobLogger::new(&job_id);
        let progress = JobProgress::new(job_id.clone(), sink);

        let (cancel_tx, cancel_rx) = watch::channel(false);
        if let Ok(mut map) = cancels.lock() {
            map.insert(job_id.clone(), cancel_tx);
        }

        let job = job.start();
        logger.log_start(&job.topic);

        let span = logger.create_span();
        let result = Self::run_isolated(&config, &pipeline, &job, &logger, &progress, cancel_rx)
            .instrument(span)
            .await;

        if let Ok(mut map) = cancels.lock() {
            map.remove(&job_id);
        }

        match result {
            Ok(output) => {
                metrics::counter!(metric_names::JOBS_TOTAL, "outcome" => "completed").increment(1);
                progress.done(&output).await;
                logger.log_completion(&output);
                job.complete(output)
            }
            Err(e) => {
                let outcome = if matches!(e, WorkerError::Cancelled) {
                    "cancelled"
                } else {
                    "failed"
                };
                metrics::counter!(metric_names::JOBS_TOTAL, "outcome" => outcome).increment(1);

                let reason = e.failure_reason();
                logger.log_error(&reason);
                progress.failed(reason.clone()).await;
                job.fail(reason)
            }
        }
    }

    /// Run the pipeline inside a fresh workspace, bounded by the job timeout
    /// and the cancel signal. The workspace is removed before returning.
    async fn run_isolated(
        config: &WorkerConfig,
        pipeline: &RenderPipeline,
        job: &RenderJob,
        logger: &JobLogger,
        progress: &JobProgress,
        cancel_rx: watch::Receiver<bool>,
    ) -> WorkerResult<std::path::PathBuf> {
        let workspace = JobWorkspace::create(&config.work_dir, &job.id)?;
        debug!(path = %workspace.path().display(), "Job workspace ready");

        let ctx = JobContext {
            workspace,
            logger: logger.clone(),
            progress: progress.clone(),
            cancel: cancel_rx.clone(),
        };

        let outcome = tokio::select! {
            result = tokio::time::timeout(config.job_timeout, pipeline.run(job, &ctx)) => {
                result.unwrap_or(Err(WorkerError::Timeout(config.job_timeout.as_secs())))
            }
            _ = wait_cancelled(cancel_rx) => {
                info!(job_id = %job.id, "Job cancelled");
                Err(WorkerError::Cancelled)
            }
        };

        if let Err(e) = ctx.workspace.close() {
            warn!(job_id = %job.id, "Failed to remove job workspace: {}", e);
        }
        outcome
    }
}

/// Resolves once the flag turns true. Never resolves if the sender is gone.
async fn wait_cancelled(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{
        Collaborators, MockFootageSearch, MockScriptWriter, MockSpeechSynthesizer, MockTranscriber,
    };
    use crate::progress::StatusBoard;
    use crate::testing::{FakeBackend, FakeFetcher, StalledTranscriber};
    use crate::collaborators::Transcriber;
    use std::time::Duration;
    use tempfile::TempDir;
    use vgen_models::{BackgroundInterval, JobState, TimeInterval, TranscriptSegment};
    use vgen_templates::TemplateStore;

    fn collaborators(transcriber: Arc<dyn Transcriber>) -> Collaborators {
        let mut script = MockScriptWriter::new();
        script
            .expect_write_script()
            .returning(|_| Ok("Bananas são frutas".to_string()));

        let mut speech = MockSpeechSynthesizer::new();
        speech
            .expect_synthesize()
            .returning(|_, _, dest| Ok(dest.to_path_buf()));

        let mut footage = MockFootageSearch::new();
        footage.expect_search().returning(|_, _| {
            Ok(vec![BackgroundInterval::with_clip(
                TimeInterval::new(0.0, 3.0).unwrap(),
                "https://footage.test/a.mp4",
            )])
        });

        Collaborators::new(Arc::new(script), Arc::new(speech), transcriber, Arc::new(footage))
    }

    fn working_transcriber() -> Arc<dyn Transcriber> {
        let mut mock = MockTranscriber::new();
        mock.expect_transcribe().returning(|_| {
            Ok(vec![TranscriptSegment::new(0.0, 3.0, "Bananas são frutas").unwrap()])
        });
        Arc::new(mock)
    }

    fn executor(
        root: &TempDir,
        transcriber: Arc<dyn Transcriber>,
        job_timeout: Duration,
    ) -> (JobExecutor, Arc<StatusBoard>) {
        let config = WorkerConfig {
            work_dir: root.path().join("work"),
            output_dir: root.path().join("out"),
            job_timeout,
            collaborator_retries: 0,
            ..WorkerConfig::default()
        };
        let pipeline = RenderPipeline::new(
            collaborators(transcriber),
            Arc::new(TemplateStore::new()),
            Arc::new(FakeBackend::new(3.0)),
            Arc::new(FakeFetcher),
            &config,
        );
        let board = Arc::new(StatusBoard::new());
        let executor = JobExecutor::new(config, Arc::new(pipeline), board.clone());
        (executor, board)
    }

    fn leftover_workspaces(root: &TempDir) -> usize {
        std::fs::read_dir(root.path().join("work"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_completed_job() {
        let root = TempDir::new().unwrap();
        let (executor, board) = executor(&root, working_transcriber(), Duration::from_secs(30));

        let job = executor.execute(RenderJob::new("bananas", None)).await.unwrap();

        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.output_path.as_ref().unwrap().is_file());
        assert_eq!(board.state(&job.id), Some(JobState::Completed));
        assert_eq!(leftover_workspaces(&root), 0);
    }

    #[tokio::test]
    async fn test_concurrent_jobs_use_separate_workspaces() {
        let root = TempDir::new().unwrap();
        let (executor, _) = executor(&root, working_transcriber(), Duration::from_secs(30));

        let a = executor.submit(RenderJob::new("a", None)).await.unwrap();
        let b = executor.submit(RenderJob::new("b", None)).await.unwrap();
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        assert_eq!(a.state, JobState::Completed);
        assert_eq!(b.state, JobState::Completed);
        assert_ne!(a.output_path, b.output_path);
        assert_eq!(leftover_workspaces(&root), 0);
    }

    #[tokio::test]
    async fn test_timeout_fails_job_and_cleans_up() {
        let root = TempDir::new().unwrap();
        let (executor, board) =
            executor(&root, Arc::new(StalledTranscriber), Duration::from_millis(50));

        let job = executor.execute(RenderJob::new("slow", None)).await.unwrap();

        assert_eq!(job.state, JobState::Failed);
        assert!(job.error.as_deref().unwrap().contains("timed out"));
        assert!(job.output_path.is_none());
        assert_eq!(board.state(&job.id), Some(JobState::Failed));
        assert_eq!(leftover_workspaces(&root), 0);
    }

    #[tokio::test]
    async fn test_cancel_running_job() {
        let root = TempDir::new().unwrap();
        let (executor, _) = executor(&root, Arc::new(StalledTranscriber), Duration::from_secs(30));

        let job = RenderJob::new("slow", None);
        let job_id = job.id.clone();
        let handle = executor.submit(job).await.unwrap();

        // Wait until the job is registered.
        while !executor.cancel(&job_id) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let job = handle.await.unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.error.as_deref(), Some("Job was cancelled"));
        assert_eq!(leftover_workspaces(&root), 0);
        assert!(!root.path().join("out").exists());
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_jobs() {
        let root = TempDir::new().unwrap();
        let (executor, _) = executor(&root, working_transcriber(), Duration::from_secs(30));

        assert!(!executor.is_shutting_down());
        executor.shutdown();
        assert!(executor.is_shutting_down());
        assert!(executor.submit(RenderJob::new("late", None)).await.is_err());
        assert!(executor.wait_for_jobs().await);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_running_job() {
        let root = TempDir::new().unwrap();
        let (executor, board) =
            executor(&root, Arc::new(StalledTranscriber), Duration::from_secs(30));

        let job = RenderJob::new("slow", None);
        let job_id = job.id.clone();
        let handle = executor.submit(job).await.unwrap();
        while executor.running_jobs() == 0 || board.state(&job_id).is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        executor.shutdown();
        let job = handle.await.unwrap();

        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.error.as_deref(), Some("Job was cancelled"));
        assert!(executor.wait_for_jobs().await);
        assert_eq!(leftover_workspaces(&root), 0);
    }
}
