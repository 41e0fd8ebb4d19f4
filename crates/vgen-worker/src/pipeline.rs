//! The per-job render pipeline.
//!
//! Stages run strictly in order for one job: script, narration audio,
//! captions, background footage, pause schedule, render. Cancellation is
//! checked between stages; recoverable stage issues go to the job's
//! [`JobLogger`] and never fail the job.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

use vgen_media::{
    ClipFetcher, CompositionEngine, JobWorkspace, RenderBackend, RenderConfig, RenderRequest,
};
use vgen_models::{
    AudioSettings, BackgroundInterval, CaptionChunk, Milestone, PauseSchedule, RenderJob,
    Template, TranscriptSegment,
};
use vgen_templates::{PatternScriptWriter, TemplateStore};
use vgen_timeline::{merge_empty, CaptionAligner, PauseScheduler, ScheduleMode};

use crate::collaborators::Collaborators;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::progress::JobProgress;
use crate::retry::{retry_async, RetryConfig};

/// Everything scoped to one running job.
pub struct JobContext {
    pub workspace: JobWorkspace,
    pub logger: JobLogger,
    pub progress: JobProgress,
    pub cancel: watch::Receiver<bool>,
}

impl JobContext {
    fn check_cancelled(&self) -> WorkerResult<()> {
        if *self.cancel.borrow() {
            return Err(WorkerError::Cancelled);
        }
        Ok(())
    }
}

/// Shared, read-only pipeline state.
pub struct RenderPipeline {
    collaborators: Collaborators,
    templates: Arc<TemplateStore>,
    backend: Arc<dyn RenderBackend>,
    fetcher: Arc<dyn ClipFetcher>,
    render_config: RenderConfig,
    aligner: CaptionAligner,
    patterns: PatternScriptWriter,
    script_seed: Option<u64>,
    output_dir: PathBuf,
    collaborator_retries: u32,
}

impl RenderPipeline {
    pub fn new(
        collaborators: Collaborators,
        templates: Arc<TemplateStore>,
        backend: Arc<dyn RenderBackend>,
        fetcher: Arc<dyn ClipFetcher>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            collaborators,
            templates,
            backend,
            fetcher,
            render_config: config.render_config(),
            aligner: CaptionAligner::new(config.max_caption_chars),
            patterns: PatternScriptWriter::with_builtin_banks(),
            script_seed: config.script_seed,
            output_dir: config.output_dir.clone(),
            collaborator_retries: config.collaborator_retries,
        }
    }

    pub fn with_patterns(mut self, patterns: PatternScriptWriter) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn with_render_config(mut self, render_config: RenderConfig) -> Self {
        self.render_config = render_config;
        self
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    /// Run every stage for `job` and return the published video path.
    pub async fn run(&self, job: &RenderJob, ctx: &JobContext) -> WorkerResult<PathBuf> {
        let template = job
            .template_id
            .as_deref()
            .map(|id| self.templates.require(id))
            .transpose()?;

        let script = self.script_stage(job, template.as_deref(), ctx).await?;
        ctx.progress.milestone(Milestone::ScriptReady).await;
        ctx.check_cancelled()?;

        let narration = self.audio_stage(&script, template.as_deref(), ctx).await?;
        ctx.progress.milestone(Milestone::AudioReady).await;
        ctx.check_cancelled()?;

        let (segments, captions) = self.caption_stage(&script, &narration, ctx).await?;
        ctx.progress.milestone(Milestone::CaptionsReady).await;
        ctx.check_cancelled()?;

        let background = self.background_stage(&script, &captions, ctx).await?;
        ctx.progress.milestone(Milestone::BackgroundResolved).await;
        ctx.check_cancelled()?;

        let pauses = template
            .as_deref()
            .map(|t| self.pause_stage(t, &segments, &captions, ctx));

        let output = job
            .output_path
            .clone()
            .unwrap_or_else(|| self.output_dir.join(format!("{}.mp4", job.id.file_stem())));

        let request = RenderRequest {
            narration,
            captions,
            background,
            template,
            pauses,
            output,
        };

        let engine = CompositionEngine::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.fetcher),
            self.render_config.clone(),
        )
        .with_cancel(ctx.cancel.clone());

        let rendered = engine
            .render(&request, &ctx.workspace, &ctx.logger.for_stage("render"))
            .await?;
        ctx.progress.milestone(Milestone::RenderComplete).await;
        ctx.logger.for_stage("render").log_progress(&format!(
            "rendered {:.1}s with {} background clips",
            rendered.duration, rendered.background_clips
        ));

        Ok(rendered.path)
    }

    fn retry(&self, operation: &str) -> RetryConfig {
        RetryConfig::new(operation).with_max_retries(self.collaborator_retries)
    }

    async fn script_stage(
        &self,
        job: &RenderJob,
        template: Option<&Template>,
        ctx: &JobContext,
    ) -> WorkerResult<String> {
        let prompt = template
            .and_then(|t| t.script_generation.as_ref())
            .map(|g| g.prompt_for(&job.topic))
            .unwrap_or_else(|| job.topic.clone());

        let written = retry_async(&self.retry("script generation"), || {
            self.collaborators.script.write_script(&prompt)
        })
        .await;

        let script = match written {
            Ok(script) if !script.trim().is_empty() => script,
            other => {
                let reason = match other {
                    Err(e) => e.to_string(),
                    Ok(_) => "empty script".to_string(),
                };
                let fallback = job.template_id.as_deref().and_then(|id| {
                    let mut rng = match self.script_seed {
                        Some(seed) => StdRng::seed_from_u64(seed),
                        None => StdRng::from_os_rng(),
                    };
                    self.patterns.write(id, &job.topic, &mut rng)
                });
                match fallback {
                    Some(script) => {
                        ctx.logger.for_stage("script").log_warning(&format!(
                            "script writer failed ({}), using patterns",
                            reason
                        ));
                        script
                    }
                    None => return Err(WorkerError::collaborator("script generation", reason)),
                }
            }
        };

        debug!(words = script.split_whitespace().count(), "Script ready");
        Ok(script)
    }

    async fn audio_stage(
        &self,
        script: &str,
        template: Option<&Template>,
        ctx: &JobContext,
    ) -> WorkerResult<PathBuf> {
        let default_voice;
        let voice = match template {
            Some(t) => t.audio_settings.voice.as_str(),
            None => {
                default_voice = AudioSettings::default().voice;
                default_voice.as_str()
            }
        };
        let dest = ctx.workspace.file("narration.mp3");

        retry_async(&self.retry("speech synthesis"), || {
            self.collaborators.speech.synthesize(script, voice, &dest)
        })
        .await
    }

    async fn caption_stage(
        &self,
        script: &str,
        narration: &std::path::Path,
        ctx: &JobContext,
    ) -> WorkerResult<(Vec<TranscriptSegment>, Vec<CaptionChunk>)> {
        let segments = retry_async(&self.retry("transcription"), || {
            self.collaborators.transcriber.transcribe(narration)
        })
        .await?;

        let captions = self
            .aligner
            .align_observed(script, &segments, &ctx.logger.for_stage("captions"));
        info!(
            job_id = %ctx.logger.job_id(),
            segments = segments.len(),
            captions = captions.len(),
            "Captions aligned"
        );
        Ok((segments, captions))
    }

    async fn background_stage(
        &self,
        script: &str,
        captions: &[CaptionChunk],
        ctx: &JobContext,
    ) -> WorkerResult<Option<Vec<BackgroundInterval>>> {
        let found = retry_async(&self.retry("footage search"), || {
            self.collaborators.footage.search(script, captions)
        })
        .await?;

        let merged = merge_empty(&found);
        let logger = ctx.logger.for_stage("background");
        match &merged {
            Some(list) => {
                logger.log_progress(&format!("{} background intervals after merge", list.len()))
            }
            None => logger.log_warning("no footage found for any interval"),
        }
        Ok(merged)
    }

    fn pause_stage(
        &self,
        template: &Template,
        segments: &[TranscriptSegment],
        captions: &[CaptionChunk],
        ctx: &JobContext,
    ) -> PauseSchedule {
        let logger = ctx.logger.for_stage("pauses");
        let real_duration = segments.iter().map(|s| s.interval.end()).reduce(f64::max);
        let (schedule, mode) = PauseScheduler::schedule_observed(
            &template.pauses(),
            template.reference_duration(),
            real_duration,
            Some(captions),
            &logger,
        );

        let mode = match mode {
            ScheduleMode::Identity => "identity".to_string(),
            ScheduleMode::Proportional { scale } => format!("proportional x{:.3}", scale),
            ScheduleMode::Snapped { scale } => format!("snapped x{:.3}", scale),
        };
        let count: usize = schedule.values().map(Vec::len).sum();
        logger.log_progress(&format!("scheduled {} pauses ({})", count, mode));
        schedule
    }
}
