//! The composition engine.

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use vgen_models::{
    flatten_schedule, BackgroundInterval, CaptionChunk, IssueObserver, PauseSchedule, StageIssue,
    Template, TimeInterval,
};
use vgen_timeline::{SectionSpans, TimeWarp};

use crate::config::RenderConfig;
use crate::download::{clip_extension, ClipFetcher};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{move_file, remove_if_exists};
use crate::metrics::metric_names;
use crate::workspace::JobWorkspace;

use super::backend::RenderBackend;
use super::settings::RenderSettings;
use super::timeline::{Asset, EffectParams, LayerKind, RenderTimeline, TimelineItem};

/// Concurrent clip downloads per render.
const FETCH_CONCURRENCY: usize = 4;

/// Background intervals closer than this are treated as touching.
const BOUNDARY_EPSILON: f64 = 1e-6;

/// Inputs for one render.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Narration audio file
    pub narration: PathBuf,
    /// Captions in narration time
    pub captions: Vec<CaptionChunk>,
    /// Background track in narration time; `None` means no background is available
    pub background: Option<Vec<BackgroundInterval>>,
    pub template: Option<Arc<Template>>,
    /// Resolved pauses in narration time
    pub pauses: Option<PauseSchedule>,
    /// Public output path
    pub output: PathBuf,
}

/// Result of a successful render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    pub path: PathBuf,
    /// Output duration in seconds
    pub duration: f64,
    pub background_clips: usize,
    pub skipped_intervals: usize,
    pub skipped_effects: usize,
}

/// A background interval whose clip is on disk.
struct FetchedClip {
    interval: TimeInterval,
    path: PathBuf,
}

/// Builds the layered timeline and hands it to a [`RenderBackend`].
pub struct CompositionEngine {
    backend: Arc<dyn RenderBackend>,
    fetcher: Arc<dyn ClipFetcher>,
    config: RenderConfig,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl CompositionEngine {
    pub fn new(
        backend: Arc<dyn RenderBackend>,
        fetcher: Arc<dyn ClipFetcher>,
        config: RenderConfig,
    ) -> Self {
        Self {
            backend,
            fetcher,
            config,
            cancel_rx: None,
        }
    }

    /// Abort between steps when the signal turns `true`.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Render one video.
    ///
    /// Fails with [`MediaError::CoverageFailure`] when no background clip is
    /// usable and [`MediaError::RenderFailed`] when encoding fails. Clips or
    /// effects that cannot be fetched are reported to `observer` and left
    /// out. Nothing is written to `request.output` unless the encode
    /// succeeds.
    pub async fn render(
        &self,
        request: &RenderRequest,
        workspace: &JobWorkspace,
        observer: &dyn IssueObserver,
    ) -> MediaResult<RenderOutput> {
        let started = Instant::now();

        let background = match &request.background {
            Some(list) if list.iter().any(BackgroundInterval::has_clip) => list,
            _ => return Err(MediaError::coverage("no background clips available")),
        };

        let template = request.template.as_deref();
        let settings = RenderSettings::resolve(template, &self.config);

        let narration_duration = self
            .backend
            .media_duration(&request.narration)
            .await
            .map_err(|e| MediaError::render_failed(format!("cannot read narration: {}", e)))?;
        if !(narration_duration.is_finite() && narration_duration > 0.0) {
            return Err(MediaError::render_failed("narration has no duration"));
        }

        let pauses = request
            .pauses
            .as_ref()
            .map(flatten_schedule)
            .unwrap_or_default();
        let warp = TimeWarp::new(&pauses, narration_duration);

        self.check_cancelled()?;
        let (clips, skipped_intervals) = self.fetch_clips(background, workspace, observer).await;
        self.check_cancelled()?;

        if clips.is_empty() {
            return Err(MediaError::coverage(format!(
                "all {} background clips failed to fetch",
                skipped_intervals
            )));
        }

        let mut timeline = RenderTimeline::new(warp.total_duration());
        self.add_background(&mut timeline, &clips, &warp);
        self.add_captions(&mut timeline, &request.captions, &warp);
        add_narration(&mut timeline, &request.narration, &warp);

        let skipped_effects = match template.filter(|_| settings.effects_enabled) {
            Some(template) => {
                let sections = SectionSpans::layout(&template.sections, narration_duration);
                let checked = self.check_assets(template).await;
                self.add_template_assets(
                    &mut timeline,
                    template,
                    &sections,
                    &clips,
                    &warp,
                    &settings,
                    &checked,
                    observer,
                )
            }
            None => 0,
        };

        debug!(
            duration = timeline.duration(),
            items = timeline.item_count(),
            splices = warp.points().len(),
            "Built render timeline"
        );

        let output = self.encode(&timeline, &settings, workspace, &request.output).await?;

        if let Err(e) = workspace.clear_clips().await {
            warn!("Failed to clear fetched clips: {}", e);
        }

        metrics::histogram!(metric_names::RENDER_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        info!(
            output = %output.display(),
            duration = format!("{:.2}s", timeline.duration()),
            clips = clips.len(),
            skipped_intervals,
            skipped_effects,
            "Render complete"
        );

        Ok(RenderOutput {
            path: output,
            duration: timeline.duration(),
            background_clips: clips.len(),
            skipped_intervals,
            skipped_effects,
        })
    }

    fn check_cancelled(&self) -> MediaResult<()> {
        match &self.cancel_rx {
            Some(rx) if *rx.borrow() => Err(MediaError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Fetch every clip, keeping order. Failures are reported and skipped.
    async fn fetch_clips(
        &self,
        background: &[BackgroundInterval],
        workspace: &JobWorkspace,
        observer: &dyn IssueObserver,
    ) -> (Vec<FetchedClip>, usize) {
        let fetches: Vec<_> = background
            .iter()
            .enumerate()
            .filter_map(|(i, bg)| {
                let clip = bg.clip.clone()?;
                let dest = workspace.clip_path(i, &clip_extension(&clip));
                let fetcher = Arc::clone(&self.fetcher);
                let backend = Arc::clone(&self.backend);
                let interval = bg.interval;
                Some(async move {
                    let result = match fetcher.fetch(&clip, &dest).await {
                        Ok(path) => backend.validate(&path).await.map(|()| path),
                        Err(e) => Err(e),
                    };
                    (interval, clip, result)
                })
            })
            .collect();
        let results: Vec<_> = stream::iter(fetches).buffered(FETCH_CONCURRENCY).collect().await;

        let mut clips = Vec::with_capacity(results.len());
        let mut skipped = 0;
        for (interval, clip, result) in results {
            match result {
                Ok(path) => {
                    metrics::counter!(metric_names::CLIP_FETCH_TOTAL, "outcome" => "ok")
                        .increment(1);
                    clips.push(FetchedClip { interval, path });
                }
                Err(e) => {
                    metrics::counter!(metric_names::CLIP_FETCH_TOTAL, "outcome" => "failed")
                        .increment(1);
                    skipped += 1;
                    observer.observe(StageIssue::PartialFetchFailure {
                        asset: clip,
                        interval: Some(interval),
                        reason: e.to_string(),
                    });
                }
            }
        }
        (clips, skipped)
    }

    fn add_background(
        &self,
        timeline: &mut RenderTimeline,
        clips: &[FetchedClip],
        warp: &TimeWarp,
    ) {
        let mut mapped: Vec<TimeInterval> =
            clips.iter().map(|c| warp.map_interval(&c.interval)).collect();

        // A pause on the boundary of two adjacent clips falls between their
        // mapped intervals; the earlier clip covers it.
        for i in 1..clips.len() {
            let adjacent = (clips[i].interval.start() - clips[i - 1].interval.end()).abs()
                < BOUNDARY_EPSILON;
            let next_start = mapped[i].start();
            if adjacent && next_start > mapped[i - 1].end() {
                mapped[i - 1] = TimeInterval::ordered(mapped[i - 1].start(), next_start);
            }
        }

        // Silence appended after the narration still needs picture.
        if let (Some(clip), Some(interval)) = (clips.last(), mapped.last_mut()) {
            if interval.end() < timeline.duration()
                && clip.interval.end() >= warp.narration_duration()
            {
                *interval = TimeInterval::ordered(interval.start(), timeline.duration());
            }
        }

        for (clip, interval) in clips.iter().zip(mapped) {
            timeline.push(
                LayerKind::Background,
                TimelineItem::new(
                    interval,
                    Asset::Clip(clip.path.clone()),
                    EffectParams::default().looped(),
                ),
            );
        }
    }

    fn add_captions(
        &self,
        timeline: &mut RenderTimeline,
        captions: &[CaptionChunk],
        warp: &TimeWarp,
    ) {
        for caption in captions.iter().filter(|c| !c.text.trim().is_empty()) {
            timeline.push(
                LayerKind::Captions,
                TimelineItem::new(
                    warp.map_interval(&caption.interval),
                    Asset::Text(caption.text.clone()),
                    EffectParams::default().with_fade(self.config.caption_fade),
                ),
            );
        }
    }

    /// Probe every asset the template references, once per path.
    async fn check_assets(&self, template: &Template) -> HashMap<PathBuf, Result<(), String>> {
        let mut checked = HashMap::new();
        for section in &template.sections {
            let assets = &section.assets;
            let paths = assets
                .video_effects
                .iter()
                .chain(&assets.audio_effects)
                .chain(assets.background_music.iter());
            for path in paths {
                if checked.contains_key(path) {
                    continue;
                }
                let result = if path.is_file() {
                    self.backend.validate(path).await.map_err(|e| e.to_string())
                } else {
                    Err("not found".to_string())
                };
                checked.insert(path.clone(), result);
            }
        }
        checked
    }

    #[allow(clippy::too_many_arguments)]
    fn add_template_assets(
        &self,
        timeline: &mut RenderTimeline,
        template: &Template,
        sections: &SectionSpans,
        clips: &[FetchedClip],
        warp: &TimeWarp,
        settings: &RenderSettings,
        checked: &HashMap<PathBuf, Result<(), String>>,
        observer: &dyn IssueObserver,
    ) -> usize {
        let mut skipped = 0usize;
        let mut usable = |path: &Path, kind: &'static str, section: &str| -> bool {
            let Some(Err(reason)) = checked.get(path) else { return true };
            skipped += 1;
            metrics::counter!(metric_names::EFFECTS_SKIPPED_TOTAL, "kind" => kind).increment(1);
            observer.observe(StageIssue::PartialFetchFailure {
                asset: path.display().to_string(),
                interval: None,
                reason: format!("{} asset for section {:?}: {}", kind, section, reason),
            });
            false
        };

        // Video effects over each background interval of the owning section.
        for clip in clips {
            let Some(span) = sections.owner_of(&clip.interval) else { continue };
            let Some(section) = template.sections.get(span.index) else { continue };
            for effect in &section.assets.video_effects {
                if usable(effect, "video", &section.name) {
                    timeline.push(
                        LayerKind::VideoEffects,
                        TimelineItem::new(
                            warp.map_interval(&clip.interval),
                            Asset::Overlay(effect.clone()),
                            EffectParams::default(),
                        ),
                    );
                }
            }
        }

        // Sound effects at section start, music across the section.
        for span in sections.spans() {
            let Some(section) = template.sections.get(span.index) else { continue };
            let interval = warp.map_interval(&span.interval);

            for effect in &section.assets.audio_effects {
                if usable(effect, "audio", &section.name) {
                    timeline.push(
                        LayerKind::SoundEffects,
                        TimelineItem::new(
                            interval,
                            Asset::Audio(effect.clone()),
                            EffectParams::gain(settings.effects_volume),
                        ),
                    );
                }
            }

            if let Some(music) = &section.assets.background_music {
                if usable(music, "music", &section.name) {
                    timeline.push(
                        LayerKind::Music,
                        TimelineItem::new(
                            interval,
                            Asset::Audio(music.clone()),
                            EffectParams::gain(settings.music_volume).looped(),
                        ),
                    );
                }
            }
        }

        skipped
    }

    async fn encode(
        &self,
        timeline: &RenderTimeline,
        settings: &RenderSettings,
        workspace: &JobWorkspace,
        output: &Path,
    ) -> MediaResult<PathBuf> {
        let staging = workspace.staging_output();

        let result = self
            .backend
            .encode(timeline, settings, &staging, workspace.path())
            .await;

        if let Err(e) = result {
            remove_if_exists(&staging).await?;
            return Err(match e {
                MediaError::Cancelled => MediaError::Cancelled,
                MediaError::RenderFailed { reason } => MediaError::render_failed(reason),
                MediaError::FfmpegFailed {
                    message,
                    stderr: Some(stderr),
                    ..
                } => MediaError::render_failed(format!("{}: {}", message, stderr)),
                other => MediaError::render_failed(other.to_string()),
            });
        }

        if !staging.is_file() {
            return Err(MediaError::render_failed("encoder produced no output"));
        }

        move_file(&staging, output)
            .await
            .map_err(|e| MediaError::render_failed(format!("cannot publish output: {}", e)))?;
        Ok(output.to_path_buf())
    }
}

/// Narration slices separated by the inserted silences.
fn add_narration(timeline: &mut RenderTimeline, narration: &Path, warp: &TimeWarp) {
    let mut source = 0.0f64;
    let mut out = 0.0f64;

    for point in warp.points() {
        out += push_slice(timeline, narration, source, point.position, out);
        source = source.max(point.position);

        timeline.push(
            LayerKind::Narration,
            TimelineItem::new(
                TimeInterval::ordered(out, out + point.duration),
                Asset::Silence,
                EffectParams::default(),
            ),
        );
        out += point.duration;
    }
    push_slice(timeline, narration, source, warp.narration_duration(), out);
}

/// Place narration `[from, to)` at output time `at`. Returns the length placed.
fn push_slice(timeline: &mut RenderTimeline, narration: &Path, from: f64, to: f64, at: f64) -> f64 {
    let len = to - from;
    if len <= 0.0 {
        return 0.0;
    }
    timeline.push(
        LayerKind::Narration,
        TimelineItem::new(
            TimeInterval::ordered(at, at + len),
            Asset::Audio(narration.to_path_buf()),
            EffectParams::default().with_source_offset(from),
        ),
    );
    len
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use vgen_models::{
        CollectingObserver, JobId, PauseSpec, PauseType, SectionAssets, TemplateSection,
    };

    struct FakeBackend {
        duration: f64,
        fail: bool,
        rendered: Mutex<Option<RenderTimeline>>,
    }

    impl FakeBackend {
        fn new(duration: f64) -> Self {
            Self {
                duration,
                fail: false,
                rendered: Mutex::new(None),
            }
        }

        fn failing(duration: f64) -> Self {
            Self {
                fail: true,
                ..Self::new(duration)
            }
        }

        fn timeline(&self) -> RenderTimeline {
            self.rendered.lock().unwrap().clone().unwrap()
        }
    }

    #[async_trait]
    impl RenderBackend for FakeBackend {
        async fn media_duration(&self, _path: &Path) -> MediaResult<f64> {
            Ok(self.duration)
        }

        async fn validate(&self, path: &Path) -> MediaResult<()> {
            let body = tokio::fs::read(path).await?;
            if body.starts_with(b"<html") {
                return Err(MediaError::InvalidMedia(format!("{} is not media", path.display())));
            }
            Ok(())
        }

        async fn encode(
            &self,
            timeline: &RenderTimeline,
            _settings: &RenderSettings,
            output: &Path,
            _scratch: &Path,
        ) -> MediaResult<()> {
            *self.rendered.lock().unwrap() = Some(timeline.clone());
            // Leave a partial file behind like a crashed encoder would.
            tokio::fs::write(output, b"partial").await?;
            if self.fail {
                return Err(MediaError::ffmpeg_failed(
                    "encoder crashed",
                    Some("disk full".into()),
                    Some(1),
                ));
            }
            Ok(())
        }
    }

    /// Writes a marker for every reference not listed as broken.
    struct FakeFetcher {
        broken: HashSet<String>,
    }

    #[async_trait]
    impl ClipFetcher for FakeFetcher {
        async fn fetch(&self, reference: &str, dest: &Path) -> MediaResult<PathBuf> {
            if self.broken.contains(reference) {
                return Err(MediaError::download_failed(format!("{} returned 404", reference)));
            }
            // Servers answering 200 with an error page.
            let body = if reference.ends_with(".html") {
                b"<html><body>gone</body></html>".to_vec()
            } else {
                reference.as_bytes().to_vec()
            };
            tokio::fs::write(dest, body).await?;
            Ok(dest.to_path_buf())
        }
    }

    struct Fixture {
        _root: TempDir,
        workspace: JobWorkspace,
        output: PathBuf,
    }

    fn fixture() -> Fixture {
        let root = TempDir::new().unwrap();
        let workspace = JobWorkspace::create(root.path().join("work"), &JobId::new()).unwrap();
        let output = root.path().join("public").join("video.mp4");
        Fixture {
            _root: root,
            workspace,
            output,
        }
    }

    fn engine(backend: Arc<FakeBackend>, broken: &[&str]) -> CompositionEngine {
        let fetcher = FakeFetcher {
            broken: broken.iter().map(|s| s.to_string()).collect(),
        };
        CompositionEngine::new(backend, Arc::new(fetcher), RenderConfig::default())
    }

    fn bg(start: f64, end: f64, url: &str) -> BackgroundInterval {
        BackgroundInterval::with_clip(TimeInterval::new(start, end).unwrap(), url)
    }

    fn request(fx: &Fixture, background: Option<Vec<BackgroundInterval>>) -> RenderRequest {
        RenderRequest {
            narration: PathBuf::from("narration.mp3"),
            captions: vec![
                CaptionChunk::from_bounds(0.0, 2.0, "Bananas são").unwrap(),
                CaptionChunk::from_bounds(2.0, 3.0, "frutas").unwrap(),
            ],
            background,
            template: None,
            pauses: None,
            output: fx.output.clone(),
        }
    }

    #[tokio::test]
    async fn test_no_background_is_coverage_failure() {
        let fx = fixture();
        let backend = Arc::new(FakeBackend::new(3.0));
        let engine = engine(backend, &[]);
        let observer = CollectingObserver::new();

        for background in [None, Some(Vec::new())] {
            let result = engine
                .render(&request(&fx, background), &fx.workspace, &observer)
                .await;
            assert!(matches!(result, Err(MediaError::CoverageFailure { .. })));
            assert!(!fx.output.exists());
        }
    }

    #[tokio::test]
    async fn test_all_fetches_failing_is_coverage_failure() {
        let fx = fixture();
        let engine = engine(Arc::new(FakeBackend::new(3.0)), &["https://v/a.mp4"]);
        let observer = CollectingObserver::new();

        let background = vec![bg(0.0, 3.0, "https://v/a.mp4")];
        let result = engine
            .render(&request(&fx, Some(background)), &fx.workspace, &observer)
            .await;

        assert!(matches!(result, Err(MediaError::CoverageFailure { .. })));
        assert!(!fx.output.exists());
        assert_eq!(observer.count("partial_fetch_failure"), 1);
    }

    #[tokio::test]
    async fn test_failed_interval_is_skipped() {
        let fx = fixture();
        let backend = Arc::new(FakeBackend::new(3.0));
        let engine = engine(Arc::clone(&backend), &["https://v/broken.mp4"]);
        let observer = CollectingObserver::new();

        let background = vec![
            bg(0.0, 1.5, "https://v/broken.mp4"),
            bg(1.5, 3.0, "https://v/ok.mp4"),
        ];
        let output = engine
            .render(&request(&fx, Some(background)), &fx.workspace, &observer)
            .await
            .unwrap();

        assert!(fx.output.is_file());
        assert_eq!(output.skipped_intervals, 1);
        assert_eq!(output.background_clips, 1);
        assert_eq!(observer.count("partial_fetch_failure"), 1);

        let timeline = backend.timeline();
        let bg_items = timeline.layer(LayerKind::Background).items();
        assert_eq!(bg_items.len(), 1);
        assert_eq!(bg_items[0].interval.start(), 1.5);
        assert_eq!(timeline.duration(), 3.0);
        assert_eq!(timeline.layer(LayerKind::Captions).items().len(), 2);
        assert!(!fx.workspace.staging_output().exists());
    }

    #[tokio::test]
    async fn test_pauses_insert_silence_and_shift_captions() {
        let fx = fixture();
        let backend = Arc::new(FakeBackend::new(3.0));
        let engine = engine(Arc::clone(&backend), &[]);

        let mut pauses = PauseSchedule::new();
        pauses.insert(
            PauseType::Dramatic,
            vec![PauseSpec::new(PauseType::Dramatic, 2.0, 1.0)],
        );
        let mut req = request(&fx, Some(vec![bg(0.0, 3.0, "https://v/a.mp4")]));
        req.pauses = Some(pauses);

        let output = engine
            .render(&req, &fx.workspace, &CollectingObserver::new())
            .await
            .unwrap();
        assert_eq!(output.duration, 4.0);

        let timeline = backend.timeline();
        let narration = timeline.layer(LayerKind::Narration).items();
        assert_eq!(narration.len(), 3);
        assert_eq!(narration[1].asset, Asset::Silence);
        assert_eq!(narration[1].interval.start(), 2.0);
        assert_eq!(narration[2].params.source_offset, 2.0);
        assert_eq!(narration[2].interval.end(), 4.0);

        let captions = timeline.layer(LayerKind::Captions).items();
        assert_eq!(captions[0].interval.end(), 2.0);
        assert_eq!(captions[1].interval.start(), 3.0);
        assert_eq!(captions[1].interval.end(), 4.0);

        let background = timeline.layer(LayerKind::Background).items();
        assert_eq!(background[0].interval.end(), 4.0);
    }

    #[tokio::test]
    async fn test_pause_past_end_is_appended_with_picture() {
        let fx = fixture();
        let backend = Arc::new(FakeBackend::new(3.0));
        let engine = engine(Arc::clone(&backend), &[]);

        let mut pauses = PauseSchedule::new();
        pauses.insert(
            PauseType::Breathing,
            vec![PauseSpec::new(PauseType::Breathing, 10.0, 0.5)],
        );
        let mut req = request(&fx, Some(vec![bg(0.0, 3.0, "https://v/a.mp4")]));
        req.pauses = Some(pauses);

        engine.render(&req, &fx.workspace, &CollectingObserver::new()).await.unwrap();

        let timeline = backend.timeline();
        assert_eq!(timeline.duration(), 3.5);
        let narration = timeline.layer(LayerKind::Narration).items();
        assert_eq!(narration.len(), 2);
        assert_eq!(narration[1].asset, Asset::Silence);
        assert_eq!(timeline.layer(LayerKind::Background).items()[0].interval.end(), 3.5);
    }

    #[tokio::test]
    async fn test_pause_at_clip_boundary_keeps_picture() {
        let fx = fixture();
        let backend = Arc::new(FakeBackend::new(3.0));
        let engine = engine(Arc::clone(&backend), &[]);

        let mut pauses = PauseSchedule::new();
        pauses.insert(
            PauseType::Dramatic,
            vec![PauseSpec::new(PauseType::Dramatic, 2.0, 1.0)],
        );
        let background = vec![bg(0.0, 2.0, "https://v/a.mp4"), bg(2.0, 3.0, "https://v/b.mp4")];
        let mut req = request(&fx, Some(background));
        req.pauses = Some(pauses);

        engine.render(&req, &fx.workspace, &CollectingObserver::new()).await.unwrap();

        let timeline = backend.timeline();
        assert_eq!(timeline.duration(), 4.0);
        let items = timeline.layer(LayerKind::Background).items();
        assert_eq!(items.len(), 2);
        assert_eq!((items[0].interval.start(), items[0].interval.end()), (0.0, 3.0));
        assert_eq!((items[1].interval.start(), items[1].interval.end()), (3.0, 4.0));
        for t in [0.5, 2.0, 2.5, 3.0, 3.9] {
            assert!(
                items.iter().any(|i| i.interval.start() <= t && t < i.interval.end()),
                "no background at {}",
                t
            );
        }
    }

    #[tokio::test]
    async fn test_gap_from_failed_clip_is_not_covered() {
        let fx = fixture();
        let backend = Arc::new(FakeBackend::new(3.0));
        let engine = engine(Arc::clone(&backend), &["https://v/b.mp4"]);

        let background = vec![
            bg(0.0, 1.0, "https://v/a.mp4"),
            bg(1.0, 2.0, "https://v/b.mp4"),
            bg(2.0, 3.0, "https://v/c.mp4"),
        ];
        engine
            .render(&request(&fx, Some(background)), &fx.workspace, &CollectingObserver::new())
            .await
            .unwrap();

        let timeline = backend.timeline();
        let items = timeline.layer(LayerKind::Background).items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].interval.end(), 1.0);
        assert_eq!(items[1].interval.start(), 2.0);
    }

    #[tokio::test]
    async fn test_undecodable_clip_is_skipped() {
        let fx = fixture();
        let backend = Arc::new(FakeBackend::new(3.0));
        let engine = engine(Arc::clone(&backend), &[]);
        let observer = CollectingObserver::new();

        let background = vec![
            bg(0.0, 1.5, "https://v/removed.html"),
            bg(1.5, 3.0, "https://v/ok.mp4"),
        ];
        let output = engine
            .render(&request(&fx, Some(background)), &fx.workspace, &observer)
            .await
            .unwrap();

        assert!(fx.output.is_file());
        assert_eq!(output.background_clips, 1);
        assert_eq!(output.skipped_intervals, 1);
        assert_eq!(observer.count("partial_fetch_failure"), 1);
        let items = backend.timeline().layer(LayerKind::Background).items().to_vec();
        assert_eq!(items[0].interval.start(), 1.5);
    }

    #[tokio::test]
    async fn test_corrupt_effect_asset_is_skipped() {
        let fx = fixture();
        let glitch = fx.workspace.file("glitch.mp4");
        let whoosh = fx.workspace.file("whoosh.mp3");
        tokio::fs::write(&glitch, b"<html>moved</html>").await.unwrap();
        tokio::fs::write(&whoosh, b"audio").await.unwrap();

        let template = Template::new("t", "T").with_section(
            TemplateSection::new("gancho", 3.0).with_assets(SectionAssets {
                audio_effects: vec![whoosh.clone()],
                video_effects: vec![glitch],
                background_music: None,
            }),
        );

        let backend = Arc::new(FakeBackend::new(3.0));
        let engine = engine(Arc::clone(&backend), &[]);
        let observer = CollectingObserver::new();
        let mut req = request(&fx, Some(vec![bg(0.0, 3.0, "https://v/a.mp4")]));
        req.template = Some(Arc::new(template));

        let output = engine.render(&req, &fx.workspace, &observer).await.unwrap();
        assert_eq!(output.skipped_effects, 1);
        assert_eq!(observer.count("partial_fetch_failure"), 1);

        let timeline = backend.timeline();
        assert!(timeline.layer(LayerKind::VideoEffects).is_empty());
        let sounds = timeline.layer(LayerKind::SoundEffects).items();
        assert_eq!(sounds.len(), 1);
        assert_eq!(sounds[0].asset, Asset::Audio(whoosh));
    }

    #[tokio::test]
    async fn test_encode_failure_leaves_no_output() {
        let fx = fixture();
        let engine = engine(Arc::new(FakeBackend::failing(3.0)), &[]);

        let result = engine
            .render(
                &request(&fx, Some(vec![bg(0.0, 3.0, "https://v/a.mp4")])),
                &fx.workspace,
                &CollectingObserver::new(),
            )
            .await;

        match result {
            Err(MediaError::RenderFailed { reason }) => assert!(reason.contains("disk full")),
            other => panic!("expected render failure, got {:?}", other),
        }
        assert!(!fx.output.exists());
        assert!(!fx.workspace.staging_output().exists());
    }

    #[tokio::test]
    async fn test_template_assets_and_missing_effects() {
        let fx = fixture();
        let music = fx.workspace.file("music.mp3");
        tokio::fs::write(&music, b"music").await.unwrap();

        let template = Template::new("t", "T")
            .with_section(TemplateSection::new("gancho", 1.0).with_assets(SectionAssets {
                audio_effects: vec![PathBuf::from("/missing/whoosh.mp3")],
                video_effects: vec![PathBuf::from("/missing/glitch.mp4")],
                background_music: Some(music.clone()),
            }))
            .with_section(TemplateSection::new("fim", 1.0));

        let backend = Arc::new(FakeBackend::new(4.0));
        let engine = engine(Arc::clone(&backend), &[]);
        let observer = CollectingObserver::new();

        let background = vec![bg(0.0, 2.0, "https://v/a.mp4"), bg(2.0, 4.0, "https://v/b.mp4")];
        let mut req = request(&fx, Some(background));
        req.template = Some(Arc::new(template));

        let output = engine.render(&req, &fx.workspace, &observer).await.unwrap();
        assert_eq!(output.skipped_effects, 2);
        assert_eq!(observer.count("partial_fetch_failure"), 2);

        let timeline = backend.timeline();
        assert!(timeline.layer(LayerKind::VideoEffects).is_empty());
        assert!(timeline.layer(LayerKind::SoundEffects).is_empty());
        let music_items = timeline.layer(LayerKind::Music).items();
        assert_eq!(music_items.len(), 1);
        assert_eq!(music_items[0].interval.end(), 2.0);
        assert!((music_items[0].params.gain - 0.3).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_cancelled_before_fetch() {
        let fx = fixture();
        let (tx, rx) = watch::channel(true);
        let engine = engine(Arc::new(FakeBackend::new(3.0)), &[]).with_cancel(rx);

        let result = engine
            .render(
                &request(&fx, Some(vec![bg(0.0, 3.0, "https://v/a.mp4")])),
                &fx.workspace,
                &CollectingObserver::new(),
            )
            .await;
        assert!(matches!(result, Err(MediaError::Cancelled)));
        assert!(!fx.output.exists());
        drop(tx);
    }
}
