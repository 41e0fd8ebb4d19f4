//! Render backends.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::config::RenderConfig;
use crate::error::{MediaError, MediaResult};
use crate::filters;
use crate::probe::{audio_duration, probe_media};

use super::settings::RenderSettings;
use super::timeline::{Asset, LayerKind, RenderTimeline};

/// Measures media and encodes timelines.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    /// Duration of an audio file in seconds.
    async fn media_duration(&self, path: &Path) -> MediaResult<f64>;

    /// Check that a fetched clip or template asset can be decoded.
    async fn validate(&self, path: &Path) -> MediaResult<()>;

    /// Encode `timeline` into `output`. `scratch` is a job-private
    /// directory for intermediate files.
    async fn encode(
        &self,
        timeline: &RenderTimeline,
        settings: &RenderSettings,
        output: &Path,
        scratch: &Path,
    ) -> MediaResult<()>;
}

/// An FFmpeg input in graph order.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphInput {
    Lavfi(String),
    File(PathBuf),
    Looped(PathBuf),
}

/// A complete filter graph with its inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGraph {
    pub inputs: Vec<GraphInput>,
    pub filter: String,
    pub video_out: String,
    pub audio_out: String,
}

/// Translate a timeline into one FFmpeg filter graph.
///
/// Input 0 is a black canvas lasting the whole output. Background clips and
/// effect overlays are trimmed, shifted to their start and composited over
/// it in layer order; captions are drawn on top. Narration slices and
/// silences are concatenated in order, then mixed with sound effects and
/// music, the narration deciding the length.
pub fn build_filter_graph(
    timeline: &RenderTimeline,
    settings: &RenderSettings,
) -> MediaResult<FilterGraph> {
    if !timeline.is_renderable() {
        return Err(MediaError::render_failed(
            "timeline has no background or narration layer",
        ));
    }

    let duration = timeline.duration();
    let mut inputs = vec![GraphInput::Lavfi(filters::color_source(
        settings.width,
        settings.height,
        settings.fps,
        duration,
    ))];
    let mut chains: Vec<String> = Vec::new();

    // Video
    let mut current = "0:v".to_string();
    for (i, item) in timeline.layer(LayerKind::Background).items().iter().enumerate() {
        let Asset::Clip(path) = &item.asset else { continue };
        let input = if item.params.looped {
            GraphInput::Looped(path.clone())
        } else {
            GraphInput::File(path.clone())
        };
        let idx = add_input(&mut inputs, input);
        let (start, end) = (item.interval.start(), item.interval.end());
        let label = format!("bg{}", i);
        chains.push(filters::background_segment(
            idx,
            start,
            end - start,
            settings.width,
            settings.height,
            settings.fps,
            &label,
        ));
        let next = format!("vb{}", i);
        chains.push(filters::overlay_between(&current, &label, start, end, &next));
        current = next;
    }

    for (i, item) in timeline.layer(LayerKind::VideoEffects).items().iter().enumerate() {
        let Asset::Overlay(path) = &item.asset else { continue };
        let idx = add_input(&mut inputs, GraphInput::Looped(path.clone()));
        let (start, end) = (item.interval.start(), item.interval.end());
        let label = format!("fxv{}", i);
        chains.push(filters::effect_segment(
            idx,
            start,
            end - start,
            settings.width,
            settings.height,
            settings.effect_opacity,
            &label,
        ));
        let next = format!("ve{}", i);
        chains.push(filters::overlay_between(&current, &label, start, end, &next));
        current = next;
    }

    let texts: Vec<String> = timeline
        .layer(LayerKind::Captions)
        .items()
        .iter()
        .filter_map(|item| match &item.asset {
            Asset::Text(text) => {
                let mut style = settings.caption.clone();
                style.fade = item.params.fade;
                Some(filters::drawtext(
                    text,
                    item.interval.start(),
                    item.interval.end(),
                    &style,
                ))
            }
            _ => None,
        })
        .collect();
    let mut video_tail = String::new();
    if !texts.is_empty() {
        video_tail = format!("{},", texts.join(","));
    }
    chains.push(format!("[{}]{}format=yuv420p[vout]", current, video_tail));

    // Audio
    let rate = settings.sample_rate;
    let narration = timeline.layer(LayerKind::Narration).items();
    let mut narration_input: Option<(PathBuf, usize)> = None;
    let mut pieces = Vec::with_capacity(narration.len());

    for (i, item) in narration.iter().enumerate() {
        let label = format!("n{}", i);
        match &item.asset {
            Asset::Audio(path) => {
                let idx = match &narration_input {
                    Some((p, idx)) if p == path => *idx,
                    _ => {
                        let idx = add_input(&mut inputs, GraphInput::File(path.clone()));
                        narration_input = Some((path.clone(), idx));
                        idx
                    }
                };
                let from = item.params.source_offset;
                let is_last_audio = !narration[i + 1..]
                    .iter()
                    .any(|n| matches!(n.asset, Asset::Audio(_)));
                let to = (!is_last_audio).then(|| from + item.interval.duration());
                chains.push(filters::narration_slice(idx, from, to, rate, &label));
            }
            Asset::Silence => {
                chains.push(filters::silence(item.interval.duration(), rate, &label));
            }
            _ => continue,
        }
        pieces.push(label);
    }

    let joined = match pieces.len() {
        0 => return Err(MediaError::render_failed("narration layer is empty")),
        1 => pieces.remove(0),
        _ => {
            chains.push(filters::concat_audio(&pieces, "narr_cat"));
            "narr_cat".to_string()
        }
    };
    chains.push(filters::volume(&joined, settings.narration_volume, "narr"));

    let mut mix = vec!["narr".to_string()];
    for (kind, prefix) in [(LayerKind::SoundEffects, "sfx"), (LayerKind::Music, "mus")] {
        for (i, item) in timeline.layer(kind).items().iter().enumerate() {
            let Asset::Audio(path) = &item.asset else { continue };
            let input = if item.params.looped {
                GraphInput::Looped(path.clone())
            } else {
                GraphInput::File(path.clone())
            };
            let idx = add_input(&mut inputs, input);
            let label = format!("{}{}", prefix, i);
            chains.push(filters::audio_cue(
                idx,
                item.interval.start(),
                Some(item.interval.duration()),
                item.params.gain,
                rate,
                &label,
            ));
            mix.push(label);
        }
    }
    chains.push(filters::mix_audio(&mix, "aout"));

    Ok(FilterGraph {
        inputs,
        filter: chains.join(";"),
        video_out: "[vout]".to_string(),
        audio_out: "[aout]".to_string(),
    })
}

fn add_input(inputs: &mut Vec<GraphInput>, input: GraphInput) -> usize {
    inputs.push(input);
    inputs.len() - 1
}

/// Backend that shells out to FFmpeg and FFprobe.
pub struct FfmpegBackend {
    config: RenderConfig,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl FfmpegBackend {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            cancel_rx: None,
        }
    }

    /// Kill the encode when the signal turns `true`.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    fn build_command(
        &self,
        graph: FilterGraph,
        duration: f64,
        output: &Path,
        script: Option<&Path>,
    ) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new(output);
        for input in &graph.inputs {
            cmd = match input {
                GraphInput::Lavfi(src) => cmd.lavfi_input(src.clone()),
                GraphInput::File(path) => cmd.input(path),
                GraphInput::Looped(path) => cmd.looped_input(path),
            };
        }

        cmd = match script {
            Some(path) => cmd.filter_complex_script(path),
            None => cmd.filter_complex(graph.filter),
        };

        cmd.map(graph.video_out)
            .map(graph.audio_out)
            .video_codec(&self.config.video_codec)
            .preset(&self.config.preset)
            .crf(self.config.crf)
            .pix_fmt("yuv420p")
            .frame_rate(self.config.fps)
            .audio_codec(&self.config.audio_codec)
            .audio_bitrate(&self.config.audio_bitrate)
            .output_args(["-ar".to_string(), self.config.sample_rate.to_string()])
            .output_args(["-movflags", "+faststart"])
            .output_duration(duration)
    }
}

#[async_trait]
impl RenderBackend for FfmpegBackend {
    async fn media_duration(&self, path: &Path) -> MediaResult<f64> {
        audio_duration(path).await
    }

    async fn validate(&self, path: &Path) -> MediaResult<()> {
        let info = probe_media(path).await?;
        if info.duration > 0.0 || info.has_video {
            Ok(())
        } else {
            Err(MediaError::InvalidMedia(format!(
                "{} has no playable stream",
                path.display()
            )))
        }
    }

    async fn encode(
        &self,
        timeline: &RenderTimeline,
        settings: &RenderSettings,
        output: &Path,
        scratch: &Path,
    ) -> MediaResult<()> {
        let graph = build_filter_graph(timeline, settings)?;
        let duration = timeline.duration();

        let script = if graph.filter.len() > self.config.max_inline_filter_len {
            let path = scratch.join("filter_graph.txt");
            tokio::fs::write(&path, &graph.filter).await?;
            debug!(
                path = %path.display(),
                len = graph.filter.len(),
                "Filter graph written to script"
            );
            Some(path)
        } else {
            None
        };

        let cmd = self.build_command(graph, duration, output, script.as_deref());

        let mut runner = FfmpegRunner::new().with_timeout(self.config.ffmpeg_timeout_secs);
        if let Some(rx) = &self.cancel_rx {
            runner = runner.with_cancel(rx.clone());
        }

        info!(
            output = %output.display(),
            duration = format!("{:.2}s", duration),
            items = timeline.item_count(),
            "Encoding render"
        );
        runner
            .run_with_progress(&cmd, move |p| {
                debug!(percent = format!("{:.0}", p.percentage(duration)), "Render progress");
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::timeline::{EffectParams, TimelineItem};
    use vgen_models::TimeInterval;

    fn iv(start: f64, end: f64) -> TimeInterval {
        TimeInterval::new(start, end).unwrap()
    }

    fn settings() -> RenderSettings {
        RenderSettings::resolve(None, &RenderConfig::default())
    }

    fn base_timeline() -> RenderTimeline {
        let mut t = RenderTimeline::new(6.0);
        t.push(
            LayerKind::Background,
            TimelineItem::new(
                iv(0.0, 6.0),
                Asset::Clip("clip-000.mp4".into()),
                EffectParams::default().looped(),
            ),
        );
        t
    }

    #[test]
    fn test_unrenderable_timeline_fails() {
        let result = build_filter_graph(&RenderTimeline::new(5.0), &settings());
        assert!(matches!(result, Err(MediaError::RenderFailed { .. })));
    }

    #[test]
    fn test_narration_splice_with_silence() {
        let mut t = base_timeline();
        let narration = PathBuf::from("narration.mp3");
        t.push(
            LayerKind::Narration,
            TimelineItem::new(
                iv(0.0, 2.0),
                Asset::Audio(narration.clone()),
                EffectParams::default(),
            ),
        );
        t.push(
            LayerKind::Narration,
            TimelineItem::new(iv(2.0, 3.0), Asset::Silence, EffectParams::default()),
        );
        t.push(
            LayerKind::Narration,
            TimelineItem::new(
                iv(3.0, 6.0),
                Asset::Audio(narration.clone()),
                EffectParams::default().with_source_offset(2.0),
            ),
        );

        let graph = build_filter_graph(&t, &settings()).unwrap();

        // canvas, clip, narration (shared by both slices)
        assert_eq!(graph.inputs.len(), 3);
        assert_eq!(graph.inputs[2], GraphInput::File(narration));
        assert!(graph.filter.contains("[2:a]atrim=start=0.000:end=2.000"));
        assert!(graph.filter.contains("anullsrc"));
        assert!(graph.filter.contains("[2:a]atrim=start=2.000,"));
        assert!(graph.filter.contains("[n0][n1][n2]concat=n=3:v=0:a=1[narr_cat]"));
        assert!(graph.filter.contains("[narr]anull[aout]"));
        assert!(graph.filter.contains("format=yuv420p[vout]"));
    }

    #[test]
    fn test_captions_and_effects_in_graph() {
        let mut t = base_timeline();
        t.push(
            LayerKind::Narration,
            TimelineItem::new(iv(0.0, 6.0), Asset::Audio("n.mp3".into()), EffectParams::default()),
        );
        t.push(
            LayerKind::Captions,
            TimelineItem::new(
                iv(0.0, 2.0),
                Asset::Text("Bananas são".into()),
                EffectParams::default().with_fade(0.3),
            ),
        );
        t.push(
            LayerKind::VideoEffects,
            TimelineItem::new(
                iv(0.0, 3.0),
                Asset::Overlay("fx/glitch.mp4".into()),
                EffectParams::default(),
            ),
        );
        t.push(
            LayerKind::SoundEffects,
            TimelineItem::new(
                iv(1.0, 3.0),
                Asset::Audio("fx/whoosh.mp3".into()),
                EffectParams::gain(0.5),
            ),
        );

        let graph = build_filter_graph(&t, &settings()).unwrap();
        assert!(matches!(graph.inputs[0], GraphInput::Lavfi(_)));
        assert!(graph.filter.contains("[vb0][fxv0]overlay"));
        assert!(graph.filter.contains("[ve0]drawtext="));
        assert!(graph.filter.contains("adelay=1000|1000"));
        assert!(graph.filter.contains("[narr][sfx0]amix=inputs=2"));
    }

    #[test]
    fn test_command_uses_script_for_long_graphs() {
        let backend = FfmpegBackend::new(RenderConfig::default());
        let mut t = base_timeline();
        t.push(
            LayerKind::Narration,
            TimelineItem::new(iv(0.0, 6.0), Asset::Audio("n.mp3".into()), EffectParams::default()),
        );
        let graph = build_filter_graph(&t, &settings()).unwrap();

        let script = Path::new("/tmp/fg.txt");
        let cmd = backend.build_command(graph, 6.0, Path::new("out.mp4"), Some(script));
        let args = cmd.build_args();
        assert!(args.contains(&"-filter_complex_script".to_string()));
        assert!(!args.contains(&"-filter_complex".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "-t" && w[1] == "6.000"));
        assert!(args.windows(2).any(|w| w[0] == "-c:v" && w[1] == "libx264"));
        assert!(args.windows(2).any(|w| w[0] == "-stream_loop" && w[1] == "-1"));
    }
}
