//! Layered render timeline.

use std::path::PathBuf;

use vgen_models::TimeInterval;

/// Timeline layers, bottom to top for video and in mix order for audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Background,
    VideoEffects,
    Captions,
    Narration,
    SoundEffects,
    Music,
}

impl LayerKind {
    pub const ALL: [LayerKind; 6] = [
        LayerKind::Background,
        LayerKind::VideoEffects,
        LayerKind::Captions,
        LayerKind::Narration,
        LayerKind::SoundEffects,
        LayerKind::Music,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::Background => "background",
            LayerKind::VideoEffects => "video_effects",
            LayerKind::Captions => "captions",
            LayerKind::Narration => "narration",
            LayerKind::SoundEffects => "sound_effects",
            LayerKind::Music => "music",
        }
    }
}

/// What a timeline item plays.
#[derive(Debug, Clone, PartialEq)]
pub enum Asset {
    /// Background footage
    Clip(PathBuf),
    /// Template video effect composited over the background
    Overlay(PathBuf),
    /// Caption text
    Text(String),
    /// Audio file (narration, sound effect or music)
    Audio(PathBuf),
    /// Inserted silence
    Silence,
}

/// Per-item rendering parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectParams {
    /// Audio gain
    pub gain: f64,
    /// Fade-in / fade-out length, seconds
    pub fade: f64,
    /// Where playback starts inside the source, seconds
    pub source_offset: f64,
    /// Loop the source to fill the interval
    pub looped: bool,
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            gain: 1.0,
            fade: 0.0,
            source_offset: 0.0,
            looped: false,
        }
    }
}

impl EffectParams {
    pub fn gain(gain: f64) -> Self {
        Self {
            gain,
            ..Self::default()
        }
    }

    pub fn with_fade(mut self, fade: f64) -> Self {
        self.fade = fade;
        self
    }

    pub fn with_source_offset(mut self, offset: f64) -> Self {
        self.source_offset = offset;
        self
    }

    pub fn looped(mut self) -> Self {
        self.looped = true;
        self
    }
}

/// One element placed on the output timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineItem {
    /// Span in output time
    pub interval: TimeInterval,
    pub asset: Asset,
    pub params: EffectParams,
}

impl TimelineItem {
    pub fn new(interval: TimeInterval, asset: Asset, params: EffectParams) -> Self {
        Self {
            interval,
            asset,
            params,
        }
    }
}

/// Items of one kind ordered by start time.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub kind: LayerKind,
    items: Vec<TimelineItem>,
}

impl Layer {
    fn new(kind: LayerKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
        }
    }

    pub fn items(&self) -> &[TimelineItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn insert(&mut self, item: TimelineItem) {
        // Stable for equal starts: later pushes go after earlier ones.
        let at = self
            .items
            .partition_point(|i| i.interval.start() <= item.interval.start());
        self.items.insert(at, item);
    }
}

/// Everything the backend needs to encode one output file.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTimeline {
    duration: f64,
    layers: Vec<Layer>,
}

impl RenderTimeline {
    /// Empty timeline of the given output duration.
    pub fn new(duration: f64) -> Self {
        Self {
            duration: duration.max(0.0),
            layers: LayerKind::ALL.iter().map(|k| Layer::new(*k)).collect(),
        }
    }

    /// Output duration. Equals the final audio duration.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, kind: LayerKind) -> &Layer {
        // Every kind is created in `new`.
        &self.layers[LayerKind::ALL.iter().position(|k| *k == kind).unwrap_or(0)]
    }

    /// Add an item, clipped to the output duration. Items entirely past
    /// the end are discarded.
    pub fn push(&mut self, kind: LayerKind, item: TimelineItem) -> bool {
        let start = item.interval.start();
        if start >= self.duration && self.duration > 0.0 {
            return false;
        }
        let end = item.interval.end().min(self.duration);
        let item = TimelineItem {
            interval: TimeInterval::ordered(start, end),
            ..item
        };

        if let Some(layer) = self.layers.iter_mut().find(|l| l.kind == kind) {
            layer.insert(item);
            true
        } else {
            false
        }
    }

    /// Total item count across layers.
    pub fn item_count(&self) -> usize {
        self.layers.iter().map(|l| l.items.len()).sum()
    }

    /// Whether the timeline has picture and sound to encode.
    pub fn is_renderable(&self) -> bool {
        self.duration > 0.0
            && !self.layer(LayerKind::Background).is_empty()
            && !self.layer(LayerKind::Narration).is_empty()
    }
}
