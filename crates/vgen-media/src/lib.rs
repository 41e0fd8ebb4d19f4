//! FFmpeg CLI wrapper and composition engine.
//!
//! This crate provides:
//! - Type-safe multi-input FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation and timeouts via tokio
//! - Media probing through ffprobe
//! - Background clip fetching over HTTP or from local files
//! - Filter builders for captions, effect overlays and audio splicing
//! - Per-job scratch workspaces
//! - The composition engine that turns aligned artifacts into one video

pub mod command;
pub mod compose;
pub mod config;
pub mod download;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod metrics;
pub mod probe;
pub mod progress;
pub mod workspace;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compose::{
    Asset, CompositionEngine, EffectParams, FfmpegBackend, Layer, LayerKind, RenderBackend,
    RenderOutput, RenderRequest, RenderSettings, RenderTimeline, TimelineItem,
};
pub use config::RenderConfig;
pub use download::{ClipFetcher, HttpClipFetcher};
pub use error::{MediaError, MediaResult};
pub use fs_utils::move_file;
pub use probe::{probe_media, MediaInfo};
pub use progress::{FfmpegProgress, ProgressCallback};
pub use workspace::JobWorkspace;
