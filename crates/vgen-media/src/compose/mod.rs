//! Composition of aligned artifacts into one rendered video.
//!
//! # Architecture
//!
//! - [`RenderSettings`]: template configuration resolved into concrete values
//! - [`RenderTimeline`]: layered, time-indexed description of the output
//! - [`CompositionEngine`]: fetches clips, builds the timeline, drives the backend
//! - [`RenderBackend`]: encodes a timeline; [`FfmpegBackend`] is the real one

mod backend;
mod engine;
mod settings;
mod timeline;

pub use backend::{build_filter_graph, FfmpegBackend, FilterGraph, GraphInput, RenderBackend};
pub use engine::{CompositionEngine, RenderOutput, RenderRequest};
pub use settings::RenderSettings;
pub use timeline::{Asset, EffectParams, Layer, LayerKind, RenderTimeline, TimelineItem};
