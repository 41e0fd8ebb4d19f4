//! Shared data models for the narrated video pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Time intervals, captions and transcription segments
//! - Background clip intervals
//! - Templates, pause specifications and their settings
//! - Render jobs and progress messages
//! - Recoverable stage issues and the observer that receives them

pub mod background;
pub mod caption;
pub mod error;
pub mod interval;
pub mod issue;
pub mod job;
pub mod pause;
pub mod progress;
pub mod template;
pub mod timestamp;

// Re-export common types
pub use background::BackgroundInterval;
pub use caption::{CaptionChunk, Transcript, TranscriptSegment};
pub use error::{ModelError, ModelResult};
pub use interval::TimeInterval;
pub use issue::{CollectingObserver, IssueObserver, StageIssue, TracingObserver};
pub use job::{JobId, JobState, RenderJob};
pub use pause::{flatten_schedule, PauseSchedule, PauseSpec, PauseType};
pub use progress::{Milestone, ProgressEvent, ProgressMessage};
pub use template::{
    AudioSettings, ScriptGeneration, SectionAssets, Template, TemplateSection, TextPosition,
    VisualSettings, DEFAULT_REFERENCE_DURATION,
};
pub use timestamp::{format_seconds, parse_duration_label, parse_timestamp, TimestampError};
