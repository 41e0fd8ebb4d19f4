//! Timeline alignment for narrated videos.
//!
//! Pure functions that turn independently produced artifacts into one
//! consistent timeline:
//! - [`CaptionAligner`]: transcript text + recognizer segments -> timed captions
//! - [`merge_empty`]: sparse background intervals -> gap-free background track
//! - [`PauseScheduler`]: authored pauses -> pauses on the real narration
//! - [`SectionSpans`]: template sections laid over the real narration
//! - [`TimeWarp`]: narration time -> output time once pauses are inserted

pub mod aligner;
pub mod merger;
pub mod scheduler;
pub mod sections;
pub mod warp;

pub use aligner::{CaptionAligner, CharTimestampMap, DEFAULT_MAX_CHUNK_SIZE};
pub use merger::merge_empty;
pub use scheduler::{PauseScheduler, ScheduleMode};
pub use sections::{SectionSpan, SectionSpans};
pub use warp::{SplicePoint, TimeWarp};
