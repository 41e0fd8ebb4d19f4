//! Captions and speech-recognition segments.

use serde::{Deserialize, Serialize};

use crate::error::ModelResult;
use crate::interval::TimeInterval;

/// A short run of on-screen text with its own display interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionChunk {
    /// Display interval
    pub interval: TimeInterval,
    /// Caption text
    pub text: String,
}

impl CaptionChunk {
    /// Create a caption chunk.
    pub fn new(interval: TimeInterval, text: impl Into<String>) -> Self {
        Self {
            interval,
            text: text.into(),
        }
    }

    /// Create a caption chunk from raw bounds.
    pub fn from_bounds(start: f64, end: f64, text: impl Into<String>) -> ModelResult<Self> {
        Ok(Self::new(TimeInterval::new(start, end)?, text))
    }
}

/// A span of recognized speech, as returned by the transcription service.
///
/// Serialized in the flat `{start, end, text}` form used by Whisper-style
/// recognizers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSegment", into = "RawSegment")]
pub struct TranscriptSegment {
    /// Time span of the segment
    pub interval: TimeInterval,
    /// Recognized text
    pub text: String,
}

#[derive(Serialize, Deserialize)]
struct RawSegment {
    start: f64,
    end: f64,
    text: String,
}

impl TryFrom<RawSegment> for TranscriptSegment {
    type Error = crate::error::ModelError;

    fn try_from(raw: RawSegment) -> Result<Self, Self::Error> {
        Ok(Self {
            interval: TimeInterval::new(raw.start, raw.end)?,
            text: raw.text,
        })
    }
}

impl From<TranscriptSegment> for RawSegment {
    fn from(segment: TranscriptSegment) -> Self {
        Self {
            start: segment.interval.start(),
            end: segment.interval.end(),
            text: segment.text,
        }
    }
}

impl TranscriptSegment {
    /// Create a segment from raw bounds.
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> ModelResult<Self> {
        Ok(Self {
            interval: TimeInterval::new(start, end)?,
            text: text.into(),
        })
    }
}

/// Full speech-recognition result for a narration track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// Whole-transcript text (may be empty if the recognizer only returns segments)
    #[serde(default)]
    pub text: String,
    /// Ordered segments
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    /// Whole-transcript text, falling back to the joined segment texts.
    pub fn full_text(&self) -> String {
        if !self.text.trim().is_empty() {
            return self.text.clone();
        }
        self.segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// End time of the last segment.
    pub fn end_time(&self) -> Option<f64> {
        self.segments
            .iter()
            .map(|s| s.interval.end())
            .fold(None, |acc, end| Some(acc.map_or(end, |a: f64| a.max(end))))
    }
}
