//! Immutable time interval in seconds.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ModelError, ModelResult};
use crate::timestamp::format_seconds;

/// A closed time range `[start, end]` in seconds with `start <= end`.
///
/// Serialized as a two-element array `[start, end]`, which is the shape
/// produced by the transcription and stock-footage collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "(f64, f64)", try_from = "(f64, f64)")]
pub struct TimeInterval {
    start: f64,
    end: f64,
}

impl TimeInterval {
    /// Create a validated interval.
    pub fn new(start: f64, end: f64) -> ModelResult<Self> {
        if !start.is_finite() || !end.is_finite() || start > end {
            return Err(ModelError::InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    /// Create an interval, swapping the bounds if they arrive reversed and
    /// clamping negative values to zero.
    pub fn ordered(a: f64, b: f64) -> Self {
        let a = if a.is_finite() { a.max(0.0) } else { 0.0 };
        let b = if b.is_finite() { b.max(0.0) } else { 0.0 };
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    /// Start time in seconds.
    pub fn start(&self) -> f64 {
        self.start
    }

    /// End time in seconds.
    pub fn end(&self) -> f64 {
        self.end
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Midpoint in seconds.
    pub fn midpoint(&self) -> f64 {
        (self.start + self.end) / 2.0
    }

    /// Whether `t` lies inside the interval (inclusive bounds).
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }

    /// A new interval with a different start.
    pub fn with_start(&self, start: f64) -> ModelResult<Self> {
        Self::new(start, self.end)
    }

    /// A new interval with a different end.
    pub fn with_end(&self, end: f64) -> ModelResult<Self> {
        Self::new(self.start, end)
    }

    /// Smallest interval covering both.
    pub fn span(&self, other: &TimeInterval) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl From<TimeInterval> for (f64, f64) {
    fn from(interval: TimeInterval) -> Self {
        (interval.start, interval.end)
    }
}

impl TryFrom<(f64, f64)> for TimeInterval {
    type Error = ModelError;

    fn try_from((start, end): (f64, f64)) -> Result<Self, Self::Error> {
        Self::new(start, end)
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", format_seconds(self.start), format_seconds(self.end))
    }
}
