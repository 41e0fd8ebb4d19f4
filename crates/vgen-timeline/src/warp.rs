//! Narration time to output time once silence is inserted.
//!
//! Each pause inserts silence at its position and the narration resumes
//! where it stopped, so everything after a pause shifts later by the pause
//! duration.

use vgen_models::{PauseSpec, TimeInterval};

/// A point where the narration is split and silence inserted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplicePoint {
    /// Position in narration time
    pub position: f64,
    /// Silence length
    pub duration: f64,
}

/// Monotonic mapping from narration time to output time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeWarp {
    points: Vec<SplicePoint>,
    narration_duration: f64,
}

impl TimeWarp {
    /// Build from resolved pauses. Zero-length pauses are ignored; pauses
    /// past the narration end are moved to the end.
    pub fn new<'a>(
        pauses: impl IntoIterator<Item = &'a PauseSpec>,
        narration_duration: f64,
    ) -> Self {
        let narration_duration = narration_duration.max(0.0);
        let mut points: Vec<SplicePoint> = pauses
            .into_iter()
            .filter(|p| p.is_well_formed() && p.duration > 0.0)
            .map(|p| SplicePoint {
                position: p.position.min(narration_duration),
                duration: p.duration,
            })
            .collect();
        points.sort_by(|a, b| a.position.total_cmp(&b.position));

        Self {
            points,
            narration_duration,
        }
    }

    /// No pauses.
    pub fn identity(narration_duration: f64) -> Self {
        Self::new(std::iter::empty(), narration_duration)
    }

    pub fn points(&self) -> &[SplicePoint] {
        &self.points
    }

    pub fn narration_duration(&self) -> f64 {
        self.narration_duration
    }

    /// Narration plus all inserted silence.
    pub fn total_duration(&self) -> f64 {
        self.narration_duration + self.points.iter().map(|p| p.duration).sum::<f64>()
    }

    /// Output time of an instant that starts something (a pause at exactly
    /// `t` plays before it).
    pub fn map_start(&self, t: f64) -> f64 {
        t + self.shift(|p| p.position <= t)
    }

    /// Output time of an instant that ends something (a pause at exactly
    /// `t` plays after it).
    pub fn map_end(&self, t: f64) -> f64 {
        t + self.shift(|p| p.position < t)
    }

    /// Map an interval. An interval spanning a pause is stretched over it.
    pub fn map_interval(&self, interval: &TimeInterval) -> TimeInterval {
        TimeInterval::ordered(self.map_start(interval.start()), self.map_end(interval.end()))
    }

    fn shift(&self, before: impl Fn(&SplicePoint) -> bool) -> f64 {
        self.points
            .iter()
            .filter(|p| before(p))
            .map(|p| p.duration)
            .sum()
    }
}
