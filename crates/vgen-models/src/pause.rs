//! Template pause specifications.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of authored pause.
///
/// Templates may define their own pause kinds; those are carried as
/// [`PauseType::Custom`] and passed through scheduling untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PauseType {
    /// Long pause before a reveal
    #[default]
    Dramatic,
    /// Short pause between sentences
    Breathing,
    /// Pause that lets a key phrase land
    Emphasis,
    /// Template-defined kind
    Custom(String),
}

impl PauseType {
    pub fn as_str(&self) -> &str {
        match self {
            PauseType::Dramatic => "dramatic",
            PauseType::Breathing => "breathing",
            PauseType::Emphasis => "emphasis",
            PauseType::Custom(s) => s,
        }
    }

    /// Whether the kind is one the scheduler knows how to rescale.
    pub fn is_known(&self) -> bool {
        !matches!(self, PauseType::Custom(_))
    }
}

impl From<String> for PauseType {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "dramatic" => PauseType::Dramatic,
            "breathing" => PauseType::Breathing,
            "emphasis" => PauseType::Emphasis,
            _ => PauseType::Custom(s),
        }
    }
}

impl From<&str> for PauseType {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<PauseType> for String {
    fn from(t: PauseType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for PauseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An instruction to insert silence at a position in the narration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseSpec {
    /// Pause kind
    #[serde(rename = "type", default)]
    pub kind: PauseType,

    /// Position in seconds
    pub position: f64,

    /// Silence duration in seconds
    pub duration: f64,

    #[serde(default)]
    pub purpose: String,

    #[serde(default)]
    pub description: String,

    /// Authored position before rescaling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_position: Option<f64>,

    /// Authored duration before rescaling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_duration: Option<f64>,
}

impl PauseSpec {
    /// Create a pause with empty purpose and description.
    pub fn new(kind: PauseType, position: f64, duration: f64) -> Self {
        Self {
            kind,
            position,
            duration,
            purpose: String::new(),
            description: String::new(),
            original_position: None,
            original_duration: None,
        }
    }

    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = purpose.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Whether position and duration are usable values.
    pub fn is_well_formed(&self) -> bool {
        self.position.is_finite()
            && self.duration.is_finite()
            && self.position >= 0.0
            && self.duration >= 0.0
    }

    /// A copy placed at a new position and duration, recording the
    /// authored values the first time it is moved.
    pub fn rescaled(&self, position: f64, duration: f64) -> Self {
        Self {
            position,
            duration,
            original_position: Some(self.original_position.unwrap_or(self.position)),
            original_duration: Some(self.original_duration.unwrap_or(self.duration)),
            ..self.clone()
        }
    }
}

/// Pauses grouped by kind.
pub type PauseSchedule = BTreeMap<PauseType, Vec<PauseSpec>>;

/// All pauses of a schedule in chronological order.
pub fn flatten_schedule(schedule: &PauseSchedule) -> Vec<PauseSpec> {
    let mut all: Vec<PauseSpec> = schedule.values().flatten().cloned().collect();
    all.sort_by(|a, b| a.position.total_cmp(&b.position));
    all
}
