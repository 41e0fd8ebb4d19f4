//! Background clip intervals.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ModelError, ModelResult};
use crate::interval::TimeInterval;

/// A time interval paired with the stock clip that should play during it.
///
/// `clip` is `None` when the footage search found nothing usable; such
/// intervals are resolved before composition and never rendered as-is.
/// Serialized as `[[start, end], url_or_null]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(TimeInterval, Option<String>)", into = "(TimeInterval, Option<String>)")]
pub struct BackgroundInterval {
    /// Time span covered
    pub interval: TimeInterval,
    /// Clip URL, if any
    pub clip: Option<String>,
}

impl BackgroundInterval {
    /// Interval with a clip reference.
    pub fn with_clip(interval: TimeInterval, clip: impl Into<String>) -> Self {
        Self {
            interval,
            clip: Some(clip.into()),
        }
    }

    /// Interval with no usable clip.
    pub fn empty(interval: TimeInterval) -> Self {
        Self {
            interval,
            clip: None,
        }
    }

    /// Whether the interval has a clip reference.
    pub fn has_clip(&self) -> bool {
        self.clip.is_some()
    }

    /// Parse the clip reference as a URL.
    pub fn clip_url(&self) -> ModelResult<Option<Url>> {
        match &self.clip {
            None => Ok(None),
            Some(raw) => Url::parse(raw)
                .map(Some)
                .map_err(|e| ModelError::InvalidClipReference(format!("{}: {}", raw, e))),
        }
    }
}

impl From<(TimeInterval, Option<String>)> for BackgroundInterval {
    fn from((interval, clip): (TimeInterval, Option<String>)) -> Self {
        // Upstream search sometimes stringifies a missing result.
        let clip = clip.filter(|c| {
            let c = c.trim();
            !c.is_empty() && c != "None" && c != "null"
        });
        Self { interval, clip }
    }
}

impl From<BackgroundInterval> for (TimeInterval, Option<String>) {
    fn from(bg: BackgroundInterval) -> Self {
        (bg.interval, bg.clip)
    }
}
