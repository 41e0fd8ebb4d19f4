//! Progress messages emitted by the render pipeline.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::job::JobId;

/// Pipeline milestones reported to status consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    ScriptReady,
    AudioReady,
    CaptionsReady,
    BackgroundResolved,
    RenderComplete,
}

impl Milestone {
    /// Progress percentage reached at this milestone.
    pub fn percent(&self) -> u8 {
        match self {
            Milestone::ScriptReady => 20,
            Milestone::AudioReady => 40,
            Milestone::CaptionsReady => 60,
            Milestone::BackgroundResolved => 80,
            Milestone::RenderComplete => 100,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Milestone::ScriptReady => "script_ready",
            Milestone::AudioReady => "audio_ready",
            Milestone::CaptionsReady => "captions_ready",
            Milestone::BackgroundResolved => "background_resolved",
            Milestone::RenderComplete => "render_complete",
        }
    }
}

/// Progress message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressMessage {
    /// Free-form log line
    Log { message: String },

    /// Milestone reached
    Milestone { milestone: Milestone, percent: u8 },

    /// Job failed
    Failed { reason: String },

    /// Job finished
    Done { output: PathBuf },
}

impl ProgressMessage {
    pub fn log(message: impl Into<String>) -> Self {
        Self::Log {
            message: message.into(),
        }
    }

    pub fn milestone(milestone: Milestone) -> Self {
        Self::Milestone {
            milestone,
            percent: milestone.percent(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    pub fn done(output: impl Into<PathBuf>) -> Self {
        Self::Done {
            output: output.into(),
        }
    }

    /// Whether no further messages follow for the job.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::Done { .. })
    }
}

/// A progress message addressed to one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub message: ProgressMessage,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(job_id: JobId, message: ProgressMessage) -> Self {
        Self {
            job_id,
            message,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_milestone_percentages_increase() {
        let order = [
            Milestone::ScriptReady,
            Milestone::AudioReady,
            Milestone::CaptionsReady,
            Milestone::BackgroundResolved,
            Milestone::RenderComplete,
        ];
        for pair in order.windows(2) {
            assert!(pair[0].percent() < pair[1].percent());
        }
        assert_eq!(Milestone::RenderComplete.percent(), 100);
    }

    #[test]
    fn test_message_serialization() {
        let msg = ProgressMessage::milestone(Milestone::CaptionsReady);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "milestone");
        assert_eq!(json["milestone"], "captions_ready");
        assert_eq!(json["percent"], 60);

        let failed = ProgressMessage::failed("boom");
        assert!(failed.is_terminal());
        assert!(!ProgressMessage::log("x").is_terminal());
    }
}
