//! Rescales authored template pauses onto the real narration.
//!
//! Pause positions are authored against a reference duration. Once the
//! narration exists they are moved either proportionally or, when caption
//! timing is known, onto the end of the nearest caption so silence never
//! lands mid-word.

use tracing::debug;

use vgen_models::{
    CaptionChunk, IssueObserver, PauseSchedule, PauseSpec, StageIssue, TracingObserver,
};

/// How pause positions were resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScheduleMode {
    /// Positions and durations left as authored
    Identity,
    /// Positions and durations multiplied by `scale`
    Proportional { scale: f64 },
    /// Durations scaled, positions snapped to caption ends
    Snapped { scale: f64 },
}

/// Pause scheduler.
#[derive(Debug, Clone, Copy, Default)]
pub struct PauseScheduler;

impl PauseScheduler {
    /// Schedule pauses, logging degenerate input.
    pub fn schedule(
        pauses: &PauseSchedule,
        reference_duration: f64,
        real_duration: Option<f64>,
        captions: Option<&[CaptionChunk]>,
    ) -> PauseSchedule {
        Self::schedule_observed(
            pauses,
            reference_duration,
            real_duration,
            captions,
            &TracingObserver,
        )
        .0
    }

    /// Schedule pauses, reporting degenerate input as
    /// [`StageIssue::ScheduleDegenerate`].
    ///
    /// Non-empty captions select snapped mode, where the real duration is the
    /// latest caption end. Otherwise a usable `real_duration` selects
    /// proportional mode. A zero reference duration or missing timing leaves
    /// pauses unscaled. Template-defined pause kinds are passed through as
    /// authored.
    pub fn schedule_observed(
        pauses: &PauseSchedule,
        reference_duration: f64,
        real_duration: Option<f64>,
        captions: Option<&[CaptionChunk]>,
        observer: &dyn IssueObserver,
    ) -> (PauseSchedule, ScheduleMode) {
        let captions = captions.filter(|c| !c.is_empty());
        let mode = Self::resolve_mode(reference_duration, real_duration, captions, observer);

        let mut malformed = 0usize;
        let scheduled = pauses
            .iter()
            .map(|(kind, specs)| {
                let specs = specs
                    .iter()
                    .map(|spec| {
                        if !kind.is_known() {
                            return spec.clone();
                        }
                        if !spec.is_well_formed() {
                            malformed += 1;
                            return neutralize(spec);
                        }
                        Self::place(spec, mode, captions)
                    })
                    .collect();
                (kind.clone(), specs)
            })
            .collect();

        if malformed > 0 {
            observer.observe(StageIssue::ScheduleDegenerate {
                reason: format!("{} malformed pause(s) replaced with no-ops", malformed),
            });
        }

        debug!(?mode, reference_duration, "Scheduled pauses");
        (scheduled, mode)
    }

    fn resolve_mode(
        reference_duration: f64,
        real_duration: Option<f64>,
        captions: Option<&[CaptionChunk]>,
        observer: &dyn IssueObserver,
    ) -> ScheduleMode {
        if !(reference_duration.is_finite() && reference_duration > 0.0) {
            observer.observe(StageIssue::ScheduleDegenerate {
                reason: format!("reference duration is {}", reference_duration),
            });
            return ScheduleMode::Identity;
        }

        if let Some(captions) = captions {
            let real = captions
                .iter()
                .map(|c| c.interval.end())
                .fold(0.0f64, f64::max);
            return ScheduleMode::Snapped {
                scale: real / reference_duration,
            };
        }

        match real_duration {
            Some(real) if real.is_finite() && real >= 0.0 => ScheduleMode::Proportional {
                scale: real / reference_duration,
            },
            _ => {
                observer.observe(StageIssue::ScheduleDegenerate {
                    reason: "no narration timing available".to_string(),
                });
                ScheduleMode::Identity
            }
        }
    }

    fn place(spec: &PauseSpec, mode: ScheduleMode, captions: Option<&[CaptionChunk]>) -> PauseSpec {
        match (mode, captions) {
            (ScheduleMode::Identity, _) => spec.clone(),
            (ScheduleMode::Proportional { scale }, _) => {
                spec.rescaled(spec.position * scale, spec.duration * scale)
            }
            (ScheduleMode::Snapped { scale }, Some(captions)) => {
                let target = spec.position * scale;
                let position = nearest_chunk_end(captions, target).unwrap_or(target);
                spec.rescaled(position, spec.duration * scale)
            }
            (ScheduleMode::Snapped { scale }, None) => {
                spec.rescaled(spec.position * scale, spec.duration * scale)
            }
        }
    }
}

/// End time of the chunk whose midpoint is closest to `target`.
/// On a tie the earlier chunk wins.
fn nearest_chunk_end(captions: &[CaptionChunk], target: f64) -> Option<f64> {
    let mut best: Option<(f64, f64)> = None;
    for chunk in captions {
        let distance = (chunk.interval.midpoint() - target).abs();
        match best {
            Some((best_distance, _)) if distance >= best_distance => {}
            _ => best = Some((distance, chunk.interval.end())),
        }
    }
    best.map(|(_, end)| end)
}

fn neutralize(spec: &PauseSpec) -> PauseSpec {
    let position = if spec.position.is_finite() {
        spec.position.max(0.0)
    } else {
        0.0
    };
    PauseSpec {
        position,
        duration: 0.0,
        ..spec.clone()
    }
}
