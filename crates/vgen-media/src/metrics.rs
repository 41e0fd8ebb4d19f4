//! Metric names.

pub mod metric_names {
    /// Background clip fetches, labelled by `outcome` (`ok` / `failed`).
    pub const CLIP_FETCH_TOTAL: &str = "vgen_clip_fetch_total";
    /// Template effects that could not be applied, labelled by `kind`.
    pub const EFFECTS_SKIPPED_TOTAL: &str = "vgen_effects_skipped_total";
    /// Caption chunks dropped for lack of timing.
    pub const CAPTIONS_DROPPED_TOTAL: &str = "vgen_captions_dropped_total";
    /// Finished jobs, labelled by `outcome`.
    pub const JOBS_TOTAL: &str = "vgen_jobs_total";
    /// Wall-clock time of the composition stage.
    pub const RENDER_DURATION_SECONDS: &str = "vgen_render_duration_seconds";
}
