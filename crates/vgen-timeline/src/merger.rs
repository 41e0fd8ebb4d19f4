//! Gap-free background track from sparse footage search results.

use tracing::debug;

use vgen_models::{BackgroundInterval, TimeInterval};

/// Resolve intervals with no clip so every interval carries a usable clip.
///
/// A run of clip-less intervals is absorbed by the next interval that has a
/// clip, which is extended backward over the run. A trailing run with no
/// clip after it is absorbed by the last interval that has one, extended
/// forward. Time gaps between consecutive clips are closed the same way.
///
/// Returns `None` when there is no clip at all, which callers treat as
/// "no background available".
pub fn merge_empty(intervals: &[BackgroundInterval]) -> Option<Vec<BackgroundInterval>> {
    let mut sorted: Vec<&BackgroundInterval> = intervals.iter().collect();
    sorted.sort_by(|a, b| a.interval.start().total_cmp(&b.interval.start()));

    let mut merged: Vec<BackgroundInterval> = Vec::with_capacity(sorted.len());
    // Uncovered run waiting for the next clip.
    let mut uncovered: Option<TimeInterval> = None;

    for bg in sorted {
        let Some(clip) = &bg.clip else {
            uncovered = Some(match uncovered {
                Some(run) => run.span(&bg.interval),
                None => bg.interval,
            });
            continue;
        };

        let start = match (uncovered.take(), merged.last()) {
            (Some(run), _) => run.start().min(bg.interval.start()),
            (None, Some(prev)) if prev.interval.end() < bg.interval.start() => {
                prev.interval.end()
            }
            _ => bg.interval.start(),
        };
        let interval = bg.interval.with_start(start).unwrap_or(bg.interval);
        merged.push(BackgroundInterval::with_clip(interval, clip.clone()));
    }

    let last = merged.last_mut()?;
    if let Some(run) = uncovered {
        if run.end() > last.interval.end() {
            last.interval = last.interval.with_end(run.end()).unwrap_or(last.interval);
        }
    }

    debug!(
        input = intervals.len(),
        output = merged.len(),
        "Merged background intervals"
    );

    Some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(start: f64, end: f64, url: &str) -> BackgroundInterval {
        BackgroundInterval::with_clip(TimeInterval::new(start, end).unwrap(), url)
    }

    fn empty(start: f64, end: f64) -> BackgroundInterval {
        BackgroundInterval::empty(TimeInterval::new(start, end).unwrap())
    }

    fn span(list: &[BackgroundInterval]) -> (f64, f64) {
        let start = list.iter().map(|b| b.interval.start()).fold(f64::MAX, f64::min);
        let end = list.iter().map(|b| b.interval.end()).fold(f64::MIN, f64::max);
        (start, end)
    }

    #[test]
    fn test_all_empty_is_sentinel() {
        assert!(merge_empty(&[]).is_none());
        assert!(merge_empty(&[empty(0.0, 2.0), empty(2.0, 4.0)]).is_none());
    }

    #[test]
    fn test_null_run_extends_following_clip_backward() {
        let input = vec![
            empty(0.0, 2.0),
            empty(2.0, 3.0),
            clip(3.0, 5.0, "https://v/a.mp4"),
            clip(5.0, 8.0, "https://v/b.mp4"),
        ];
        let merged = merge_empty(&input).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].interval.start(), 0.0);
        assert_eq!(merged[0].clip.as_deref(), Some("https://v/a.mp4"));
        assert_eq!(span(&merged), span(&input));
    }

    #[test]
    fn test_trailing_nulls_extend_previous_clip() {
        let input = vec![clip(0.0, 3.0, "https://v/a.mp4"), empty(3.0, 6.0)];
        let merged = merge_empty(&input).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].interval.end(), 6.0);
    }

    #[test]
    fn test_time_gaps_are_closed() {
        let input = vec![clip(0.0, 2.0, "https://v/a.mp4"), clip(3.0, 5.0, "https://v/b.mp4")];
        let merged = merge_empty(&input).unwrap();
        assert_eq!(merged[1].interval.start(), 2.0);
        for pair in merged.windows(2) {
            assert_eq!(pair[0].interval.end(), pair[1].interval.start());
        }
    }

    #[test]
    fn test_unsorted_input_is_ordered() {
        let input = vec![
            clip(4.0, 6.0, "https://v/c.mp4"),
            empty(2.0, 4.0),
            clip(0.0, 2.0, "https://v/a.mp4"),
        ];
        let merged = merge_empty(&input).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].interval.start(), 2.0);
        assert_eq!(merged[1].clip.as_deref(), Some("https://v/c.mp4"));
        assert!(merged.iter().all(|b| b.has_clip()));
    }
}
