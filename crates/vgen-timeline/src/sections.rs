//! Template sections laid over the real narration.

use vgen_models::{TemplateSection, TimeInterval};

/// A template section placed on the real timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionSpan {
    /// Index into the template's section list
    pub index: usize,
    pub name: String,
    pub interval: TimeInterval,
}

/// Sections placed proportionally to their nominal durations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionSpans {
    spans: Vec<SectionSpan>,
}

impl SectionSpans {
    /// Spread `sections` over `[0, total_duration]`.
    ///
    /// Each section gets a share proportional to its nominal duration, or an
    /// equal share when no section states one.
    pub fn layout(sections: &[TemplateSection], total_duration: f64) -> Self {
        if sections.is_empty() || !(total_duration.is_finite() && total_duration > 0.0) {
            return Self::default();
        }

        let nominal: f64 = sections.iter().map(|s| s.nominal_duration.max(0.0)).sum();
        let shares: Vec<f64> = if nominal > 0.0 {
            sections
                .iter()
                .map(|s| total_duration * s.nominal_duration.max(0.0) / nominal)
                .collect()
        } else {
            vec![total_duration / sections.len() as f64; sections.len()]
        };

        let mut cursor = 0.0;
        let last = sections.len() - 1;
        let spans = sections
            .iter()
            .zip(shares)
            .enumerate()
            .map(|(index, (section, share))| {
                let end = if index == last {
                    total_duration
                } else {
                    (cursor + share).min(total_duration)
                };
                let span = SectionSpan {
                    index,
                    name: section.name.clone(),
                    interval: TimeInterval::ordered(cursor, end),
                };
                cursor = end;
                span
            })
            .collect();

        Self { spans }
    }

    pub fn spans(&self) -> &[SectionSpan] {
        &self.spans
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Section playing at time `t`. Boundaries belong to the later section.
    pub fn at(&self, t: f64) -> Option<&SectionSpan> {
        self.spans
            .iter()
            .rev()
            .find(|s| s.interval.contains(t))
            .or_else(|| {
                // Past the end: clamp to the last section.
                self.spans.last().filter(|s| t > s.interval.end())
            })
    }

    /// Section owning an interval: the one containing its midpoint.
    pub fn owner_of(&self, interval: &TimeInterval) -> Option<&SectionSpan> {
        self.at(interval.midpoint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proportional_layout() {
        let sections = vec![
            TemplateSection::new("gancho", 5.0),
            TemplateSection::new("desenvolvimento", 30.0),
            TemplateSection::new("conclusao", 10.0),
        ];
        let spans = SectionSpans::layout(&sections, 90.0);

        let bounds: Vec<(f64, f64)> = spans
            .spans()
            .iter()
            .map(|s| (s.interval.start(), s.interval.end()))
            .collect();
        assert_eq!(bounds, vec![(0.0, 10.0), (10.0, 70.0), (70.0, 90.0)]);
    }

    #[test]
    fn test_equal_split_without_durations() {
        let sections = vec![TemplateSection::new("a", 0.0), TemplateSection::new("b", 0.0)];
        let spans = SectionSpans::layout(&sections, 10.0);
        assert_eq!(spans.spans()[0].interval.end(), 5.0);
        assert_eq!(spans.spans()[1].interval.end(), 10.0);
    }

    #[test]
    fn test_owner_by_midpoint() {
        let sections = vec![TemplateSection::new("a", 1.0), TemplateSection::new("b", 1.0)];
        let spans = SectionSpans::layout(&sections, 10.0);

        let mostly_b = TimeInterval::new(4.0, 8.0).unwrap();
        assert_eq!(spans.owner_of(&mostly_b).unwrap().name, "b");
        assert_eq!(spans.at(5.0).unwrap().name, "b");
        assert_eq!(spans.at(12.0).unwrap().name, "b");
        assert_eq!(spans.at(1.0).unwrap().name, "a");
    }

    #[test]
    fn test_empty_inputs() {
        assert!(SectionSpans::layout(&[], 10.0).is_empty());
        assert!(SectionSpans::layout(&[TemplateSection::new("a", 1.0)], 0.0).is_empty());
    }
}
