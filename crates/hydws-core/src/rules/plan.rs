use chrono::NaiveDateTime;

use crate::error::{RuleError, StoreError};

/// A time window `[start, end)` routed to one section.
///
/// The end is exclusive because schedules are written back to back, one row's `date_until`
/// being the next row's `date_from`; a sample on that boundary belongs to the later window
/// only, instead of being routed twice and failing as an overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub target_section: String,
}

impl PlanInterval {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, target_section: impl Into<String>) -> Self {
        Self {
            start,
            end,
            target_section: target_section.into(),
        }
    }

    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        self.start <= timestamp && timestamp < self.end
    }

    pub fn overlaps(&self, other: &PlanInterval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Ordered routing schedule of a raw column across sections over time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    intervals: Vec<PlanInterval>,
}

impl Plan {
    pub fn new(intervals: Vec<PlanInterval>) -> Self {
        Self { intervals }
    }

    pub fn intervals(&self) -> &[PlanInterval] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Rejects inverted windows and any pair of overlapping windows.
    pub fn validate(&self, reference: &str) -> Result<(), RuleError> {
        for (idx, interval) in self.intervals.iter().enumerate() {
            if interval.end <= interval.start {
                return Err(RuleError::config(
                    format!("plan '{reference}'"),
                    format!(
                        "interval {idx} ends ({}) before it starts ({})",
                        interval.end, interval.start
                    ),
                ));
            }
        }

        for (idx, interval) in self.intervals.iter().enumerate() {
            for (other_idx, other) in self.intervals.iter().enumerate().skip(idx + 1) {
                if interval.overlaps(other) {
                    return Err(StoreError::MergeConflict {
                        target: format!("plan '{reference}'"),
                        reason: format!(
                            "intervals {idx} ({} .. {}) and {other_idx} ({} .. {}) overlap",
                            interval.start, interval.end, other.start, other.end
                        ),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 3, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn windows_are_half_open() {
        let interval = PlanInterval::new(day(1), day(2), "int-1");
        assert!(interval.contains(day(1)));
        assert!(!interval.contains(day(2)));

        let touching = Plan::new(vec![
            PlanInterval::new(day(1), day(2), "int-1"),
            PlanInterval::new(day(2), day(3), "int-2"),
        ]);
        assert!(touching.validate("touching").is_ok());
    }

    #[test]
    fn overlapping_windows_conflict() {
        let plan = Plan::new(vec![
            PlanInterval::new(day(1), day(5), "int-1"),
            PlanInterval::new(day(4), day(6), "int-2"),
        ]);
        assert!(matches!(
            plan.validate("overlap"),
            Err(RuleError::Store(StoreError::MergeConflict { .. }))
        ));
    }

    #[test]
    fn inverted_windows_are_configuration_errors() {
        let plan = Plan::new(vec![PlanInterval::new(day(3), day(1), "int-1")]);
        assert!(matches!(
            plan.validate("inverted"),
            Err(RuleError::ConfigFormat { .. })
        ));
    }
}
