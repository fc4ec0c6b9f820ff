use tracing::debug;

use super::config::Condition;
use super::table::RawTable;

/// Overlays each condition's candidate sum onto a zero series wherever the condition triggers.
/// Candidates only use columns that are also selected by the rule. Later conditions win.
pub(crate) fn apply_conditions(
    table: &RawTable,
    selected: &[&str],
    conditions: &[Condition],
) -> Vec<f64> {
    let mut running = vec![0.0; table.len()];

    for (idx, condition) in conditions.iter().enumerate() {
        let columns: Vec<&str> = condition
            .source_columns
            .iter()
            .map(String::as_str)
            .filter(|name| selected.contains(name))
            .collect();
        if columns.is_empty() {
            debug!(condition = idx, "condition has no available columns, skipped");
            continue;
        }

        let candidate = table.sum_columns(columns);
        for (current, value) in running.iter_mut().zip(candidate) {
            if condition.kind.triggers(value, *current, condition.threshold) {
                *current = value;
            }
        }
    }
    running
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::config::ConditionKind;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn table() -> RawTable {
        let start: NaiveDateTime = NaiveDate::from_ymd_opt(2022, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let timestamps = (0..4).map(|i| start + Duration::minutes(i)).collect();
        RawTable::new(timestamps)
            .with_column("low", vec![0.5, 2.0, 0.0, 4.0])
            .unwrap()
            .with_column("high", vec![0.0, 3.0, 5.0, 1.0])
            .unwrap()
    }

    fn condition(kind: ConditionKind, threshold: f64, column: &str) -> Condition {
        Condition {
            kind,
            threshold,
            source_columns: vec![column.to_string()],
        }
    }

    #[test]
    fn later_conditions_take_precedence() {
        let conditions = vec![
            condition(ConditionKind::Above, 1.0, "low"),
            condition(ConditionKind::Above, 2.5, "high"),
        ];
        let result = apply_conditions(&table(), &["low", "high"], &conditions);
        assert_eq!(result, vec![0.0, 3.0, 5.0, 4.0]);
    }

    #[test]
    fn current_conditions_compare_against_the_running_result() {
        let conditions = vec![
            condition(ConditionKind::Above, 0.0, "low"),
            condition(ConditionKind::AboveCurrent, 0.5, "high"),
        ];
        // high replaces low only where it exceeds it by more than 0.5
        let result = apply_conditions(&table(), &["low", "high"], &conditions);
        assert_eq!(result, vec![0.5, 3.0, 5.0, 4.0]);

        let conditions = vec![
            condition(ConditionKind::Above, 0.0, "low"),
            condition(ConditionKind::BelowCurrent, 2.0, "high"),
        ];
        let result = apply_conditions(&table(), &["low", "high"], &conditions);
        assert_eq!(result, vec![0.5, 2.0, 0.0, 1.0]);
    }

    #[test]
    fn conditions_outside_the_selection_are_skipped() {
        let conditions = vec![
            condition(ConditionKind::Below, 10.0, "high"),
            condition(ConditionKind::Above, 0.0, "low"),
        ];
        let result = apply_conditions(&table(), &["low"], &conditions);
        assert_eq!(result, vec![0.5, 2.0, 0.0, 4.0]);
    }
}
