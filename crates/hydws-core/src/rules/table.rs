use chrono::NaiveDateTime;
use polars::prelude::*;
use tracing::debug;

use crate::error::StoreError;
use crate::series::{timestamp_values, TIME_COLUMN};

/// Raw sensor readings aligned on a shared time axis. Missing readings are stored as zero so
/// they contribute nothing to column sums.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    timestamps: Vec<NaiveDateTime>,
    columns: Vec<(String, Vec<f64>)>,
}

impl RawTable {
    pub fn new(timestamps: Vec<NaiveDateTime>) -> Self {
        Self {
            timestamps,
            columns: Vec::new(),
        }
    }

    pub fn with_column(
        mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<Self, StoreError> {
        self.push_column(name, values)?;
        Ok(self)
    }

    /// Adds or replaces a column. Non-finite readings become zero.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<(), StoreError> {
        let name = name.into();
        if values.len() != self.timestamps.len() {
            return Err(StoreError::Validation(format!(
                "raw column '{name}' has {} values for {} timestamps",
                values.len(),
                self.timestamps.len()
            )));
        }
        let values = values
            .into_iter()
            .map(|v| if v.is_finite() { v } else { 0.0 })
            .collect();

        match self.columns.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = values,
            None => self.columns.push((name, values)),
        }
        Ok(())
    }

    /// Reads a frame with a `datetime` column; every other column is cast to `f64`. Rows
    /// without a timestamp are dropped.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self, StoreError> {
        let time = df.column(TIME_COLUMN).map_err(|_| {
            StoreError::Validation(format!("raw table is missing the '{TIME_COLUMN}' column"))
        })?;
        let timestamps = timestamp_values(time)?;
        let keep: Vec<bool> = timestamps.iter().map(Option::is_some).collect();
        let dropped = keep.iter().filter(|k| !**k).count();
        if dropped > 0 {
            debug!(dropped, "raw rows without timestamp dropped");
        }

        let mut table = RawTable::new(timestamps.into_iter().flatten().collect());
        for column in df.get_columns() {
            let name = column.name().as_str();
            if name == TIME_COLUMN {
                continue;
            }
            let cast = column.cast(&DataType::Float64)?;
            let values: Vec<f64> = cast
                .f64()?
                .into_iter()
                .zip(&keep)
                .filter(|(_, keep)| **keep)
                .map(|(value, _)| value.unwrap_or(0.0))
                .collect();
            table.push_column(name, values)?;
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, values)| values.as_slice())
    }

    /// Row-wise sum of the named columns; unknown names are ignored.
    pub fn sum_columns<'a, I>(&self, names: I) -> Vec<f64>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut sums = vec![0.0; self.len()];
        for name in names {
            if let Some(values) = self.column(name) {
                for (sum, value) in sums.iter_mut().zip(values) {
                    *sum += value;
                }
            }
        }
        sums
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn nulls_count_as_zero() {
        let start = NaiveDate::from_ymd_opt(2022, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let micros: Vec<i64> = (0..3)
            .map(|i| start.and_utc().timestamp_micros() + i * 60_000_000)
            .collect();
        let time = Series::new(TIME_COLUMN.into(), micros)
            .cast(&DataType::Datetime(TimeUnit::Microseconds, None))
            .unwrap();
        let a = Series::new("a".into(), vec![Some(1.0), None, Some(3.0)]);
        let b = Series::new("b".into(), vec![Some(1i64), Some(2), None]);
        let df = DataFrame::new(vec![time.into(), a.into(), b.into()]).unwrap();

        let table = RawTable::from_dataframe(&df).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.sum_columns(["a", "b", "missing"]), vec![2.0, 2.0, 3.0]);
    }

    #[test]
    fn column_lengths_must_match_the_time_axis() {
        let table = RawTable::new(vec![NaiveDateTime::default()]);
        assert!(table.with_column("a", vec![1.0, 2.0]).is_err());
    }
}
