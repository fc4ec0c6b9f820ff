use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;
use tracing::warn;

use crate::error::StoreError;
use crate::fields::{resolve_columns, FieldShape, HydraulicField};
use crate::model::{HydraulicSample, RealValue};

/// Name of the timestamp column in every hydraulic or raw table.
pub const TIME_COLUMN: &str = "datetime";

const MICROS_PER_SECOND: i64 = 1_000_000;

/// Time-indexed table of canonical fields. The index is a `BTreeMap`, so it is sorted and
/// free of duplicates after every write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HydraulicSeries {
    columns: BTreeSet<HydraulicField>,
    rows: BTreeMap<NaiveDateTime, HydraulicSample>,
}

impl HydraulicSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = HydraulicField> + '_ {
        self.columns.iter().copied()
    }

    pub fn has_column(&self, field: HydraulicField) -> bool {
        self.columns.contains(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDateTime, &HydraulicSample)> {
        self.rows.iter()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        self.rows.keys().copied()
    }

    pub fn get(&self, timestamp: &NaiveDateTime) -> Option<&HydraulicSample> {
        self.rows.get(timestamp)
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.rows.keys().next().copied()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.rows.keys().next_back().copied()
    }

    /// Builds a series from samples; a repeated timestamp keeps the last sample.
    pub fn from_samples<I>(samples: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDateTime, HydraulicSample)>,
    {
        let mut series = HydraulicSeries::new();
        for (timestamp, sample) in samples {
            series.columns.extend(sample.fields());
            series.rows.insert(timestamp, sample);
        }
        series
    }

    /// Builds a single-column series. Non-finite values are treated as not measured.
    pub fn from_column<I>(field: HydraulicField, points: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDateTime, f64)>,
    {
        let mut series = HydraulicSeries::new();
        series.columns.insert(field);
        for (timestamp, value) in points {
            let row = series.rows.entry(timestamp).or_default();
            if value.is_finite() {
                row.set_real(field, RealValue::new(value));
            }
        }
        series
    }

    /// Values of a real-valued column, in time order.
    pub fn values(&self, field: HydraulicField) -> Vec<(NaiveDateTime, f64)> {
        self.rows
            .iter()
            .filter_map(|(timestamp, sample)| sample.real(field).map(|v| (*timestamp, v.value)))
            .collect()
    }

    /// Outer join on timestamp. Only new columns may be merged; rows are never reconciled.
    pub(crate) fn merge_columns(
        &mut self,
        other: HydraulicSeries,
        target: &str,
    ) -> Result<(), StoreError> {
        let conflicts: Vec<&str> = other
            .columns
            .iter()
            .filter(|field| self.columns.contains(field))
            .map(|field| field.canonical_name())
            .collect();
        if !conflicts.is_empty() {
            return Err(StoreError::MergeConflict {
                target: target.to_string(),
                reason: format!("cannot merge rows, only columns; {conflicts:?} already present"),
            });
        }

        self.columns.extend(other.columns);
        for (timestamp, sample) in other.rows {
            self.rows.entry(timestamp).or_default().absorb(sample);
        }
        Ok(())
    }

    /// Copy of the rows with `start <= timestamp <= end`; either bound may be open.
    pub fn range(&self, start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        let mut result = HydraulicSeries {
            columns: self.columns.clone(),
            rows: BTreeMap::new(),
        };
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return result;
            }
        }

        let lower = start.map_or(Bound::Unbounded, Bound::Included);
        let upper = end.map_or(Bound::Unbounded, Bound::Included);
        result.rows = self
            .rows
            .range((lower, upper))
            .map(|(timestamp, sample)| (*timestamp, sample.clone()))
            .collect();
        result
    }

    /// Downsamples to fixed buckets of `interval_seconds` (epoch aligned, labelled by bucket
    /// start) using the mean per bucket, then fills interior gaps by linear interpolation in
    /// time. Text columns and uncertainty attributes do not survive resampling.
    pub fn resample(&self, interval_seconds: i64) -> Result<Self, StoreError> {
        if interval_seconds <= 0 {
            return Err(StoreError::Validation(format!(
                "resample interval must be positive, got {interval_seconds}s"
            )));
        }
        let step = interval_seconds.checked_mul(MICROS_PER_SECOND).ok_or_else(|| {
            StoreError::Validation(format!(
                "resample interval of {interval_seconds}s is out of range"
            ))
        })?;

        let real_columns: Vec<HydraulicField> = self
            .columns
            .iter()
            .copied()
            .filter(|field| field.shape() == FieldShape::Real)
            .collect();

        let mut result = HydraulicSeries {
            columns: real_columns.iter().copied().collect(),
            rows: BTreeMap::new(),
        };
        let (Some(first), Some(last)) = (self.first_timestamp(), self.last_timestamp()) else {
            return Ok(result);
        };
        let first_bucket = naive_to_micros(first).div_euclid(step) * step;
        let last_bucket = naive_to_micros(last).div_euclid(step) * step;

        let mut filled: BTreeMap<i64, HydraulicSample> = BTreeMap::new();
        for field in real_columns {
            let mut sums: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
            for (timestamp, sample) in &self.rows {
                if let Some(value) = sample.real(field) {
                    let bucket = naive_to_micros(*timestamp).div_euclid(step) * step;
                    let entry = sums.entry(bucket).or_insert((0.0, 0));
                    entry.0 += value.value;
                    entry.1 += 1;
                }
            }

            let means: Vec<(i64, f64)> = sums
                .into_iter()
                .map(|(bucket, (sum, count))| (bucket, sum / count as f64))
                .collect();

            for (idx, (bucket, mean)) in means.iter().enumerate() {
                filled
                    .entry(*bucket)
                    .or_default()
                    .set_real(field, RealValue::new(*mean));

                let Some((next_bucket, next_mean)) = means.get(idx + 1) else {
                    continue;
                };
                let mut gap = bucket + step;
                while gap < *next_bucket {
                    let value = mean
                        + (next_mean - mean) * (gap - bucket) as f64
                            / (next_bucket - bucket) as f64;
                    filled
                        .entry(gap)
                        .or_default()
                        .set_real(field, RealValue::new(value));
                    gap += step;
                }
            }
        }

        for (bucket, sample) in filled {
            if bucket < first_bucket || bucket > last_bucket || sample.is_empty() {
                continue;
            }
            result.rows.insert(naive_from_micros(bucket)?, sample);
        }
        Ok(result)
    }

    /// Reads a table with a `datetime` column and canonical field columns.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self, StoreError> {
        let time = df.column(TIME_COLUMN).map_err(|_| {
            StoreError::Validation(format!("table is missing the '{TIME_COLUMN}' column"))
        })?;
        let timestamps = timestamp_values(time)?;

        let value_columns: Vec<&Column> = df
            .get_columns()
            .iter()
            .filter(|column| column.name().as_str() != TIME_COLUMN)
            .collect();
        let fields = resolve_columns(value_columns.iter().map(|column| column.name().as_str()))?;

        let mut samples = vec![HydraulicSample::default(); df.height()];
        for (field, column) in fields.iter().zip(&value_columns) {
            match field.shape() {
                FieldShape::Real => {
                    let cast = column.cast(&DataType::Float64)?;
                    for (idx, value) in cast.f64()?.into_iter().enumerate() {
                        if let Some(value) = value.filter(|v| v.is_finite()) {
                            samples[idx].set_real(*field, RealValue::new(value));
                        }
                    }
                }
                FieldShape::Text => {
                    let cast = column.cast(&DataType::String)?;
                    for (idx, value) in cast.str()?.into_iter().enumerate() {
                        if let Some(text) = value {
                            samples[idx].fluidcomposition = Some(text.to_string());
                        }
                    }
                }
            }
        }

        let mut series = HydraulicSeries::new();
        series.columns.extend(fields);
        let mut duplicates = 0usize;
        for (timestamp, sample) in timestamps.into_iter().zip(samples) {
            let Some(timestamp) = timestamp else {
                continue;
            };
            if series.rows.insert(timestamp, sample).is_some() {
                duplicates += 1;
            }
        }
        if duplicates > 0 {
            warn!(duplicates, "collapsed duplicate timestamps, keeping the last row");
        }
        Ok(series)
    }

    pub fn to_dataframe(&self) -> Result<DataFrame, StoreError> {
        let micros: Vec<i64> = self.rows.keys().map(|ts| naive_to_micros(*ts)).collect();
        let time = Series::new(TIME_COLUMN.into(), micros)
            .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;

        let mut columns: Vec<Column> = vec![time.into()];
        for field in &self.columns {
            match field.shape() {
                FieldShape::Real => {
                    let values: Vec<Option<f64>> = self
                        .rows
                        .values()
                        .map(|sample| sample.real(*field).map(|v| v.value))
                        .collect();
                    columns.push(Series::new(field.canonical_name().into(), values).into());
                }
                FieldShape::Text => {
                    let values: Vec<Option<&str>> = self
                        .rows
                        .values()
                        .map(|sample| sample.fluidcomposition.as_deref())
                        .collect();
                    columns.push(Series::new(field.canonical_name().into(), values).into());
                }
            }
        }

        Ok(DataFrame::new(columns)?)
    }
}

pub(crate) fn timestamp_values(column: &Column) -> Result<Vec<Option<NaiveDateTime>>, StoreError> {
    let micros = column
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?
        .cast(&DataType::Int64)?;
    micros
        .i64()?
        .into_iter()
        .map(|value| value.map(naive_from_micros).transpose())
        .collect()
}

pub fn naive_to_micros(timestamp: NaiveDateTime) -> i64 {
    timestamp.and_utc().timestamp_micros()
}

pub fn naive_from_micros(micros: i64) -> Result<NaiveDateTime, StoreError> {
    DateTime::from_timestamp_micros(micros)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| StoreError::Validation(format!("timestamp {micros}us is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 3, 1)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn range_is_inclusive_and_tolerates_inverted_bounds() {
        let series = HydraulicSeries::from_column(
            HydraulicField::TopFlow,
            (0..10).map(|m| (at(0, m), m as f64)),
        );
        let slice = series.range(Some(at(0, 2)), Some(at(0, 5)));
        assert_eq!(slice.len(), 4);
        assert_eq!(slice.first_timestamp(), Some(at(0, 2)));
        assert_eq!(slice.last_timestamp(), Some(at(0, 5)));

        let empty = series.range(Some(at(0, 5)), Some(at(0, 2)));
        assert!(empty.is_empty());
        assert!(empty.has_column(HydraulicField::TopFlow));
    }

    #[test]
    fn resample_averages_buckets_and_interpolates_gaps() {
        // 00:00 and 00:05 fall in the first 10 minute bucket, nothing in 00:10 and 00:20,
        // 00:30 alone in the last.
        let series = HydraulicSeries::from_column(
            HydraulicField::TopPressure,
            vec![(at(0, 0), 1.0), (at(0, 5), 3.0), (at(0, 30), 8.0)],
        );
        let resampled = series.resample(600).unwrap();
        let values = resampled.values(HydraulicField::TopPressure);
        assert_eq!(
            values,
            vec![
                (at(0, 0), 2.0),
                (at(0, 10), 4.0),
                (at(0, 20), 6.0),
                (at(0, 30), 8.0)
            ]
        );
        // the source series is untouched
        assert_eq!(series.len(), 3);
    }

    #[test]
    fn resample_rejects_non_positive_interval() {
        let series = HydraulicSeries::new();
        assert!(matches!(
            series.resample(0),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn resample_rejects_intervals_beyond_the_time_range() {
        let series = HydraulicSeries::from_column(HydraulicField::TopFlow, vec![(at(0, 0), 1.0)]);
        assert!(matches!(
            series.resample(i64::MAX),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            series.resample(i64::MAX / MICROS_PER_SECOND + 1),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn from_column_skips_non_finite_values() {
        let series = HydraulicSeries::from_column(
            HydraulicField::TopFlow,
            vec![(at(1, 0), f64::NAN), (at(1, 1), 2.0)],
        );
        assert_eq!(series.len(), 2);
        assert_eq!(series.values(HydraulicField::TopFlow), vec![(at(1, 1), 2.0)]);
        assert!(series.get(&at(1, 0)).is_some_and(HydraulicSample::is_empty));
    }
}
