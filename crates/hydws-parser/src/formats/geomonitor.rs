use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use hydws_core::series::{naive_from_micros, naive_to_micros};
use polars::prelude::DataFrame;
use tracing::debug;

use crate::errors::ParserError;
use crate::registry::RawParser;

use super::{build_raw_dataframe, decode_latin1, is_missing, parse_optional_f64, parse_timestamp};

const DATE_HEADER: &str = "dd/mm/yyyy";
const TIME_HEADER: &str = "hh:mm:ss";
const TIMESTAMP_FORMATS: &[&str] = &["%d.%m.%Y %H:%M:%S", "%d/%m/%Y %H:%M:%S"];
/// Longest run of missing readings bridged by the previous value.
const PAD_LIMIT: usize = 86_400;
/// Lines 0, 2, 3 and 4 carry logger banners and units; line 1 is the header.
const HEADER_LINE: usize = 1;
const FIRST_DATA_LINE: usize = 5;

/// Whitespace delimited `.dat` exports of Geomonitor loggers.
#[derive(Debug, Clone, Copy)]
pub struct GeomonitorParser {
    pub sample_rate_seconds: i64,
}

impl Default for GeomonitorParser {
    fn default() -> Self {
        Self {
            sample_rate_seconds: 60,
        }
    }
}

struct Channel {
    name: String,
    values: Vec<Option<f64>>,
}

impl GeomonitorParser {
    const NAME: &'static str = "GEOMONITOR";

    pub fn with_sample_rate(sample_rate_seconds: i64) -> Self {
        Self {
            sample_rate_seconds,
        }
    }

    fn read_rows(
        text: &str,
    ) -> Result<(Vec<NaiveDateTime>, Vec<Channel>), ParserError> {
        let lines: Vec<&str> = text.lines().collect();
        let header: Vec<&str> = lines
            .get(HEADER_LINE)
            .map(|line| line.split_whitespace().collect())
            .ok_or_else(|| ParserError::FormatMismatch {
                parser: Self::NAME,
                reason: "file has no header line".to_string(),
            })?;

        let position = |name: &str| header.iter().position(|column| *column == name);
        let (Some(date_idx), Some(time_idx)) = (position(DATE_HEADER), position(TIME_HEADER))
        else {
            return Err(ParserError::FormatMismatch {
                parser: Self::NAME,
                reason: format!("header lacks '{DATE_HEADER}' and '{TIME_HEADER}' columns"),
            });
        };

        let mut channels: Vec<(usize, Channel)> = header
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != date_idx && *idx != time_idx)
            .map(|(idx, name)| {
                (
                    idx,
                    Channel {
                        name: name.to_string(),
                        values: Vec::new(),
                    },
                )
            })
            .collect();

        let mut timestamps = Vec::new();
        let mut dropped = 0usize;
        for (line_index, line) in lines.iter().enumerate().skip(FIRST_DATA_LINE) {
            if line.trim().is_empty() {
                continue;
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() > header.len() {
                return Err(ParserError::DataRow {
                    parser: Self::NAME,
                    line_index,
                    message: format!(
                        "expected at most {} fields, found {}",
                        header.len(),
                        tokens.len()
                    ),
                });
            }

            let field = |idx: usize| tokens.get(idx).copied().unwrap_or("-");
            let (date, time) = (field(date_idx), field(time_idx));
            if is_missing(date) || is_missing(time) {
                dropped += 1;
                continue;
            }
            timestamps.push(parse_timestamp(
                Self::NAME,
                &format!("{date} {time}"),
                line_index,
                TIMESTAMP_FORMATS,
            )?);

            for (idx, channel) in channels.iter_mut() {
                let value = parse_optional_f64(Self::NAME, field(*idx), line_index, &channel.name)?;
                channel.values.push(value);
            }
        }
        if dropped > 0 {
            debug!(dropped, "rows without date or time dropped");
        }

        Ok((
            timestamps,
            channels.into_iter().map(|(_, channel)| channel).collect(),
        ))
    }

    /// Resamples onto buckets `(end - (k+1)·rate, end - k·rate]` labelled by their right edge,
    /// where `end` is the last timestamp. Every bucket between the first and last reading is
    /// emitted; buckets without readings hold nulls.
    fn resample(
        &self,
        timestamps: &[NaiveDateTime],
        channels: &[Channel],
    ) -> Result<(Vec<NaiveDateTime>, Vec<Vec<Option<f64>>>), ParserError> {
        if self.sample_rate_seconds <= 0 {
            return Err(ParserError::Validation {
                parser: Self::NAME,
                message: format!(
                    "sample rate must be positive, got {}s",
                    self.sample_rate_seconds
                ),
            });
        }
        let step = self
            .sample_rate_seconds
            .checked_mul(1_000_000)
            .ok_or_else(|| ParserError::Validation {
                parser: Self::NAME,
                message: format!(
                    "sample rate of {}s is out of range",
                    self.sample_rate_seconds
                ),
            })?;
        let Some(end) = timestamps.iter().max().map(|ts| naive_to_micros(*ts)) else {
            return Ok((Vec::new(), vec![Vec::new(); channels.len()]));
        };

        let mut buckets: BTreeMap<i64, (Vec<f64>, usize)> = BTreeMap::new();
        for (row, timestamp) in timestamps.iter().enumerate() {
            let offset = (end - naive_to_micros(*timestamp)).div_euclid(step);
            let entry = buckets
                .entry(offset)
                .or_insert_with(|| (vec![0.0; channels.len()], 0));
            for (sum, channel) in entry.0.iter_mut().zip(channels) {
                *sum += channel.values[row].unwrap_or(0.0);
            }
            entry.1 += 1;
        }

        let span = buckets.keys().next_back().copied().unwrap_or(0);
        let mut labels = Vec::new();
        let mut means = vec![Vec::new(); channels.len()];
        for offset in (0..=span).rev() {
            labels.push(naive_from_micros(end - offset * step)?);
            match buckets.get(&offset) {
                Some((sums, count)) => {
                    for (column, sum) in means.iter_mut().zip(sums) {
                        column.push(Some(sum / *count as f64));
                    }
                }
                None => means.iter_mut().for_each(|column| column.push(None)),
            }
        }
        Ok((labels, means))
    }
}

/// Forward fills at most `limit` consecutive gaps after a reading; the rest become zero.
fn pad_and_fill(values: &[Option<f64>], limit: usize) -> Vec<f64> {
    let mut filled = Vec::with_capacity(values.len());
    let mut last: Option<f64> = None;
    let mut gap = 0usize;
    for value in values {
        match value {
            Some(v) => {
                last = Some(*v);
                gap = 0;
                filled.push(*v);
            }
            None => {
                gap += 1;
                match last {
                    Some(v) if gap <= limit => filled.push(v),
                    _ => filled.push(0.0),
                }
            }
        }
    }
    filled
}

impl RawParser for GeomonitorParser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, content: &[u8]) -> Result<DataFrame, ParserError> {
        let text = decode_latin1(content);
        let (timestamps, channels) = Self::read_rows(&text)?;

        // channels that never reported anything
        let channels: Vec<Channel> = channels
            .into_iter()
            .filter(|channel| channel.values.iter().any(Option::is_some))
            .collect();

        // rows where no remaining channel reported
        let keep: Vec<bool> = (0..timestamps.len())
            .map(|row| channels.iter().any(|channel| channel.values[row].is_some()))
            .collect();
        let mut order: Vec<usize> = (0..timestamps.len()).filter(|row| keep[*row]).collect();
        order.sort_by_key(|row| timestamps[*row]);
        if order.is_empty() {
            return Err(ParserError::EmptyData { parser: Self::NAME });
        }
        let timestamps: Vec<NaiveDateTime> = order.iter().map(|row| timestamps[*row]).collect();

        let mut connected = Vec::new();
        for channel in channels {
            let values: Vec<Option<f64>> = order.iter().map(|row| channel.values[*row]).collect();
            let filled = pad_and_fill(&values, PAD_LIMIT);
            if filled.iter().all(|v| *v <= 0.0) {
                debug!(channel = %channel.name, "sensor not connected, column dropped");
                continue;
            }
            connected.push(Channel {
                name: channel.name,
                values: filled.into_iter().map(|v| Some(v.max(0.0))).collect(),
            });
        }

        let (labels, means) = self.resample(&timestamps, &connected)?;

        // repeated channel names collapse onto the last surviving column
        let mut columns: Vec<(String, Vec<Option<f64>>)> = Vec::new();
        for (channel, values) in connected.into_iter().zip(means) {
            match columns.iter_mut().find(|(name, _)| *name == channel.name) {
                Some((_, existing)) => *existing = values,
                None => columns.push((channel.name, values)),
            }
        }

        build_raw_dataframe(Self::NAME, &labels, columns)
    }
}
