use chrono::NaiveDateTime;
use hydws_core::series::naive_to_micros;
use hydws_core::TIME_COLUMN;
use polars::prelude::*;

use crate::errors::ParserError;

/// Tokens that mark a missing reading.
const MISSING_TOKENS: &[&str] = &["", "-", "NaN", "nan", "NAN", "NA"];

pub(crate) fn is_missing(value: &str) -> bool {
    MISSING_TOKENS.contains(&value.trim())
}

pub(crate) fn parse_optional_f64(
    parser: &'static str,
    value: &str,
    line_index: usize,
    column: &str,
) -> Result<Option<f64>, ParserError> {
    let trimmed = value.trim();
    if is_missing(trimmed) {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|err| ParserError::DataRow {
            parser,
            line_index,
            message: format!("failed to parse column '{column}' as float: {err}"),
        })
}

pub(crate) fn parse_timestamp(
    parser: &'static str,
    value: &str,
    line_index: usize,
    formats: &[&str],
) -> Result<NaiveDateTime, ParserError> {
    let trimmed = value.trim();
    for fmt in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(dt);
        }
    }
    Err(ParserError::DataRow {
        parser,
        line_index,
        message: format!("invalid timestamp '{trimmed}'"),
    })
}

/// `True`/`False` as written by spreadsheet exports, plus `1`/`0`.
pub(crate) fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// ISO-8859-1 maps every byte onto the code point of the same value.
pub(crate) fn decode_latin1(content: &[u8]) -> String {
    content.iter().map(|&byte| byte as char).collect()
}

/// Assembles a raw frame: a `datetime` column followed by the value columns in order.
pub(crate) fn build_raw_dataframe(
    parser: &'static str,
    timestamps: &[NaiveDateTime],
    columns: Vec<(String, Vec<Option<f64>>)>,
) -> Result<DataFrame, ParserError> {
    let micros: Vec<i64> = timestamps.iter().map(|ts| naive_to_micros(*ts)).collect();
    let ts_series = Series::new(TIME_COLUMN.into(), micros)
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))
        .map_err(|err| ParserError::Validation {
            parser,
            message: format!("failed to cast timestamp column: {err}"),
        })?;

    let mut cols: Vec<Column> = Vec::with_capacity(columns.len() + 1);
    cols.push(ts_series.into());
    for (name, values) in columns {
        if values.len() != timestamps.len() {
            return Err(ParserError::Validation {
                parser,
                message: format!(
                    "column '{name}' had {} rows, expected {}",
                    values.len(),
                    timestamps.len()
                ),
            });
        }
        cols.push(Series::new(name.as_str().into(), values).into());
    }

    DataFrame::new(cols).map_err(|err| ParserError::Validation {
        parser,
        message: format!("failed to build raw dataframe: {err}"),
    })
}
