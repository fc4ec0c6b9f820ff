use csv::{ReaderBuilder, Trim};
use polars::prelude::DataFrame;

use crate::errors::ParserError;
use crate::registry::RawParser;

use super::{build_raw_dataframe, parse_optional_f64, parse_timestamp};

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
];

/// Delimited raw sensor table with one timestamp column and numeric sensor columns.
#[derive(Debug, Clone)]
pub struct CsvTableParser {
    pub timestamp_column: String,
    pub delimiter: u8,
}

impl Default for CsvTableParser {
    fn default() -> Self {
        Self {
            timestamp_column: hydws_core::TIME_COLUMN.to_string(),
            delimiter: b',',
        }
    }
}

impl CsvTableParser {
    const NAME: &'static str = "CSV_TABLE";

    pub fn with_timestamp_column(mut self, column: impl Into<String>) -> Self {
        self.timestamp_column = column.into();
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

impl RawParser for CsvTableParser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, content: &[u8]) -> Result<DataFrame, ParserError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(Trim::All)
            .flexible(false)
            .from_reader(content);

        let headers = reader
            .headers()
            .map_err(ParserError::csv(Self::NAME))?
            .clone();
        let Some(time_idx) = headers.iter().position(|h| h == self.timestamp_column) else {
            return Err(ParserError::FormatMismatch {
                parser: Self::NAME,
                reason: format!("no '{}' column in header", self.timestamp_column),
            });
        };

        let names: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != time_idx)
            .map(|(idx, name)| (idx, name.to_string()))
            .collect();
        let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); names.len()];
        let mut timestamps = Vec::new();

        for (row_idx, record) in reader.records().enumerate() {
            let record = record.map_err(ParserError::csv(Self::NAME))?;
            // header is line 0
            let line_index = row_idx + 1;
            let raw_time = record.get(time_idx).unwrap_or_default();
            timestamps.push(parse_timestamp(
                Self::NAME,
                raw_time,
                line_index,
                TIMESTAMP_FORMATS,
            )?);
            for ((idx, name), column) in names.iter().zip(values.iter_mut()) {
                let raw = record.get(*idx).unwrap_or_default();
                column.push(parse_optional_f64(Self::NAME, raw, line_index, name)?);
            }
        }

        if timestamps.is_empty() {
            return Err(ParserError::EmptyData { parser: Self::NAME });
        }

        let columns = names
            .into_iter()
            .map(|(_, name)| name)
            .zip(values)
            .collect();
        build_raw_dataframe(Self::NAME, &timestamps, columns)
    }
}
