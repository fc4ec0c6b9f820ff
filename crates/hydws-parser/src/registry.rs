use polars::prelude::DataFrame;

use crate::errors::ParserError;
use crate::formats::{CsvTableParser, GeomonitorParser};

/// A loader that materializes one raw input file as a frame with a `datetime` column.
pub trait RawParser {
    fn name(&self) -> &'static str;
    fn parse(&self, content: &[u8]) -> Result<DataFrame, ParserError>;
}

/// Raw input formats selectable from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFormat {
    Geomonitor { sample_rate_seconds: i64 },
    Csv { timestamp_column: String },
}

pub fn parse_raw_file(content: &[u8], format: &RawFormat) -> Result<DataFrame, ParserError> {
    match format {
        RawFormat::Geomonitor {
            sample_rate_seconds,
        } => parse_with(content, &GeomonitorParser::with_sample_rate(*sample_rate_seconds)),
        RawFormat::Csv { timestamp_column } => parse_with(
            content,
            &CsvTableParser::default().with_timestamp_column(timestamp_column.clone()),
        ),
    }
}

pub fn parse_with(content: &[u8], parser: &dyn RawParser) -> Result<DataFrame, ParserError> {
    let df = parser.parse(content)?;
    tracing::debug!(
        parser = parser.name(),
        rows = df.height(),
        columns = df.width(),
        "raw table parsed"
    );
    Ok(df)
}
