use csv::{ReaderBuilder, Trim};
use hydws_core::rules::{Plan, PlanInterval};

use crate::errors::ParserError;

use super::parse_timestamp;

const NAME: &str = "PLAN";
const DATE_FORMATS: &[&str] = &["%Y/%m/%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Parses a plan schedule with `date_from, date_until, interval` columns into ordered windows.
pub fn parse_plan(content: &[u8]) -> Result<Plan, ParserError> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(content);

    let headers = reader.headers().map_err(ParserError::csv(NAME))?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ParserError::InvalidHeader {
                parser: NAME,
                message: format!("missing '{name}' column"),
            })
    };
    let from_idx = column("date_from")?;
    let until_idx = column("date_until")?;
    let target_idx = column("interval")?;

    let mut intervals = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record.map_err(ParserError::csv(NAME))?;
        let line_index = row_idx + 1;
        let field = |idx: usize| record.get(idx).unwrap_or_default();
        let start = parse_timestamp(NAME, field(from_idx), line_index, DATE_FORMATS)?;
        let end = parse_timestamp(NAME, field(until_idx), line_index, DATE_FORMATS)?;
        let target = record.get(target_idx).unwrap_or_default();
        if target.is_empty() {
            return Err(ParserError::DataRow {
                parser: NAME,
                line_index,
                message: "empty interval target".to_string(),
            });
        }
        intervals.push(PlanInterval::new(start, end, target));
    }

    Ok(Plan::new(intervals))
}
