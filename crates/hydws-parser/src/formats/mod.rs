mod catalogue;
mod common;
mod csv_table;
mod geomonitor;
mod plan;

pub use catalogue::{
    build_borehole, build_catalogue, read_borehole_table, read_section_table,
    CoordinateTransform, LocalOrigin, Trajectory,
};
pub use csv_table::CsvTableParser;
pub use geomonitor::GeomonitorParser;
pub use plan::parse_plan;

pub(crate) use common::{
    build_raw_dataframe, decode_latin1, is_missing, parse_flag, parse_optional_f64,
    parse_timestamp,
};
