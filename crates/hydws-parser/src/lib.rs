pub mod errors;
pub mod formats;
pub mod model;
mod registry;

pub use errors::ParserError;
pub use formats::{
    build_borehole, build_catalogue, parse_plan, read_borehole_table, read_section_table,
    CoordinateTransform, CsvTableParser, GeomonitorParser, LocalOrigin, Trajectory,
};
pub use model::{BoreholeRow, SectionRow, TrajectoryPoint};
pub use registry::{parse_raw_file, parse_with, RawFormat, RawParser};

#[cfg(test)]
mod tests;
