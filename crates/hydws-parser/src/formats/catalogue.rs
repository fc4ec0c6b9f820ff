use std::collections::HashMap;

use csv::{ReaderBuilder, Trim};
use hydws_core::record::parse_timestamp;
use hydws_core::{Borehole, HydraulicStore, Location, RealValue, Section, SectionGeometry};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::errors::ParserError;
use crate::model::{BoreholeRow, SectionRow, TrajectoryPoint};

const NAME: &str = "CATALOGUE";

/// Converts local borehole coordinates into the coordinates written to records.
pub trait CoordinateTransform {
    /// Maps local `(x, y, z)` onto `(longitude, latitude, altitude)`.
    fn to_world(&self, x: f64, y: f64, z: f64) -> (f64, f64, f64);
}

/// Shifts local coordinates by the origin of the local grid.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LocalOrigin {
    pub easting: f64,
    pub northing: f64,
    pub elevation: f64,
}

impl CoordinateTransform for LocalOrigin {
    fn to_world(&self, x: f64, y: f64, z: f64) -> (f64, f64, f64) {
        (x + self.easting, y + self.northing, z + self.elevation)
    }
}

/// Borehole path as `(depth, x, y, z)` points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    points: Vec<TrajectoryPoint>,
}

impl Trajectory {
    pub fn new(points: Vec<TrajectoryPoint>) -> Self {
        Self { points }
    }

    pub fn from_csv(content: &[u8]) -> Result<Self, ParserError> {
        read_rows(content).map(Self::new)
    }

    pub fn points(&self) -> &[TrajectoryPoint] {
        &self.points
    }

    /// Local coordinates at a measured depth. Between trajectory points the elevation is
    /// interpolated in depth, then `x` and `y` in elevation, using the enclosing pair of
    /// points (the outermost pair beyond either end).
    pub fn position_at(&self, depth: f64) -> Result<(f64, f64, f64), ParserError> {
        if let Some(point) = self.points.iter().find(|point| point.depth == depth) {
            return Ok((point.x, point.y, point.z));
        }
        if self.points.len() < 2 {
            return Err(ParserError::Validation {
                parser: NAME,
                message: format!("trajectory needs two points to interpolate depth {depth}"),
            });
        }

        let mut sorted: Vec<&TrajectoryPoint> = self.points.iter().collect();
        sorted.sort_by(|a, b| a.depth.total_cmp(&b.depth));
        let below = sorted
            .iter()
            .position(|point| point.depth > depth)
            .unwrap_or(sorted.len())
            .clamp(1, sorted.len() - 1);
        let (p0, p1) = (sorted[below - 1], sorted[below]);
        if p0.depth == p1.depth {
            return Err(ParserError::Validation {
                parser: NAME,
                message: format!("trajectory repeats depth {}", p0.depth),
            });
        }

        let z = (depth - p0.depth) / (p1.depth - p0.depth) * (p1.z - p0.z) + p0.z;
        let x = interpolate(z, (p0.z, p1.z), (p0.x, p1.x));
        let y = interpolate(z, (p0.z, p1.z), (p0.y, p1.y));
        Ok((x, y, z))
    }
}

/// Linear interpolation of `at` over `from`, clamped to the end values.
fn interpolate(at: f64, from: (f64, f64), to: (f64, f64)) -> f64 {
    if from.0 == from.1 {
        return to.0;
    }
    let t = ((at - from.0) / (from.1 - from.0)).clamp(0.0, 1.0);
    to.0 + t * (to.1 - to.0)
}

fn read_rows<T: DeserializeOwned>(content: &[u8]) -> Result<Vec<T>, ParserError> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(content);
    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(ParserError::csv(NAME))
}

pub fn read_borehole_table(content: &[u8]) -> Result<Vec<BoreholeRow>, ParserError> {
    read_rows(content)
}

pub fn read_section_table(content: &[u8]) -> Result<Vec<SectionRow>, ParserError> {
    read_rows(content)
}

fn optional_time(value: &Option<String>) -> Result<Option<chrono::NaiveDateTime>, ParserError> {
    value
        .as_deref()
        .map(|text| parse_timestamp(text).map_err(ParserError::from))
        .transpose()
}

fn build_section(
    row: &SectionRow,
    trajectory: &Trajectory,
    transform: &dyn CoordinateTransform,
) -> Result<Section, ParserError> {
    let world = |depth: f64| -> Result<(f64, f64, f64), ParserError> {
        let (x, y, z) = trajectory.position_at(depth)?;
        Ok(transform.to_world(x, y, z))
    };
    let (top_lon, top_lat, top_alt) = world(row.topmeasureddepth)?;
    let (bottom_lon, bottom_lat, bottom_alt) = world(row.bottommeasureddepth)?;

    let geometry = SectionGeometry {
        toplongitude: RealValue::new(top_lon),
        toplatitude: RealValue::new(top_lat),
        topaltitude: RealValue::new(top_alt),
        bottomlongitude: RealValue::new(bottom_lon),
        bottomlatitude: RealValue::new(bottom_lat),
        bottomaltitude: RealValue::new(bottom_alt),
        topclosed: row.topclosed,
        bottomclosed: row.bottomclosed,
        topmeasureddepth: Some(RealValue::new(row.topmeasureddepth)),
        bottommeasureddepth: Some(RealValue::new(row.bottommeasureddepth)),
        holediameter: row.holediameter.map(RealValue::new),
        casingdiameter: row.casingdiameter.map(RealValue::new),
    };

    let mut section = Section::new(row.publicid, geometry);
    if let Some(name) = &row.name {
        section = section.with_name(name.clone());
    }
    section.sectiontype = row.sectiontype.clone();
    section.casingtype = row.casingtype.clone();
    section.description = row.description.clone();
    section.starttime = optional_time(&row.starttime)?;
    section.endtime = optional_time(&row.endtime)?;
    Ok(section)
}

/// Builds one borehole with its sections from metadata rows.
pub fn build_borehole(
    row: &BoreholeRow,
    sections: &[SectionRow],
    trajectory: Option<&Trajectory>,
    transform: &dyn CoordinateTransform,
) -> Result<Borehole, ParserError> {
    let (longitude, latitude, altitude) = transform.to_world(row.x, row.y, row.z);
    let mut borehole = Borehole::new(
        row.publicid,
        Location {
            longitude: RealValue::new(longitude),
            latitude: RealValue::new(latitude),
            altitude: RealValue::new(altitude),
        },
    );
    borehole.name = row.name.clone();
    borehole.description = row.description.clone();
    borehole.location_name = row.location_name.clone();
    borehole.institution = row.institution.clone();
    borehole.bedrockaltitude = row.bedrockaltitude.map(RealValue::new);
    borehole.measureddepth = row.measureddepth.map(RealValue::new);

    let owned: Vec<&SectionRow> = sections
        .iter()
        .filter(|section| section.borehole == row.publicid)
        .collect();
    if owned.is_empty() {
        return Ok(borehole);
    }
    let trajectory = trajectory.ok_or_else(|| ParserError::Validation {
        parser: NAME,
        message: format!(
            "borehole {} has sections but no trajectory",
            row.name.as_deref().unwrap_or("<unnamed>")
        ),
    })?;

    for section in owned {
        borehole.insert_section(build_section(section, trajectory, transform)?)?;
    }
    Ok(borehole)
}

/// Builds the catalogue of all boreholes. Trajectories are keyed by borehole name.
pub fn build_catalogue(
    boreholes: &[BoreholeRow],
    sections: &[SectionRow],
    trajectories: &HashMap<String, Trajectory>,
    transform: &dyn CoordinateTransform,
) -> Result<HydraulicStore, ParserError> {
    for section in sections {
        if !boreholes.iter().any(|row| row.publicid == section.borehole) {
            warn!(
                section = %section.publicid,
                borehole = %section.borehole,
                "section references an unknown borehole, skipped"
            );
        }
    }

    let mut store = HydraulicStore::new();
    for row in boreholes {
        let trajectory = row.name.as_ref().and_then(|name| trajectories.get(name));
        let borehole = build_borehole(row, sections, trajectory, transform)?;
        debug!(borehole = %borehole.id(), sections = borehole.len(), "borehole metadata built");
        store.insert_borehole(borehole)?;
    }
    Ok(store)
}
