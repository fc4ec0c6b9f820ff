use serde::{de::Error, Deserialize, Deserializer};
use uuid::Uuid;

use crate::formats::parse_flag;

/// One row of the borehole metadata table. Coordinates are local `x, y, z`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BoreholeRow {
    pub publicid: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "location")]
    pub location_name: Option<String>,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub bedrockaltitude: Option<f64>,
    #[serde(default)]
    pub measureddepth: Option<f64>,
}

/// One row of the section metadata table; positions are measured depths along the trajectory.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SectionRow {
    pub borehole: Uuid,
    pub publicid: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    pub topmeasureddepth: f64,
    pub bottommeasureddepth: f64,
    #[serde(deserialize_with = "flag")]
    pub topclosed: bool,
    #[serde(deserialize_with = "flag")]
    pub bottomclosed: bool,
    #[serde(default)]
    pub holediameter: Option<f64>,
    #[serde(default)]
    pub casingdiameter: Option<f64>,
    #[serde(default)]
    pub sectiontype: Option<String>,
    #[serde(default)]
    pub casingtype: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub starttime: Option<String>,
    #[serde(default)]
    pub endtime: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TrajectoryPoint {
    pub depth: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_flag(&raw).ok_or_else(|| D::Error::custom(format!("'{raw}' is not a boolean flag")))
}
