use chrono::NaiveDateTime;
use polars::prelude::DataFrame;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::RealValue;
use crate::series::HydraulicSeries;

/// Position and completion of a monitored depth interval.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionGeometry {
    pub toplongitude: RealValue,
    pub toplatitude: RealValue,
    pub topaltitude: RealValue,
    pub bottomlongitude: RealValue,
    pub bottomlatitude: RealValue,
    pub bottomaltitude: RealValue,
    pub topclosed: bool,
    pub bottomclosed: bool,
    pub topmeasureddepth: Option<RealValue>,
    pub bottommeasureddepth: Option<RealValue>,
    pub holediameter: Option<RealValue>,
    pub casingdiameter: Option<RealValue>,
}

impl SectionGeometry {
    /// A closed section at the origin spanning `top_altitude..bottom_altitude`.
    pub fn vertical(top_altitude: f64, bottom_altitude: f64) -> Self {
        Self {
            toplongitude: RealValue::new(0.0),
            toplatitude: RealValue::new(0.0),
            topaltitude: RealValue::new(top_altitude),
            bottomlongitude: RealValue::new(0.0),
            bottomlatitude: RealValue::new(0.0),
            bottomaltitude: RealValue::new(bottom_altitude),
            topclosed: true,
            bottomclosed: true,
            topmeasureddepth: None,
            bottommeasureddepth: None,
            holediameter: None,
            casingdiameter: None,
        }
    }
}

/// A monitored interval of a borehole together with its hydraulic time series.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    id: Uuid,
    name: Option<String>,
    pub geometry: SectionGeometry,
    pub sectiontype: Option<String>,
    pub casingtype: Option<String>,
    pub description: Option<String>,
    pub starttime: Option<NaiveDateTime>,
    pub endtime: Option<NaiveDateTime>,
    series: HydraulicSeries,
}

impl Section {
    pub fn new(id: Uuid, geometry: SectionGeometry) -> Self {
        Self {
            id,
            name: None,
            geometry,
            sectiontype: None,
            casingtype: None,
            description: None,
            starttime: None,
            endtime: None,
            series: HydraulicSeries::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn series(&self) -> &HydraulicSeries {
        &self.series
    }

    pub fn bottom_altitude(&self) -> f64 {
        self.geometry.bottomaltitude.value
    }

    /// Replaces the series with the contents of `table`.
    pub fn set_series(&mut self, table: &DataFrame) -> Result<(), StoreError> {
        self.series = HydraulicSeries::from_dataframe(table)?;
        Ok(())
    }

    pub fn replace_series(&mut self, series: HydraulicSeries) {
        self.series = series;
    }

    /// Outer-joins the columns of `table` into the series. Existing columns are rejected.
    pub fn merge_columns(&mut self, table: &DataFrame) -> Result<(), StoreError> {
        let incoming = HydraulicSeries::from_dataframe(table)?;
        self.merge_series(incoming)
    }

    pub fn merge_series(&mut self, series: HydraulicSeries) -> Result<(), StoreError> {
        let target = format!("section {}", self.label());
        self.series.merge_columns(series, &target)
    }

    /// Copy of this section restricted to `start <= timestamp <= end`.
    pub fn query(&self, start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Section {
        Section {
            series: self.series.range(start, end),
            ..self.metadata()
        }
    }

    /// Copy of the metadata with an empty series.
    pub fn metadata(&self) -> Section {
        Section {
            id: self.id,
            name: self.name.clone(),
            geometry: self.geometry.clone(),
            sectiontype: self.sectiontype.clone(),
            casingtype: self.casingtype.clone(),
            description: self.description.clone(),
            starttime: self.starttime,
            endtime: self.endtime,
            series: HydraulicSeries::new(),
        }
    }

    pub fn to_dataframe(&self) -> Result<DataFrame, StoreError> {
        self.series.to_dataframe()
    }

    fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("'{name}' ({})", self.id),
            None => self.id.to_string(),
        }
    }
}
