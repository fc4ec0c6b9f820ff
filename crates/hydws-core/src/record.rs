// crates/hydws-core/src/record.rs
//
// Nested HYDWS JSON records and the conversions between them and the store.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::borehole::{Borehole, Location};
use crate::error::StoreError;
use crate::fields::resolve_columns;
use crate::model::{FieldValue, HydraulicSample, RealValue};
use crate::section::{Section, SectionGeometry};
use crate::series::HydraulicSeries;
use crate::store::HydraulicStore;

const RECORD_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const ACCEPTED_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Parses the timestamp notations found in HYDWS records. Offsets are normalised to UTC.
pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime, StoreError> {
    let text = text.trim();
    for format in ACCEPTED_TIME_FORMATS {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(timestamp);
        }
    }
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.naive_utc())
        .map_err(|_| StoreError::Validation(format!("unrecognised timestamp '{text}'")))
}

pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(RECORD_TIME_FORMAT).to_string()
}

mod iso {
    use chrono::NaiveDateTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_timestamp(&text).map_err(D::Error::custom)
    }
}

mod iso_opt {
    use chrono::NaiveDateTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_str(&super::format_timestamp(value)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|text| super::parse_timestamp(&text).map_err(D::Error::custom))
            .transpose()
    }
}

/// `{"value": "YYYY-MM-DDTHH:MM:SS"}`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatetimeValue {
    #[serde(with = "iso")]
    pub value: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydraulicSampleRecord {
    pub datetime: DatetimeValue,
    /// Measured quantities keyed by canonical field name; unmeasured fields are absent.
    #[serde(flatten)]
    pub values: BTreeMap<String, FieldValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionRecord {
    pub publicid: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "iso_opt")]
    pub starttime: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "iso_opt")]
    pub endtime: Option<NaiveDateTime>,
    pub toplongitude: RealValue,
    pub toplatitude: RealValue,
    pub topaltitude: RealValue,
    pub bottomlongitude: RealValue,
    pub bottomlatitude: RealValue,
    pub bottomaltitude: RealValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topmeasureddepth: Option<RealValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottommeasureddepth: Option<RealValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holediameter: Option<RealValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub casingdiameter: Option<RealValue>,
    pub topclosed: bool,
    pub bottomclosed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sectiontype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub casingtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hydraulics: Vec<HydraulicSampleRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoreholeRecord {
    pub publicid: Uuid,
    pub longitude: RealValue,
    pub latitude: RealValue,
    pub altitude: RealValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bedrockaltitude: Option<RealValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measureddepth: Option<RealValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<SectionRecord>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<BoreholeRecord>),
    One(Box<BoreholeRecord>),
}

fn malformed(err: serde_json::Error) -> StoreError {
    StoreError::Validation(format!("malformed HYDWS record: {err}"))
}

impl BoreholeRecord {
    pub fn from_json_str(text: &str) -> Result<Self, StoreError> {
        serde_json::from_str(text).map_err(malformed)
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self, StoreError> {
        serde_json::from_value(value).map_err(malformed)
    }

    pub fn to_json_value(&self) -> Result<serde_json::Value, StoreError> {
        serde_json::to_value(self).map_err(malformed)
    }

    pub fn to_json_string(&self) -> Result<String, StoreError> {
        serde_json::to_string_pretty(self).map_err(malformed)
    }
}

/// Reads either a single borehole record or a list of them.
pub fn boreholes_from_json_str(text: &str) -> Result<Vec<BoreholeRecord>, StoreError> {
    match serde_json::from_str::<OneOrMany>(text) {
        Ok(OneOrMany::Many(records)) => Ok(records),
        Ok(OneOrMany::One(record)) => Ok(vec![*record]),
        // untagged errors are uninformative, retry for a precise message
        Err(_) if text.trim_start().starts_with('[') => {
            serde_json::from_str(text).map_err(malformed)
        }
        Err(_) => BoreholeRecord::from_json_str(text).map(|record| vec![record]),
    }
}

pub fn boreholes_to_json_string(records: &[BoreholeRecord]) -> Result<String, StoreError> {
    serde_json::to_string_pretty(records).map_err(malformed)
}

impl HydraulicSeries {
    pub fn from_records(records: Vec<HydraulicSampleRecord>) -> Result<Self, StoreError> {
        let mut names: Vec<&str> = records
            .iter()
            .flat_map(|record| record.values.keys().map(String::as_str))
            .collect();
        names.sort_unstable();
        names.dedup();
        resolve_columns(names.iter().copied())?;

        let mut samples = Vec::with_capacity(records.len());
        for record in records {
            let mut sample = HydraulicSample::default();
            for (name, value) in record.values {
                let field = name.parse()?;
                sample.set(field, value)?;
            }
            samples.push((record.datetime.value, sample));
        }
        Ok(HydraulicSeries::from_samples(samples))
    }

    pub fn to_records(&self) -> Vec<HydraulicSampleRecord> {
        self.iter()
            .map(|(timestamp, sample)| HydraulicSampleRecord {
                datetime: DatetimeValue { value: *timestamp },
                values: sample
                    .fields()
                    .filter_map(|field| {
                        sample
                            .get(field)
                            .map(|value| (field.canonical_name().to_string(), value))
                    })
                    .collect(),
            })
            .collect()
    }
}

impl Section {
    pub fn from_record(record: SectionRecord) -> Result<Section, StoreError> {
        let geometry = SectionGeometry {
            toplongitude: record.toplongitude,
            toplatitude: record.toplatitude,
            topaltitude: record.topaltitude,
            bottomlongitude: record.bottomlongitude,
            bottomlatitude: record.bottomlatitude,
            bottomaltitude: record.bottomaltitude,
            topclosed: record.topclosed,
            bottomclosed: record.bottomclosed,
            topmeasureddepth: record.topmeasureddepth,
            bottommeasureddepth: record.bottommeasureddepth,
            holediameter: record.holediameter,
            casingdiameter: record.casingdiameter,
        };
        let mut section = Section::new(record.publicid, geometry);
        if let Some(name) = record.name {
            section = section.with_name(name);
        }
        section.sectiontype = record.sectiontype;
        section.casingtype = record.casingtype;
        section.description = record.description;
        section.starttime = record.starttime;
        section.endtime = record.endtime;
        section.replace_series(HydraulicSeries::from_records(record.hydraulics)?);
        Ok(section)
    }

    /// Renders the section; `resample` (seconds) only affects the rendered samples.
    pub fn to_record(&self, resample: Option<i64>) -> Result<SectionRecord, StoreError> {
        let hydraulics = match resample {
            Some(interval) => self.series().resample(interval)?.to_records(),
            None => self.series().to_records(),
        };
        let geometry = &self.geometry;
        Ok(SectionRecord {
            publicid: self.id(),
            starttime: self.starttime,
            endtime: self.endtime,
            toplongitude: geometry.toplongitude,
            toplatitude: geometry.toplatitude,
            topaltitude: geometry.topaltitude,
            bottomlongitude: geometry.bottomlongitude,
            bottomlatitude: geometry.bottomlatitude,
            bottomaltitude: geometry.bottomaltitude,
            topmeasureddepth: geometry.topmeasureddepth,
            bottommeasureddepth: geometry.bottommeasureddepth,
            holediameter: geometry.holediameter,
            casingdiameter: geometry.casingdiameter,
            topclosed: geometry.topclosed,
            bottomclosed: geometry.bottomclosed,
            sectiontype: self.sectiontype.clone(),
            casingtype: self.casingtype.clone(),
            description: self.description.clone(),
            name: self.name().map(str::to_string),
            hydraulics,
        })
    }
}

impl Borehole {
    pub fn from_record(record: BoreholeRecord) -> Result<Borehole, StoreError> {
        let location = Location {
            longitude: record.longitude,
            latitude: record.latitude,
            altitude: record.altitude,
        };
        let mut borehole = Borehole::new(record.publicid, location);
        borehole.bedrockaltitude = record.bedrockaltitude;
        borehole.measureddepth = record.measureddepth;
        borehole.name = record.name;
        borehole.description = record.description;
        borehole.location_name = record.location_name;
        borehole.institution = record.institution;
        for section in record.sections {
            borehole.insert_section(Section::from_record(section)?)?;
        }
        Ok(borehole)
    }

    pub fn to_record(&self, resample: Option<i64>) -> Result<BoreholeRecord, StoreError> {
        let sections = self
            .sections()
            .map(|section| section.to_record(resample))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(BoreholeRecord {
            publicid: self.id(),
            longitude: self.location.longitude,
            latitude: self.location.latitude,
            altitude: self.location.altitude,
            bedrockaltitude: self.bedrockaltitude,
            measureddepth: self.measureddepth,
            name: self.name.clone(),
            description: self.description.clone(),
            location_name: self.location_name.clone(),
            institution: self.institution.clone(),
            sections,
        })
    }
}

impl HydraulicStore {
    pub fn from_records(records: Vec<BoreholeRecord>) -> Result<HydraulicStore, StoreError> {
        let mut store = HydraulicStore::new();
        for record in records {
            store.insert_borehole(Borehole::from_record(record)?)?;
        }
        Ok(store)
    }

    pub fn to_records(&self, resample: Option<i64>) -> Result<Vec<BoreholeRecord>, StoreError> {
        self.boreholes()
            .map(|borehole| borehole.to_record(resample))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn timestamps_accept_fractions_and_offsets() {
        let base = NaiveDate::from_ymd_opt(2022, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2022-03-01T12:30:00").unwrap(), base);
        assert_eq!(parse_timestamp("2022-03-01 12:30:00").unwrap(), base);
        assert_eq!(parse_timestamp("2022-03-01T14:30:00+02:00").unwrap(), base);
        assert_eq!(format_timestamp(&base), "2022-03-01T12:30:00");

        let fractional = parse_timestamp("2022-03-01T12:30:00.250").unwrap();
        assert_eq!(format_timestamp(&fractional), "2022-03-01T12:30:00.250");
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn sample_records_omit_unmeasured_fields() {
        let records: Vec<HydraulicSampleRecord> = serde_json::from_value(serde_json::json!([
            {"datetime": {"value": "2022-03-01T00:00:00"}, "topflow": {"value": 1.5}},
            {"datetime": {"value": "2022-03-01T00:01:00"}, "toppressure": {"value": 2.5, "uncertainty": 0.1}}
        ]))
        .unwrap();
        let series = HydraulicSeries::from_records(records.clone()).unwrap();
        assert_eq!(series.len(), 2);

        let rendered = serde_json::to_value(series.to_records()).unwrap();
        assert!(rendered[0].get("toppressure").is_none());
        assert!(rendered[1].get("topflow").is_none());
        assert_eq!(rendered[1]["toppressure"]["uncertainty"], 0.1);
    }

    #[test]
    fn unknown_sample_fields_are_reported_together() {
        let records: Vec<HydraulicSampleRecord> = serde_json::from_value(serde_json::json!([
            {"datetime": {"value": "2022-03-01T00:00:00"}, "flow": {"value": 1.0}, "pressure": {"value": 1.0}}
        ]))
        .unwrap();
        match HydraulicSeries::from_records(records) {
            Err(StoreError::UnknownField { names, .. }) => {
                assert_eq!(names, vec!["flow".to_string(), "pressure".to_string()])
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
