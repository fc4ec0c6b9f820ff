use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use hydws_core::record::{boreholes_from_json_str, boreholes_to_json_string};
use hydws_core::{BoreholeRecord, HydraulicStore};
use tracing::{debug, info};

/// Loads a HYDWS JSON file, or every `*.json` file of a directory.
///
/// A directory holds the data of one borehole split over several files. Files are read in
/// name order; section metadata and hydraulics from later files replace earlier ones.
pub fn load_store(input: &Path) -> Result<HydraulicStore> {
    if input.is_file() {
        let records = read_records(input)?;
        return Ok(HydraulicStore::from_records(records)?);
    }
    if !input.is_dir() {
        bail!(
            "Could not read hydraulic data, '{}' is neither a file nor a directory",
            input.display()
        );
    }

    let pattern = input.join("*.json");
    let pattern_str = pattern
        .to_str()
        .with_context(|| format!("Invalid path pattern '{}'", pattern.display()))?;
    let mut files: Vec<PathBuf> = glob::glob(pattern_str)?
        .collect::<Result<_, _>>()
        .context("Could not read path from glob pattern")?;
    files.sort();

    let mut combined: Option<BoreholeRecord> = None;
    for file in files {
        debug!(file = %file.display(), "loading HYDWS file");
        for record in read_records(&file)? {
            combined = Some(match combined {
                None => record,
                Some(existing) if existing.publicid != record.publicid => bail!(
                    "Data of multiple boreholes in '{}' ({} and {}), only one borehole is allowed",
                    input.display(),
                    existing.publicid,
                    record.publicid
                ),
                Some(existing) => overlay(existing, record),
            });
        }
    }

    let records: Vec<BoreholeRecord> = combined.into_iter().collect();
    Ok(HydraulicStore::from_records(records)?)
}

fn read_records(path: &Path) -> Result<Vec<BoreholeRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read HYDWS file '{}'", path.display()))?;
    boreholes_from_json_str(&text)
        .with_context(|| format!("Invalid HYDWS file '{}'", path.display()))
}

/// Borehole metadata of `later`, with its sections replacing same-id sections of `earlier`.
fn overlay(earlier: BoreholeRecord, mut later: BoreholeRecord) -> BoreholeRecord {
    let mut sections = earlier.sections;
    for section in later.sections.drain(..) {
        match sections.iter_mut().find(|s| s.publicid == section.publicid) {
            Some(existing) if section.hydraulics.is_empty() => {
                let hydraulics = std::mem::take(&mut existing.hydraulics);
                *existing = section;
                existing.hydraulics = hydraulics;
            }
            Some(existing) => *existing = section,
            None => sections.push(section),
        }
    }
    later.sections = sections;
    later
}

pub fn run(
    input: &Path,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
    resample: Option<i64>,
    output: Option<&Path>,
) -> Result<()> {
    let store = load_store(input)?;
    let selected = store.query(start, end);
    let records = selected.to_records(resample)?;
    let json = boreholes_to_json_string(&records)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write output '{}'", path.display()))?;
            info!(path = %path.display(), boreholes = records.len(), "query result written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, hydraulics: &str) -> BoreholeRecord {
        let text = format!(
            r#"{{
                "publicid": "4d8c7e3a-5b3f-4f2a-9f0e-2f6a1c3b9d10",
                "longitude": {{"value": 0.0}},
                "latitude": {{"value": 0.0}},
                "altitude": {{"value": 100.0}},
                "name": "{name}",
                "sections": [{{
                    "publicid": "9a1f0c52-7d3e-4b8a-8c1d-5e2f3a4b6c71",
                    "toplongitude": {{"value": 0.0}},
                    "toplatitude": {{"value": 0.0}},
                    "topaltitude": {{"value": 60.0}},
                    "bottomlongitude": {{"value": 0.0}},
                    "bottomlatitude": {{"value": 0.0}},
                    "bottomaltitude": {{"value": 20.0}},
                    "topclosed": false,
                    "bottomclosed": false,
                    "hydraulics": [{hydraulics}]
                }}]
            }}"#
        );
        BoreholeRecord::from_json_str(&text).unwrap()
    }

    #[test]
    fn later_files_replace_metadata_and_keep_missing_hydraulics() {
        let sample = r#"{"datetime": {"value": "2022-03-01T00:00:00"}, "topflow": {"value": 1.5}}"#;
        let merged = overlay(record("old", sample), record("new", ""));

        assert_eq!(merged.name.as_deref(), Some("new"));
        assert_eq!(merged.sections.len(), 1);
        assert_eq!(merged.sections[0].hydraulics.len(), 1);

        let replaced = overlay(merged, record("newer", sample));
        assert_eq!(replaced.sections[0].hydraulics.len(), 1);
    }
}
