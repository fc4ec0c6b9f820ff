use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hydws_core::record::{boreholes_from_json_str, boreholes_to_json_string};
use hydws_core::rules::{RawTable, RuleEngine, RuleSet};
use hydws_core::HydraulicStore;
use hydws_parser::{
    build_catalogue, parse_plan, parse_raw_file, read_borehole_table, read_section_table,
    LocalOrigin, Trajectory,
};
use tracing::{debug, info};

use crate::config::{MetadataConfig, RunConfig};

pub fn run(config: &RunConfig) -> Result<()> {
    let rules_text = read_text(&config.rules, "rule configuration")?;
    let rules = RuleSet::from_json_str(&rules_text)
        .with_context(|| format!("Invalid rule configuration '{}'", config.rules.display()))?;
    info!(rules = rules.len(), "rule configuration loaded");

    let catalogue = load_catalogue(&config.metadata)?;
    info!(boreholes = catalogue.len(), "metadata catalogue loaded");

    let plan_dir = config.plans.as_deref().unwrap_or_else(|| Path::new("."));
    let mut engine = RuleEngine::new(rules, catalogue);
    let references: Vec<String> = engine
        .rules()
        .plan_references()
        .into_iter()
        .map(str::to_string)
        .collect();
    for reference in references {
        let path = plan_dir.join(&reference);
        let content = std::fs::read(&path)
            .with_context(|| format!("Failed to read plan file '{}'", path.display()))?;
        let plan = parse_plan(&content)
            .with_context(|| format!("Invalid plan file '{}'", path.display()))?;
        debug!(plan = %reference, intervals = plan.len(), "plan loaded");
        engine.add_plan(reference, plan);
    }

    let raw_path = config.raw.path();
    let content = std::fs::read(raw_path)
        .with_context(|| format!("Failed to read raw input '{}'", raw_path.display()))?;
    let frame = parse_raw_file(&content, &config.raw.format())
        .with_context(|| format!("Failed to parse raw input '{}'", raw_path.display()))?;
    let table = RawTable::from_dataframe(&frame)?;

    let output = engine.run(&table)?;
    let records = output.to_records(config.resample)?;
    let json = boreholes_to_json_string(&records)?;

    match &config.output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create output directory '{}'", parent.display())
                })?;
            }
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write output '{}'", path.display()))?;
            info!(path = %path.display(), boreholes = records.len(), "HYDWS records written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn read_text(path: &Path, what: &str) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {what} at '{}'", path.display()))
}

fn load_catalogue(metadata: &MetadataConfig) -> Result<HydraulicStore> {
    match metadata {
        MetadataConfig::Records { records } => {
            let text = read_text(records, "metadata records")?;
            let records = boreholes_from_json_str(&text)
                .with_context(|| format!("Invalid metadata records '{}'", records.display()))?;
            Ok(HydraulicStore::from_records(records)?)
        }
        MetadataConfig::Tables {
            boreholes,
            sections,
            trajectories,
            origin,
        } => {
            let borehole_rows = read_borehole_table(&read_bytes(boreholes)?)
                .with_context(|| format!("Invalid borehole table '{}'", boreholes.display()))?;
            let section_rows = read_section_table(&read_bytes(sections)?)
                .with_context(|| format!("Invalid section table '{}'", sections.display()))?;

            let mut paths = HashMap::new();
            if let Some(dir) = trajectories {
                for row in &borehole_rows {
                    if let Some(name) = &row.name {
                        paths.insert(name.clone(), dir.join(format!("{name}.csv")));
                    }
                }
            }
            let trajectories = load_trajectories(paths)?;

            let origin = LocalOrigin::from(*origin);
            Ok(build_catalogue(
                &borehole_rows,
                &section_rows,
                &trajectories,
                &origin,
            )?)
        }
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read '{}'", path.display()))
}

/// Missing trajectory files are skipped; boreholes with sections then fail to build.
fn load_trajectories(paths: HashMap<String, PathBuf>) -> Result<HashMap<String, Trajectory>> {
    let mut trajectories = HashMap::new();
    for (name, path) in paths {
        if !path.is_file() {
            debug!(borehole = %name, path = %path.display(), "no trajectory file");
            continue;
        }
        let trajectory = Trajectory::from_csv(&read_bytes(&path)?)
            .with_context(|| format!("Invalid trajectory '{}'", path.display()))?;
        trajectories.insert(name, trajectory);
    }
    Ok(trajectories)
}
