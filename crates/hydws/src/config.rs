use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hydws_parser::{LocalOrigin, RawFormat};
use serde::Deserialize;

fn default_sample_rate() -> i64 {
    60
}

fn default_timestamp_column() -> String {
    hydws_core::TIME_COLUMN.to_string()
}

/// Run configuration of `hydws ingest`. Relative paths resolve against the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub rules: PathBuf,
    pub metadata: MetadataConfig,
    pub raw: RawConfig,
    /// Base directory for plan files referenced by rules; defaults to the config directory.
    #[serde(default)]
    pub plans: Option<PathBuf>,
    /// Written to stdout when absent.
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub resample: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MetadataConfig {
    /// HYDWS JSON borehole records.
    Records { records: PathBuf },
    /// Delimited borehole and section tables plus one `<borehole name>.csv` trajectory per
    /// borehole in `trajectories`.
    Tables {
        boreholes: PathBuf,
        sections: PathBuf,
        #[serde(default)]
        trajectories: Option<PathBuf>,
        #[serde(default)]
        origin: OriginConfig,
    },
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OriginConfig {
    #[serde(default)]
    pub easting: f64,
    #[serde(default)]
    pub northing: f64,
    #[serde(default)]
    pub elevation: f64,
}

impl From<OriginConfig> for LocalOrigin {
    fn from(origin: OriginConfig) -> Self {
        LocalOrigin {
            easting: origin.easting,
            northing: origin.northing,
            elevation: origin.elevation,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum RawConfig {
    Geomonitor {
        path: PathBuf,
        #[serde(default = "default_sample_rate")]
        sample_rate: i64,
    },
    Csv {
        path: PathBuf,
        #[serde(default = "default_timestamp_column")]
        timestamp_column: String,
    },
}

impl RawConfig {
    pub fn path(&self) -> &Path {
        match self {
            RawConfig::Geomonitor { path, .. } | RawConfig::Csv { path, .. } => path,
        }
    }

    pub fn format(&self) -> RawFormat {
        match self {
            RawConfig::Geomonitor { sample_rate, .. } => RawFormat::Geomonitor {
                sample_rate_seconds: *sample_rate,
            },
            RawConfig::Csv {
                timestamp_column, ..
            } => RawFormat::Csv {
                timestamp_column: timestamp_column.clone(),
            },
        }
    }
}

impl RunConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse run configuration TOML")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run configuration at '{}'", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Invalid run configuration '{}'", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(config.resolved(base))
    }

    /// Anchors every relative path at `base`.
    pub fn resolved(mut self, base: &Path) -> Self {
        let anchor = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        anchor(&mut self.rules);
        match &mut self.metadata {
            MetadataConfig::Records { records } => anchor(records),
            MetadataConfig::Tables {
                boreholes,
                sections,
                trajectories,
                ..
            } => {
                anchor(boreholes);
                anchor(sections);
                if let Some(dir) = trajectories {
                    anchor(dir);
                }
            }
        }
        match &mut self.raw {
            RawConfig::Geomonitor { path, .. } | RawConfig::Csv { path, .. } => anchor(path),
        }
        if let Some(dir) = &mut self.plans {
            anchor(dir);
        } else {
            self.plans = Some(base.to_path_buf());
        }
        if let Some(output) = &mut self.output {
            anchor(output);
        }
        self
    }
}
