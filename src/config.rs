use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// Province polygons, .shp or .geojson, already in a planar
    /// area-preserving projection.
    pub geometry: PathBuf,
    /// Directory holding the population table (query.csv, or the last
    /// query*.csv if that name is absent).
    pub population_dir: PathBuf,
    /// Country codes to keep. Empty keeps everything.
    #[serde(default)]
    pub countries: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub dir: PathBuf,
    #[serde(default)]
    pub debug_csv: bool,
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}
