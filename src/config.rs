//! Declarative dataset configuration, read once at startup.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::dataset::NodataPolicy;
use crate::interpolation::Kernel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TilingSchemeConfig {
    #[serde(rename = "type")]
    pub kind: String,
    /// For `single_file`: the raster path.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// For `uniform_grid`: the directory holding per-tile files.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// For `filename_index`: the manifest file path.
    #[serde(default)]
    pub manifest: Option<PathBuf>,
}

fn default_output_precision() -> u32 {
    crate::dataset::DEFAULT_OUTPUT_PRECISION
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub name: String,
    pub tiling_scheme: TilingSchemeConfig,
    #[serde(default)]
    pub default_kernel: Kernel,
    #[serde(default)]
    pub nodata_policy: NodataPolicy,
    #[serde(default = "default_output_precision")]
    pub output_precision: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub datasets: Vec<DatasetConfig>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {path:?}"))?;
        let config: Config =
            toml::from_str(&contents).with_context(|| format!("parsing config file {path:?}"))?;
        Ok(config)
    }
}

/// One row of a filename-index manifest: a geographic bounding box mapped
/// to the raster that covers it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: PathBuf,
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Manifest {
    #[serde(default)]
    pub tiles: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading manifest file {path:?}"))?;
        let manifest: Manifest = toml::from_str(&contents)
            .with_context(|| format!("parsing manifest file {path:?}"))?;
        Ok(manifest)
    }
}
