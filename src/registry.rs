//! Parses and validates dataset configuration into ready-to-query dataset
//! handles, published atomically: a config with any invalid dataset fails
//! to load at all rather than starting half-registered.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};

use crate::config::{Config, DatasetConfig, Manifest, TilingSchemeConfig};
use crate::dataset::Dataset;
use crate::error::ConfigError;
use crate::raster::hgt;
use crate::tile_index::TileIndex;

#[derive(Debug)]
pub struct DatasetRegistry {
    datasets: HashMap<String, Arc<Dataset>>,
}

impl DatasetRegistry {
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        if !config_path.exists() {
            return Err(ConfigError::NotFound(config_path.to_path_buf()).into());
        }

        let config = Config::load(config_path)?;
        Self::from_config(config, config_path.parent().unwrap_or(Path::new(".")))
    }

    fn from_config(config: Config, base_dir: &Path) -> anyhow::Result<Self> {
        let mut datasets = HashMap::new();

        for dataset_config in &config.datasets {
            if datasets.contains_key(&dataset_config.name) {
                return Err(ConfigError::DuplicateDataset(dataset_config.name.clone()).into());
            }

            let dataset = build_dataset(dataset_config, base_dir)
                .with_context(|| format!("loading dataset '{}'", dataset_config.name))?;

            probe(&dataset)
                .with_context(|| format!("probing dataset '{}'", dataset_config.name))?;

            datasets.insert(dataset_config.name.clone(), Arc::new(dataset));
        }

        Ok(Self { datasets })
    }

    pub fn get(&self, name: &str) -> Option<Arc<Dataset>> {
        self.datasets.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

fn build_dataset(config: &DatasetConfig, base_dir: &Path) -> anyhow::Result<Dataset> {
    let tile_index = build_tile_index(&config.tiling_scheme, &config.name, base_dir)?;

    Ok(Dataset {
        name: config.name.clone(),
        tile_index,
        default_kernel: config.default_kernel,
        nodata_policy: config.nodata_policy,
        output_precision: config.output_precision,
    })
}

fn build_tile_index(
    scheme: &TilingSchemeConfig,
    dataset_name: &str,
    base_dir: &Path,
) -> anyhow::Result<TileIndex> {
    match scheme.kind.as_str() {
        "single_file" => {
            let path = scheme.path.clone().ok_or_else(|| ConfigError::InvalidDataset {
                name: dataset_name.to_string(),
                reason: "single_file tiling scheme requires 'path'".to_string(),
            })?;
            Ok(TileIndex::SingleFile {
                path: resolve(base_dir, &path),
            })
        }

        "uniform_grid" => {
            let dir = scheme.dir.clone().ok_or_else(|| ConfigError::InvalidDataset {
                name: dataset_name.to_string(),
                reason: "uniform_grid tiling scheme requires 'dir'".to_string(),
            })?;
            Ok(TileIndex::uniform_grid(
                resolve(base_dir, &dir),
                hgt::tile_filename,
            ))
        }

        "filename_index" => {
            let manifest_path =
                scheme.manifest.clone().ok_or_else(|| ConfigError::InvalidDataset {
                    name: dataset_name.to_string(),
                    reason: "filename_index tiling scheme requires 'manifest'".to_string(),
                })?;
            let manifest = Manifest::load(&resolve(base_dir, &manifest_path))?;
            let entries = manifest
                .tiles
                .into_iter()
                .map(|tile| {
                    (
                        (tile.south, tile.west, tile.north, tile.east),
                        resolve(base_dir, &tile.path),
                    )
                })
                .collect();
            Ok(TileIndex::filename_index(entries))
        }

        other => Err(ConfigError::UnknownTilingScheme {
            name: dataset_name.to_string(),
            scheme: other.to_string(),
        }
        .into()),
    }
}

fn resolve(base_dir: &Path, path: &Path) -> std::path::PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Probe one raster per dataset at load time so format errors surface at
/// startup, never mid-request.
fn probe(dataset: &Dataset) -> anyhow::Result<()> {
    let sample_path = match &dataset.tile_index {
        TileIndex::SingleFile { path } => Some(path.clone()),
        TileIndex::UniformGrid { dir, .. } => first_raster_in_dir(dir),
        // manifest entries name an arbitrary number of files; probe the first one.
        TileIndex::FilenameIndex { entries } => entries.first().map(|(_, path)| path.clone()),
    };

    let Some(path) = sample_path else {
        return Ok(());
    };

    if !path.exists() {
        bail!("dataset '{}': sample raster {path:?} does not exist", dataset.name);
    }

    crate::raster::open(&path)
        .with_context(|| format!("dataset '{}': failed to open sample raster {path:?}", dataset.name))?;

    Ok(())
}

fn first_raster_in_dir(dir: &Path) -> Option<std::path::PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".tif") || name.ends_with(".tiff") || name.ends_with(".hgt") || name.ends_with(".hgt.gz") {
            return Some(path);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn rejects_duplicate_dataset_names() {
        let dir = tempfile::tempdir().unwrap();
        let toml = r#"
            [[datasets]]
            name = "dup"
            [datasets.tiling_scheme]
            type = "single_file"
            path = "/dev/null"

            [[datasets]]
            name = "dup"
            [datasets.tiling_scheme]
            type = "single_file"
            path = "/dev/null"
        "#;
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, toml).unwrap();

        let err = DatasetRegistry::load(&config_path).unwrap_err();
        assert!(err.to_string().contains("duplicate dataset") || err.to_string().contains("dup"));
    }

    #[test]
    fn rejects_unknown_tiling_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let toml = r#"
            [[datasets]]
            name = "bad"
            [datasets.tiling_scheme]
            type = "quadtree"
        "#;
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, toml).unwrap();

        assert!(DatasetRegistry::load(&config_path).is_err());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = DatasetRegistry::load(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
