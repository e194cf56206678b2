//! Error taxonomy for the elevation query engine.
//!
//! `anyhow` is used at the process boundary (config load, registry bring-up,
//! top-level command handlers) where an operator just needs a readable chain.
//! Inside the engine we use this closed enum so request handlers can match
//! exhaustively on a point's fate instead of string-matching.

use std::path::PathBuf;
use thiserror::Error;

/// Startup-fatal configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("dataset '{name}': unknown tiling scheme '{scheme}'")]
    UnknownTilingScheme { name: String, scheme: String },

    #[error("dataset '{name}': {reason}")]
    InvalidDataset { name: String, reason: String },

    #[error("duplicate dataset name: {0}")]
    DuplicateDataset(String),
}

/// Request-fatal or per-point failures raised while querying a dataset.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PointError {
    #[error("latitude {0} is out of range [-90, 90]")]
    InvalidPoint(f64),

    #[error("point is outside dataset coverage")]
    Uncovered,

    #[error("sample is NODATA")]
    NoData,
}

/// Whole-batch, request-fatal failures.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("raster I/O error reading {path}: {source}")]
    RasterIO {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}
