use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use crate::registry::DatasetRegistry;

/// Load the dataset registry and exit, without starting the HTTP server.
/// Intended for deploy pipelines that want config errors caught before a
/// rollout, not at the first incoming request.
pub fn handle_validate(config_path: PathBuf) -> Result<()> {
    let registry = DatasetRegistry::load(&config_path)?;
    info!(
        "config at {config_path:?} is valid: {} dataset(s) registered",
        registry.len()
    );
    Ok(())
}
