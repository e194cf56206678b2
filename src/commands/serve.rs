use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::engine::RasterPool;
use crate::registry::DatasetRegistry;
use crate::web;

pub async fn handle_serve(config_path: PathBuf, interface: String, port: u16, pool_capacity: u64) -> Result<()> {
    info!("loading dataset registry from {config_path:?}");
    let registry = Arc::new(DatasetRegistry::load(&config_path)?);
    info!("{} dataset(s) registered", registry.len());

    // install the recorder before any counter/gauge/histogram call, or
    // those calls hit the metrics crate's default no-op recorder.
    crate::metrics::handle();
    crate::metrics::initialize_query_metrics();
    let pool = RasterPool::new(pool_capacity);

    web::serve(&interface, port, registry, pool).await
}
