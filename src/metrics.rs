//! Prometheus metrics exporter and the counters/gauges the query engine
//! and HTTP layer record against.

use axum::{Router, response::IntoResponse, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the process-wide Prometheus recorder. Must be called exactly
/// once, before any `metrics::counter!`/`gauge!`/`histogram!` call.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full(
                "elevation_query_duration_seconds".to_string(),
            ),
            &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5],
        )
        .expect("failed to set buckets for elevation_query_duration_seconds")
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

pub fn handle() -> &'static PrometheusHandle {
    METRICS_HANDLE.get_or_init(init_metrics)
}

/// Zero out the counters so they appear in `/metrics` scrapes even before
/// the first query, matching Prometheus's convention for known metrics.
pub fn initialize_query_metrics() {
    metrics::counter!("elevation_points_total").absolute(0);
    metrics::counter!("elevation_points_nodata_total").absolute(0);
    metrics::counter!("elevation_points_uncovered_total").absolute(0);
    metrics::counter!("elevation_points_invalid_total").absolute(0);
    metrics::counter!("elevation_raster_pool_hits_total").absolute(0);
    metrics::counter!("elevation_raster_pool_misses_total").absolute(0);
    metrics::gauge!("elevation_raster_pool_entries").set(0.0);
}

pub async fn metrics_handler() -> impl IntoResponse {
    handle().render()
}

pub fn router() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}
