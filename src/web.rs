//! Axum application: router assembly, shared state, and request logging.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::{
    Router,
    http::StatusCode,
    middleware::{self, Next},
    extract::Request,
    response::{IntoResponse, Response},
    routing::get,
};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::actions;
use crate::engine::RasterPool;
use crate::metrics;
use crate::registry::DatasetRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<DatasetRegistry>,
    pub pool: RasterPool,
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

// Request logging with a short correlation id, matching the convention used
// throughout the rest of the service's structured logs.
async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = Uuid::new_v4().to_string()[..8].to_string();
    let start = Instant::now();

    info!("Started {} {} [{}]", method, path, request_id);

    let response = next.run(request).await;
    let duration = start.elapsed();

    info!(
        "Completed {} {} [{}] {} in {:.2}ms",
        method,
        path,
        request_id,
        response.status().as_u16(),
        duration.as_secs_f64() * 1000.0
    );

    response
}

pub fn build_router(registry: Arc<DatasetRegistry>, pool: RasterPool) -> Router {
    let state = AppState { registry, pool };

    let api_router = Router::new()
        .route("/{dataset}", get(actions::elevation::get_elevations).post(actions::elevation::post_elevations))
        .with_state(state);

    Router::new()
        .nest("/v1", api_router)
        .route("/health", get(health))
        .merge(metrics::router())
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::new())
                .layer(middleware::from_fn(request_logging_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(std::time::Duration::from_secs(30)))
                .layer(CorsLayer::permissive()),
        )
}

pub async fn serve(interface: &str, port: u16, registry: Arc<DatasetRegistry>, pool: RasterPool) -> Result<()> {
    let app = build_router(registry, pool);
    let listener = tokio::net::TcpListener::bind(format!("{interface}:{port}")).await?;
    info!("listening on http://{interface}:{port}");
    axum::serve(listener, app).await?;
    Ok(())
}
