//! `GET /v1/{dataset}?locations=...&interpolation=...` and
//! `POST /v1/{dataset}` — the two external entry points into the query
//! engine, differing only in where the point list and kernel come from.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

use crate::engine::{self, PointResult};
use crate::error::QueryError;
use crate::interpolation::Kernel;
use crate::web::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
enum Status {
    Ok,
    Invalid,
    ServerError,
}

#[derive(Debug, Serialize)]
pub struct ResultItem {
    pub elevation: Option<f64>,
    pub location: (f64, f64),
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ElevationResponse {
    status: Status,
    results: Vec<ResultItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ElevationResponse {
    // A request-level problem (bad dataset name, malformed locations, an
    // unknown kernel) is still a successful HTTP exchange: the caller gets
    // back a well-formed response body describing what went wrong, not an
    // HTTP error status.
    fn invalid(message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            StatusCode::OK,
            Json(Self {
                status: Status::Invalid,
                results: Vec::new(),
                error: Some(message.into()),
            }),
        )
    }

    fn server_error(message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(Self {
                status: Status::ServerError,
                results: Vec::new(),
                error: Some(message.into()),
            }),
        )
    }

    fn ok(results: Vec<ResultItem>) -> (StatusCode, Json<Self>) {
        (
            StatusCode::OK,
            Json(Self {
                status: Status::Ok,
                results,
                error: None,
            }),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct ElevationQuery {
    locations: String,
    interpolation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ElevationBody {
    locations: Vec<(f64, f64)>,
    #[serde(default)]
    interpolation: Option<String>,
}

fn parse_kernel(name: &str) -> Result<Kernel, String> {
    match name.to_ascii_lowercase().as_str() {
        "nearest" => Ok(Kernel::Nearest),
        "bilinear" => Ok(Kernel::Bilinear),
        "cubic" => Ok(Kernel::Cubic),
        other => Err(format!("unknown interpolation kernel '{other}'")),
    }
}

fn parse_locations(raw: &str) -> Result<Vec<(f64, f64)>, String> {
    raw.split('|')
        .map(|pair| {
            let mut parts = pair.splitn(2, ',');
            let lat = parts.next().ok_or_else(|| format!("malformed location '{pair}'"))?;
            let lng = parts.next().ok_or_else(|| format!("malformed location '{pair}'"))?;
            let lat: f64 = lat
                .trim()
                .parse()
                .map_err(|_| format!("malformed location '{pair}'"))?;
            let lng: f64 = lng
                .trim()
                .parse()
                .map_err(|_| format!("malformed location '{pair}'"))?;
            Ok((lat, lng))
        })
        .collect()
}

pub async fn get_elevations(
    State(state): State<AppState>,
    Path(dataset): Path<String>,
    Query(query): Query<ElevationQuery>,
) -> (StatusCode, Json<ElevationResponse>) {
    let points = match parse_locations(&query.locations) {
        Ok(points) => points,
        Err(message) => return ElevationResponse::invalid(message),
    };
    let kernel = match query.interpolation.as_deref().map(parse_kernel).transpose() {
        Ok(kernel) => kernel,
        Err(message) => return ElevationResponse::invalid(message),
    };
    run_query(state, &dataset, points, kernel).await
}

pub async fn post_elevations(
    State(state): State<AppState>,
    Path(dataset): Path<String>,
    Json(body): Json<ElevationBody>,
) -> (StatusCode, Json<ElevationResponse>) {
    let kernel = match body.interpolation.as_deref().map(parse_kernel).transpose() {
        Ok(kernel) => kernel,
        Err(message) => return ElevationResponse::invalid(message),
    };
    run_query(state, &dataset, body.locations, kernel).await
}

async fn run_query(
    state: AppState,
    dataset_name: &str,
    points: Vec<(f64, f64)>,
    kernel: Option<Kernel>,
) -> (StatusCode, Json<ElevationResponse>) {
    let Some(dataset) = state.registry.get(dataset_name) else {
        return ElevationResponse::invalid(
            QueryError::DatasetNotFound(dataset_name.to_string()).to_string(),
        );
    };

    // Raster I/O is blocking (std::fs-based); keep it off the async
    // runtime's worker thread so one slow tile read doesn't stall every
    // other in-flight request.
    let pool = state.pool.clone();
    let outcome = tokio::task::spawn_blocking(move || engine::query(&dataset, &pool, &points, kernel)).await;

    match outcome {
        Ok(Ok(rows)) => {
            let results = rows
                .into_iter()
                .map(|(point, outcome)| match outcome {
                    PointResult::Elevation(value) => ResultItem {
                        elevation: Some(value),
                        location: (point.lat, point.lng),
                        error: None,
                    },
                    PointResult::Null => ResultItem {
                        elevation: None,
                        location: (point.lat, point.lng),
                        error: None,
                    },
                    PointResult::Error(err) => ResultItem {
                        elevation: None,
                        location: (point.lat, point.lng),
                        error: Some(err.to_string()),
                    },
                })
                .collect();
            ElevationResponse::ok(results)
        }
        Ok(Err(source)) => ElevationResponse::server_error(source.to_string()),
        Err(join_err) => ElevationResponse::server_error(format!("query task panicked: {join_err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pipe_separated_locations() {
        let points = parse_locations("56.35,123.90|34.5,-117.5").unwrap();
        assert_eq!(points, vec![(56.35, 123.90), (34.5, -117.5)]);
    }

    #[test]
    fn rejects_malformed_location() {
        assert!(parse_locations("56.35").is_err());
        assert!(parse_locations("abc,123").is_err());
    }

    #[test]
    fn parses_known_kernels_case_insensitively() {
        assert_eq!(parse_kernel("NEAREST"), Ok(Kernel::Nearest));
        assert_eq!(parse_kernel("bilinear"), Ok(Kernel::Bilinear));
        assert_eq!(parse_kernel("Cubic"), Ok(Kernel::Cubic));
        assert!(parse_kernel("lanczos").is_err());
    }
}
