//! Orchestrates a batch elevation query against a single dataset: resolve
//! tiles, group points per tile to amortize file opens, read one window per
//! group, interpolate, and scatter results back into input order.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use moka::sync::Cache;

use crate::dataset::{Dataset, NodataPolicy};
use crate::error::{PointError, QueryError};
use crate::interpolation::{self, Kernel};
use crate::point::Point;
use crate::raster::{self, RasterReader};

/// The outcome for a single point in a batch query.
#[derive(Debug, Clone, PartialEq)]
pub enum PointResult {
    Elevation(f64),
    Null,
    Error(PointError),
}

/// A bounded LRU of open raster handles, shared across queries against the
/// same registry. Evictions simply drop the handle; closing happens via
/// `Drop` on the underlying file.
#[derive(Clone)]
pub struct RasterPool {
    handles: Cache<PathBuf, Arc<dyn RasterReader>>,
}

impl RasterPool {
    pub fn new(capacity: u64) -> Self {
        Self {
            handles: Cache::builder().max_capacity(capacity).build(),
        }
    }

    fn open(&self, path: &PathBuf) -> anyhow::Result<Arc<dyn RasterReader>> {
        if let Some(handle) = self.handles.get(path) {
            metrics::counter!("elevation_raster_pool_hits_total").increment(1);
            return Ok(handle);
        }
        metrics::counter!("elevation_raster_pool_misses_total").increment(1);
        let handle: Arc<dyn RasterReader> = Arc::from(raster::open(path)?);
        self.handles.insert(path.clone(), handle.clone());
        metrics::gauge!("elevation_raster_pool_entries").set(self.handles.entry_count() as f64);
        Ok(handle)
    }
}

impl Default for RasterPool {
    fn default() -> Self {
        // a small, bounded file-handle budget shared across datasets
        Self::new(64)
    }
}

/// If the union of a tile group's per-point kernel footprints covers more
/// than this fraction of the tile's total pixel area, fall back to reading
/// one small window per point instead of a single large bounding window.
const BOUNDING_WINDOW_AREA_THRESHOLD: f64 = 0.5;

pub fn query(
    dataset: &Dataset,
    pool: &RasterPool,
    points: &[(f64, f64)],
    kernel_override: Option<Kernel>,
) -> anyhow::Result<Vec<(Point, PointResult)>> {
    let kernel = kernel_override.unwrap_or(dataset.default_kernel);
    let start = Instant::now();

    // received -> validated (per point; invalid points are rejected but
    // never abort the batch) and located (tile resolution).
    let mut resolved: Vec<Option<(Point, PathBuf)>> = Vec::with_capacity(points.len());
    let mut results: Vec<Option<(Point, PointResult)>> = vec![None; points.len()];

    metrics::counter!("elevation_points_total").increment(points.len() as u64);

    for (i, &(lat, lng)) in points.iter().enumerate() {
        match Point::new(lat, lng) {
            Ok(point) => match dataset.tile_index.locate(point.lat, point.lng) {
                Some(path) => resolved.push(Some((point, path))),
                None => {
                    resolved.push(None);
                    metrics::counter!("elevation_points_uncovered_total").increment(1);
                    let outcome = emit(dataset.nodata_policy, PointError::Uncovered);
                    results[i] = Some((point, outcome));
                }
            },
            Err(err) => {
                resolved.push(None);
                metrics::counter!("elevation_points_invalid_total").increment(1);
                // InvalidPoint is surfaced directly as a per-point error
                // regardless of NODATA policy — it isn't a data-availability
                // question, it's a malformed request.
                let point = Point { lat, lng };
                results[i] = Some((point, PointResult::Error(err)));
            }
        }
    }

    // grouped: bucket the surviving indices by resolved tile path.
    let mut groups: HashMap<PathBuf, Vec<usize>> = HashMap::new();
    for (i, entry) in resolved.iter().enumerate() {
        if let Some((_, path)) = entry {
            groups.entry(path.clone()).or_default().push(i);
        }
    }

    for (path, indices) in groups {
        let reader = pool
            .open(&path)
            .map_err(|source| QueryError::RasterIO { path: path.clone(), source })?;

        process_group(dataset, reader.as_ref(), kernel, &resolved, &indices, &mut results)?;
    }

    let mut ordered = Vec::with_capacity(points.len());
    for (i, &(lat, lng)) in points.iter().enumerate() {
        let (point, outcome) = results[i]
            .take()
            .unwrap_or_else(|| (Point { lat, lng }, PointResult::Error(PointError::Uncovered)));
        ordered.push((point, outcome));
    }
    metrics::histogram!("elevation_query_duration_seconds").record(start.elapsed().as_secs_f64());
    Ok(ordered)
}

fn emit(policy: NodataPolicy, error: PointError) -> PointResult {
    match policy {
        NodataPolicy::Permissive => PointResult::Null,
        NodataPolicy::Strict => PointResult::Error(error),
    }
}

#[allow(clippy::too_many_arguments)]
fn process_group(
    dataset: &Dataset,
    reader: &dyn RasterReader,
    kernel: Kernel,
    resolved: &[Option<(Point, PathBuf)>],
    indices: &[usize],
    results: &mut [Option<(Point, PointResult)>],
) -> anyhow::Result<()> {
    let geo = reader.metadata();
    let margin = kernel.footprint_radius();
    let fill = geo.nodata.unwrap_or(f64::NAN);

    // sampled: compute each point's fractional pixel coordinate up front.
    let pixel_coords: Vec<(usize, f64, f64)> = indices
        .iter()
        .map(|&i| {
            let (point, _) = resolved[i].as_ref().unwrap();
            let (row, col) = geo.geo_to_pixel(point.lat, point.lng);
            (i, row, col)
        })
        .collect();

    let min_row = pixel_coords
        .iter()
        .map(|&(_, r, _)| r.floor() as i64 - margin)
        .min()
        .unwrap();
    let max_row = pixel_coords
        .iter()
        .map(|&(_, r, _)| r.floor() as i64 + margin + 1)
        .max()
        .unwrap();
    let min_col = pixel_coords
        .iter()
        .map(|&(_, _, c)| c.floor() as i64 - margin)
        .min()
        .unwrap();
    let max_col = pixel_coords
        .iter()
        .map(|&(_, _, c)| c.floor() as i64 + margin + 1)
        .max()
        .unwrap();

    let bounding_rows = (max_row - min_row).max(0) as u64;
    let bounding_cols = (max_col - min_col).max(0) as u64;
    let bounding_area = bounding_rows * bounding_cols;
    let tile_area = geo.width as u64 * geo.height as u64;

    let use_single_window = pixel_coords.len() > 1
        && tile_area > 0
        && (bounding_area as f64) <= BOUNDING_WINDOW_AREA_THRESHOLD * tile_area as f64;

    if use_single_window {
        let window = reader
            .read_window(
                min_row,
                min_col,
                bounding_rows as usize,
                bounding_cols as usize,
                fill,
            )
            .map_err(|source| QueryError::RasterIO {
                path: reader.path().to_path_buf(),
                source,
            })?;

        for (i, row, col) in pixel_coords {
            let local_row = row - min_row as f64;
            let local_col = col - min_col as f64;
            let value = interpolation::sample(kernel, &window, local_row, local_col, geo.nodata);
            let (point, _) = resolved[i].as_ref().unwrap();
            results[i] = Some((
                *point,
                outcome_for(dataset, value),
            ));
        }
    } else {
        for (i, row, col) in pixel_coords {
            let base_row = row.floor() as i64 - margin;
            let base_col = col.floor() as i64 - margin;
            let side = margin * 2 + 2;
            let window = reader
                .read_window(base_row, base_col, side as usize, side as usize, fill)
                .map_err(|source| QueryError::RasterIO {
                    path: reader.path().to_path_buf(),
                    source,
                })?;

            let local_row = row - base_row as f64;
            let local_col = col - base_col as f64;
            let value = interpolation::sample(kernel, &window, local_row, local_col, geo.nodata);
            let (point, _) = resolved[i].as_ref().unwrap();
            results[i] = Some((*point, outcome_for(dataset, value)));
        }
    }

    Ok(())
}

fn outcome_for(dataset: &Dataset, value: Option<f64>) -> PointResult {
    match value {
        Some(v) => PointResult::Elevation(dataset.round_output(v)),
        None => {
            metrics::counter!("elevation_points_nodata_total").increment(1);
            emit(dataset.nodata_policy, PointError::NoData)
        }
    }
}
