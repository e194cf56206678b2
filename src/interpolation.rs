//! Resampling kernels applied to a pixel-space fractional (row, col) against
//! a [`Window`] of samples already read from a raster.
//!
//! Every kernel treats the raster's NODATA sentinel as poisoning: if any
//! sample in the kernel's footprint is NODATA, the result is NODATA rather
//! than an interpolated blend with a sentinel value baked in.

use serde::{Deserialize, Serialize};

use crate::raster::Window;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kernel {
    Nearest,
    Bilinear,
    Cubic,
}

impl Default for Kernel {
    fn default() -> Self {
        Kernel::Bilinear
    }
}

impl Kernel {
    /// How many rows/cols of margin the kernel needs around the sample
    /// point in each direction, used by the engine to size the window it
    /// reads from the raster.
    pub fn footprint_radius(self) -> i64 {
        match self {
            Kernel::Nearest => 0,
            Kernel::Bilinear => 1,
            Kernel::Cubic => 2,
        }
    }

    /// Sample `window` at a fractional position local to the window itself
    /// (window index `(0, 0)` is row/col `0.0`). `window` must have been
    /// read with `footprint_radius()` rows/cols of margin on every side of
    /// the point being sampled — see [`sample`].
    fn apply(self, window: &Window, row_frac: f64, col_frac: f64, base_row: i64, base_col: i64, nodata: Option<f64>) -> Option<f64> {
        match self {
            Kernel::Nearest => nearest(window, row_frac, col_frac, base_row, base_col, nodata),
            Kernel::Bilinear => bilinear(window, row_frac, col_frac, base_row, base_col, nodata),
            Kernel::Cubic => cubic(window, row_frac, col_frac, base_row, base_col, nodata),
        }
    }
}

fn is_nodata(value: f64, nodata: Option<f64>) -> bool {
    // NaN only ever arises as the fill value for cells outside the raster
    // (when the dataset defines no NODATA sentinel of its own), and must be
    // treated as missing regardless.
    value.is_nan() || nodata.is_some_and(|n| value == n)
}

fn at(window: &Window, base_row: i64, base_col: i64, dr: i64, dc: i64) -> f64 {
    let row = (base_row + dr).clamp(0, window.nrows as i64 - 1) as usize;
    let col = (base_col + dc).clamp(0, window.ncols as i64 - 1) as usize;
    window.get(row, col)
}

fn nearest(
    window: &Window,
    row_frac: f64,
    col_frac: f64,
    base_row: i64,
    base_col: i64,
    nodata: Option<f64>,
) -> Option<f64> {
    // Round half to even on each axis independently.
    let dr = (base_row as f64 + row_frac).round_ties_even() as i64 - base_row;
    let dc = (base_col as f64 + col_frac).round_ties_even() as i64 - base_col;
    let value = at(window, base_row, base_col, dr, dc);
    if is_nodata(value, nodata) {
        None
    } else {
        Some(value)
    }
}

fn bilinear(
    window: &Window,
    row_frac: f64,
    col_frac: f64,
    base_row: i64,
    base_col: i64,
    nodata: Option<f64>,
) -> Option<f64> {
    let v00 = at(window, base_row, base_col, 0, 0);
    let v01 = at(window, base_row, base_col, 0, 1);
    let v10 = at(window, base_row, base_col, 1, 0);
    let v11 = at(window, base_row, base_col, 1, 1);

    if [v00, v01, v10, v11].iter().any(|v| is_nodata(*v, nodata)) {
        return None;
    }

    let top = v00 * (1.0 - col_frac) + v01 * col_frac;
    let bottom = v10 * (1.0 - col_frac) + v11 * col_frac;
    Some(top * (1.0 - row_frac) + bottom * row_frac)
}

/// Keys' cubic convolution kernel with a = -0.5, the value libraries like
/// GDAL default to for "cubic" resampling.
const CUBIC_A: f64 = -0.5;

fn cubic_weight(t: f64) -> f64 {
    let t = t.abs();
    if t <= 1.0 {
        (CUBIC_A + 2.0) * t.powi(3) - (CUBIC_A + 3.0) * t.powi(2) + 1.0
    } else if t < 2.0 {
        CUBIC_A * t.powi(3) - 5.0 * CUBIC_A * t.powi(2) + 8.0 * CUBIC_A * t - 4.0 * CUBIC_A
    } else {
        0.0
    }
}

fn cubic(
    window: &Window,
    row_frac: f64,
    col_frac: f64,
    base_row: i64,
    base_col: i64,
    nodata: Option<f64>,
) -> Option<f64> {
    let row_weights = [
        cubic_weight(1.0 + row_frac),
        cubic_weight(row_frac),
        cubic_weight(1.0 - row_frac),
        cubic_weight(2.0 - row_frac),
    ];
    let col_weights = [
        cubic_weight(1.0 + col_frac),
        cubic_weight(col_frac),
        cubic_weight(1.0 - col_frac),
        cubic_weight(2.0 - col_frac),
    ];

    let mut sum = 0.0;
    for (ri, &rw) in row_weights.iter().enumerate() {
        for (ci, &cw) in col_weights.iter().enumerate() {
            let dr = ri as i64 - 1;
            let dc = ci as i64 - 1;
            let value = at(window, base_row, base_col, dr, dc);
            if is_nodata(value, nodata) {
                return None;
            }
            sum += value * rw * cw;
        }
    }
    Some(sum)
}

/// Resample `window` at a fractional position local to the window's own
/// coordinate system: `(local_row, local_col) = (0.0, 0.0)` is the sample
/// at `window.get(0, 0)`. The caller is responsible for reading `window`
/// with `kernel.footprint_radius()` rows/cols of margin on every side of
/// the point, and for translating the point's raster-space pixel
/// coordinate into this window-local one before calling.
///
/// `nodata` is the raster's sentinel value; `None` means there is no
/// elevation at this point (either an out-of-bounds sample, which the
/// caller has already filled with the sentinel, or a genuine NODATA hit).
pub fn sample(
    kernel: Kernel,
    window: &Window,
    local_row: f64,
    local_col: f64,
    nodata: Option<f64>,
) -> Option<f64> {
    let base_row = local_row.floor() as i64;
    let base_col = local_col.floor() as i64;
    let row_frac = local_row - local_row.floor();
    let col_frac = local_col - local_col.floor();
    kernel.apply(window, row_frac, col_frac, base_row, base_col, nodata)
}
