//! Raster reader: open a single raster file, report its georeferencing, and
//! read rectangular pixel windows, clipped and filled so callers never have
//! to special-case tile edges.

mod geotiff;
pub mod hgt;

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result, bail};

pub use geotiff::GeoTiffReader;
pub use hgt::HgtReader;

/// The affine transform from pixel (row, col) to geographic (lat, lng),
/// plus the raster's shape and NODATA sentinel.
///
/// `pixel_height` is signed and carries the sign convention of the file: a
/// raster where row 0 is the northmost row (the overwhelming common case)
/// has a negative `pixel_height`. Readers must honor whatever the file
/// says rather than assume north-up.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoReference {
    /// Longitude of the west edge of pixel (0, 0).
    pub origin_lng: f64,
    /// Latitude of the north edge of pixel (0, 0).
    pub origin_lat: f64,
    /// Degrees per pixel, positive eastward.
    pub pixel_width: f64,
    /// Degrees per pixel row; negative when row 0 is the northmost row.
    pub pixel_height: f64,
    pub width: u32,
    pub height: u32,
    pub nodata: Option<f64>,
}

impl GeoReference {
    /// Geographic (lat, lng) to fractional pixel (row, col).
    pub fn geo_to_pixel(&self, lat: f64, lng: f64) -> (f64, f64) {
        let col = (lng - self.origin_lng) / self.pixel_width;
        let row = (lat - self.origin_lat) / self.pixel_height;
        (row, col)
    }

    /// Southwest corner of the raster's coverage, used by the filename
    /// tile index and by the uniform-grid scheme's tie-break rule.
    pub fn southwest(&self) -> (f64, f64) {
        let lat_extent = self.pixel_height * self.height as f64;
        let lng_extent = self.pixel_width * self.width as f64;
        let sw_lat = if self.pixel_height < 0.0 {
            self.origin_lat + lat_extent
        } else {
            self.origin_lat
        };
        let sw_lng = if self.pixel_width < 0.0 {
            self.origin_lng + lng_extent
        } else {
            self.origin_lng
        };
        (sw_lat, sw_lng)
    }
}

/// Sample data type: signed or unsigned integer of 16 or 32 bits, or
/// 32-bit float.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    I16,
    U16,
    I32,
    U32,
    F32,
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SampleType::I16 => "i16",
            SampleType::U16 => "u16",
            SampleType::I32 => "i32",
            SampleType::U32 => "u32",
            SampleType::F32 => "f32",
        };
        write!(f, "{s}")
    }
}

/// A rectangular window of decoded samples, widened to 64-bit float so the
/// interpolator never has to care about the source sample type.
///
/// `read_window` always returns a window of exactly the requested shape:
/// rows/cols that fall outside the raster are filled with `fill_value`
/// (the raster's NODATA sentinel, or a caller-supplied fallback when none
/// is defined).
#[derive(Debug, Clone)]
pub struct Window {
    pub nrows: usize,
    pub ncols: usize,
    pub samples: Vec<f64>,
}

impl Window {
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.samples[row * self.ncols + col]
    }
}

/// A single open raster file.
pub trait RasterReader: Send + Sync {
    fn metadata(&self) -> &GeoReference;

    fn sample_type(&self) -> SampleType;

    /// Read a window of `nrows` x `ncols` samples anchored at pixel
    /// `(row0, col0)`. The window may extend partially or fully outside
    /// the raster; out-of-bounds cells are filled with `fill_value`.
    fn read_window(
        &self,
        row0: i64,
        col0: i64,
        nrows: usize,
        ncols: usize,
        fill_value: f64,
    ) -> Result<Window>;

    fn path(&self) -> &Path;
}

/// Open a raster file, dispatching on extension. GeoTIFF (`.tif`/`.tiff`)
/// and raw/gzipped HGT (`.hgt`/`.hgt.gz`) are supported; anything else
/// fails at dataset-load time, where this function is first called to
/// probe each dataset (it is never called mid-request after that).
pub fn open(path: &Path) -> Result<Box<dyn RasterReader>> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if name.ends_with(".tif") || name.ends_with(".tiff") {
        return Ok(Box::new(
            GeoTiffReader::open(path).with_context(|| format!("opening GeoTIFF {path:?}"))?,
        ));
    }
    if name.ends_with(".hgt") || name.ends_with(".hgt.gz") {
        return Ok(Box::new(
            HgtReader::open(path).with_context(|| format!("opening HGT tile {path:?}"))?,
        ));
    }

    bail!(
        "unsupported raster format for {path:?}: expected .tif/.tiff or .hgt/.hgt.gz"
    )
}

/// Clip `[row0, row0+nrows)` x `[col0, col0+ncols)` against `[0, height) x
/// [0, width)`, returning the in-bounds sub-rectangle (in both raster and
/// window-local coordinates), or `None` if the window doesn't intersect
/// the raster at all.
pub(crate) fn clip_window(
    row0: i64,
    col0: i64,
    nrows: usize,
    ncols: usize,
    width: u32,
    height: u32,
) -> Option<ClippedWindow> {
    let row_end = row0 + nrows as i64;
    let col_end = col0 + ncols as i64;

    let clipped_row0 = row0.max(0);
    let clipped_col0 = col0.max(0);
    let clipped_row_end = row_end.min(height as i64);
    let clipped_col_end = col_end.min(width as i64);

    if clipped_row0 >= clipped_row_end || clipped_col0 >= clipped_col_end {
        return None;
    }

    Some(ClippedWindow {
        raster_row0: clipped_row0 as u32,
        raster_col0: clipped_col0 as u32,
        window_row0: (clipped_row0 - row0) as usize,
        window_col0: (clipped_col0 - col0) as usize,
        nrows: (clipped_row_end - clipped_row0) as usize,
        ncols: (clipped_col_end - clipped_col0) as usize,
    })
}

pub(crate) struct ClippedWindow {
    pub raster_row0: u32,
    pub raster_col0: u32,
    pub window_row0: usize,
    pub window_col0: usize,
    pub nrows: usize,
    pub ncols: usize,
}
