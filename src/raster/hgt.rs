//! Raw SRTM `.hgt` reader: 1201x1201 (3 arc-second) or 3601x3601
//! (1 arc-second) grids of big-endian signed 16-bit samples, NODATA = -32768.
//!
//! `.hgt` carries no georeferencing of its own; the southwest corner is
//! encoded in the filename (`N34W118.hgt`), which is how the uniform-grid
//! tiling scheme names its tiles in the first place. Files are commonly
//! shipped gzip-compressed (`.hgt.gz`); we decompress transparently and
//! keep the whole tile resident, since unlike GeoTIFF there is no
//! structural way to seek to a sub-region without first reading the block
//! size anyway — we compute the byte offset directly instead.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use flate2::read::GzDecoder;

use super::{ClippedWindow, GeoReference, RasterReader, SampleType, Window, clip_window};

pub const HGT_NODATA: i16 = -32768;

pub struct HgtReader {
    buffer: Vec<u8>,
    geo: GeoReference,
    size: u32,
    path: PathBuf,
}

impl HgtReader {
    pub fn open(path: &Path) -> Result<Self> {
        let (sw_lat, sw_lng) = parse_sw_corner(path)?;

        let raw = fs::read(path)?;
        let buffer = if path
            .to_string_lossy()
            .to_ascii_lowercase()
            .ends_with(".gz")
        {
            let mut decoder = GzDecoder::new(&raw[..]);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out)?;
            out
        } else {
            raw
        };

        let size = match buffer.len() {
            25_934_402 => 3601u32, // 1 arc-second: 3601 * 3601 * 2 bytes
            2_884_802 => 1201u32,  // 3 arc-second: 1201 * 1201 * 2 bytes
            n => bail!(
                "unrecognized HGT tile size for {path:?}: {n} bytes (expected 1 or 3 arc-second grid)"
            ),
        };

        let cells = size - 1;
        let geo = GeoReference {
            origin_lng: sw_lng,
            origin_lat: sw_lat + 1.0,
            pixel_width: 1.0 / cells as f64,
            pixel_height: -1.0 / cells as f64,
            width: size,
            height: size,
            nodata: Some(HGT_NODATA as f64),
        };

        Ok(Self {
            buffer,
            geo,
            size,
            path: path.to_path_buf(),
        })
    }

    fn sample_at(&self, row: u32, col: u32) -> i16 {
        let offset = (row as usize * self.size as usize + col as usize) * 2;
        i16::from_be_bytes([self.buffer[offset], self.buffer[offset + 1]])
    }
}

impl RasterReader for HgtReader {
    fn metadata(&self) -> &GeoReference {
        &self.geo
    }

    fn sample_type(&self) -> SampleType {
        SampleType::I16
    }

    fn read_window(
        &self,
        row0: i64,
        col0: i64,
        nrows: usize,
        ncols: usize,
        fill_value: f64,
    ) -> Result<Window> {
        let mut samples = vec![fill_value; nrows * ncols];

        if let Some(ClippedWindow {
            raster_row0,
            raster_col0,
            window_row0,
            window_col0,
            nrows: clipped_rows,
            ncols: clipped_cols,
        }) = clip_window(row0, col0, nrows, ncols, self.geo.width, self.geo.height)
        {
            for r in 0..clipped_rows {
                for c in 0..clipped_cols {
                    let value = self.sample_at(raster_row0 + r as u32, raster_col0 + c as u32);
                    let dest_row = window_row0 + r;
                    let dest_col = window_col0 + c;
                    samples[dest_row * ncols + dest_col] = value as f64;
                }
            }
        }

        Ok(Window {
            nrows,
            ncols,
            samples,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse the southwest corner encoded in an SRTM-style filename, e.g.
/// `N34W118.hgt` or `S12E045.hgt.gz` (case-insensitive).
pub fn parse_sw_corner(path: &Path) -> Result<(f64, f64)> {
    let stem = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    let upper = stem.to_ascii_uppercase();
    let bytes = upper.as_bytes();

    let lat_sign_idx = bytes.iter().position(|&b| b == b'N' || b == b'S');
    let Some(lat_idx) = lat_sign_idx else {
        bail!("cannot parse SW corner from HGT filename: {stem}");
    };

    let lat_sign = if bytes[lat_idx] == b'S' { -1.0 } else { 1.0 };
    let rest = &upper[lat_idx + 1..];

    let lon_sign_idx = rest
        .find(['E', 'W'])
        .ok_or_else(|| anyhow::anyhow!("cannot parse SW corner from HGT filename: {stem}"))?;

    let lat_digits = &rest[..lon_sign_idx];
    let lat: f64 = lat_digits
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid latitude in HGT filename: {stem}"))?;

    let lon_sign = if rest.as_bytes()[lon_sign_idx] == b'W' {
        -1.0
    } else {
        1.0
    };
    let lon_rest = &rest[lon_sign_idx + 1..];
    let lon_digits: String = lon_rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let lng: f64 = lon_digits
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid longitude in HGT filename: {stem}"))?;

    Ok((lat_sign * lat, lon_sign * lng))
}

/// Build the canonical `.hgt.gz` filename for a tile whose southwest
/// corner is at the given integer-degree lat/lng, matching the layout the
/// uniform-grid tile index expects: `N45E009.hgt.gz`.
pub fn tile_filename(sw_lat: i32, sw_lng: i32) -> String {
    let lat_prefix = if sw_lat < 0 { "S" } else { "N" };
    let lng_prefix = if sw_lng < 0 { "W" } else { "E" };
    format!(
        "{}{:02}{}{:03}.hgt.gz",
        lat_prefix,
        sw_lat.abs(),
        lng_prefix,
        sw_lng.abs()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_hgt(dir: &Path, name: &str, size: usize, fill: i16) -> PathBuf {
        let path = dir.join(name);
        let mut buf = Vec::with_capacity(size * size * 2);
        for _ in 0..(size * size) {
            buf.extend_from_slice(&fill.to_be_bytes());
        }
        fs::write(&path, &buf).unwrap();
        path
    }

    fn write_hgt_gz(dir: &Path, name: &str, size: usize, fill: i16) -> PathBuf {
        let path = dir.join(name);
        let mut buf = Vec::with_capacity(size * size * 2);
        for _ in 0..(size * size) {
            buf.extend_from_slice(&fill.to_be_bytes());
        }
        let file = fs::File::create(&path).unwrap();
        let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::fast());
        encoder.write_all(&buf).unwrap();
        encoder.finish().unwrap();
        path
    }

    #[test]
    fn parses_sw_corner_variants() {
        assert_eq!(
            parse_sw_corner(Path::new("N34W118.hgt")).unwrap(),
            (34.0, -118.0)
        );
        assert_eq!(
            parse_sw_corner(Path::new("S12E045.hgt.gz")).unwrap(),
            (-12.0, 45.0)
        );
        assert_eq!(
            parse_sw_corner(Path::new("N00E000.hgt")).unwrap(),
            (0.0, 0.0)
        );
    }

    #[test]
    fn tile_filename_matches_convention() {
        assert_eq!(tile_filename(34, -118), "N34W118.hgt.gz");
        assert_eq!(tile_filename(-12, 45), "S12E045.hgt.gz");
        assert_eq!(tile_filename(0, 0), "N00E000.hgt.gz");
    }

    #[test]
    fn reads_raw_and_gzipped_tiles_identically() {
        let dir = tempfile::tempdir().unwrap();
        let raw_path = write_hgt(dir.path(), "N34W118.hgt", 1201, 500);
        let gz_path = write_hgt_gz(dir.path(), "N34W118.hgt.gz", 1201, 500);

        let raw = HgtReader::open(&raw_path).unwrap();
        let gz = HgtReader::open(&gz_path).unwrap();

        let raw_window = raw.read_window(0, 0, 2, 2, -32768.0).unwrap();
        let gz_window = gz.read_window(0, 0, 2, 2, -32768.0).unwrap();
        assert_eq!(raw_window.samples, gz_window.samples);
        assert_eq!(raw_window.samples, vec![500.0; 4]);
    }

    #[test]
    fn out_of_bounds_window_is_filled() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_hgt(dir.path(), "N00E000.hgt", 1201, 10);
        let reader = HgtReader::open(&path).unwrap();

        let window = reader.read_window(-1, -1, 3, 3, -1.0).unwrap();
        assert_eq!(window.nrows, 3);
        assert_eq!(window.ncols, 3);
        // top-left corner is out of bounds -> fill value
        assert_eq!(window.get(0, 0), -1.0);
        // bottom-right of the 3x3 maps to raster (1,1) which is in bounds
        assert_eq!(window.get(2, 2), 10.0);
    }
}
