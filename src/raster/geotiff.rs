//! GeoTIFF reader: tiled or stripped, 16/32-bit int or
//! 32-bit float samples, optional deflate/LZW compression. Only the chunks
//! (tiles or strips) that intersect a requested window are decoded — never
//! the whole file.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow, bail};
use tiff::ColorType;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

use super::{ClippedWindow, GeoReference, RasterReader, SampleType, Window, clip_window};

/// GDAL writes the NODATA value as an ASCII string under this private tag.
const GDAL_NODATA_TAG: u16 = 42113;

pub struct GeoTiffReader {
    decoder: Mutex<Decoder<BufReader<File>>>,
    geo: GeoReference,
    sample_type: SampleType,
    chunk_width: u32,
    chunk_height: u32,
    chunks_across: u32,
    path: PathBuf,
}

impl GeoTiffReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut decoder = Decoder::new(BufReader::new(file))
            .with_context(|| format!("reading TIFF header of {path:?}"))?;

        let (width, height) = decoder.dimensions()?;
        let sample_type = read_sample_type(&mut decoder)?;
        let nodata = read_nodata(&mut decoder);
        let (origin_lng, origin_lat, pixel_width, pixel_height) =
            read_georeference(&mut decoder, width, height)?;

        let (chunk_width, chunk_height) = decoder.chunk_dimensions();
        let chunks_across = width.div_ceil(chunk_width);

        let geo = GeoReference {
            origin_lng,
            origin_lat,
            pixel_width,
            pixel_height,
            width,
            height,
            nodata,
        };

        Ok(Self {
            decoder: Mutex::new(decoder),
            geo,
            sample_type,
            chunk_width,
            chunk_height,
            chunks_across,
            path: path.to_path_buf(),
        })
    }

    fn chunk_index(&self, chunk_row: u32, chunk_col: u32) -> u32 {
        chunk_row * self.chunks_across + chunk_col
    }
}

impl RasterReader for GeoTiffReader {
    fn metadata(&self) -> &GeoReference {
        &self.geo
    }

    fn sample_type(&self) -> SampleType {
        self.sample_type
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

        let Some(ClippedWindow {
            raster_row0,
            raster_col0,
            window_row0,
            window_col0,
            nrows: clipped_rows,
            ncols: clipped_cols,
        }) = clip_window(row0, col0, nrows, ncols, self.geo.width, self.geo.height)
        else {
            return Ok(Window {
                nrows,
                ncols,
                samples,
            });
        };

        let raster_row_end = raster_row0 + clipped_rows as u32;
        let raster_col_end = raster_col0 + clipped_cols as u32;

        let chunk_row_start = raster_row0 / self.chunk_height;
        let chunk_row_end = (raster_row_end - 1) / self.chunk_height;
        let chunk_col_start = raster_col0 / self.chunk_width;
        let chunk_col_end = (raster_col_end - 1) / self.chunk_width;

        let mut decoder = self
            .decoder
            .lock()
            .map_err(|_| anyhow!("GeoTIFF decoder mutex poisoned for {:?}", self.path))?;

        for chunk_row in chunk_row_start..=chunk_row_end {
            for chunk_col in chunk_col_start..=chunk_col_end {
                let index = self.chunk_index(chunk_row, chunk_col);
                let (valid_w, valid_h) = decoder.chunk_data_dimensions(index);
                let decoded = decoder
                    .read_chunk(index)
                    .with_context(|| format!("reading chunk {index} of {:?}", self.path))?;

                let chunk_origin_row = chunk_row * self.chunk_height;
                let chunk_origin_col = chunk_col * self.chunk_width;

                // Intersection of this chunk's valid pixels with the clipped window.
                let overlap_row0 = raster_row0.max(chunk_origin_row);
                let overlap_col0 = raster_col0.max(chunk_origin_col);
                let overlap_row_end = raster_row_end.min(chunk_origin_row + valid_h);
                let overlap_col_end = raster_col_end.min(chunk_origin_col + valid_w);

                if overlap_row0 >= overlap_row_end || overlap_col0 >= overlap_col_end {
                    continue;
                }

                for r in overlap_row0..overlap_row_end {
                    let chunk_local_row = (r - chunk_origin_row) as usize;
                    for c in overlap_col0..overlap_col_end {
                        let chunk_local_col = (c - chunk_origin_col) as usize;
                        let chunk_idx = chunk_local_row * valid_w as usize + chunk_local_col;
                        let value = decoding_result_at(&decoded, chunk_idx)?;

                        let dest_row = window_row0 + (r - raster_row0) as usize;
                        let dest_col = window_col0 + (c - raster_col0) as usize;
                        samples[dest_row * ncols + dest_col] = value;
                    }
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

fn decoding_result_at(result: &DecodingResult, idx: usize) -> Result<f64> {
    let value = match result {
        DecodingResult::U8(v) => v[idx] as f64,
        DecodingResult::U16(v) => v[idx] as f64,
        DecodingResult::U32(v) => v[idx] as f64,
        DecodingResult::U64(v) => v[idx] as f64,
        DecodingResult::I8(v) => v[idx] as f64,
        DecodingResult::I16(v) => v[idx] as f64,
        DecodingResult::I32(v) => v[idx] as f64,
        DecodingResult::I64(v) => v[idx] as f64,
        DecodingResult::F32(v) => v[idx] as f64,
        DecodingResult::F64(v) => v[idx],
    };
    Ok(value)
}

fn read_sample_type(decoder: &mut Decoder<BufReader<File>>) -> Result<SampleType> {
    let bits = decoder.get_tag_u32(Tag::BitsPerSample).unwrap_or(16);
    // SampleFormat: 1 = unsigned int, 2 = signed int, 3 = IEEE float.
    let format = decoder.get_tag_u32(Tag::Unknown(339)).unwrap_or(1);

    match (format, bits) {
        (3, 32) => Ok(SampleType::F32),
        (2, 16) => Ok(SampleType::I16),
        (2, 32) => Ok(SampleType::I32),
        (1, 16) => Ok(SampleType::U16),
        (1, 32) => Ok(SampleType::U32),
        _ => match decoder.colortype()? {
            ColorType::Gray(16) => Ok(SampleType::U16),
            ColorType::Gray(32) => Ok(SampleType::U32),
            other => bail!("unsupported GeoTIFF sample format: {other:?} ({bits}-bit)"),
        },
    }
}

fn read_nodata(decoder: &mut Decoder<BufReader<File>>) -> Option<f64> {
    decoder
        .get_tag_ascii_string(Tag::Unknown(GDAL_NODATA_TAG))
        .ok()
        .and_then(|s| s.trim().parse::<f64>().ok())
}

/// Derive the origin (northwest corner) and pixel size from the
/// `ModelPixelScaleTag`/`ModelTiepointTag` pair (the common case) or the
/// full `ModelTransformationTag` (rare, but spec requires honoring
/// whatever the file actually says rather than assuming north-up).
fn read_georeference(
    decoder: &mut Decoder<BufReader<File>>,
    width: u32,
    height: u32,
) -> Result<(f64, f64, f64, f64)> {
    if let Ok(transform) = decoder.get_tag_f64_vec(Tag::ModelTransformationTag) {
        if transform.len() >= 8 {
            let pixel_width = transform[0];
            let pixel_height = transform[5];
            let origin_lng = transform[3];
            let origin_lat = transform[7];
            return Ok((origin_lng, origin_lat, pixel_width, pixel_height));
        }
    }

    let scale = decoder
        .get_tag_f64_vec(Tag::ModelPixelScaleTag)
        .context("GeoTIFF is missing ModelPixelScaleTag")?;
    if scale.len() < 2 {
        bail!("ModelPixelScaleTag must have at least 2 values");
    }

    let tiepoint = decoder
        .get_tag_f64_vec(Tag::ModelTiepointTag)
        .context("GeoTIFF is missing ModelTiepointTag")?;
    if tiepoint.len() < 6 {
        bail!("ModelTiepointTag must have 6 values");
    }

    let pixel_width = scale[0];
    let pixel_height = -scale[1];

    // tiepoint = [pixel_i, pixel_j, pixel_k, geo_x, geo_y, geo_z]; for the
    // (0,0) tiepoint this directly gives the northwest corner.
    let origin_lng = tiepoint[3] - tiepoint[0] * pixel_width;
    let origin_lat = tiepoint[4] - tiepoint[1] * pixel_height;

    let _ = (width, height);
    Ok((origin_lng, origin_lat, pixel_width, pixel_height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiff::encoder::{TiffEncoder, colortype};

    fn write_test_geotiff(path: &Path, values: &[i32], width: u32, height: u32) {
        let file = File::create(path).unwrap();
        let mut tiff = TiffEncoder::new(file).unwrap();
        let data: Vec<i32> = values.to_vec();
        let mut image = tiff
            .new_image::<colortype::GrayI32>(width, height)
            .unwrap();
        image
            .encoder()
            .write_tag(Tag::ModelPixelScaleTag, &[1.0f64, 1.0, 0.0][..])
            .unwrap();
        image
            .encoder()
            .write_tag(
                Tag::ModelTiepointTag,
                &[0.0f64, 0.0, 0.0, 122.0, 57.0, 0.0][..],
            )
            .unwrap();
        image.write_data(&data).unwrap();
    }

    #[test]
    fn reads_full_single_chunk_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.tif");
        // 2x2 grid: [[815, 820], [810, 805]]
        write_test_geotiff(&path, &[815, 820, 810, 805], 2, 2);

        let reader = GeoTiffReader::open(&path).unwrap();
        assert_eq!(reader.metadata().width, 2);
        assert_eq!(reader.metadata().height, 2);
        assert_eq!(reader.metadata().origin_lat, 57.0);
        assert_eq!(reader.metadata().origin_lng, 122.0);

        let window = reader.read_window(0, 0, 2, 2, -9999.0).unwrap();
        assert_eq!(window.samples, vec![815.0, 820.0, 810.0, 805.0]);
    }

    #[test]
    fn out_of_bounds_window_is_filled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.tif");
        write_test_geotiff(&path, &[815, 820, 810, 805], 2, 2);

        let reader = GeoTiffReader::open(&path).unwrap();
        let window = reader.read_window(-1, -1, 4, 4, -1.0).unwrap();
        assert_eq!(window.nrows, 4);
        assert_eq!(window.ncols, 4);
        assert_eq!(window.get(0, 0), -1.0);
        assert_eq!(window.get(1, 1), 815.0);
        assert_eq!(window.get(2, 2), 805.0);
    }
}
