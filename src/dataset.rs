//! A named, configured collection of rasters queryable as one.

use crate::interpolation::Kernel;
use crate::tile_index::TileIndex;

/// What to return when a point has no usable sample: a missing tile, or a
/// sample that hits the raster's NODATA sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodataPolicy {
    /// Surface as `elevation: null` in the response.
    #[default]
    Permissive,
    /// Surface as a per-point error instead of `null`.
    Strict,
}

/// Decimal places of precision to round returned elevations to. The
/// default, one decimal place, matches "1 meter" resolution for elevation
/// values expressed in meters.
pub const DEFAULT_OUTPUT_PRECISION: u32 = 1;

#[derive(Debug)]
pub struct Dataset {
    pub name: String,
    pub tile_index: TileIndex,
    pub default_kernel: Kernel,
    pub nodata_policy: NodataPolicy,
    pub output_precision: u32,
}

impl Dataset {
    pub fn round_output(&self, value: f64) -> f64 {
        let factor = 10f64.powi(self.output_precision as i32);
        (value * factor).round() / factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_configured_precision() {
        let dataset = Dataset {
            name: "test".to_string(),
            tile_index: TileIndex::SingleFile {
                path: "/dev/null".into(),
            },
            default_kernel: Kernel::Bilinear,
            nodata_policy: NodataPolicy::Permissive,
            output_precision: 1,
        };
        assert_eq!(dataset.round_output(812.346), 812.3);
    }
}
