//! Geographic point validation and canonicalization.

use serde::{Deserialize, Serialize};

use crate::error::PointError;

/// A latitude/longitude pair in degrees.
///
/// `lng` is always canonicalized to `[-180, 180]` by the time a `Point` is
/// constructed via [`Point::new`]; `lat` outside `[-90, 90]` is rejected
/// rather than wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

impl Point {
    /// Validate and canonicalize a raw (lat, lng) pair.
    ///
    /// Longitude wraps modulo 360 into `[-180, 180]`; latitude out of range
    /// or either coordinate non-finite is rejected.
    pub fn new(lat: f64, lng: f64) -> Result<Self, PointError> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(PointError::InvalidPoint(lat));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(PointError::InvalidPoint(lat));
        }

        Ok(Self {
            lat,
            lng: wrap_lng(lng),
        })
    }
}

/// Wrap a longitude value modulo 360 into the canonical `[-180, 180]` interval.
fn wrap_lng(lng: f64) -> f64 {
    let wrapped = ((lng + 180.0).rem_euclid(360.0)) - 180.0;
    // rem_euclid can return exactly -180.0 at the lower boundary; normalize to 180.0
    // only when the input was itself already the upper edge, otherwise leave as-is.
    if wrapped == -180.0 && lng > 0.0 {
        180.0
    } else {
        wrapped
    }
}
