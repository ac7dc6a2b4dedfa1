//! Geographic primitives: validated coordinates and great-circle distance.
//!
//! Latitude is degrees north (-90 to 90), longitude degrees east (-180 to
//! 180). Distances are meters on a spherical Earth.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Mean Earth radius in meters (spherical approximation).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Degrees to radians conversion factor.
const DEG_TO_RAD: f64 = PI / 180.0;

/// Meters spanned by one degree of latitude (and of longitude at the equator).
pub const M_PER_DEG: f64 = PI * EARTH_RADIUS_M / 180.0;

/// A point on the Earth's surface, in degrees.
///
/// `new` is the validating constructor; code that derives points from
/// already-valid ones (cell centers, corners) builds the struct directly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    /// Build a point, rejecting out-of-range or non-finite coordinates.
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        check_lat(lat)?;
        check_lon(lon)?;
        Ok(Self { lat, lon })
    }
}

/// Reject an out-of-range or non-finite latitude.
pub fn check_lat(lat: f64) -> Result<()> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(Error::InvalidCoordinate {
            field: "latitude",
            value: lat,
            min: -90.0,
            max: 90.0,
        });
    }
    Ok(())
}

/// Reject an out-of-range or non-finite longitude.
pub fn check_lon(lon: f64) -> Result<()> {
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(Error::InvalidCoordinate {
            field: "longitude",
            value: lon,
            min: -180.0,
            max: 180.0,
        });
    }
    Ok(())
}

/// Great-circle distance between two points in meters (haversine formula).
pub fn haversine_m(from: LatLon, to: LatLon) -> f64 {
    let lat1_rad = from.lat * DEG_TO_RAD;
    let lat2_rad = to.lat * DEG_TO_RAD;
    let delta_lat = (to.lat - from.lat) * DEG_TO_RAD;
    let delta_lon = (to.lon - from.lon) * DEG_TO_RAD;

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Signed shortest angular difference `a - b` for longitudes, in degrees.
pub(crate) fn lon_delta_deg(a: f64, b: f64) -> f64 {
    let mut d = (a - b) % 360.0;
    if d > 180.0 {
        d -= 360.0;
    } else if d < -180.0 {
        d += 360.0;
    }
    d
}
