//! Base-32 geohash codec: hierarchical spatial keys over a bisected grid.
//!
//! A key of length p ("precision") names one cell of the grid built by
//! recursively halving the longitude and latitude ranges, one bit per
//! halving, longitude first, five bits per character. Keys nest: the
//! first p characters of a longer key name the enclosing coarser cell.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::geo::{haversine_m, lon_delta_deg, LatLon, M_PER_DEG};

/// Shortest usable key length.
pub const MIN_PRECISION: usize = 1;
/// Longest key length the codec produces (sub-meter cells).
pub const MAX_PRECISION: usize = 12;

/// The geohash character set. Notably absent: a, i, l, o.
const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

fn base32_index(byte: u8) -> Option<usize> {
    BASE32.iter().position(|&c| c == byte)
}

/// A geohash cell identifier. The string length is the precision.
///
/// Keys are valid by construction: `encode` produces them and `FromStr`
/// checks alphabet and length, so strings read back from storage go
/// through `parse`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpatialKey(String);

impl SpatialKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key length, i.e. the precision of the cell this key names.
    pub fn precision(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for SpatialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SpatialKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || s.len() > MAX_PRECISION {
            return Err(Error::InvalidKey(s.to_string()));
        }
        let lower = s.to_ascii_lowercase();
        if lower.bytes().any(|b| base32_index(b).is_none()) {
            return Err(Error::InvalidKey(s.to_string()));
        }
        Ok(SpatialKey(lower))
    }
}

/// The bounding box a key decodes to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl CellBounds {
    /// Midpoint of the box, the cell's representative center.
    pub fn center(&self) -> LatLon {
        LatLon {
            lat: (self.lat_min + self.lat_max) / 2.0,
            lon: (self.lon_min + self.lon_max) / 2.0,
        }
    }

    pub fn height_deg(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    pub fn width_deg(&self) -> f64 {
        self.lon_max - self.lon_min
    }

    pub fn contains(&self, point: LatLon) -> bool {
        (self.lat_min..=self.lat_max).contains(&point.lat)
            && (self.lon_min..=self.lon_max).contains(&point.lon)
    }

    /// Distance from `point` to the closest spot of the box, zero inside.
    ///
    /// Clamps in degree space (longitude wrap-aware), then measures with
    /// the haversine. Good to well under a cell edge for index-sized
    /// cells, which is all the ring expansion needs.
    pub fn nearest_distance_m(&self, point: LatLon) -> f64 {
        let lat = point.lat.clamp(self.lat_min, self.lat_max);
        let lon = if (self.lon_min..=self.lon_max).contains(&point.lon) {
            point.lon
        } else if lon_delta_deg(point.lon, self.lon_min).abs()
            <= lon_delta_deg(point.lon, self.lon_max).abs()
        {
            self.lon_min
        } else {
            self.lon_max
        };
        haversine_m(point, LatLon { lat, lon })
    }

    /// Distance from `point` to the farthest corner of the box.
    pub fn farthest_distance_m(&self, point: LatLon) -> f64 {
        let corners = [
            LatLon { lat: self.lat_min, lon: self.lon_min },
            LatLon { lat: self.lat_min, lon: self.lon_max },
            LatLon { lat: self.lat_max, lon: self.lon_min },
            LatLon { lat: self.lat_max, lon: self.lon_max },
        ];
        corners
            .iter()
            .map(|c| haversine_m(point, *c))
            .fold(0.0, f64::max)
    }
}

/// Encode a point into the key of the cell containing it.
///
/// Deterministic for any valid point; `precision` is clamped into
/// 1..=12. Bit 1 selects the upper half of the current range.
pub fn encode(point: LatLon, precision: usize) -> SpatialKey {
    let precision = precision.clamp(MIN_PRECISION, MAX_PRECISION);
    let mut lat = (-90.0, 90.0);
    let mut lon = (-180.0, 180.0);
    let mut key = String::with_capacity(precision);
    let mut bits = 0usize;
    let mut bit_count = 0;
    let mut even_bit = true; // longitude first

    while key.len() < precision {
        if even_bit {
            let mid = (lon.0 + lon.1) / 2.0;
            if point.lon >= mid {
                bits = (bits << 1) | 1;
                lon.0 = mid;
            } else {
                bits <<= 1;
                lon.1 = mid;
            }
        } else {
            let mid = (lat.0 + lat.1) / 2.0;
            if point.lat >= mid {
                bits = (bits << 1) | 1;
                lat.0 = mid;
            } else {
                bits <<= 1;
                lat.1 = mid;
            }
        }
        even_bit = !even_bit;
        bit_count += 1;
        if bit_count == 5 {
            key.push(BASE32[bits] as char);
            bits = 0;
            bit_count = 0;
        }
    }

    SpatialKey(key)
}

/// Decode a key into the bounding box of its cell.
///
/// Exact inverse of `encode` up to grid resolution: encoding any point
/// of the box at the same precision yields the key back. Fails only on a
/// malformed key string, which parsed or encoded keys never are.
pub fn decode(key: &SpatialKey) -> Result<CellBounds> {
    let mut lat = (-90.0, 90.0);
    let mut lon = (-180.0, 180.0);
    let mut even_bit = true;

    for byte in key.as_str().bytes() {
        let idx =
            base32_index(byte).ok_or_else(|| Error::InvalidKey(key.as_str().to_string()))?;
        for shift in (0..5).rev() {
            let bit = (idx >> shift) & 1;
            if even_bit {
                let mid = (lon.0 + lon.1) / 2.0;
                if bit == 1 {
                    lon.0 = mid;
                } else {
                    lon.1 = mid;
                }
            } else {
                let mid = (lat.0 + lat.1) / 2.0;
                if bit == 1 {
                    lat.0 = mid;
                } else {
                    lat.1 = mid;
                }
            }
            even_bit = !even_bit;
        }
    }

    Ok(CellBounds {
        lat_min: lat.0,
        lat_max: lat.1,
        lon_min: lon.0,
        lon_max: lon.1,
    })
}

/// Degree dimensions (height, width) of any cell at `precision`.
///
/// 5p bits split floor/ceil between latitude and longitude, so cells are
/// square in degrees at odd precisions and twice as wide at even ones.
pub fn cell_size_deg(precision: usize) -> (f64, f64) {
    let bits = 5 * precision.clamp(MIN_PRECISION, MAX_PRECISION);
    let lat_bits = bits / 2;
    let lon_bits = bits - lat_bits;
    (
        180.0 / 2f64.powi(lat_bits as i32),
        360.0 / 2f64.powi(lon_bits as i32),
    )
}

/// Shortest cell edge at `precision`, in meters, measured at the equator.
pub fn min_cell_edge_m(precision: usize) -> f64 {
    let (height_deg, width_deg) = cell_size_deg(precision);
    height_deg.min(width_deg) * M_PER_DEG
}

/// The finest precision whose cell edge is at least `radius_m`.
///
/// One cell edge at the chosen level spans the whole radius, so a search
/// circle touches only a handful of cells. Radii wider than the coarsest
/// cell settle at 1.
pub fn precision_for_radius(radius_m: f64) -> usize {
    let mut chosen = MIN_PRECISION;
    for p in MIN_PRECISION..=MAX_PRECISION {
        if min_cell_edge_m(p) >= radius_m {
            chosen = p;
        } else {
            break;
        }
    }
    chosen
}
