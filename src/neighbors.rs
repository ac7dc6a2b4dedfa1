//! Neighbor cells and ring expansion over the geohash grid.
//!
//! Neighbors come from shifting a cell's midpoint by one cell size and
//! re-encoding, which rolls over base-32 digit boundaries without lookup
//! tables. `covering_cells` grows rings of neighbors outward until the
//! whole search circle sits inside the visited area.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::geo::LatLon;
use crate::geohash::{decode, encode, precision_for_radius, CellBounds, SpatialKey};

/// The up-to-8 cells adjacent to `key`, cardinal and diagonal.
///
/// Steps past a pole are omitted, so polar cells report fewer than 8;
/// longitude wraps at the antimeridian. Every returned key has the same
/// precision as `key`, and `key` itself is never in the set.
pub fn neighbors(key: &SpatialKey) -> Result<BTreeSet<SpatialKey>> {
    let bounds = decode(key)?;
    let precision = key.precision();
    let mut out = BTreeSet::new();
    for dlat in [-1i32, 0, 1] {
        for dlon in [-1i32, 0, 1] {
            if dlat == 0 && dlon == 0 {
                continue;
            }
            if let Some(n) = shifted(&bounds, precision, dlat, dlon) {
                out.insert(n);
            }
        }
    }
    Ok(out)
}

/// The cell one step from `bounds` in the given direction, or `None`
/// when the step would cross a pole.
fn shifted(bounds: &CellBounds, precision: usize, dlat: i32, dlon: i32) -> Option<SpatialKey> {
    let center = bounds.center();
    let lat = center.lat + f64::from(dlat) * bounds.height_deg();
    if !(-90.0..=90.0).contains(&lat) {
        return None;
    }
    let mut lon = center.lon + f64::from(dlon) * bounds.width_deg();
    if lon > 180.0 {
        lon -= 360.0;
    } else if lon < -180.0 {
        lon += 360.0;
    }
    Some(encode(LatLon { lat, lon }, precision))
}

/// Cells covering a circle, at the precision `precision_for_radius` picks
/// for it.
pub fn covering_cells(center: LatLon, radius_m: f64) -> Result<BTreeSet<SpatialKey>> {
    covering_cells_at(center, radius_m, precision_for_radius(radius_m))
}

/// Cells covering a circle at an explicit precision.
///
/// Breadth-first over rings: ring 0 is the center cell, ring k the
/// not-yet-visited neighbors of ring k-1. Expansion continues while any
/// cell of the current ring still intersects the circle and stops once
/// the whole ring lies beyond the radius. Every visited cell is
/// returned, so the result over-covers by up to one ring rather than
/// risking a gap: a point inside the circle always lands in a visited
/// cell, because its own cell intersects the circle and rings only stop
/// after a fully disjoint one.
///
/// Rings move outward by one cell per step, so the loop runs on the
/// order of radius over cell size; if the frontier empties first (the
/// grid is exhausted at this precision) the loop ends there.
pub fn covering_cells_at(
    center: LatLon,
    radius_m: f64,
    precision: usize,
) -> Result<BTreeSet<SpatialKey>> {
    let origin = encode(center, precision);
    let mut visited = BTreeSet::from([origin.clone()]);
    let mut ring = BTreeSet::from([origin]);

    loop {
        let mut ring_touches_circle = false;
        for key in &ring {
            if decode(key)?.nearest_distance_m(center) <= radius_m {
                ring_touches_circle = true;
                break;
            }
        }
        if !ring_touches_circle {
            break;
        }

        let mut next = BTreeSet::new();
        for key in &ring {
            for n in neighbors(key)? {
                if !visited.contains(&n) {
                    next.insert(n);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        visited.extend(next.iter().cloned());
        ring = next;
    }

    Ok(visited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::M_PER_DEG;

    #[test]
    fn test_neighbors_inland_cell_has_eight() {
        let key = encode(LatLon { lat: 48.8566, lon: 2.3522 }, 5);
        let around = neighbors(&key).unwrap();
        assert_eq!(around.len(), 8);
        assert!(!around.contains(&key));
        for n in &around {
            assert_eq!(n.precision(), 5);
        }
    }

    #[test]
    fn test_neighbors_clip_at_north_pole() {
        // a cell in the topmost latitude row has no northern neighbors
        let key = encode(LatLon { lat: 89.9, lon: 12.0 }, 3);
        let around = neighbors(&key).unwrap();
        assert_eq!(around.len(), 5);
    }

    #[test]
    fn test_neighbors_wrap_at_antimeridian() {
        let key = encode(LatLon { lat: 0.1, lon: 179.99 }, 4);
        let around = neighbors(&key).unwrap();
        assert_eq!(around.len(), 8);
        let crosses_seam = around.iter().any(|n| {
            let b = decode(n).unwrap();
            b.lon_min == -180.0
        });
        assert!(crosses_seam, "no neighbor on the far side of the seam");
    }

    #[test]
    fn test_covering_small_radius_is_three_by_three() {
        // query at a cell center, radius tiny next to the ~4.9 km edge:
        // ring 1 never touches the circle but is still returned
        let center = decode(&encode(LatLon { lat: 37.7749, lon: -122.4194 }, 5))
            .unwrap()
            .center();
        let cells = covering_cells_at(center, 100.0, 5).unwrap();
        assert_eq!(cells.len(), 9);
        assert!(cells.contains(&encode(center, 5)));
    }

    #[test]
    fn test_covering_expands_past_one_ring_for_wide_radius() {
        let center = LatLon { lat: 37.7749, lon: -122.4194 };
        let cells = covering_cells_at(center, 15_000.0, 5).unwrap();
        assert!(cells.len() > 9, "only {} cells for a 15 km circle", cells.len());
    }

    #[test]
    fn test_covering_contains_points_inside_radius() {
        let center = LatLon { lat: 37.7749, lon: -122.4194 };
        let cells = covering_cells_at(center, 5_000.0, 5).unwrap();

        let d_lat = 4_500.0 / M_PER_DEG;
        let d_lon = 4_500.0 / (M_PER_DEG * center.lat.to_radians().cos());
        let samples = [
            LatLon { lat: center.lat + d_lat, lon: center.lon },
            LatLon { lat: center.lat - d_lat, lon: center.lon },
            LatLon { lat: center.lat, lon: center.lon + d_lon },
            LatLon { lat: center.lat, lon: center.lon - d_lon },
        ];
        for p in samples {
            assert!(
                cells.contains(&encode(p, 5)),
                "cell of {:?} missing from covering set",
                p
            );
        }
    }

    #[test]
    fn test_covering_picks_precision_from_radius() {
        let center = LatLon { lat: 59.3293, lon: 18.0686 };
        let cells = covering_cells(center, 600.0).unwrap();
        for key in &cells {
            assert_eq!(key.precision(), 6);
        }
    }

    #[test]
    fn test_covering_terminates_when_grid_is_exhausted() {
        // planet-sized radius at the coarsest level visits all 32 cells
        let center = LatLon { lat: 0.0, lon: 0.0 };
        let cells = covering_cells_at(center, 30_000_000.0, 1).unwrap();
        assert_eq!(cells.len(), 32);
    }
}
