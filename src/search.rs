//! Radius search over the spatial index.
//!
//! Pipeline: validate the query, pick a maintained precision near the
//! radius-ideal one, expand covering cells, pull candidate ids from the
//! index, load the records, then rank by true haversine distance. The
//! cell stage over-covers, so the distance filter is what guarantees
//! nothing beyond the radius is returned.
//!
//! Radii wider than the coarsest maintained cell expand at the
//! radius-ideal precision (a bounded handful of coarse cells) and
//! resolve candidates by key prefix, so the covering set stays small at
//! any radius up to planet scale.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::geo::{haversine_m, LatLon};
use crate::geohash::precision_for_radius;
use crate::index::SpatialIndex;
use crate::neighbors::covering_cells_at;
use crate::store::{Business, BusinessId, BusinessStore};

/// One ranked result: the record plus its distance from the query point.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub business: Business,
    pub distance_m: f64,
}

/// A page of ranked results. `has_more` tells the caller whether a
/// further offset would yield anything.
#[derive(Debug, Serialize)]
pub struct SearchPage {
    pub results: Vec<SearchHit>,
    pub has_more: bool,
}

pub struct ProximityService {
    index: Arc<dyn SpatialIndex>,
    store: Arc<dyn BusinessStore>,
    /// Precisions the maintainer keeps indexed, ascending.
    precisions: Vec<usize>,
    timeout: Duration,
    max_limit: usize,
}

impl ProximityService {
    pub fn new(
        index: Arc<dyn SpatialIndex>,
        store: Arc<dyn BusinessStore>,
        precisions: Vec<usize>,
        timeout: Duration,
        max_limit: usize,
    ) -> Self {
        Self {
            index,
            store,
            precisions,
            timeout,
            max_limit,
        }
    }

    /// Run a radius query. Fails with `Cancelled` when the configured
    /// timeout elapses before the pipeline finishes.
    pub async fn search(
        &self,
        lat: f64,
        lon: f64,
        radius_m: f64,
        limit: usize,
        offset: usize,
    ) -> Result<SearchPage> {
        let deadline = Instant::now() + self.timeout;
        match tokio::time::timeout(
            self.timeout,
            self.search_inner(deadline, lat, lon, radius_m, limit, offset),
        )
        .await
        {
            Ok(page) => page,
            Err(_) => Err(Error::Cancelled(self.timeout)),
        }
    }

    async fn search_inner(
        &self,
        deadline: Instant,
        lat: f64,
        lon: f64,
        radius_m: f64,
        limit: usize,
        offset: usize,
    ) -> Result<SearchPage> {
        let origin = LatLon::new(lat, lon)?;
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(Error::invalid_query(format!(
                "radius must be a positive number of meters, got {radius_m}"
            )));
        }
        if limit == 0 {
            return Err(Error::invalid_query("limit must be at least 1"));
        }
        let limit = limit.min(self.max_limit);

        let ideal = precision_for_radius(radius_m);
        let coarsest = self.precisions.first().copied().unwrap_or(ideal);
        let candidates = if ideal < coarsest {
            // the circle outgrows the coarsest maintained cell, so
            // enumerating maintained cells would produce an enormous
            // key set; expand at the radius-ideal precision instead and
            // match maintained entries by prefix, which the key
            // hierarchy makes exact
            let cells = covering_cells_at(origin, radius_m, ideal)?;
            self.check_deadline(deadline)?;
            self.index.lookup_within(&cells, coarsest).await?
        } else {
            let precision = self.maintained_precision(ideal);
            let cells = covering_cells_at(origin, radius_m, precision)?;
            self.check_deadline(deadline)?;
            self.index.lookup(&cells).await?
        };
        let ids: Vec<BusinessId> = candidates.into_iter().collect();
        self.check_deadline(deadline)?;

        let records = self.store.get_batch(&ids).await?;
        self.check_deadline(deadline)?;

        let mut hits: Vec<SearchHit> = records
            .into_values()
            .filter_map(|business| {
                let position = LatLon {
                    lat: business.latitude,
                    lon: business.longitude,
                };
                let distance_m = haversine_m(origin, position);
                (distance_m <= radius_m).then_some(SearchHit {
                    business,
                    distance_m,
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            a.distance_m
                .total_cmp(&b.distance_m)
                .then_with(|| a.business.id.cmp(&b.business.id))
        });

        let total = hits.len();
        let results: Vec<SearchHit> = hits.into_iter().skip(offset).take(limit).collect();
        let has_more = offset.saturating_add(limit) < total;
        Ok(SearchPage { results, has_more })
    }

    /// The finest maintained precision not finer than `ideal`. Only
    /// called once `ideal` is known to be at least the coarsest
    /// maintained level; wider radii take the prefix path instead.
    fn maintained_precision(&self, ideal: usize) -> usize {
        self.precisions
            .iter()
            .rev()
            .find(|&&p| p <= ideal)
            .copied()
            .unwrap_or(ideal)
    }

    fn check_deadline(&self, deadline: Instant) -> Result<()> {
        if Instant::now() >= deadline {
            return Err(Error::Cancelled(self.timeout));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::geohash::{decode, encode};
    use crate::index::SqliteSpatialIndex;
    use crate::store::{NewBusiness, SqliteBusinessStore};

    struct Fixture {
        store: Arc<SqliteBusinessStore>,
        index: Arc<SqliteSpatialIndex>,
        service: ProximityService,
    }

    fn fixture() -> Fixture {
        fixture_with(Duration::from_secs(2), 100)
    }

    fn fixture_with(timeout: Duration, max_limit: usize) -> Fixture {
        let db = db::in_memory().unwrap();
        let store = Arc::new(SqliteBusinessStore::new(db.clone()).unwrap());
        let index = Arc::new(SqliteSpatialIndex::new(db).unwrap());
        let service = ProximityService::new(
            index.clone(),
            store.clone(),
            vec![4, 5, 6],
            timeout,
            max_limit,
        );
        Fixture {
            store,
            index,
            service,
        }
    }

    async fn seed(fx: &Fixture, name: &str, lat: f64, lon: f64) -> BusinessId {
        let business = fx
            .store
            .create(NewBusiness {
                name: name.into(),
                address: String::new(),
                city: String::new(),
                state: String::new(),
                country: String::new(),
                latitude: lat,
                longitude: lon,
            })
            .await
            .unwrap();
        for p in [4, 5, 6] {
            fx.index
                .insert(&encode(LatLon { lat, lon }, p), business.id)
                .await
                .unwrap();
        }
        business.id
    }

    const SF_LAT: f64 = 37.7749;
    const SF_LON: f64 = -122.4194;

    async fn seed_bay_area(fx: &Fixture) {
        seed(fx, "Oakland Diner", 37.8044, -122.2712).await;
        seed(fx, "Ferry Cafe", 37.7955, -122.3937).await;
        seed(fx, "Civic Bakery", SF_LAT, SF_LON).await;
        seed(fx, "Mission Tacos", 37.7599, -122.4148).await;
    }

    fn names(page: &SearchPage) -> Vec<&str> {
        page.results.iter().map(|h| h.business.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_search_ranks_by_distance() {
        let fx = fixture();
        seed_bay_area(&fx).await;

        let page = fx
            .service
            .search(SF_LAT, SF_LON, 15_000.0, 20, 0)
            .await
            .unwrap();

        assert_eq!(
            names(&page),
            vec!["Civic Bakery", "Mission Tacos", "Ferry Cafe", "Oakland Diner"]
        );
        assert!(!page.has_more);
        assert!(page.results[0].distance_m < 1.0);
        for pair in page.results.windows(2) {
            assert!(pair[0].distance_m <= pair[1].distance_m);
        }
        let oakland = &page.results[3];
        assert!(
            (12_500.0..14_500.0).contains(&oakland.distance_m),
            "Oakland at {} m",
            oakland.distance_m
        );
    }

    #[tokio::test]
    async fn test_search_excludes_beyond_radius() {
        let fx = fixture();
        seed_bay_area(&fx).await;

        let page = fx
            .service
            .search(SF_LAT, SF_LON, 5_000.0, 20, 0)
            .await
            .unwrap();

        assert_eq!(names(&page), vec!["Civic Bakery", "Mission Tacos", "Ferry Cafe"]);
        for hit in &page.results {
            assert!(hit.distance_m <= 5_000.0);
        }
    }

    #[tokio::test]
    async fn test_search_filters_candidates_sharing_cells() {
        let fx = fixture();
        // one business at a cell center, one a full cell north (~4.9 km):
        // the neighbor lands in the covering set but fails the distance cut
        let center = decode(&encode(LatLon { lat: SF_LAT, lon: SF_LON }, 5))
            .unwrap()
            .center();
        seed(&fx, "At Center", center.lat, center.lon).await;
        seed(&fx, "Cell North", center.lat + 0.0439453125, center.lon).await;

        let page = fx
            .service
            .search(center.lat, center.lon, 1_500.0, 20, 0)
            .await
            .unwrap();

        assert_eq!(names(&page), vec!["At Center"]);
    }

    #[tokio::test]
    async fn test_search_wide_radius_resolves_by_prefix() {
        // 2500 km is far wider than any maintained cell; the covering
        // set settles at precision 1 and candidates come from coarse
        // prefixes, not an enormous exact key set
        let fx = fixture();
        seed_bay_area(&fx).await;
        seed(&fx, "Distant Harbor", -33.8688, 151.2093).await;

        let page = fx
            .service
            .search(SF_LAT, SF_LON, 2_500_000.0, 20, 0)
            .await
            .unwrap();

        assert_eq!(
            names(&page),
            vec!["Civic Bakery", "Mission Tacos", "Ferry Cafe", "Oakland Diner"]
        );
        for pair in page.results.windows(2) {
            assert!(pair[0].distance_m <= pair[1].distance_m);
        }
    }

    #[tokio::test]
    async fn test_search_planet_radius_returns_everything() {
        let fx = fixture();
        seed_bay_area(&fx).await;
        seed(&fx, "Distant Harbor", -33.8688, 151.2093).await;

        let page = fx
            .service
            .search(SF_LAT, SF_LON, 20_100_000.0, 20, 0)
            .await
            .unwrap();

        assert_eq!(page.results.len(), 5);
        assert_eq!(page.results.last().unwrap().business.name, "Distant Harbor");
    }

    #[tokio::test]
    async fn test_search_pagination() {
        let fx = fixture();
        seed_bay_area(&fx).await;

        let first = fx
            .service
            .search(SF_LAT, SF_LON, 15_000.0, 2, 0)
            .await
            .unwrap();
        assert_eq!(names(&first), vec!["Civic Bakery", "Mission Tacos"]);
        assert!(first.has_more);

        let second = fx
            .service
            .search(SF_LAT, SF_LON, 15_000.0, 2, 2)
            .await
            .unwrap();
        assert_eq!(names(&second), vec!["Ferry Cafe", "Oakland Diner"]);
        assert!(!second.has_more);

        let past_end = fx
            .service
            .search(SF_LAT, SF_LON, 15_000.0, 2, 4)
            .await
            .unwrap();
        assert!(past_end.results.is_empty());
        assert!(!past_end.has_more);
    }

    #[tokio::test]
    async fn test_search_clamps_limit() {
        let fx = fixture_with(Duration::from_secs(2), 3);
        seed_bay_area(&fx).await;

        let page = fx
            .service
            .search(SF_LAT, SF_LON, 15_000.0, 50, 0)
            .await
            .unwrap();
        assert_eq!(page.results.len(), 3);
        assert!(page.has_more);
    }

    #[tokio::test]
    async fn test_search_rejects_bad_parameters() {
        let fx = fixture();

        let err = fx.service.search(91.0, 0.0, 1_000.0, 20, 0).await.unwrap_err();
        assert!(matches!(err, Error::InvalidCoordinate { field: "latitude", .. }));

        let err = fx.service.search(0.0, 0.0, 0.0, 20, 0).await.unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)));

        let err = fx.service.search(0.0, 0.0, f64::NAN, 20, 0).await.unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)));

        let err = fx.service.search(0.0, 0.0, 1_000.0, 0, 0).await.unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_search_cancelled_past_deadline() {
        let fx = fixture_with(Duration::ZERO, 100);
        seed_bay_area(&fx).await;

        let err = fx
            .service
            .search(SF_LAT, SF_LON, 5_000.0, 20, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled(_)));
    }

    #[tokio::test]
    async fn test_search_empty_index() {
        let fx = fixture();
        let page = fx
            .service
            .search(SF_LAT, SF_LON, 5_000.0, 20, 0)
            .await
            .unwrap();
        assert!(page.results.is_empty());
        assert!(!page.has_more);
    }
}
