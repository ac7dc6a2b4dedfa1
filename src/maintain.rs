//! Keeps the spatial index in step with the business store.
//!
//! Every mutation of a record passes through here so the index entries
//! at each maintained precision follow the record's position. Missing
//! entries found along the way are logged and tolerated; failures while
//! writing the index surface as reconciliation errors, and the record
//! and the index may disagree until the mutation is retried.

use std::sync::Arc;

use tracing::warn;

use crate::error::{Error, Result};
use crate::geo::LatLon;
use crate::geohash::encode;
use crate::index::SpatialIndex;
use crate::store::{Business, BusinessId};

pub struct IndexMaintainer {
    index: Arc<dyn SpatialIndex>,
    /// Precisions kept indexed, ascending.
    precisions: Vec<usize>,
}

impl IndexMaintainer {
    pub fn new(index: Arc<dyn SpatialIndex>, precisions: Vec<usize>) -> Self {
        Self { index, precisions }
    }

    fn position(business: &Business) -> LatLon {
        LatLon {
            lat: business.latitude,
            lon: business.longitude,
        }
    }

    /// Index a freshly created record at every maintained precision.
    pub async fn on_create(&self, business: &Business) -> Result<()> {
        let position = Self::position(business);
        for &precision in &self.precisions {
            let key = encode(position, precision);
            self.index.insert(&key, business.id).await.map_err(|e| {
                Error::Reconciliation(format!(
                    "indexing business {} under {key}: {e}",
                    business.id
                ))
            })?;
        }
        Ok(())
    }

    /// Move index entries after a record changed. Precisions where the
    /// cell key is unchanged are skipped; a missing old entry is logged
    /// and the new entry written anyway.
    pub async fn on_update(&self, old: &Business, new: &Business) -> Result<()> {
        let old_position = Self::position(old);
        let new_position = Self::position(new);
        for &precision in &self.precisions {
            let old_key = encode(old_position, precision);
            let new_key = encode(new_position, precision);
            if old_key == new_key {
                continue;
            }
            let existed = self
                .index
                .relocate(&old_key, &new_key, new.id)
                .await
                .map_err(|e| {
                    Error::Reconciliation(format!(
                        "relocating business {} from {old_key} to {new_key}: {e}",
                        new.id
                    ))
                })?;
            if !existed {
                warn!(
                    business = new.id,
                    key = %old_key,
                    "index entry missing during relocation"
                );
            }
        }
        Ok(())
    }

    /// Drop all index entries for a deleted record.
    ///
    /// Works from what the index actually holds per precision rather
    /// than re-encoding the record's coordinates, so entries left by
    /// missed updates are still cleaned up.
    pub async fn on_delete(&self, id: BusinessId) -> Result<()> {
        for &precision in &self.precisions {
            let keys = self.index.entries_for(id, precision).await.map_err(|e| {
                Error::Reconciliation(format!(
                    "listing entries for business {id} at precision {precision}: {e}"
                ))
            })?;
            if keys.is_empty() {
                warn!(business = id, precision, "no index entries to delete");
                continue;
            }
            for key in keys {
                match self.index.remove(&key, id).await {
                    Ok(()) => {}
                    Err(Error::NotFound(_)) => {
                        warn!(business = id, key = %key, "index entry vanished before delete");
                    }
                    Err(e) => {
                        return Err(Error::Reconciliation(format!(
                            "removing entry {key} for business {id}: {e}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
