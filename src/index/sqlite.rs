//! SQLite-backed spatial index.

use async_trait::async_trait;
use rusqlite::{params, params_from_iter};
use std::collections::BTreeSet;

use crate::db::Db;
use crate::error::{Error, Result};
use crate::geohash::SpatialKey;
use crate::store::BusinessId;

use super::SpatialIndex;

pub struct SqliteSpatialIndex {
    db: Db,
}

impl SqliteSpatialIndex {
    pub fn new(db: Db) -> Result<Self> {
        let index = Self { db };
        index.init_schema()?;
        Ok(index)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.db.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS geo_entries (
                geohash     TEXT NOT NULL,
                business_id INTEGER NOT NULL,
                PRIMARY KEY (geohash, business_id)
            );
            CREATE INDEX IF NOT EXISTS idx_geo_entries_business
                ON geo_entries (business_id);",
        )?;
        Ok(())
    }
}

#[async_trait]
impl SpatialIndex for SqliteSpatialIndex {
    async fn insert(&self, key: &SpatialKey, id: BusinessId) -> Result<()> {
        let conn = self.db.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO geo_entries (geohash, business_id) VALUES (?1, ?2)",
            params![key.as_str(), id],
        )?;
        Ok(())
    }

    async fn remove(&self, key: &SpatialKey, id: BusinessId) -> Result<()> {
        let conn = self.db.lock().unwrap();
        let removed = conn.execute(
            "DELETE FROM geo_entries WHERE geohash = ?1 AND business_id = ?2",
            params![key.as_str(), id],
        )?;
        if removed == 0 {
            return Err(Error::not_found(format!("entry {key} -> {id}")));
        }
        Ok(())
    }

    async fn lookup(&self, keys: &BTreeSet<SpatialKey>) -> Result<BTreeSet<BusinessId>> {
        let keys: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
        let conn = self.db.lock().unwrap();
        let mut ids = BTreeSet::new();
        for chunk in keys.chunks(crate::db::MAX_BIND_VARS) {
            let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT DISTINCT business_id FROM geo_entries WHERE geohash IN ({placeholders})"
            ))?;
            let found = stmt
                .query_map(params_from_iter(chunk.iter()), |row| {
                    row.get::<_, BusinessId>(0)
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            ids.extend(found);
        }
        Ok(ids)
    }

    async fn lookup_within(
        &self,
        cells: &BTreeSet<SpatialKey>,
        precision: usize,
    ) -> Result<BTreeSet<BusinessId>> {
        // cells share one precision by contract; it is the prefix length
        let Some(prefix_len) = cells.iter().next().map(|c| c.precision()) else {
            return Ok(BTreeSet::new());
        };
        let cells: Vec<&str> = cells.iter().map(|c| c.as_str()).collect();
        let conn = self.db.lock().unwrap();
        let mut ids = BTreeSet::new();
        for chunk in cells.chunks(crate::db::MAX_BIND_VARS) {
            let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT DISTINCT business_id FROM geo_entries
                  WHERE length(geohash) = {precision}
                    AND substr(geohash, 1, {prefix_len}) IN ({placeholders})"
            ))?;
            let found = stmt
                .query_map(params_from_iter(chunk.iter()), |row| {
                    row.get::<_, BusinessId>(0)
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            ids.extend(found);
        }
        Ok(ids)
    }

    async fn entries_for(&self, id: BusinessId, precision: usize) -> Result<BTreeSet<SpatialKey>> {
        let conn = self.db.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT geohash FROM geo_entries WHERE business_id = ?1 AND length(geohash) = ?2",
        )?;
        let raw = stmt
            .query_map(params![id, precision as i64], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raw.iter().map(|s| s.parse()).collect()
    }

    async fn relocate(&self, old: &SpatialKey, new: &SpatialKey, id: BusinessId) -> Result<bool> {
        let conn = self.db.lock().unwrap();
        let tx = conn.unchecked_transaction()?;
        let removed = tx.execute(
            "DELETE FROM geo_entries WHERE geohash = ?1 AND business_id = ?2",
            params![old.as_str(), id],
        )?;
        tx.execute(
            "INSERT OR IGNORE INTO geo_entries (geohash, business_id) VALUES (?1, ?2)",
            params![new.as_str(), id],
        )?;
        tx.commit()?;
        Ok(removed > 0)
    }
}
