//! SQLite-backed business store.

use async_trait::async_trait;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use std::collections::HashMap;

use crate::db::Db;
use crate::error::{Error, Result};

use super::{Business, BusinessId, BusinessStore, BusinessUpdate, NewBusiness, UpdateOutcome};

pub struct SqliteBusinessStore {
    db: Db,
}

impl SqliteBusinessStore {
    pub fn new(db: Db) -> Result<Self> {
        let store = Self { db };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.db.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS businesses (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                name      TEXT NOT NULL,
                address   TEXT NOT NULL DEFAULT '',
                city      TEXT NOT NULL DEFAULT '',
                state     TEXT NOT NULL DEFAULT '',
                country   TEXT NOT NULL DEFAULT '',
                latitude  REAL NOT NULL,
                longitude REAL NOT NULL
            );",
        )?;
        Ok(())
    }
}

fn row_to_business(row: &Row) -> rusqlite::Result<Business> {
    Ok(Business {
        id: row.get(0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        city: row.get(3)?,
        state: row.get(4)?,
        country: row.get(5)?,
        latitude: row.get(6)?,
        longitude: row.get(7)?,
    })
}

const BUSINESS_COLUMNS: &str = "id, name, address, city, state, country, latitude, longitude";

#[async_trait]
impl BusinessStore for SqliteBusinessStore {
    async fn get(&self, id: BusinessId) -> Result<Option<Business>> {
        let conn = self.db.lock().unwrap();
        let business = conn
            .query_row(
                &format!("SELECT {BUSINESS_COLUMNS} FROM businesses WHERE id = ?1"),
                params![id],
                row_to_business,
            )
            .optional()?;
        Ok(business)
    }

    async fn get_batch(&self, ids: &[BusinessId]) -> Result<HashMap<BusinessId, Business>> {
        let conn = self.db.lock().unwrap();
        let mut out = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(crate::db::MAX_BIND_VARS) {
            let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT {BUSINESS_COLUMNS} FROM businesses WHERE id IN ({placeholders})"
            ))?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), row_to_business)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            out.extend(rows.into_iter().map(|b| (b.id, b)));
        }
        Ok(out)
    }

    async fn create(&self, new: NewBusiness) -> Result<Business> {
        let conn = self.db.lock().unwrap();
        conn.execute(
            "INSERT INTO businesses (name, address, city, state, country, latitude, longitude)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                new.name,
                new.address,
                new.city,
                new.state,
                new.country,
                new.latitude,
                new.longitude
            ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(Business {
            id,
            name: new.name,
            address: new.address,
            city: new.city,
            state: new.state,
            country: new.country,
            latitude: new.latitude,
            longitude: new.longitude,
        })
    }

    async fn update(&self, id: BusinessId, update: BusinessUpdate) -> Result<UpdateOutcome> {
        // the pre-image is read under the same lock as the write, so it
        // is exactly the record this update replaces
        let conn = self.db.lock().unwrap();
        let previous = conn
            .query_row(
                &format!("SELECT {BUSINESS_COLUMNS} FROM businesses WHERE id = ?1"),
                params![id],
                row_to_business,
            )
            .optional()?
            .ok_or_else(|| Error::not_found(format!("business {id}")))?;

        let updated = Business {
            id,
            name: update.name.unwrap_or_else(|| previous.name.clone()),
            address: update.address.unwrap_or_else(|| previous.address.clone()),
            city: update.city.unwrap_or_else(|| previous.city.clone()),
            state: update.state.unwrap_or_else(|| previous.state.clone()),
            country: update.country.unwrap_or_else(|| previous.country.clone()),
            latitude: update.latitude.unwrap_or(previous.latitude),
            longitude: update.longitude.unwrap_or(previous.longitude),
        };
        conn.execute(
            "UPDATE businesses
             SET name = ?1, address = ?2, city = ?3, state = ?4, country = ?5,
                 latitude = ?6, longitude = ?7
             WHERE id = ?8",
            params![
                updated.name,
                updated.address,
                updated.city,
                updated.state,
                updated.country,
                updated.latitude,
                updated.longitude,
                id
            ],
        )?;
        Ok(UpdateOutcome { previous, updated })
    }

    async fn delete(&self, id: BusinessId) -> Result<()> {
        let conn = self.db.lock().unwrap();
        let removed = conn.execute("DELETE FROM businesses WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(Error::not_found(format!("business {id}")));
        }
        Ok(())
    }
}
