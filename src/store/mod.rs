//! Business records and the storage port for them.

mod sqlite;

pub use sqlite::SqliteBusinessStore;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub type BusinessId = i64;

/// A stored business record. Coordinates are validated at the API edge,
/// so a persisted record always carries a usable position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Business {
    pub id: BusinessId,
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Payload for creating a business; the store assigns the id.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBusiness {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Partial update; absent fields keep their stored values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BusinessUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A partial update's before and after images. The store captures
/// `previous` at the moment it writes, so callers reconciling derived
/// state (the spatial index) see the record the write actually
/// replaced, not one from an earlier racy read.
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub previous: Business,
    pub updated: Business,
}

/// Storage port for business records.
#[async_trait]
pub trait BusinessStore: Send + Sync {
    /// Fetch one record, `None` when the id is unknown.
    async fn get(&self, id: BusinessId) -> Result<Option<Business>>;

    /// Fetch many records at once; unknown ids are simply absent from
    /// the result map.
    async fn get_batch(&self, ids: &[BusinessId]) -> Result<HashMap<BusinessId, Business>>;

    /// Persist a new record and return it with its assigned id.
    async fn create(&self, new: NewBusiness) -> Result<Business>;

    /// Apply a partial update and return the record before and after
    /// the write.
    async fn update(&self, id: BusinessId, update: BusinessUpdate) -> Result<UpdateOutcome>;

    /// Remove a record.
    async fn delete(&self, id: BusinessId) -> Result<()>;
}
