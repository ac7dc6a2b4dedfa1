//! The spatial index: geohash cell to business-id entries.
//!
//! The index is a plain inverted mapping. It knows nothing about
//! coordinates or distance; the maintainer decides which keys an entry
//! lives under and the search service decides which cells to read.

mod sqlite;

pub use sqlite::SqliteSpatialIndex;

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::geohash::SpatialKey;
use crate::store::BusinessId;

#[async_trait]
pub trait SpatialIndex: Send + Sync {
    /// Record `id` under `key`. Inserting an entry that already exists
    /// is a no-op, so replays are harmless.
    async fn insert(&self, key: &SpatialKey, id: BusinessId) -> Result<()>;

    /// Drop the entry for `id` under `key`; `NotFound` when no such
    /// entry exists.
    async fn remove(&self, key: &SpatialKey, id: BusinessId) -> Result<()>;

    /// All ids recorded under any of `keys`, deduplicated.
    async fn lookup(&self, keys: &BTreeSet<SpatialKey>) -> Result<BTreeSet<BusinessId>>;

    /// All ids whose entry at `precision` lies inside any of `cells`:
    /// same-precision keys coarser than `precision`. The prefix
    /// hierarchy makes the containment test exact, so a wide search can
    /// probe a handful of coarse cells instead of enumerating every
    /// maintained cell they span.
    async fn lookup_within(
        &self,
        cells: &BTreeSet<SpatialKey>,
        precision: usize,
    ) -> Result<BTreeSet<BusinessId>>;

    /// The keys of the given precision that currently carry `id`. Lets
    /// cleanup work from what the index really holds instead of
    /// re-deriving keys from coordinates that may have drifted.
    async fn entries_for(&self, id: BusinessId, precision: usize) -> Result<BTreeSet<SpatialKey>>;

    /// Move `id` from `old` to `new` atomically. Returns whether the
    /// old entry was present; either way `id` ends up under `new`.
    async fn relocate(&self, old: &SpatialKey, new: &SpatialKey, id: BusinessId) -> Result<bool>;
}
