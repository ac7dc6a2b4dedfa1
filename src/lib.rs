//! Vicinity — geohash-backed proximity search for business records.
//!
//! Businesses live in a SQLite store; a spatial index maps geohash
//! cells to business ids at a few maintained precisions. A radius query
//! expands rings of cells around the query point, reads candidate ids
//! from the index, then ranks the records by true distance. The HTTP
//! server in [`server`] exposes the whole thing.

pub mod config;
pub mod db;
pub mod error;
pub mod geo;
pub mod geohash;
pub mod index;
pub mod maintain;
pub mod neighbors;
pub mod search;
pub mod server;
pub mod store;

pub use error::{Error, Result};
