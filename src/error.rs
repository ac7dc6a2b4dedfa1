//! Error taxonomy shared across the crate.

use std::time::Duration;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can fail between the HTTP boundary and the database.
#[derive(Debug, Error)]
pub enum Error {
    /// Latitude or longitude out of range (or not finite). Rejected at the
    /// boundary, so bad coordinates never reach the codec or the index.
    #[error("invalid coordinate: {field} = {value} (expected {min} to {max})")]
    InvalidCoordinate {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Malformed search parameters: non-positive radius, bad pagination.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A spatial key string outside the base-32 alphabet or length limits.
    #[error("invalid spatial key {0:?}")]
    InvalidKey(String),

    /// A targeted record or index entry does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A failure while bringing the index in line with a record mutation.
    /// Entries that were merely already gone are logged and tolerated
    /// instead; this variant means the index and the store may disagree.
    #[error("index reconciliation: {0}")]
    Reconciliation(String),

    /// A search ran past its deadline and was abandoned.
    #[error("search cancelled after {0:?}")]
    Cancelled(Duration),

    /// Underlying SQLite failure.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Socket-level failure while starting or running the server.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Error::InvalidQuery(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }
}
