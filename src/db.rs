//! SQLite connection handling shared by the store and the index.
//!
//! One connection guarded by a mutex serves the whole process. Guards
//! are taken inside synchronous sections only and never held across an
//! await point.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::error::Result;

pub type Db = Arc<Mutex<Connection>>;

/// Bind variables per statement, kept well under SQLite's cap. Batch
/// reads chunk their IN lists to this size; wide searches and large
/// candidate sets otherwise fail outright once the list outgrows the
/// limit.
pub(crate) const MAX_BIND_VARS: usize = 500;

/// Open (or create) the database file, creating parent directories as
/// needed.
pub fn open(path: &Path) -> Result<Db> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// Open a private in-memory database, used by tests and `--in-memory`.
pub fn in_memory() -> Result<Db> {
    let conn = Connection::open_in_memory()?;
    Ok(Arc::new(Mutex::new(conn)))
}
