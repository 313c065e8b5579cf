use std::path::PathBuf;

use rusqlite::Connection;

use super::{sqlite, DatabaseError};

/// Cheap-to-clone handle to the database file.
///
/// Every operation opens its own short-lived connection, so concurrent
/// language tasks never share one. Contention between them surfaces as
/// SQLITE_BUSY, which the retry layer classifies as transient.
#[derive(Clone, Debug)]
pub struct Store {
    db_path: PathBuf,
}

impl Store {
    /// Open the store, creating and migrating the database file if needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DatabaseError> {
        let db_path = path.into();
        sqlite::open_database(&db_path)?;
        Ok(Self { db_path })
    }

    /// A fresh connection for one operation. Dropped when the caller is done.
    pub fn connect(&self) -> Result<Connection, DatabaseError> {
        sqlite::connect(&self.db_path)
    }
}
