//! SQLite storage layer.

mod schema;
mod drafts;
mod events;
mod lots;
mod recipients;
mod transfers;

pub use schema::*;
#[allow(unused_imports)]
pub use drafts::*;
#[allow(unused_imports)]
pub use events::*;

use std::path::Path;

use rusqlite::Connection;
use thiserror::Error;

/// Storage errors, classified so callers can react to the two error classes
/// the reconciliation engine cares about: schema drift (`UnknownColumn`) and
/// natural-key races (`UniqueViolation`).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("unique constraint violation: {0}")]
    UniqueViolation(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("invalid stored value: {0}")]
    Invalid(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, msg) => {
                if err.code == rusqlite::ErrorCode::ConstraintViolation
                    && (err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
                {
                    return StoreError::UniqueViolation(msg.clone().unwrap_or_default());
                }
                if let Some(m) = msg {
                    if is_unknown_column(m) {
                        return StoreError::UnknownColumn(m.clone());
                    }
                }
            }
            // missing columns in a prepared statement surface at prepare
            // time, not execution time
            rusqlite::Error::SqlInputError { msg, .. } => {
                if is_unknown_column(msg) {
                    return StoreError::UnknownColumn(msg.clone());
                }
            }
            _ => {}
        }
        StoreError::Sqlite(e)
    }
}

fn is_unknown_column(msg: &str) -> bool {
    msg.contains("no such column") || msg.contains("has no column named")
}

pub type DbResult<T> = Result<T, StoreError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed. An existing file keeps its
    /// tables as-is (`CREATE TABLE IF NOT EXISTS`), which is how a store
    /// created by an older release surfaces schema drift.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}
