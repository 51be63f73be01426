//! Database layer for petcare.

mod appointments;
mod hospitals;
mod records;
mod schema;
mod tokens;

pub use appointments::*;
pub use records::*;
pub use schema::*;
pub use tokens::*;

use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// How long a connection waits on another writer before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// The (veterinarian, date, time slot) tuple is held by a live appointment
    #[error("Slot already taken")]
    SlotTaken,
}

pub type DbResult<T> = Result<T, DbError>;

/// Database handle shared between services.
pub type SharedDatabase = Arc<Mutex<Database>>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
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

    /// Wrap in the shared handle used by services.
    pub fn shared(self) -> SharedDatabase {
        Arc::new(Mutex::new(self))
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

    /// Begin a write transaction that takes the database write lock up front.
    ///
    /// Check-then-insert sequences run inside one of these so that no other
    /// connection can commit between the check and the insert.
    pub fn immediate_transaction(&mut self) -> DbResult<Transaction<'_>> {
        Ok(self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
    }
}

/// Translate a unique-index violation on the slot tuple into [`DbError::SlotTaken`].
pub(crate) fn classify_constraint(e: rusqlite::Error) -> DbError {
    match &e {
        rusqlite::Error::SqliteFailure(failure, Some(message))
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            if message.contains("appointments.veterinarian_id") {
                DbError::SlotTaken
            } else {
                DbError::Constraint(message.clone())
            }
        }
        _ => DbError::Sqlite(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let db = Database::open_in_memory().unwrap();

        let tables: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"appointments".to_string()));
        assert!(tables.contains(&"token_counters".to_string()));
        assert!(tables.contains(&"records".to_string()));
        assert!(tables.contains(&"hospitals".to_string()));
    }

    #[test]
    fn test_schema_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("petcare.db");
        drop(Database::open(&path).unwrap());
        assert!(Database::open(&path).is_ok());
    }
}
