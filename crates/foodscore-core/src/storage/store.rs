use crate::errors::ScoreError;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// Single-file SQLite database.
///
/// Holds only the path: every operation opens its own connection and closes
/// it on return, so no handle is shared between requests.
#[derive(Clone, Debug)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, ScoreError> {
        let store = Self {
            path: path.to_path_buf(),
        };
        // Fail at startup rather than on the first request if the file is unusable.
        store.connect()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn connect(&self) -> Result<Connection, ScoreError> {
        Ok(Connection::open(&self.path)?)
    }

    /// Idempotent; safe on every startup.
    pub fn init_schema(&self) -> Result<(), ScoreError> {
        let conn = self.connect()?;
        conn.execute_batch(crate::storage::schema::DDL)?;
        Ok(())
    }

    /// Number of cached rows, duplicates included.
    pub fn count(&self) -> Result<u64, ScoreError> {
        let conn = self.connect()?;
        let n: i64 = conn.query_row("SELECT count(*) FROM food_data", [], |r| r.get(0))?;
        Ok(n as u64)
    }
}
