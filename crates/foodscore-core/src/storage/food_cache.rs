use crate::errors::ScoreError;
use crate::model::{FoodFeatures, HealthScore, STORAGE_COLUMNS};
use crate::storage::Store;
use rusqlite::{OptionalExtension, ToSql};

/// `SELECT` matching every feature column exactly, oldest row first.
fn lookup_sql() -> String {
    let predicate: Vec<String> = STORAGE_COLUMNS
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{col} = ?{}", i + 1))
        .collect();
    format!(
        "SELECT health_score FROM food_data WHERE {} ORDER BY id LIMIT 1",
        predicate.join(" AND ")
    )
}

fn insert_sql() -> String {
    let placeholders: Vec<String> = (1..=STORAGE_COLUMNS.len() + 1)
        .map(|i| format!("?{i}"))
        .collect();
    format!(
        "INSERT INTO food_data({}, health_score) VALUES ({})",
        STORAGE_COLUMNS.join(", "),
        placeholders.join(", ")
    )
}

/// Exact-match result cache keyed by the seven feature values.
///
/// There is no uniqueness constraint on the tuple: two racing misses for the
/// same features both insert, and `lookup` returns the oldest row.
#[derive(Clone, Debug)]
pub struct FoodCache {
    store: Store,
}

impl FoodCache {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// `Ok(None)` means the query ran and matched nothing. Connection and
    /// query failures surface as `Err`.
    pub fn lookup(&self, f: &FoodFeatures) -> Result<Option<HealthScore>, ScoreError> {
        let conn = self.store.connect()?;
        let mut stmt = conn.prepare(&lookup_sql())?;
        let stored: Option<i64> = stmt
            .query_row(rusqlite::params_from_iter(f.as_array()), |row| row.get(0))
            .optional()?;
        Ok(stored.map(HealthScore::from_stored))
    }

    /// Appends one row and returns its id. Does not check for duplicates.
    pub fn insert(&self, f: &FoodFeatures, score: HealthScore) -> Result<i64, ScoreError> {
        let values = f.as_array();
        let score = score.as_i64();
        let mut params: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
        params.push(&score);

        let conn = self.store.connect()?;
        conn.execute(&insert_sql(), params.as_slice())?;
        Ok(conn.last_insert_rowid())
    }
}
