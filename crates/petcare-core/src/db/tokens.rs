//! Per-hospital, per-day visit token counters.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use super::appointments::date_key;
use super::{Database, DbResult};

/// Atomically bump the counter for `(hospital_id, date)` and return the new value.
///
/// A single `INSERT … ON CONFLICT DO UPDATE … RETURNING` statement, so two
/// connections can never read the same value. The first call for a new day
/// returns 1.
pub fn increment_token_counter(conn: &Connection, hospital_id: &str, date: NaiveDate) -> DbResult<i64> {
    let value = conn.query_row(
        r#"
        INSERT INTO token_counters (hospital_id, counter_date, last_value)
        VALUES (?1, ?2, 1)
        ON CONFLICT (hospital_id, counter_date)
        DO UPDATE SET last_value = last_value + 1
        RETURNING last_value
        "#,
        params![hospital_id, date_key(date)],
        |row| row.get(0),
    )?;
    Ok(value)
}

impl Database {
    /// Issue the next counter value for a hospital and day.
    pub fn next_token_counter(&self, hospital_id: &str, date: NaiveDate) -> DbResult<i64> {
        increment_token_counter(&self.conn, hospital_id, date)
    }

    /// Last counter value issued, if any.
    pub fn current_token_counter(&self, hospital_id: &str, date: NaiveDate) -> DbResult<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT last_value FROM token_counters WHERE hospital_id = ?1 AND counter_date = ?2",
                params![hospital_id, date_key(date)],
                |row| row.get(0),
            )
            .optional()?)
    }
}
