//! Visit token issuance.

use chrono::NaiveDate;
use rusqlite::Connection;
use tracing::debug;

use crate::db::{increment_token_counter, DbResult};

/// Issues per-(hospital, day) counters on a connection, typically one inside
/// the booking transaction.
pub struct TokenIssuer<'a> {
    conn: &'a Connection,
}

impl<'a> TokenIssuer<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Next counter for `(hospital_id, date)`, starting at 1 each day.
    ///
    /// The increment belongs to the caller's transaction: a rollback returns
    /// the value, a cancelled booking keeps it.
    pub fn next_token(&self, hospital_id: &str, date: NaiveDate) -> DbResult<i64> {
        let counter = increment_token_counter(self.conn, hospital_id, date)?;
        debug!(hospital_id, %date, counter, "issued token counter");
        Ok(counter)
    }
}

/// First letter of each word of the hospital name, upper-cased.
pub fn hospital_initials(hospital_name: &str) -> String {
    let initials: String = hospital_name
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .collect();

    if initials.is_empty() {
        "XX".to_string()
    } else {
        initials
    }
}

/// `{initials}00{counter}-{YYYY-MM-DD}`, e.g. `GVPH001-2025-01-10`.
pub fn format_token(hospital_name: &str, counter: i64, date: NaiveDate) -> String {
    format!(
        "{}00{}-{}",
        hospital_initials(hospital_name),
        counter,
        date.format("%Y-%m-%d")
    )
}
