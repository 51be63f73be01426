//! Appointment database operations.
//!
//! The check and insert functions take a bare [`Connection`] so the booking
//! path can run them inside one immediate transaction.

use chrono::NaiveDate;
use petcare_fhir::{AppointmentRecord, AppointmentStatus};
use rusqlite::{params, Connection, OptionalExtension};

use super::{classify_constraint, Database, DbError, DbResult};

/// `YYYY-MM-DD` key used for every date column.
pub(crate) fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Whether a live (non-cancelled) appointment holds the slot.
///
/// `excluding` skips one appointment id, for rescheduling an appointment onto
/// a slot it already holds.
pub fn slot_taken(
    conn: &Connection,
    veterinarian_id: &str,
    date: NaiveDate,
    time_24h: &str,
    excluding: Option<&str>,
) -> DbResult<bool> {
    let count: i64 = conn.query_row(
        r#"
        SELECT COUNT(*) FROM appointments
        WHERE veterinarian_id = ?1
          AND appointment_date = ?2
          AND time_slot = ?3
          AND status <> 'cancelled'
          AND (?4 IS NULL OR id <> ?4)
        "#,
        params![veterinarian_id, date_key(date), time_24h, excluding],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn required<'a>(value: Option<&'a str>, what: &str) -> DbResult<&'a str> {
    value.ok_or_else(|| DbError::Constraint(format!("appointment has no {what}")))
}

/// Insert a new appointment holding `token_counter`.
///
/// Fails with [`DbError::SlotTaken`] when the slot index rejects the row.
pub fn insert_appointment(conn: &Connection, record: &AppointmentRecord, token_counter: i64) -> DbResult<()> {
    let id = required(record.id.as_deref(), "id")?;
    let time_24h = required(record.time_24h.as_deref(), "24-hour time")?;
    let token_number = required(record.token_number.as_deref(), "token number")?;
    let body = serde_json::to_string(record)?;

    conn.execute(
        r#"
        INSERT INTO appointments (
            id, owner_id, pet_id, hospital_id, veterinarian_id,
            appointment_date, time_slot, status, token_counter, token_number, body
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
        params![
            id,
            record.owner_id,
            record.pet_id,
            record.hospital_id,
            record.veterinarian_id,
            date_key(record.date),
            time_24h,
            record.status.as_str(),
            token_counter,
            token_number,
            body,
        ],
    )
    .map_err(classify_constraint)?;
    Ok(())
}

/// Overwrite the mutable columns of an existing appointment.
///
/// The token columns are never touched.
pub fn save_appointment(conn: &Connection, record: &AppointmentRecord) -> DbResult<bool> {
    let id = required(record.id.as_deref(), "id")?;
    let time_24h = required(record.time_24h.as_deref(), "24-hour time")?;
    let body = serde_json::to_string(record)?;

    let rows_affected = conn
        .execute(
            r#"
            UPDATE appointments SET
                appointment_date = ?2,
                time_slot = ?3,
                status = ?4,
                body = ?5,
                updated_at = datetime('now')
            WHERE id = ?1
            "#,
            params![id, date_key(record.date), time_24h, record.status.as_str(), body],
        )
        .map_err(classify_constraint)?;
    Ok(rows_affected > 0)
}

/// Load an appointment on an arbitrary connection.
pub fn find_appointment(conn: &Connection, id: &str) -> DbResult<Option<AppointmentRecord>> {
    conn.query_row(
        "SELECT status, body FROM appointments WHERE id = ?",
        [id],
        |row| {
            Ok(AppointmentRow {
                status: row.get(0)?,
                body: row.get(1)?,
            })
        },
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

impl Database {
    /// Whether a live appointment holds the slot.
    pub fn is_slot_booked(&self, veterinarian_id: &str, date: NaiveDate, time_24h: &str) -> DbResult<bool> {
        slot_taken(&self.conn, veterinarian_id, date, time_24h, None)
    }

    /// Get an appointment by ID.
    pub fn get_appointment(&self, id: &str) -> DbResult<Option<AppointmentRecord>> {
        find_appointment(&self.conn, id)
    }

    /// Update an existing appointment.
    pub fn update_appointment(&self, record: &AppointmentRecord) -> DbResult<bool> {
        save_appointment(&self.conn, record)
    }

    /// 24-hour times held by live appointments for a veterinarian on a day.
    pub fn booked_time_slots(&self, veterinarian_id: &str, date: NaiveDate) -> DbResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT time_slot FROM appointments
            WHERE veterinarian_id = ?1 AND appointment_date = ?2 AND status <> 'cancelled'
            ORDER BY time_slot
            "#,
        )?;
        let rows = stmt.query_map(params![veterinarian_id, date_key(date)], |row| row.get(0))?;

        let mut slots = Vec::new();
        for row in rows {
            slots.push(row?);
        }
        Ok(slots)
    }

    /// List all appointments for a pet, most recent first.
    pub fn list_appointments_for_pet(&self, pet_id: &str) -> DbResult<Vec<AppointmentRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT status, body FROM appointments
            WHERE pet_id = ?
            ORDER BY appointment_date DESC, time_slot DESC
            "#,
        )?;

        let rows = stmt.query_map([pet_id], |row| {
            Ok(AppointmentRow {
                status: row.get(0)?,
                body: row.get(1)?,
            })
        })?;

        let mut appointments = Vec::new();
        for row in rows {
            appointments.push(row?.try_into()?);
        }
        Ok(appointments)
    }
}

/// Intermediate row struct for database mapping.
struct AppointmentRow {
    status: String,
    body: String,
}

impl TryFrom<AppointmentRow> for AppointmentRecord {
    type Error = DbError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        let mut record: AppointmentRecord = serde_json::from_str(&row.body)?;
        record.status = string_to_status(&row.status)?;
        Ok(record)
    }
}

fn string_to_status(s: &str) -> Result<AppointmentStatus, DbError> {
    AppointmentStatus::parse(s)
        .ok_or_else(|| DbError::Constraint(format!("Unknown appointment status: {}", s)))
}
