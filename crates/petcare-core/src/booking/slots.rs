//! Slot availability.

use chrono::NaiveDate;
use petcare_fhir::time::to_24_hour;
use rusqlite::Connection;

use crate::db::slot_taken;
use crate::error::ServiceResult;

/// Answers whether a veterinarian's slot is held by a live appointment.
///
/// Bound to a connection so the booking path can ask the same question again
/// inside its commit transaction.
pub struct SlotAvailability<'a> {
    conn: &'a Connection,
}

impl<'a> SlotAvailability<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// `time_slot` is a display time such as `"10:00 AM"`.
    pub fn is_booked(&self, veterinarian_id: &str, date: NaiveDate, time_slot: &str) -> ServiceResult<bool> {
        let time_24h = to_24_hour(time_slot)?;
        Ok(slot_taken(self.conn, veterinarian_id, date, &time_24h, None)?)
    }

    /// Same as [`is_booked`](Self::is_booked), ignoring one appointment.
    pub fn is_booked_by_other(
        &self,
        veterinarian_id: &str,
        date: NaiveDate,
        time_slot: &str,
        appointment_id: &str,
    ) -> ServiceResult<bool> {
        let time_24h = to_24_hour(time_slot)?;
        Ok(slot_taken(self.conn, veterinarian_id, date, &time_24h, Some(appointment_id))?)
    }

    /// The candidates (display times) that are still free.
    pub fn available(
        &self,
        veterinarian_id: &str,
        date: NaiveDate,
        candidates: &[String],
    ) -> ServiceResult<Vec<String>> {
        let mut free = Vec::new();
        for candidate in candidates {
            if !self.is_booked(veterinarian_id, date, candidate)? {
                free.push(candidate.clone());
            }
        }
        Ok(free)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{insert_appointment, Database};
    use crate::error::ServiceError;
    use petcare_fhir::AppointmentRecord;

    fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let mut record = AppointmentRecord::new("pet-1", "vet-1", "h1", date, "10:00 AM");
        record.id = Some("a1".into());
        record.time_24h = Some("10:00".into());
        record.token_number = Some("GV001-2025-01-10".into());
        insert_appointment(db.conn(), &record, 1).unwrap();
        db
    }

    #[test]
    fn test_is_booked_normalizes_display_time() {
        let db = setup_db();
        let slots = SlotAvailability::new(db.conn());
        let date = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();

        assert!(slots.is_booked("vet-1", date, "10:00 AM").unwrap());
        assert!(!slots.is_booked("vet-1", date, "10:00 PM").unwrap());
        assert!(!slots.is_booked("vet-2", date, "10:00 AM").unwrap());
        assert!(!slots.is_booked_by_other("vet-1", date, "10:00 AM", "a1").unwrap());
    }

    #[test]
    fn test_malformed_time_is_a_decode_error() {
        let db = setup_db();
        let slots = SlotAvailability::new(db.conn());
        let date = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        assert!(matches!(slots.is_booked("vet-1", date, "asdf"), Err(ServiceError::Decode(_))));
    }

    #[test]
    fn test_available_filters_booked() {
        let db = setup_db();
        let slots = SlotAvailability::new(db.conn());
        let date = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let candidates = vec!["9:30 AM".to_string(), "10:00 AM".to_string(), "10:30 AM".to_string()];

        assert_eq!(
            slots.available("vet-1", date, &candidates).unwrap(),
            vec!["9:30 AM".to_string(), "10:30 AM".to_string()]
        );
    }
}
