//! Service-level errors.
//!
//! Decode failures and slot conflicts reach the caller with full detail.
//! Storage-layer failures are logged here and surfaced as [`ServiceError::Internal`]
//! so no table names or SQL leak out.

use chrono::NaiveDate;
use petcare_fhir::{AppointmentStatus, FhirError};
use thiserror::Error;

use crate::db::DbError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Decode(#[from] FhirError),

    #[error("slot {date} {time_slot} is already booked for veterinarian {veterinarian_id}")]
    SlotConflict {
        veterinarian_id: String,
        date: NaiveDate,
        time_slot: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("cannot move appointment from {} to {}", .from.as_str(), .to.as_str())]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("appointment in status {} cannot be rescheduled", .0.as_str())]
    NotReschedulable(AppointmentStatus),

    #[error("attachment storage failed: {0}")]
    Storage(String),

    #[error("internal server error")]
    Internal,
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<DbError> for ServiceError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => ServiceError::NotFound(what),
            other => {
                tracing::error!(error = %other, "storage failure");
                ServiceError::Internal
            }
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(e: StorageError) -> Self {
        ServiceError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        tracing::error!(error = %e, "stored record failed to (de)serialize");
        ServiceError::Internal
    }
}

impl<T> From<std::sync::PoisonError<T>> for ServiceError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        tracing::error!("database lock poisoned: {}", e);
        ServiceError::Internal
    }
}

impl ServiceError {
    /// Translate a slot-index violation for `(veterinarian_id, date, time_slot)`.
    pub(crate) fn from_slot_write(
        e: DbError,
        veterinarian_id: &str,
        date: NaiveDate,
        time_slot: &str,
    ) -> Self {
        match e {
            DbError::SlotTaken => ServiceError::SlotConflict {
                veterinarian_id: veterinarian_id.to_string(),
                date,
                time_slot: time_slot.to_string(),
            },
            other => other.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_hides_storage_detail() {
        let err: ServiceError = DbError::Constraint("UNIQUE constraint failed: records.id".into()).into();
        assert!(matches!(err, ServiceError::Internal));
        assert_eq!(err.to_string(), "internal server error");
    }

    #[test]
    fn test_slot_taken_becomes_conflict() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let err = ServiceError::from_slot_write(DbError::SlotTaken, "vet-1", date, "10:00 AM");
        assert!(matches!(err, ServiceError::SlotConflict { ref veterinarian_id, .. } if veterinarian_id == "vet-1"));
    }

    #[test]
    fn test_decode_error_keeps_detail() {
        let err: ServiceError = FhirError::MissingRequiredField("type.text".into()).into();
        assert_eq!(err.to_string(), "missing required field: type.text");
    }
}
