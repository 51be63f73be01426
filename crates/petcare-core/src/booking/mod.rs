//! Appointment booking and the appointment state machine.
//!
//! # Booking protocol
//!
//! ```text
//!  Appointment JSON ─► decode ─► availability pre-check ──(booked)──► SlotConflict
//!                                      │
//!        ┌──────────────┬──────────────┼───────────────┐   (in parallel)
//!        ▼              ▼              ▼               ▼
//!   24-hour time   pet + owner    upload files   hospital name
//!        └──────────────┴──────────────┼───────────────┘
//!                                      ▼
//!                 IMMEDIATE transaction: re-check slot,
//!                 draw token, insert (slot index backs the check)
//!                                      │
//!                                      ▼
//!                           encoded Appointment JSON
//! ```
//!
//! The token counter is incremented inside the same transaction as the
//! insert, so a booking that fails to commit rolls its increment back and
//! leaves no gap. A cancelled booking keeps its token.

mod slots;
mod token;

pub use slots::SlotAvailability;
pub use token::{format_token, hospital_initials, TokenIssuer};

use std::sync::Arc;
use std::thread::{self, ScopedJoinHandle};

use chrono::{NaiveDate, Utc};
use petcare_fhir::mappers::{appointment_mapper, AppointmentMapper};
use petcare_fhir::time::{day_of_week, parse_24_hour, to_12_hour, to_24_hour};
use petcare_fhir::wire::Appointment;
use petcare_fhir::{AppointmentRecord, AppointmentStatus, Bundle, BundleKind, FileRef};
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::{find_appointment, insert_appointment, save_appointment, Database, DbError, SharedDatabase};
use crate::directory::{Directory, PetIdentity};
use crate::error::{ServiceError, ServiceResult};
use crate::storage::{release_files, upload_all, ObjectStorage, Upload};

/// Books, moves and advances appointments.
pub struct AppointmentService {
    db: SharedDatabase,
    storage: Arc<dyn ObjectStorage>,
    directory: Arc<dyn Directory>,
    mapper: AppointmentMapper,
    base_url: String,
}

/// What the parallel assembly step produced.
struct Assembled {
    time_24h: String,
    identity: PetIdentity,
    hospital_name: Option<String>,
}

fn joined<T>(handle: ScopedJoinHandle<'_, ServiceResult<T>>) -> ServiceResult<T> {
    handle.join().unwrap_or_else(|_| {
        error!("booking worker panicked");
        Err(ServiceError::Internal)
    })
}

fn slot_conflict(record: &AppointmentRecord) -> ServiceError {
    ServiceError::SlotConflict {
        veterinarian_id: record.veterinarian_id.clone(),
        date: record.date,
        time_slot: record.time_slot.clone(),
    }
}

fn fill_record(record: &mut AppointmentRecord, caller_id: &str, assembled: Assembled, uploaded: &[FileRef]) {
    let Assembled {
        time_24h,
        identity,
        hospital_name,
    } = assembled;

    record.id = Some(Uuid::new_v4().to_string());
    record.owner_id = identity.owner_id.or_else(|| Some(caller_id.to_string()));
    record.pet_name = Some(identity.name);
    record.pet_species = identity.species.or(record.pet_species.take());
    record.hospital_name = hospital_name.or(record.hospital_name.take());
    record.time_24h = Some(time_24h);
    record.day_of_week = Some(day_of_week(record.date).to_string());
    record.status = AppointmentStatus::Pending;
    record.documents.extend_from_slice(uploaded);
    record.created = Some(Utc::now());
}

impl AppointmentService {
    pub fn new(
        db: SharedDatabase,
        storage: Arc<dyn ObjectStorage>,
        directory: Arc<dyn Directory>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            db,
            storage,
            directory,
            mapper: appointment_mapper(),
            base_url: base_url.into(),
        }
    }

    fn encode(&self, record: &AppointmentRecord) -> ServiceResult<Value> {
        Ok(self.mapper.to_document(record, &self.base_url)?)
    }

    // =========================================================================
    // Booking
    // =========================================================================

    /// Book an appointment from an inbound FHIR Appointment.
    ///
    /// Returns the persisted appointment, encoded. A held slot fails with
    /// [`ServiceError::SlotConflict`] whether it is caught by the pre-check or
    /// by the slot index at commit.
    pub fn book(&self, caller_id: &str, document: &Value, uploads: &[Upload]) -> ServiceResult<Value> {
        let mut record = self.mapper.to_internal(document)?;
        info!(
            pet_id = %record.pet_id,
            veterinarian_id = %record.veterinarian_id,
            date = %record.date,
            time_slot = %record.time_slot,
            "Booking appointment"
        );

        {
            let db = self.db.lock()?;
            let slots = SlotAvailability::new(db.conn());
            if slots.is_booked(&record.veterinarian_id, record.date, &record.time_slot)? {
                warn!(
                    veterinarian_id = %record.veterinarian_id,
                    date = %record.date,
                    time_slot = %record.time_slot,
                    "slot already booked"
                );
                return Err(slot_conflict(&record));
            }
        }

        let (assembled, uploaded) = self.assemble(&record, uploads)?;
        fill_record(&mut record, caller_id, assembled, &uploaded);

        let committed = {
            let mut db = self.db.lock()?;
            self.commit_new(&mut db, record)
        };
        let record = match committed {
            Ok(record) => record,
            Err(e) => {
                if matches!(e, ServiceError::SlotConflict { .. }) {
                    warn!("slot taken while booking was in flight");
                }
                release_files(self.storage.as_ref(), &uploaded);
                return Err(e);
            }
        };

        info!(
            appointment_id = record.id.as_deref().unwrap_or_default(),
            token = record.token_number.as_deref().unwrap_or_default(),
            "Appointment booked"
        );
        self.encode(&record)
    }

    /// Normalize time, resolve identity, upload files and resolve the hospital
    /// name in parallel. Uploaded files are released if any other step fails.
    fn assemble(
        &self,
        record: &AppointmentRecord,
        uploads: &[Upload],
    ) -> ServiceResult<(Assembled, Vec<FileRef>)> {
        let (time_24h, identity, uploaded, hospital_name) = thread::scope(|s| {
            let time = s.spawn(|| to_24_hour(&record.time_slot).map_err(ServiceError::from));
            let pet = s.spawn(|| self.directory.resolve_pet(&record.pet_id));
            let files = s.spawn(|| upload_all(self.storage.as_ref(), uploads).map_err(ServiceError::from));
            let hospital = s.spawn(|| self.directory.hospital_name(&record.hospital_id));
            (joined(time), joined(pet), joined(files), joined(hospital))
        });

        let uploaded = uploaded?;
        let assembled = time_24h.and_then(|time_24h| {
            Ok(Assembled {
                time_24h,
                identity: identity?,
                hospital_name: hospital_name?,
            })
        });

        match assembled {
            Ok(assembled) => Ok((assembled, uploaded)),
            Err(e) => {
                release_files(self.storage.as_ref(), &uploaded);
                Err(e)
            }
        }
    }

    /// Re-check the slot, draw the token and insert, in one IMMEDIATE transaction.
    fn commit_new(&self, db: &mut Database, mut record: AppointmentRecord) -> ServiceResult<AppointmentRecord> {
        let tx = db.immediate_transaction()?;

        if SlotAvailability::new(&tx).is_booked(&record.veterinarian_id, record.date, &record.time_slot)? {
            return Err(slot_conflict(&record));
        }

        let counter = TokenIssuer::new(&tx).next_token(&record.hospital_id, record.date)?;
        let hospital_name = record.hospital_name.as_deref().unwrap_or_default();
        record.token_number = Some(format_token(hospital_name, counter, record.date));

        insert_appointment(&tx, &record, counter).map_err(|e| {
            ServiceError::from_slot_write(e, &record.veterinarian_id, record.date, &record.time_slot)
        })?;
        tx.commit().map_err(DbError::from)?;
        Ok(record)
    }

    // =========================================================================
    // State machine
    // =========================================================================

    /// Move an appointment to `to`, enforcing the state machine.
    pub fn transition(&self, id: &str, to: AppointmentStatus) -> ServiceResult<Value> {
        let record = {
            let mut db = self.db.lock()?;
            let tx = db.immediate_transaction()?;
            let mut record = find_appointment(&tx, id)?
                .ok_or_else(|| ServiceError::NotFound(format!("appointment {id}")))?;

            let from = record.status;
            if !from.can_transition_to(to) {
                warn!(appointment_id = id, from = from.as_str(), to = to.as_str(), "rejected transition");
                return Err(ServiceError::InvalidTransition { from, to });
            }

            record.status = to;
            save_appointment(&tx, &record)?;
            tx.commit().map_err(DbError::from)?;
            info!(appointment_id = id, from = from.as_str(), to = to.as_str(), "Appointment status changed");
            record
        };
        self.encode(&record)
    }

    /// Cancel an appointment. The slot becomes bookable again; the token is
    /// never reissued.
    pub fn cancel(&self, id: &str) -> ServiceResult<Value> {
        self.transition(id, AppointmentStatus::Cancelled)
    }

    /// Move a pending or accepted appointment to another slot. The token is kept.
    pub fn reschedule(&self, id: &str, date: NaiveDate, time_slot: &str) -> ServiceResult<Value> {
        let time_24h = to_24_hour(time_slot)?;
        let slot_display = to_12_hour(parse_24_hour(&time_24h)?);

        let record = {
            let mut db = self.db.lock()?;
            let tx = db.immediate_transaction()?;
            let mut record = find_appointment(&tx, id)?
                .ok_or_else(|| ServiceError::NotFound(format!("appointment {id}")))?;

            if !record.status.is_reschedulable() {
                return Err(ServiceError::NotReschedulable(record.status));
            }

            if SlotAvailability::new(&tx).is_booked_by_other(&record.veterinarian_id, date, &slot_display, id)? {
                warn!(appointment_id = id, %date, time_slot = %slot_display, "reschedule target already booked");
                return Err(ServiceError::SlotConflict {
                    veterinarian_id: record.veterinarian_id,
                    date,
                    time_slot: slot_display,
                });
            }

            record.date = date;
            record.time_slot = slot_display;
            record.time_24h = Some(time_24h);
            record.day_of_week = Some(day_of_week(date).to_string());

            save_appointment(&tx, &record).map_err(|e| {
                ServiceError::from_slot_write(e, &record.veterinarian_id, record.date, &record.time_slot)
            })?;
            tx.commit().map_err(DbError::from)?;
            info!(appointment_id = id, %date, time_slot = %record.time_slot, "Appointment rescheduled");
            record
        };
        self.encode(&record)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Display times held by live appointments, earliest first.
    pub fn booked_slots(&self, veterinarian_id: &str, date: NaiveDate) -> ServiceResult<Vec<String>> {
        let held = self.db.lock()?.booked_time_slots(veterinarian_id, date)?;
        held.iter()
            .map(|t| -> ServiceResult<String> { Ok(to_12_hour(parse_24_hour(t)?)) })
            .collect()
    }

    /// The candidate display times that are still free.
    pub fn available_slots(
        &self,
        veterinarian_id: &str,
        date: NaiveDate,
        candidates: &[String],
    ) -> ServiceResult<Vec<String>> {
        let db = self.db.lock()?;
        SlotAvailability::new(db.conn()).available(veterinarian_id, date, candidates)
    }

    /// One appointment, encoded.
    pub fn appointment(&self, id: &str) -> ServiceResult<Value> {
        let record = self
            .db
            .lock()?
            .get_appointment(id)?
            .ok_or_else(|| ServiceError::NotFound(format!("appointment {id}")))?;
        self.encode(&record)
    }

    /// Every appointment for a pet, most recent first, as a searchset Bundle.
    pub fn appointments_for_pet(&self, pet_id: &str) -> ServiceResult<Value> {
        let records = self.db.lock()?.list_appointments_for_pet(pet_id)?;
        let resources: Vec<Appointment> = records
            .iter()
            .map(|r| self.mapper.to_external(r, &self.base_url))
            .collect();
        Ok(serde_json::to_value(Bundle::wrap(resources, BundleKind::Searchset))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{RecordEntry, RecordKind};
    use crate::directory::DatabaseDirectory;
    use crate::storage::DirectoryStorage;
    use petcare_fhir::PetProfile;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (TempDir, AppointmentService) {
        let dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        db.upsert_hospital("h1", "Green Valley").unwrap();

        let mut pet = PetProfile::new("Bruno");
        pet.species = Some("Dog".into());
        db.insert_record(&RecordEntry {
            id: "pet-1".into(),
            kind: RecordKind::Pet,
            owner_id: Some("owner-1".into()),
            pet_id: Some("pet-1".into()),
            body: serde_json::to_string(&pet).unwrap(),
        })
        .unwrap();

        let db = db.shared();
        let storage = Arc::new(DirectoryStorage::new(dir.path(), "https://vet.example").unwrap());
        let directory = Arc::new(DatabaseDirectory::new(db.clone()));
        let service = AppointmentService::new(db, storage, directory, "https://vet.example");
        (dir, service)
    }

    fn request(start: &str) -> Value {
        json!({
            "resourceType": "Appointment",
            "status": "proposed",
            "start": start,
            "reasonCode": [{ "text": "Checkup" }],
            "participant": [
                { "actor": { "reference": "Patient/pet-1" } },
                { "actor": { "reference": "Practitioner/vet-1" } },
                { "actor": { "reference": "Location/h1" } }
            ]
        })
    }

    #[test]
    fn test_book_assigns_token_and_identity() {
        let (_dir, service) = setup();
        let booked = service
            .book("caller-1", &request("2025-01-10T10:00:00+05:30"), &[])
            .unwrap();

        assert_eq!(booked["status"], "pending");
        let record = service.mapper.to_internal(&booked).unwrap();
        assert_eq!(record.token_number.as_deref(), Some("GV001-2025-01-10"));
        assert_eq!(record.owner_id.as_deref(), Some("owner-1"));
        assert_eq!(record.pet_name.as_deref(), Some("Bruno"));
        assert_eq!(record.hospital_name.as_deref(), Some("Green Valley"));
        assert!(record.id.is_some());
        assert!(record.created.is_some());
    }

    #[test]
    fn test_second_booking_conflicts() {
        let (_dir, service) = setup();
        service.book("caller-1", &request("2025-01-10T10:00:00+05:30"), &[]).unwrap();

        let err = service
            .book("caller-2", &request("2025-01-10T10:00:00+05:30"), &[])
            .unwrap_err();
        assert!(matches!(err, ServiceError::SlotConflict { ref time_slot, .. } if time_slot == "10:00 AM"));
        assert_eq!(service.booked_slots("vet-1", NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()).unwrap(), vec!["10:00 AM"]);
    }

    #[test]
    fn test_unknown_pet_books_nothing() {
        let (_dir, service) = setup();
        let mut doc = request("2025-01-10T10:00:00+05:30");
        doc["participant"][0]["actor"]["reference"] = json!("Patient/ghost");

        assert!(matches!(service.book("caller-1", &doc, &[]), Err(ServiceError::NotFound(_))));
        let date = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        assert!(service.booked_slots("vet-1", date).unwrap().is_empty());
    }

    #[test]
    fn test_transition_rules() {
        let (_dir, service) = setup();
        let booked = service.book("caller-1", &request("2025-01-10T10:00:00+05:30"), &[]).unwrap();
        let id = booked["id"].as_str().unwrap().to_string();

        let err = service.transition(&id, AppointmentStatus::Fulfilled).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidTransition { from: AppointmentStatus::Pending, to: AppointmentStatus::Fulfilled }
        ));

        let accepted = service.transition(&id, AppointmentStatus::Accepted).unwrap();
        assert_eq!(accepted["status"], "booked");

        assert!(matches!(
            service.transition("missing", AppointmentStatus::Accepted),
            Err(ServiceError::NotFound(_))
        ));
    }
}
