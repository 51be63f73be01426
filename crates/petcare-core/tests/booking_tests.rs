//! Booking behaviour across connections and threads.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use chrono::NaiveDate;
use petcare_core::{
    AppointmentService, Database, DatabaseDirectory, DirectoryStorage, ObjectStorage, RecordLifecycle,
    PetService, ServiceError, Upload,
};
use petcare_fhir::appointment_mapper;
use serde_json::{json, Value};
use tempfile::TempDir;

const BASE: &str = "https://vet.example";

struct Clinic {
    dir: TempDir,
    pet_id: String,
}

impl Clinic {
    fn db_path(&self) -> std::path::PathBuf {
        self.dir.path().join("petcare.db")
    }

    fn storage(&self) -> Arc<dyn ObjectStorage> {
        Arc::new(DirectoryStorage::new(self.dir.path().join("files"), BASE).unwrap())
    }

    /// A service on its own connection, as a separate request handler would have.
    fn service(&self) -> AppointmentService {
        open_service(&self.db_path(), self.storage())
    }
}

fn open_service(db_path: &Path, storage: Arc<dyn ObjectStorage>) -> AppointmentService {
    let db = Database::open(db_path).unwrap().shared();
    let directory = Arc::new(DatabaseDirectory::new(db.clone()));
    AppointmentService::new(db, storage, directory, BASE)
}

fn setup_clinic() -> Clinic {
    let dir = TempDir::new().unwrap();
    let db = Database::open(dir.path().join("petcare.db")).unwrap();
    db.upsert_hospital("h1", "Green Valley").unwrap();

    let storage: Arc<dyn ObjectStorage> = Arc::new(DirectoryStorage::new(dir.path().join("files"), BASE).unwrap());
    let pets = PetService::pets(db.shared(), storage, BASE);
    let pet = pets
        .create(
            "owner-1",
            &json!({ "resourceType": "Patient", "name": [{ "text": "Bruno" }] }),
            &[],
        )
        .unwrap();

    Clinic {
        pet_id: pet["id"].as_str().unwrap().to_string(),
        dir,
    }
}

fn request(pet_id: &str, vet_id: &str, start: &str) -> Value {
    json!({
        "resourceType": "Appointment",
        "start": start,
        "reasonCode": [{ "text": "Checkup" }],
        "participant": [
            { "actor": { "reference": format!("Patient/{pet_id}") } },
            { "actor": { "reference": format!("Practitioner/{vet_id}") } },
            { "actor": { "reference": "Location/h1" } }
        ]
    })
}

fn token_of(doc: &Value) -> String {
    appointment_mapper()
        .to_internal(doc)
        .unwrap()
        .token_number
        .unwrap()
}

fn jan10() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()
}

// =========================================================================
// Slot conflicts
// =========================================================================

#[test]
fn test_sequential_double_booking_conflicts() {
    let clinic = setup_clinic();
    let service = clinic.service();

    service
        .book("owner-1", &request(&clinic.pet_id, "vet-1", "2025-01-10T10:00:00+05:30"), &[])
        .unwrap();
    let err = service
        .book("owner-1", &request(&clinic.pet_id, "vet-1", "2025-01-10T10:00:00+05:30"), &[])
        .unwrap_err();

    match err {
        ServiceError::SlotConflict {
            veterinarian_id,
            date,
            time_slot,
        } => {
            assert_eq!(veterinarian_id, "vet-1");
            assert_eq!(date, jan10());
            assert_eq!(time_slot, "10:00 AM");
        }
        other => panic!("expected SlotConflict, got {other:?}"),
    }
}

#[test]
fn test_concurrent_double_booking_succeeds_once() {
    let clinic = setup_clinic();
    const ATTEMPTS: usize = 8;

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..ATTEMPTS)
            .map(|i| {
                let clinic = &clinic;
                s.spawn(move || {
                    let service = clinic.service();
                    service.book(
                        &format!("caller-{i}"),
                        &request(&clinic.pet_id, "vet-1", "2025-01-10T10:00:00+05:30"),
                        &[],
                    )
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let booked = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(ServiceError::SlotConflict { .. })))
        .count();
    assert_eq!(booked, 1);
    assert_eq!(conflicts, ATTEMPTS - 1);
    assert_eq!(clinic.service().booked_slots("vet-1", jan10()).unwrap(), vec!["10:00 AM"]);
}

fn stored_files(clinic: &Clinic) -> usize {
    std::fs::read_dir(clinic.dir.path().join("files")).unwrap().count()
}

#[test]
fn test_pre_check_conflict_uploads_nothing() {
    let clinic = setup_clinic();
    let service = clinic.service();
    service
        .book("owner-1", &request(&clinic.pet_id, "vet-1", "2025-01-10T10:00:00+05:30"), &[])
        .unwrap();

    let upload = Upload::new("referral.pdf", "application/pdf", b"%PDF".to_vec());
    assert!(service
        .book("owner-1", &request(&clinic.pet_id, "vet-1", "2025-01-10T10:00:00+05:30"), &[upload])
        .is_err());
    assert_eq!(stored_files(&clinic), 0);
}

#[test]
fn test_failed_assembly_releases_uploaded_files() {
    let clinic = setup_clinic();
    let service = clinic.service();

    let uploads = vec![
        Upload::new("referral.pdf", "application/pdf", b"%PDF".to_vec()),
        Upload::new("xray.png", "image/png", vec![0x89, 0x50]),
    ];
    let err = service
        .book("owner-1", &request("ghost-pet", "vet-1", "2025-01-10T10:00:00+05:30"), &uploads)
        .unwrap_err();

    assert!(matches!(err, ServiceError::NotFound(_)));
    assert_eq!(stored_files(&clinic), 0);
    assert!(service.booked_slots("vet-1", jan10()).unwrap().is_empty());
}

#[test]
fn test_booking_with_documents() {
    let clinic = setup_clinic();
    let service = clinic.service();

    let booked = service
        .book(
            "owner-1",
            &request(&clinic.pet_id, "vet-1", "2025-01-10T10:00:00+05:30"),
            &[Upload::new("referral.pdf", "application/pdf", b"%PDF".to_vec())],
        )
        .unwrap();

    let record = appointment_mapper().to_internal(&booked).unwrap();
    assert_eq!(record.documents.len(), 1);
    assert_eq!(record.documents[0].original_name, "referral.pdf");
    assert!(record.documents[0].url.starts_with("https://vet.example/files/"));
    assert_eq!(stored_files(&clinic), 1);
}

// =========================================================================
// Tokens
// =========================================================================

#[test]
fn test_concurrent_token_issuance_is_distinct_and_consecutive() {
    let clinic = setup_clinic();
    const ISSUERS: i64 = 16;

    let mut issued: Vec<i64> = thread::scope(|s| {
        let handles: Vec<_> = (0..ISSUERS)
            .map(|_| {
                let path = clinic.db_path();
                s.spawn(move || {
                    let db = Database::open(path).unwrap();
                    db.next_token_counter("h1", jan10()).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    issued.sort_unstable();
    assert_eq!(issued, (1..=ISSUERS).collect::<Vec<_>>());
}

#[test]
fn test_concurrent_bookings_get_distinct_tokens() {
    let clinic = setup_clinic();
    const VETS: usize = 6;

    let tokens: Vec<String> = thread::scope(|s| {
        let handles: Vec<_> = (0..VETS)
            .map(|i| {
                let clinic = &clinic;
                s.spawn(move || {
                    let booked = clinic
                        .service()
                        .book(
                            "owner-1",
                            &request(&clinic.pet_id, &format!("vet-{i}"), "2025-01-10T10:00:00+05:30"),
                            &[],
                        )
                        .unwrap();
                    token_of(&booked)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let unique: HashSet<_> = tokens.iter().collect();
    assert_eq!(unique.len(), VETS);
    for n in 1..=VETS {
        assert!(tokens.contains(&format!("GV00{n}-2025-01-10")), "missing token {n} in {tokens:?}");
    }
}

#[test]
fn test_tokens_restart_each_day_and_survive_cancellation() {
    let clinic = setup_clinic();
    let service = clinic.service();

    let first = service
        .book("owner-1", &request(&clinic.pet_id, "vet-1", "2025-01-10T10:00:00+05:30"), &[])
        .unwrap();
    assert_eq!(token_of(&first), "GV001-2025-01-10");

    service.cancel(first["id"].as_str().unwrap()).unwrap();

    // The slot is free again, but token 1 is never reissued.
    let second = service
        .book("owner-1", &request(&clinic.pet_id, "vet-1", "2025-01-10T10:00:00+05:30"), &[])
        .unwrap();
    assert_eq!(token_of(&second), "GV002-2025-01-10");

    let next_day = service
        .book("owner-1", &request(&clinic.pet_id, "vet-1", "2025-01-11T10:00:00+05:30"), &[])
        .unwrap();
    assert_eq!(token_of(&next_day), "GV001-2025-01-11");
}

// =========================================================================
// Cancel / reschedule
// =========================================================================

#[test]
fn test_cancel_is_terminal() {
    let clinic = setup_clinic();
    let service = clinic.service();
    let booked = service
        .book("owner-1", &request(&clinic.pet_id, "vet-1", "2025-01-10T10:00:00+05:30"), &[])
        .unwrap();
    let id = booked["id"].as_str().unwrap();

    let cancelled = service.cancel(id).unwrap();
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(cancelled["participant"][0]["status"], "declined");

    assert!(matches!(service.cancel(id), Err(ServiceError::InvalidTransition { .. })));
    assert!(matches!(
        service.reschedule(id, jan10(), "11:00 AM"),
        Err(ServiceError::NotReschedulable(_))
    ));
}

#[test]
fn test_reschedule_keeps_token_and_checks_slot() {
    let clinic = setup_clinic();
    let service = clinic.service();
    let a = service
        .book("owner-1", &request(&clinic.pet_id, "vet-1", "2025-01-10T10:00:00+05:30"), &[])
        .unwrap();
    service
        .book("owner-1", &request(&clinic.pet_id, "vet-1", "2025-01-10T11:00:00+05:30"), &[])
        .unwrap();
    let id = a["id"].as_str().unwrap();

    assert!(matches!(
        service.reschedule(id, jan10(), "11:00 AM"),
        Err(ServiceError::SlotConflict { .. })
    ));

    // Moving onto its own slot is not a conflict.
    service.reschedule(id, jan10(), "10:00 AM").unwrap();

    let moved = service.reschedule(id, jan10(), "2:30 PM").unwrap();
    assert_eq!(moved["start"], "2025-01-10T14:30:00+05:30");
    assert_eq!(token_of(&moved), "GV001-2025-01-10");
    assert_eq!(
        service.booked_slots("vet-1", jan10()).unwrap(),
        vec!["11:00 AM", "2:30 PM"]
    );

    let candidates: Vec<String> = ["10:00 AM", "11:00 AM", "2:30 PM"].iter().map(|s| s.to_string()).collect();
    assert_eq!(
        service.available_slots("vet-1", jan10(), &candidates).unwrap(),
        vec!["10:00 AM"]
    );
}

#[test]
fn test_reschedule_onto_held_slot_leaves_original_untouched() {
    let clinic = setup_clinic();
    let service = clinic.service();
    let moving = service
        .book("owner-1", &request(&clinic.pet_id, "vet-1", "2025-01-10T10:00:00+05:30"), &[])
        .unwrap();
    service
        .book("owner-1", &request(&clinic.pet_id, "vet-1", "2025-01-11T15:00:00+05:30"), &[])
        .unwrap();
    let id = moving["id"].as_str().unwrap();
    let next_day = NaiveDate::from_ymd_opt(2025, 1, 11).unwrap();

    match service.reschedule(id, next_day, "03:00 pm").unwrap_err() {
        ServiceError::SlotConflict {
            veterinarian_id,
            date,
            time_slot,
        } => {
            assert_eq!(veterinarian_id, "vet-1");
            assert_eq!(date, next_day);
            assert_eq!(time_slot, "3:00 PM");
        }
        other => panic!("expected SlotConflict, got {other:?}"),
    }

    let stored = service.appointment(id).unwrap();
    assert_eq!(stored["start"], "2025-01-10T10:00:00+05:30");
    assert_eq!(token_of(&stored), token_of(&moving));
    assert_eq!(service.booked_slots("vet-1", jan10()).unwrap(), vec!["10:00 AM"]);
    assert_eq!(service.booked_slots("vet-1", next_day).unwrap(), vec!["3:00 PM"]);
}

#[test]
fn test_appointments_for_pet_bundle() {
    let clinic = setup_clinic();
    let service = clinic.service();
    for start in ["2025-01-10T10:00:00+05:30", "2025-01-12T09:30:00+05:30"] {
        service
            .book("owner-1", &request(&clinic.pet_id, "vet-1", start), &[])
            .unwrap();
    }

    let bundle = service.appointments_for_pet(&clinic.pet_id).unwrap();
    assert_eq!(bundle["resourceType"], "Bundle");
    assert_eq!(bundle["type"], "searchset");
    assert_eq!(bundle["total"], 2);
    assert_eq!(bundle["entry"][0]["resource"]["start"], "2025-01-12T09:30:00+05:30");

    let empty = service.appointments_for_pet("nobody").unwrap();
    assert_eq!(empty["total"], 0);
}
