//! Round-trip property tests for every domain mapper.
//!
//! For any valid record `r`, decoding the encoded resource reproduces `r`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use proptest::option;
use proptest::prelude::*;

use petcare_fhir::time::{day_of_week, to_12_hour};
use petcare_fhir::{
    appointment_mapper, diabetes_mapper, immunization_mapper, medical_document_mapper,
    pet_mapper, AppointmentRecord, AppointmentStatus, DiabetesObservation, FileRef,
    ImmunizationRecord, MedicalDocumentRecord, PetProfile,
};

const BASE: &str = "https://vet.example";

// ============================================================================
// Strategies
// ============================================================================

fn text() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 ]{0,14}[A-Za-z0-9]"
}

/// Free text as typed: may be empty, padded, or contain " - ".
fn free_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[ ]{0,2}[A-Za-z0-9 -]{0,16}[ ]{0,2}",
        ("[A-Za-z]{1,8}", "[A-Za-z ]{0,8}").prop_map(|(a, b)| format!("{a} - {b}")),
    ]
}

fn ident() -> impl Strategy<Value = String> {
    "[a-z0-9]{1,12}"
}

fn date() -> impl Strategy<Value = NaiveDate> {
    (2000i32..2035, 1u32..=12, 1u32..=28)
        .prop_filter_map("valid date", |(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
}

fn clock() -> impl Strategy<Value = NaiveTime> {
    (0u32..24, 0u32..60).prop_filter_map("valid time", |(h, m)| NaiveTime::from_hms_opt(h, m, 0))
}

fn instant() -> impl Strategy<Value = DateTime<Utc>> {
    (946_684_800i64..2_000_000_000)
        .prop_filter_map("valid timestamp", |secs| Utc.timestamp_opt(secs, 0).single())
}

fn file() -> impl Strategy<Value = FileRef> {
    ("[a-z]{1,10}", prop_oneof![Just("image/jpeg"), Just("application/pdf")]).prop_map(
        |(stem, mime)| {
            let ext = if mime == "image/jpeg" { "jpg" } else { "pdf" };
            FileRef::new(
                format!("https://files.example/{stem}.{ext}"),
                format!("{stem}.{ext}"),
                mime,
            )
        },
    )
}

fn files() -> impl Strategy<Value = Vec<FileRef>> {
    proptest::collection::vec(file(), 0..4)
}

fn measurement() -> impl Strategy<Value = f64> {
    (0u32..6000).prop_map(|v| f64::from(v) / 10.0)
}

fn status() -> impl Strategy<Value = AppointmentStatus> {
    prop_oneof![
        Just(AppointmentStatus::Pending),
        Just(AppointmentStatus::Accepted),
        Just(AppointmentStatus::CheckedIn),
        Just(AppointmentStatus::InProgress),
        Just(AppointmentStatus::Fulfilled),
        Just(AppointmentStatus::Cancelled),
    ]
}

fn pet() -> impl Strategy<Value = PetProfile> {
    let identity = (
        option::of(ident()),
        option::of(ident()),
        text(),
        option::of(text()),
        option::of(text()),
        option::of(prop_oneof![Just("Male"), Just("Female"), Just("Unknown")]),
        option::of(date()),
        any::<bool>(),
        option::of(instant()),
    );
    let details = (
        option::of(text()),
        option::of(text()),
        option::of(text()),
        option::of(any::<bool>()),
        option::of(text()),
        option::of(ident()),
        option::of(ident()),
        option::of(text()),
        option::of(ident()),
        option::of(text()),
        files(),
    );

    (identity, details).prop_map(
        |(
            (id, owner_id, name, species, breed, gender, birth_date, active, last_updated),
            (weight, color, blood_group, neutered, age_when_neutered, microchip, passport, company, policy, origin, images),
        )| {
            let mut pet = PetProfile::new(name);
            pet.id = id;
            pet.owner_id = owner_id;
            pet.species = species;
            pet.breed = breed;
            pet.gender = gender.map(str::to_string);
            pet.birth_date = birth_date;
            pet.active = active;
            pet.last_updated = last_updated;
            pet.weight = weight;
            pet.color = color;
            pet.blood_group = blood_group;
            pet.neutered = neutered;
            pet.age_when_neutered = age_when_neutered;
            pet.microchip_number = microchip;
            pet.passport_number = passport;
            pet.insurance_company = company;
            pet.policy_number = policy;
            pet.origin = origin;
            pet.images = images;
            pet
        },
    )
}

fn appointment() -> impl Strategy<Value = AppointmentRecord> {
    let slot = (ident(), ident(), ident(), date(), clock(), status());
    let details = (
        option::of(ident()),
        option::of(ident()),
        option::of(text()),
        option::of(text()),
        option::of(text()),
        option::of(free_text()),
        option::of(free_text()),
        option::of(free_text().prop_filter("an empty concern decodes as none", |c| !c.is_empty())),
        option::of(ident()),
        option::of(text()),
        option::of(instant()),
        files(),
    );

    (slot, details).prop_map(
        |(
            (pet_id, vet_id, hospital_id, date, time, status),
            (id, owner_id, pet_name, pet_species, hospital_name, department, purpose, concern, slot_id, source, created, documents),
        )| {
            let mut record = AppointmentRecord::new(pet_id, vet_id, hospital_id, date, to_12_hour(time));
            record.time_24h = Some(time.format("%H:%M").to_string());
            record.day_of_week = Some(day_of_week(date).to_string());
            record.status = status;
            record.id = id;
            record.owner_id = owner_id;
            record.pet_name = pet_name;
            record.pet_species = pet_species;
            record.hospital_name = hospital_name;
            record.department = department;
            record.purpose = purpose;
            record.concern = concern;
            record.slot_id = slot_id;
            record.source = source;
            record.token_number = Some(format!("GV001-{}", date.format("%Y-%m-%d")));
            record.created = created;
            record.documents = documents;
            record
        },
    )
}

fn diabetes() -> impl Strategy<Value = DiabetesObservation> {
    let identity = (
        ident(),
        option::of(ident()),
        option::of(ident()),
        option::of(ident()),
        option::of((date(), clock()).prop_map(|(d, t)| NaiveDateTime::new(d, t))),
        files(),
    );
    let values = (
        option::of(free_text()),
        option::of(free_text()),
        option::of(free_text()),
        option::of(free_text()),
        option::of(free_text()),
        option::of(measurement()),
        option::of(free_text()),
        option::of(free_text()),
        option::of(measurement()),
    );

    (identity, values).prop_map(
        |(
            (pet_id, id, vet_id, appointment_id, recorded_at, images),
            (water, food, activity, urination, illness, glucose, urine_glucose, ketones, weight),
        )| DiabetesObservation {
            id,
            pet_id,
            vet_id,
            appointment_id,
            recorded_at,
            water_intake: water,
            food_intake: food,
            activity_level: activity,
            urination,
            illness_signs: illness,
            blood_glucose: glucose,
            urine_glucose,
            urine_ketones: ketones,
            weight,
            body_condition_images: images,
        },
    )
}

fn immunization() -> impl Strategy<Value = ImmunizationRecord> {
    (
        (ident(), text(), option::of(ident()), option::of(ident())),
        (option::of(text()), option::of(text())),
        (option::of(date()), option::of(0i64..800), option::of(date())),
        (option::of(ident()), option::of(text()), any::<bool>(), files()),
    )
        .prop_map(
            |(
                (pet_id, vaccine_name, id, vaccine_code),
                (lot_number, manufacturer),
                (vaccination_date, due_after_days, expiry_date),
                (hospital_id, hospital_name, reminder, images),
            )| {
                // Next-due never precedes the vaccination date
                let next_due_date = match (vaccination_date, due_after_days) {
                    (Some(given), Some(days)) => Some(given + chrono::Duration::days(days)),
                    (None, Some(days)) => NaiveDate::from_ymd_opt(2030, 1, 1)
                        .map(|d| d + chrono::Duration::days(days)),
                    _ => None,
                };
                ImmunizationRecord {
                    id,
                    pet_id,
                    vaccine_name,
                    vaccine_code,
                    lot_number,
                    manufacturer,
                    vaccination_date,
                    next_due_date,
                    expiry_date,
                    hospital_id,
                    hospital_name,
                    reminder,
                    images,
                }
            },
        )
}

fn medical_document() -> impl Strategy<Value = MedicalDocumentRecord> {
    (
        (ident(), text(), text(), option::of(ident()), option::of(ident())),
        (option::of(date()), option::of(0i64..800), any::<bool>(), any::<bool>()),
        files(),
    )
        .prop_map(
            |(
                (pet_id, document_type, title, id, owner_id),
                (issue_date, valid_days, has_expiry_date, is_read),
                attachments,
            )| {
                let expiry_date = match (issue_date, valid_days) {
                    (Some(issued), Some(days)) => Some(issued + chrono::Duration::days(days)),
                    _ => None,
                };
                MedicalDocumentRecord {
                    id,
                    owner_id,
                    pet_id,
                    document_type,
                    title,
                    issue_date,
                    expiry_date,
                    has_expiry_date,
                    is_read,
                    attachments,
                }
            },
        )
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn pet_round_trip(pet in pet()) {
        let mapper = pet_mapper();
        let doc = mapper.to_document(&pet, BASE).unwrap();
        prop_assert_eq!(mapper.to_internal(&doc).unwrap(), pet);
    }

    #[test]
    fn appointment_round_trip(record in appointment()) {
        let mapper = appointment_mapper();
        let doc = mapper.to_document(&record, BASE).unwrap();
        prop_assert_eq!(mapper.to_internal(&doc).unwrap(), record);
    }

    #[test]
    fn diabetes_round_trip(log in diabetes()) {
        let mapper = diabetes_mapper();
        let doc = mapper.to_document(&log, BASE).unwrap();
        prop_assert_eq!(mapper.to_internal(&doc).unwrap(), log);
    }

    #[test]
    fn immunization_round_trip(record in immunization()) {
        let mapper = immunization_mapper();
        let doc = mapper.to_document(&record, BASE).unwrap();
        prop_assert_eq!(mapper.to_internal(&doc).unwrap(), record);
    }

    #[test]
    fn medical_document_round_trip(record in medical_document()) {
        let mapper = medical_document_mapper();
        let doc = mapper.to_document(&record, BASE).unwrap();
        prop_assert_eq!(mapper.to_internal(&doc).unwrap(), record);
    }

    /// Text rendering goes through the same codec as the document form.
    #[test]
    fn render_then_parse(record in medical_document()) {
        let mapper = medical_document_mapper();
        let text = mapper.render(&record, BASE).unwrap();
        prop_assert_eq!(mapper.parse(&text).unwrap(), record);
    }
}

// ============================================================================
// All optional fields absent
// ============================================================================

#[test]
fn test_minimal_records_round_trip() {
    let pet = PetProfile::new("Mittens");
    let mapper = pet_mapper();
    assert_eq!(mapper.to_internal(&mapper.to_document(&pet, BASE).unwrap()).unwrap(), pet);

    let log = DiabetesObservation::new("pet-1");
    let mapper = diabetes_mapper();
    assert_eq!(mapper.to_internal(&mapper.to_document(&log, BASE).unwrap()).unwrap(), log);

    let shot = ImmunizationRecord::new("pet-1", "Rabies");
    let mapper = immunization_mapper();
    assert_eq!(mapper.to_internal(&mapper.to_document(&shot, BASE).unwrap()).unwrap(), shot);

    let doc = MedicalDocumentRecord::new("pet-1", "Lab Report", "CBC");
    let mapper = medical_document_mapper();
    assert_eq!(mapper.to_internal(&mapper.to_document(&doc, BASE).unwrap()).unwrap(), doc);

    let date = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
    let mut appt = AppointmentRecord::new("pet-1", "vet-1", "hosp-1", date, "10:00 AM");
    appt.time_24h = Some("10:00".into());
    appt.day_of_week = Some("Friday".into());
    let mapper = appointment_mapper();
    assert_eq!(mapper.to_internal(&mapper.to_document(&appt, BASE).unwrap()).unwrap(), appt);
}
