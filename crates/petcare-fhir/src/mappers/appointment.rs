//! AppointmentRecord ⇄ Appointment.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};

use super::{contain_files, contained_files, non_empty};
use crate::extension::{ScalarExtension, UrlMatch};
use crate::mapper::ResourceMapper;
use crate::models::{AppointmentRecord, AppointmentStatus};
use crate::time::{day_of_week, parse_24_hour, to_12_hour, to_24_hour};
use crate::wire::{Appointment, AppointmentParticipant, CodeableConcept, Reference};
use crate::{practice_offset, FhirError, FhirResult, SLOT_MINUTES};

const CONCERN_SEPARATOR: &str = " - ";

pub type AppointmentMapper = ResourceMapper<AppointmentRecord, Appointment>;

/// Mapper for appointments.
///
/// `start` carries the scheduled date and time as a practice-local instant;
/// `participant[]` carries pet, veterinarian and hospital by reference prefix.
pub fn appointment_mapper() -> AppointmentMapper {
    ResourceMapper::builder(encode, decode)
        .extension(ScalarExtension::string(
            "ownerId",
            |a: &AppointmentRecord| a.owner_id.as_deref(),
            |a, v| a.owner_id = Some(v),
        ))
        .extension(
            ScalarExtension::string(
                "slotsId",
                |a: &AppointmentRecord| a.slot_id.as_deref(),
                |a, v| a.slot_id = Some(v),
            )
            .matching(UrlMatch::Contains),
        )
        .extension(ScalarExtension::string(
            "source",
            |a: &AppointmentRecord| a.source.as_deref(),
            |a, v| a.source = Some(v),
        ))
        .extension(ScalarExtension::string(
            "tokenNumber",
            |a: &AppointmentRecord| a.token_number.as_deref(),
            |a, v| a.token_number = Some(v),
        ))
        .extension(ScalarExtension::string(
            "petSpecies",
            |a: &AppointmentRecord| a.pet_species.as_deref(),
            |a, v| a.pet_species = Some(v),
        ))
        .build()
}

/// Practice-local wall-clock start of the appointment, if its display time parses.
fn local_start(record: &AppointmentRecord) -> Option<DateTime<chrono::FixedOffset>> {
    let time = to_24_hour(&record.time_slot).ok()?;
    let time = parse_24_hour(&time).ok()?;
    practice_offset()
        .from_local_datetime(&NaiveDateTime::new(record.date, time))
        .single()
}

fn participant(kind: &str, id: &str, display: Option<&str>, status: &str) -> AppointmentParticipant {
    let mut actor = Reference::to(kind, id);
    actor.display = display.map(str::to_string);
    AppointmentParticipant {
        actor: Some(actor),
        status: Some(status.to_string()),
    }
}

fn encode(record: &AppointmentRecord) -> Appointment {
    let start = local_start(record);
    let participant_status = if record.status == AppointmentStatus::Cancelled {
        "declined"
    } else {
        "accepted"
    };

    let description = match (&record.purpose, &record.concern) {
        (None, None) => None,
        (purpose, None) => purpose.clone(),
        (purpose, Some(concern)) => Some(format!(
            "{}{CONCERN_SEPARATOR}{concern}",
            purpose.as_deref().unwrap_or_default()
        )),
    };

    let (contained, supporting_information) = contain_files(&record.documents);

    Appointment {
        resource_type: "Appointment".to_string(),
        id: record.id.clone(),
        contained,
        status: Some(record.status.to_fhir().to_string()),
        service_type: record
            .department
            .as_deref()
            .map(CodeableConcept::text)
            .into_iter()
            .collect(),
        reason_code: record
            .purpose
            .as_deref()
            .map(CodeableConcept::text)
            .into_iter()
            .collect(),
        description,
        supporting_information,
        start: start.map(|s| s.to_rfc3339()),
        end: start.map(|s| (s + Duration::minutes(SLOT_MINUTES)).to_rfc3339()),
        created: record.created.map(|c| c.to_rfc3339()),
        participant: vec![
            participant("Patient", &record.pet_id, record.pet_name.as_deref(), participant_status),
            participant("Practitioner", &record.veterinarian_id, None, participant_status),
            participant(
                "Location",
                &record.hospital_id,
                record.hospital_name.as_deref(),
                participant_status,
            ),
        ],
        extension: Vec::new(),
    }
}

/// The participant whose actor references `kind`, with its id.
fn find_participant<'a>(
    participants: &'a [AppointmentParticipant],
    kind: &str,
) -> Option<(&'a str, Option<&'a str>)> {
    participants.iter().find_map(|p| {
        let actor = p.actor.as_ref()?;
        Some((actor.id_for(kind)?, actor.display.as_deref()))
    })
}

fn required_participant<'a>(
    participants: &'a [AppointmentParticipant],
    kind: &str,
) -> FhirResult<(&'a str, Option<&'a str>)> {
    find_participant(participants, kind).ok_or_else(|| {
        FhirError::MissingRequiredField(format!("participant[].actor.reference ({kind}/)"))
    })
}

/// The text after `"{purpose} - "`, as written. Without a purpose, a
/// description lacking that prefix is split at its first separator. Nothing
/// after the separator means no concern.
fn concern_from_description(description: &str, purpose: Option<&str>) -> Option<String> {
    let prefix = format!("{}{CONCERN_SEPARATOR}", purpose.unwrap_or_default());
    let concern = match description.strip_prefix(&prefix) {
        Some(concern) => Some(concern),
        None if purpose.is_none() => description
            .split_once(CONCERN_SEPARATOR)
            .map(|(_, concern)| concern),
        None => None,
    };
    concern.filter(|c| !c.is_empty()).map(str::to_string)
}

fn decode(appointment: Appointment) -> FhirResult<AppointmentRecord> {
    let raw_start = non_empty(appointment.start.as_deref())
        .ok_or_else(|| FhirError::MissingRequiredField("start".into()))?;
    let start = DateTime::parse_from_rfc3339(&raw_start)
        .map_err(|_| FhirError::InvalidDate {
            field: "start".into(),
            value: raw_start.clone(),
        })?
        .with_timezone(&practice_offset());

    let (pet_id, pet_name) = required_participant(&appointment.participant, "Patient")?;
    let (vet_id, _) = required_participant(&appointment.participant, "Practitioner")?;
    let (hospital_id, hospital_name) = required_participant(&appointment.participant, "Location")?;

    let date = start.date_naive();
    let time = start.time();
    let mut record = AppointmentRecord::new(pet_id, vet_id, hospital_id, date, to_12_hour(time));
    record.id = appointment.id;
    record.pet_name = non_empty(pet_name);
    record.hospital_name = non_empty(hospital_name);
    record.time_24h = Some(time.format("%H:%M").to_string());
    record.day_of_week = Some(day_of_week(date).to_string());

    record.status = match appointment.status.as_deref() {
        None => AppointmentStatus::Pending,
        Some(code) => AppointmentStatus::from_fhir(code).ok_or_else(|| {
            FhirError::MalformedInput(format!("unknown appointment status '{code}'"))
        })?,
    };

    record.department = appointment.service_type.first().and_then(|c| c.text.clone());
    record.purpose = appointment.reason_code.first().and_then(|c| c.text.clone());
    record.concern = appointment
        .description
        .as_deref()
        .and_then(|d| concern_from_description(d, record.purpose.as_deref()));

    if let Some(raw) = non_empty(appointment.created.as_deref()) {
        let created = DateTime::parse_from_rfc3339(&raw).map_err(|_| FhirError::InvalidDate {
            field: "created".into(),
            value: raw.clone(),
        })?;
        record.created = Some(created.with_timezone(&Utc));
    }

    record.documents = contained_files(&appointment.contained);
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileRef;
    use chrono::NaiveDate;
    use serde_json::json;

    const BASE: &str = "https://vet.example";

    fn booked() -> AppointmentRecord {
        let date = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let mut record = AppointmentRecord::new("pet-1", "vet-7", "hosp-3", date, "10:00 AM");
        record.id = Some("appt-1".into());
        record.owner_id = Some("owner-9".into());
        record.pet_name = Some("Bruno".into());
        record.pet_species = Some("Dog".into());
        record.hospital_name = Some("Green Valley Pet Hospital".into());
        record.department = Some("General Medicine".into());
        record.time_24h = Some("10:00".into());
        record.day_of_week = Some("Friday".into());
        record.purpose = Some("Vaccination".into());
        record.concern = Some("Mild cough since Monday".into());
        record.status = AppointmentStatus::Accepted;
        record.source = Some("app".into());
        record.slot_id = Some("slot-42".into());
        record.documents = vec![FileRef::new("https://files.example/x.pdf", "x.pdf", "application/pdf")];
        record.token_number = Some("GVPH001-2025-01-10".into());
        record.created = "2025-01-02T08:00:00Z".parse().ok();
        record
    }

    #[test]
    fn test_encode_shape() {
        let doc = appointment_mapper().to_document(&booked(), BASE).unwrap();

        assert_eq!(doc["status"], "booked");
        assert_eq!(doc["start"], "2025-01-10T10:00:00+05:30");
        assert_eq!(doc["end"], "2025-01-10T10:30:00+05:30");
        assert_eq!(doc["description"], "Vaccination - Mild cough since Monday");
        assert_eq!(doc["reasonCode"][0]["text"], "Vaccination");
        assert_eq!(doc["serviceType"][0]["text"], "General Medicine");
        assert_eq!(doc["participant"][0]["actor"]["reference"], "Patient/pet-1");
        assert_eq!(doc["participant"][1]["actor"]["reference"], "Practitioner/vet-7");
        assert_eq!(doc["participant"][2]["actor"]["display"], "Green Valley Pet Hospital");
        assert_eq!(doc["participant"][2]["status"], "accepted");
        assert_eq!(doc["contained"][0]["id"], "doc-0");
        assert_eq!(doc["supportingInformation"][0]["reference"], "#doc-0");
    }

    #[test]
    fn test_round_trip() {
        let mapper = appointment_mapper();
        let record = booked();
        let decoded = mapper.to_internal(&mapper.to_document(&record, BASE).unwrap()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_cancelled_participants_declined() {
        let mut record = booked();
        record.status = AppointmentStatus::Cancelled;
        let resource = appointment_mapper().to_external(&record, BASE);
        assert!(resource
            .participant
            .iter()
            .all(|p| p.status.as_deref() == Some("declined")));
    }

    #[test]
    fn test_decode_inbound_booking() {
        let doc = json!({
            "resourceType": "Appointment",
            "status": "proposed",
            "start": "2025-01-10T04:30:00Z",
            "reasonCode": [{ "text": "Checkup" }],
            "description": "Checkup - ",
            "participant": [
                { "actor": { "reference": "Location/hosp-3" } },
                { "actor": { "reference": "Patient/pet-1" } },
                { "actor": { "reference": "Practitioner/vet-7" } }
            ],
            "extension": [
                { "url": "https://vet.example/fhir/extensions/slotsId-2025", "valueString": "slot-9" }
            ]
        });

        let record = appointment_mapper().to_internal(&doc).unwrap();
        assert_eq!(record.status, AppointmentStatus::Pending);
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());
        assert_eq!(record.time_slot, "10:00 AM");
        assert_eq!(record.time_24h.as_deref(), Some("10:00"));
        assert_eq!(record.day_of_week.as_deref(), Some("Friday"));
        assert_eq!(record.hospital_id, "hosp-3");
        assert_eq!(record.purpose.as_deref(), Some("Checkup"));
        assert_eq!(record.concern, None);
        assert_eq!(record.slot_id.as_deref(), Some("slot-9"));
    }

    #[test]
    fn test_concern_follows_purpose_prefix() {
        let mapper = appointment_mapper();
        let mut record = booked();
        record.purpose = Some("Dental - cleaning".into());
        record.concern = None;
        let decoded = mapper.to_internal(&mapper.to_document(&record, BASE).unwrap()).unwrap();
        assert_eq!(decoded.concern, None);

        record.concern = Some("  bleeding - gums ".into());
        let doc = mapper.to_document(&record, BASE).unwrap();
        assert_eq!(doc["description"], "Dental - cleaning -   bleeding - gums ");
        assert_eq!(mapper.to_internal(&doc).unwrap(), record);

        assert_eq!(concern_from_description("Checkup - limping", None).as_deref(), Some("limping"));
        assert_eq!(concern_from_description("Checkup", Some("Checkup")), None);
    }

    #[test]
    fn test_decode_missing_practitioner() {
        let doc = json!({
            "resourceType": "Appointment",
            "start": "2025-01-10T10:00:00+05:30",
            "participant": [
                { "actor": { "reference": "Patient/pet-1" } },
                { "actor": { "reference": "Location/hosp-3" } }
            ]
        });
        let err = appointment_mapper().to_internal(&doc).unwrap_err();
        assert!(
            matches!(err, FhirError::MissingRequiredField(ref path) if path.contains("Practitioner/"))
        );
    }

    #[test]
    fn test_decode_requires_valid_start() {
        let mapper = appointment_mapper();

        let missing = json!({ "resourceType": "Appointment" });
        assert_eq!(
            mapper.to_internal(&missing).unwrap_err(),
            FhirError::MissingRequiredField("start".into())
        );

        let invalid = json!({ "resourceType": "Appointment", "start": "tomorrow morning" });
        assert!(matches!(
            mapper.to_internal(&invalid).unwrap_err(),
            FhirError::InvalidDate { .. }
        ));
    }
}
