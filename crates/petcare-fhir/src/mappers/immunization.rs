//! ImmunizationRecord ⇄ Immunization.

use super::{contain_files, contained_files, ensure_order, non_empty, parse_date, parse_optional_date};
use crate::extension::ScalarExtension;
use crate::mapper::ResourceMapper;
use crate::models::ImmunizationRecord;
use crate::wire::{Annotation, CodeableConcept, Coding, Immunization, Reference};
use crate::{FhirError, FhirResult};

const CVX_SYSTEM: &str = "http://hl7.org/fhir/sid/cvx";
const NEXT_DUE_NOTE: &str = "Next due: ";
const EXPIRY_NOTE: &str = "Expiry: ";

pub type ImmunizationMapper = ResourceMapper<ImmunizationRecord, Immunization>;

/// Mapper for vaccination records.
///
/// Next-due and expiry dates travel as `note[]` text; vaccine images as
/// contained DocumentReferences.
pub fn immunization_mapper() -> ImmunizationMapper {
    ResourceMapper::builder(encode, decode)
        .extension(ScalarExtension::boolean(
            "reminder",
            |r: &ImmunizationRecord| Some(r.reminder),
            |r, v| r.reminder = v,
        ))
        .build()
}

fn encode(record: &ImmunizationRecord) -> Immunization {
    let (contained, supporting_information) = contain_files(&record.images);

    let mut note = Vec::new();
    if let Some(due) = record.next_due_date {
        note.push(Annotation {
            text: format!("{NEXT_DUE_NOTE}{}", due.format("%Y-%m-%d")),
        });
    }
    if let Some(expiry) = record.expiry_date {
        note.push(Annotation {
            text: format!("{EXPIRY_NOTE}{}", expiry.format("%Y-%m-%d")),
        });
    }

    let location = match (&record.hospital_id, &record.hospital_name) {
        (None, None) => None,
        (id, name) => Some(Reference {
            reference: id.as_ref().map(|id| format!("Location/{id}")),
            display: name.clone(),
            ..Reference::default()
        }),
    };

    Immunization {
        resource_type: "Immunization".to_string(),
        id: record.id.clone(),
        contained,
        status: Some("completed".to_string()),
        vaccine_code: Some(CodeableConcept::coded(Coding {
            system: Some(CVX_SYSTEM.to_string()),
            code: record.vaccine_code.clone(),
            display: Some(record.vaccine_name.clone()),
        })),
        patient: Some(Reference::to("Patient", &record.pet_id)),
        occurrence_date_time: record.vaccination_date.map(|d| d.format("%Y-%m-%d").to_string()),
        location,
        manufacturer: record.manufacturer.as_deref().map(Reference::display),
        lot_number: record.lot_number.clone(),
        note,
        supporting_information,
        extension: Vec::new(),
    }
}

fn decode(immunization: Immunization) -> FhirResult<ImmunizationRecord> {
    let pet_id = immunization
        .patient
        .as_ref()
        .and_then(|p| p.id_for("Patient"))
        .ok_or_else(|| FhirError::MissingRequiredField("patient.reference".into()))?;

    let coding = immunization.vaccine_code.as_ref().and_then(|c| c.coding.first());
    let vaccine_name = non_empty(coding.and_then(|c| c.display.as_deref()))
        .ok_or_else(|| FhirError::MissingRequiredField("vaccineCode.coding[0].display".into()))?;

    let mut record = ImmunizationRecord::new(pet_id, vaccine_name);
    record.id = immunization.id;
    record.vaccine_code = non_empty(coding.and_then(|c| c.code.as_deref()));
    record.lot_number = non_empty(immunization.lot_number.as_deref());
    record.manufacturer = non_empty(immunization.manufacturer.as_ref().and_then(|m| m.display.as_deref()));
    record.vaccination_date =
        parse_optional_date("occurrenceDateTime", immunization.occurrence_date_time.as_deref())?;

    if let Some(location) = &immunization.location {
        record.hospital_id = location.id_for("Location").map(str::to_string);
        record.hospital_name = non_empty(location.display.as_deref());
    }

    for note in &immunization.note {
        if let Some(due) = note.text.strip_prefix(NEXT_DUE_NOTE) {
            record.next_due_date = Some(parse_date("note (next due)", due.trim())?);
        } else if let Some(expiry) = note.text.strip_prefix(EXPIRY_NOTE) {
            record.expiry_date = Some(parse_date("note (expiry)", expiry.trim())?);
        }
    }

    ensure_order(
        "occurrenceDateTime",
        record.vaccination_date,
        "note (next due)",
        record.next_due_date,
    )?;

    record.images = contained_files(&immunization.contained);
    Ok(record)
}
