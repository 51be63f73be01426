//! Per-domain mapping tables.
//!
//! Each submodule exposes one constructor returning a fully assembled
//! [`ResourceMapper`](crate::ResourceMapper) for its domain.

mod appointment;
mod document_reference;
mod immunization;
mod observation;
mod pet;

pub use appointment::{appointment_mapper, AppointmentMapper};
pub use document_reference::{medical_document_mapper, MedicalDocumentMapper};
pub use immunization::{immunization_mapper, ImmunizationMapper};
pub use observation::{diabetes_mapper, DiabetesMapper, DIABETES_ID_PREFIX};
pub use pet::{pet_mapper, PetMapper};

use chrono::{DateTime, NaiveDate};

use crate::models::FileRef;
use crate::wire::{DocumentContent, DocumentReference, Reference};
use crate::{FhirError, FhirResult};

/// Parse a FHIR date, accepting a full dateTime and keeping its calendar day.
pub(crate) fn parse_date(field: &str, value: &str) -> FhirResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.date_naive()))
        .map_err(|_| FhirError::InvalidDate {
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// Parse an optional date, treating an empty string as absent.
pub(crate) fn parse_optional_date(field: &str, value: Option<&str>) -> FhirResult<Option<NaiveDate>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => parse_date(field, v).map(Some),
    }
}

/// Fail when `later` is strictly before `earlier`.
pub(crate) fn ensure_order(
    earlier_field: &str,
    earlier: Option<NaiveDate>,
    later_field: &str,
    later: Option<NaiveDate>,
) -> FhirResult<()> {
    match (earlier, later) {
        (Some(e), Some(l)) if l < e => Err(FhirError::DateOrderViolation {
            earlier_field: earlier_field.to_string(),
            earlier: e.to_string(),
            later_field: later_field.to_string(),
            later: l.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Non-empty trimmed text.
pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Contained DocumentReferences plus matching `#doc-N` back-references.
pub(crate) fn contain_files(files: &[FileRef]) -> (Vec<DocumentReference>, Vec<Reference>) {
    files
        .iter()
        .enumerate()
        .map(|(i, file)| {
            let id = format!("doc-{i}");
            let doc = DocumentReference {
                resource_type: "DocumentReference".to_string(),
                id: Some(id.clone()),
                status: Some("current".to_string()),
                content: vec![DocumentContent {
                    attachment: file.to_attachment(),
                }],
                ..DocumentReference::default()
            };
            let reference = Reference {
                reference: Some(format!("#{id}")),
                ..Reference::default()
            };
            (doc, reference)
        })
        .unzip()
}

/// Files carried by contained DocumentReferences, in document order.
pub(crate) fn contained_files(contained: &[DocumentReference]) -> Vec<FileRef> {
    contained
        .iter()
        .filter_map(|doc| doc.content.first())
        .map(|content| FileRef::from_attachment(&content.attachment))
        .collect()
}
