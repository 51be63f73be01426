//! MedicalDocumentRecord ⇄ DocumentReference.

use super::{ensure_order, non_empty, parse_optional_date};
use crate::extension::ScalarExtension;
use crate::mapper::ResourceMapper;
use crate::models::{FileRef, MedicalDocumentRecord};
use crate::wire::{
    CodeableConcept, DocumentContent, DocumentContext, DocumentReference, Identifier, Period,
    Reference,
};
use crate::{FhirError, FhirResult};

pub type MedicalDocumentMapper = ResourceMapper<MedicalDocumentRecord, DocumentReference>;

pub fn medical_document_mapper() -> MedicalDocumentMapper {
    ResourceMapper::builder(encode, decode)
        .extension(ScalarExtension::boolean(
            "hasExpiryDate",
            |d: &MedicalDocumentRecord| Some(d.has_expiry_date),
            |d, v| d.has_expiry_date = v,
        ))
        .extension(ScalarExtension::boolean(
            "isRead",
            |d: &MedicalDocumentRecord| Some(d.is_read),
            |d, v| d.is_read = v,
        ))
        .build()
}

fn encode(record: &MedicalDocumentRecord) -> DocumentReference {
    DocumentReference {
        resource_type: "DocumentReference".to_string(),
        id: record.id.clone(),
        status: Some("current".to_string()),
        doc_type: Some(CodeableConcept::text(&record.document_type)),
        subject: Some(Reference {
            reference: Some(format!("Patient/{}", record.pet_id)),
            identifier: record.owner_id.as_ref().map(|owner| Identifier {
                system: None,
                value: Some(owner.clone()),
            }),
            display: None,
        }),
        date: record.issue_date.map(|d| d.format("%Y-%m-%d").to_string()),
        description: Some(record.title.clone()),
        content: record
            .attachments
            .iter()
            .map(|file| DocumentContent {
                attachment: file.to_attachment(),
            })
            .collect(),
        context: Some(DocumentContext {
            period: Some(Period {
                start: None,
                end: Some(
                    record
                        .expiry_date
                        .map(|d| d.format("%Y-%m-%d").to_string())
                        .unwrap_or_default(),
                ),
            }),
        }),
        extension: Vec::new(),
    }
}

fn decode(doc: DocumentReference) -> FhirResult<MedicalDocumentRecord> {
    let document_type = non_empty(doc.doc_type.as_ref().and_then(|t| t.text.as_deref()))
        .ok_or_else(|| FhirError::MissingRequiredField("type.text".into()))?;
    let title = non_empty(doc.description.as_deref())
        .ok_or_else(|| FhirError::MissingRequiredField("description".into()))?;
    let issue_date = parse_optional_date("date", doc.date.as_deref())?;
    let expiry_date = parse_optional_date(
        "context.period.end",
        doc.context
            .as_ref()
            .and_then(|c| c.period.as_ref())
            .and_then(|p| p.end.as_deref()),
    )?;
    let pet_id = doc
        .subject
        .as_ref()
        .and_then(|s| s.reference.as_deref())
        .and_then(|r| r.split('/').nth(1))
        .and_then(|id| non_empty(Some(id)))
        .ok_or_else(|| FhirError::MissingRequiredField("subject.reference".into()))?;

    ensure_order("date", issue_date, "context.period.end", expiry_date)?;

    let mut record = MedicalDocumentRecord::new(pet_id, document_type, title);
    record.id = doc.id;
    record.owner_id = non_empty(
        doc.subject
            .as_ref()
            .and_then(|s| s.identifier.as_ref())
            .and_then(|i| i.value.as_deref()),
    );
    record.issue_date = issue_date;
    record.expiry_date = expiry_date;
    record.attachments = doc
        .content
        .iter()
        .map(|c| FileRef::from_attachment(&c.attachment))
        .collect();
    Ok(record)
}
