//! Medical document model.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::FileRef;

/// An uploaded medical document (FHIR DocumentReference).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MedicalDocumentRecord {
    pub id: Option<String>,
    pub owner_id: Option<String>,
    pub pet_id: String,
    /// Document category (e.g., "Lab Report", "Prescription")
    pub document_type: String,
    pub title: String,
    pub issue_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub has_expiry_date: bool,
    pub is_read: bool,
    pub attachments: Vec<FileRef>,
}

impl MedicalDocumentRecord {
    pub fn new(
        pet_id: impl Into<String>,
        document_type: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            pet_id: pet_id.into(),
            document_type: document_type.into(),
            title: title.into(),
            ..Self::default()
        }
    }
}
