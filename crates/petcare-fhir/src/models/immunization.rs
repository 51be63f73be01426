//! Vaccination record model.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::FileRef;

/// A vaccination given to a pet (FHIR Immunization).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImmunizationRecord {
    pub id: Option<String>,
    pub pet_id: String,
    pub vaccine_name: String,
    /// CVX or manufacturer code
    pub vaccine_code: Option<String>,
    pub lot_number: Option<String>,
    pub manufacturer: Option<String>,
    pub vaccination_date: Option<NaiveDate>,
    pub next_due_date: Option<NaiveDate>,
    /// Expiry of the administered lot
    pub expiry_date: Option<NaiveDate>,
    pub hospital_id: Option<String>,
    pub hospital_name: Option<String>,
    /// Owner wants a reminder before the next due date
    pub reminder: bool,
    pub images: Vec<FileRef>,
}

impl ImmunizationRecord {
    pub fn new(pet_id: impl Into<String>, vaccine_name: impl Into<String>) -> Self {
        Self {
            pet_id: pet_id.into(),
            vaccine_name: vaccine_name.into(),
            ..Self::default()
        }
    }
}
