//! Diabetes monitoring log model.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::FileRef;

/// One diabetes monitoring entry for a pet (FHIR Observation).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DiabetesObservation {
    pub id: Option<String>,
    pub pet_id: String,
    /// Veterinarian who reviewed the entry
    pub vet_id: Option<String>,
    /// Related appointment, if the log was taken during a visit
    pub appointment_id: Option<String>,
    /// Practice-local date and time of the reading
    pub recorded_at: Option<NaiveDateTime>,
    pub water_intake: Option<String>,
    pub food_intake: Option<String>,
    pub activity_level: Option<String>,
    pub urination: Option<String>,
    pub illness_signs: Option<String>,
    /// mg/dL
    pub blood_glucose: Option<f64>,
    pub urine_glucose: Option<String>,
    pub urine_ketones: Option<String>,
    /// kg
    pub weight: Option<f64>,
    pub body_condition_images: Vec<FileRef>,
}

impl DiabetesObservation {
    pub fn new(pet_id: impl Into<String>) -> Self {
        Self {
            pet_id: pet_id.into(),
            ..Self::default()
        }
    }
}
