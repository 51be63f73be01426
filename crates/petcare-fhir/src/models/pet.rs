//! Pet profile model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::FileRef;

/// A pet's profile (FHIR Patient with an `animal` element).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PetProfile {
    /// Record ID - None until persisted
    pub id: Option<String>,
    /// Owning user
    pub owner_id: Option<String>,
    /// Pet name
    pub name: String,
    /// Species (e.g., "Dog", "Cat")
    pub species: Option<String>,
    /// Breed
    pub breed: Option<String>,
    /// Gender, first letter upper-cased ("Male", "Female")
    pub gender: Option<String>,
    pub birth_date: Option<NaiveDate>,
    /// Weight as entered (e.g., "12.5 kg")
    pub weight: Option<String>,
    pub color: Option<String>,
    pub blood_group: Option<String>,
    /// Neutered (Some(true)) / intact (Some(false)) / unknown
    pub neutered: Option<bool>,
    pub age_when_neutered: Option<String>,
    pub microchip_number: Option<String>,
    pub passport_number: Option<String>,
    pub insurance_company: Option<String>,
    pub policy_number: Option<String>,
    /// Country or breeder of origin
    pub origin: Option<String>,
    pub images: Vec<FileRef>,
    pub active: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

impl PetProfile {
    /// Create a new active profile with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            owner_id: None,
            name: name.into(),
            species: None,
            breed: None,
            gender: None,
            birth_date: None,
            weight: None,
            color: None,
            blood_group: None,
            neutered: None,
            age_when_neutered: None,
            microchip_number: None,
            passport_number: None,
            insurance_company: None,
            policy_number: None,
            origin: None,
            images: Vec::new(),
            active: true,
            last_updated: None,
        }
    }

    /// Insured iff both the company and the policy number are known.
    pub fn is_insured(&self) -> bool {
        self.insurance_company.is_some() && self.policy_number.is_some()
    }
}
