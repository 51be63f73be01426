//! Identity lookups used while assembling an appointment.

use petcare_fhir::PetProfile;

use crate::db::{RecordKind, SharedDatabase};
use crate::error::{ServiceError, ServiceResult};

/// Who a pet is and who owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetIdentity {
    pub pet_id: String,
    pub name: String,
    pub species: Option<String>,
    pub owner_id: Option<String>,
}

/// Read-only lookups for pets and hospitals.
pub trait Directory: Send + Sync {
    /// Fails with [`ServiceError::NotFound`] for an unknown pet.
    fn resolve_pet(&self, pet_id: &str) -> ServiceResult<PetIdentity>;

    fn hospital_name(&self, hospital_id: &str) -> ServiceResult<Option<String>>;
}

/// [`Directory`] backed by the pet records and the hospitals table.
pub struct DatabaseDirectory {
    db: SharedDatabase,
}

impl DatabaseDirectory {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }
}

impl Directory for DatabaseDirectory {
    fn resolve_pet(&self, pet_id: &str) -> ServiceResult<PetIdentity> {
        let found = self.db.lock()?.get_record(RecordKind::Pet, pet_id)?;
        let entry = found.ok_or_else(|| ServiceError::NotFound(format!("pet {pet_id}")))?;

        let pet: PetProfile = serde_json::from_str(&entry.body)?;
        Ok(PetIdentity {
            pet_id: entry.id,
            name: pet.name,
            species: pet.species,
            owner_id: entry.owner_id.or(pet.owner_id),
        })
    }

    fn hospital_name(&self, hospital_id: &str) -> ServiceResult<Option<String>> {
        let db = self.db.lock()?;
        Ok(db.get_hospital_name(hospital_id)?)
    }
}
