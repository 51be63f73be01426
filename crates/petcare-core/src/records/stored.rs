use chrono::{DateTime, Utc};
use petcare_fhir::{
    DiabetesObservation, FileRef, ImmunizationRecord, MedicalDocumentRecord, PetProfile,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::db::RecordKind;

/// A domain record that can be filed in the `records` table.
pub trait StoredRecord: Clone + Serialize + DeserializeOwned {
    const KIND: RecordKind;

    fn id(&self) -> Option<&str>;

    fn set_id(&mut self, id: String);

    /// Pet the record belongs to. A pet profile is its own pet.
    fn pet_id(&self) -> Option<&str>;

    /// Records that do not carry an owner ignore this.
    fn set_owner_id(&mut self, _owner_id: String) {}

    fn files(&self) -> &[FileRef];

    fn files_mut(&mut self) -> &mut Vec<FileRef>;

    /// Stamp a modification time, for records that carry one.
    fn touch(&mut self, _now: DateTime<Utc>) {}
}

impl StoredRecord for PetProfile {
    const KIND: RecordKind = RecordKind::Pet;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn pet_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_owner_id(&mut self, owner_id: String) {
        self.owner_id = Some(owner_id);
    }

    fn files(&self) -> &[FileRef] {
        &self.images
    }

    fn files_mut(&mut self) -> &mut Vec<FileRef> {
        &mut self.images
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_updated = Some(now);
    }
}

impl StoredRecord for ImmunizationRecord {
    const KIND: RecordKind = RecordKind::Immunization;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn pet_id(&self) -> Option<&str> {
        Some(&self.pet_id)
    }

    fn files(&self) -> &[FileRef] {
        &self.images
    }

    fn files_mut(&mut self) -> &mut Vec<FileRef> {
        &mut self.images
    }
}

impl StoredRecord for DiabetesObservation {
    const KIND: RecordKind = RecordKind::Diabetes;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn pet_id(&self) -> Option<&str> {
        Some(&self.pet_id)
    }

    fn files(&self) -> &[FileRef] {
        &self.body_condition_images
    }

    fn files_mut(&mut self) -> &mut Vec<FileRef> {
        &mut self.body_condition_images
    }
}

impl StoredRecord for MedicalDocumentRecord {
    const KIND: RecordKind = RecordKind::MedicalDocument;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn pet_id(&self) -> Option<&str> {
        Some(&self.pet_id)
    }

    fn set_owner_id(&mut self, owner_id: String) {
        self.owner_id = Some(owner_id);
    }

    fn files(&self) -> &[FileRef] {
        &self.attachments
    }

    fn files_mut(&mut self) -> &mut Vec<FileRef> {
        &mut self.attachments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pet_profile_is_its_own_pet() {
        let mut pet = PetProfile::new("Bruno");
        assert_eq!(StoredRecord::pet_id(&pet), None);
        pet.set_id("pet-1".into());
        assert_eq!(StoredRecord::pet_id(&pet), Some("pet-1"));
    }

    #[test]
    fn test_owner_is_ignored_where_not_carried() {
        let mut log = DiabetesObservation::new("pet-1");
        log.set_owner_id("owner-1".into());
        assert_eq!(serde_json::to_value(&log).unwrap()["pet_id"], "pet-1");

        let mut doc = MedicalDocumentRecord::new("pet-1", "Lab Report", "CBC");
        doc.set_owner_id("owner-1".into());
        assert_eq!(doc.owner_id.as_deref(), Some("owner-1"));
    }

    #[test]
    fn test_touch_stamps_pets_only() {
        let now = Utc::now();
        let mut pet = PetProfile::new("Bruno");
        pet.touch(now);
        assert_eq!(pet.last_updated, Some(now));
    }
}
