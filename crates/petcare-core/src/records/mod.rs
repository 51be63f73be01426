//! Create, edit, delete and list the FHIR-backed records of the four
//! non-appointment domains.
//!
//! Every operation takes and returns FHIR JSON. Attachments are uploaded
//! before anything is persisted; if any upload fails nothing is stored.

mod stored;

pub use stored::StoredRecord;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use petcare_fhir::mappers::{
    diabetes_mapper, immunization_mapper, medical_document_mapper, pet_mapper,
};
use petcare_fhir::wire::{DocumentReference, FhirResource, Immunization, Observation, Patient};
use petcare_fhir::{
    Bundle, BundleKind, DiabetesObservation, FileRef, ImmunizationRecord, MedicalDocumentRecord,
    PetProfile, ResourceMapper,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{DbError, RecordEntry, SharedDatabase};
use crate::error::{ServiceError, ServiceResult};
use crate::storage::{release_files, upload_all, ObjectStorage, Upload};

/// Lifecycle operations shared by every record domain, in FHIR JSON.
pub trait RecordLifecycle: Send + Sync {
    /// Decode, upload attachments, assign an id, persist, re-encode.
    fn create(&self, owner_id: &str, document: &Value, uploads: &[Upload]) -> ServiceResult<Value>;

    /// Merge a partial submission into the stored record.
    fn edit(&self, id: &str, submission: &Value, uploads: &[Upload]) -> ServiceResult<Value>;

    /// Release attachments, then remove the record.
    ///
    /// If an attachment cannot be released the record is kept, minus the
    /// files already released, and the storage error is returned.
    fn delete(&self, id: &str) -> ServiceResult<()>;

    fn get(&self, id: &str) -> ServiceResult<Value>;

    fn list_for_owner(&self, owner_id: &str) -> ServiceResult<Value>;

    fn list_for_pet(&self, pet_id: &str) -> ServiceResult<Value>;
}

/// Record lifecycle for one domain `T`, published as resource `R`.
pub struct RecordService<T, R> {
    db: SharedDatabase,
    storage: Arc<dyn ObjectStorage>,
    mapper: ResourceMapper<T, R>,
    base_url: String,
}

pub type PetService = RecordService<PetProfile, Patient>;
pub type ImmunizationService = RecordService<ImmunizationRecord, Immunization>;
pub type DiabetesService = RecordService<DiabetesObservation, Observation>;
pub type MedicalDocumentService = RecordService<MedicalDocumentRecord, DocumentReference>;

impl PetService {
    pub fn pets(db: SharedDatabase, storage: Arc<dyn ObjectStorage>, base_url: impl Into<String>) -> Self {
        Self::new(db, storage, pet_mapper(), base_url)
    }
}

impl ImmunizationService {
    pub fn immunizations(db: SharedDatabase, storage: Arc<dyn ObjectStorage>, base_url: impl Into<String>) -> Self {
        Self::new(db, storage, immunization_mapper(), base_url)
    }
}

impl DiabetesService {
    pub fn diabetes_logs(db: SharedDatabase, storage: Arc<dyn ObjectStorage>, base_url: impl Into<String>) -> Self {
        Self::new(db, storage, diabetes_mapper(), base_url)
    }
}

impl MedicalDocumentService {
    pub fn medical_documents(
        db: SharedDatabase,
        storage: Arc<dyn ObjectStorage>,
        base_url: impl Into<String>,
    ) -> Self {
        Self::new(db, storage, medical_document_mapper(), base_url)
    }

    /// Flag a medical document as read by its owner.
    pub fn mark_read(&self, id: &str) -> ServiceResult<Value> {
        let (mut record, owner_id) = self.load(id)?;
        if !record.is_read {
            record.is_read = true;
            self.save(&record, owner_id)?;
            info!(id, "Medical document marked read");
        }
        self.encode(&record)
    }
}

impl<T, R> RecordService<T, R>
where
    T: StoredRecord,
    R: FhirResource + Serialize + DeserializeOwned,
{
    pub fn new(
        db: SharedDatabase,
        storage: Arc<dyn ObjectStorage>,
        mapper: ResourceMapper<T, R>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            db,
            storage,
            mapper,
            base_url: base_url.into(),
        }
    }

    fn encode(&self, record: &T) -> ServiceResult<Value> {
        Ok(self.mapper.to_document(record, &self.base_url)?)
    }

    fn entry(record: &T, owner_id: Option<String>) -> ServiceResult<RecordEntry> {
        let id = record
            .id()
            .ok_or_else(|| {
                tracing::error!(kind = T::KIND.as_str(), "record has no id at persist time");
                ServiceError::Internal
            })?
            .to_string();

        Ok(RecordEntry {
            id,
            kind: T::KIND,
            owner_id,
            pet_id: record.pet_id().map(str::to_string),
            body: serde_json::to_string(record)?,
        })
    }

    /// Stored record and the owner it is filed under.
    fn load(&self, id: &str) -> ServiceResult<(T, Option<String>)> {
        let entry = self
            .db
            .lock()?
            .get_record(T::KIND, id)?
            .ok_or_else(|| ServiceError::NotFound(format!("{} {id}", T::KIND.as_str())))?;
        let record: T = serde_json::from_str(&entry.body)?;
        Ok((record, entry.owner_id))
    }

    fn save(&self, record: &T, owner_id: Option<String>) -> ServiceResult<()> {
        let entry = Self::entry(record, owner_id)?;
        let updated = self.db.lock()?.update_record(&entry)?;
        if !updated {
            return Err(ServiceError::NotFound(format!("{} {}", T::KIND.as_str(), entry.id)));
        }
        Ok(())
    }

    fn bundle(&self, entries: Vec<RecordEntry>) -> ServiceResult<Value> {
        let mut resources = Vec::with_capacity(entries.len());
        for entry in entries {
            let record: T = serde_json::from_str(&entry.body)?;
            resources.push(self.mapper.to_external(&record, &self.base_url));
        }
        Ok(serde_json::to_value(Bundle::wrap(resources, BundleKind::Searchset))?)
    }
}

impl<T, R> RecordLifecycle for RecordService<T, R>
where
    T: StoredRecord + Send + Sync,
    R: FhirResource + Serialize + DeserializeOwned + Send + Sync,
{
    fn create(&self, owner_id: &str, document: &Value, uploads: &[Upload]) -> ServiceResult<Value> {
        let mut record = self.mapper.to_internal(document)?;
        let uploaded = upload_all(self.storage.as_ref(), uploads)?;

        record.set_id(Uuid::new_v4().to_string());
        record.set_owner_id(owner_id.to_string());
        record.files_mut().extend(uploaded.iter().cloned());
        record.touch(Utc::now());

        let stored = Self::entry(&record, Some(owner_id.to_string()))
            .and_then(|entry| Ok(self.db.lock()?.insert_record(&entry)?));
        if let Err(e) = stored {
            release_files(self.storage.as_ref(), &uploaded);
            return Err(e);
        }

        info!(
            kind = T::KIND.as_str(),
            id = record.id().unwrap_or_default(),
            attachments = uploaded.len(),
            "Record created"
        );
        self.encode(&record)
    }

    fn edit(&self, id: &str, submission: &Value, uploads: &[Upload]) -> ServiceResult<Value> {
        let (existing, owner_id) = self.load(id)?;
        let mut record = self.mapper.merge(&existing, submission, &self.base_url)?;
        let uploaded = upload_all(self.storage.as_ref(), uploads)?;

        record.set_id(id.to_string());
        if let Some(owner) = owner_id.clone() {
            record.set_owner_id(owner);
        }
        record.files_mut().extend(uploaded.iter().cloned());
        record.touch(Utc::now());

        if let Err(e) = self.save(&record, owner_id) {
            release_files(self.storage.as_ref(), &uploaded);
            return Err(e);
        }

        let kept: HashSet<&str> = record.files().iter().map(|f| f.url.as_str()).collect();
        let dropped: Vec<FileRef> = existing
            .files()
            .iter()
            .filter(|f| !kept.contains(f.url.as_str()))
            .cloned()
            .collect();
        release_files(self.storage.as_ref(), &dropped);

        info!(
            kind = T::KIND.as_str(),
            id,
            added = uploaded.len(),
            released = dropped.len(),
            "Record edited"
        );
        self.encode(&record)
    }

    fn delete(&self, id: &str) -> ServiceResult<()> {
        let (mut record, owner_id) = self.load(id)?;
        let files = record.files().to_vec();
        for (released, file) in files.iter().enumerate() {
            if let Err(e) = self.storage.delete(&file.url) {
                warn!(kind = T::KIND.as_str(), id, url = %file.url, error = %e, "delete stopped at attachment");
                // Keep the record, listing only the files that still exist.
                record.files_mut().drain(..released);
                self.save(&record, owner_id)?;
                return Err(e.into());
            }
            debug!(url = %file.url, "released attachment");
        }

        let removed = self.db.lock()?.delete_record(T::KIND, id)?;
        if !removed {
            return Err(DbError::NotFound(format!("{} {id}", T::KIND.as_str())).into());
        }
        info!(kind = T::KIND.as_str(), id, attachments = files.len(), "Record deleted");
        Ok(())
    }

    fn get(&self, id: &str) -> ServiceResult<Value> {
        let (record, _) = self.load(id)?;
        self.encode(&record)
    }

    fn list_for_owner(&self, owner_id: &str) -> ServiceResult<Value> {
        let entries = self.db.lock()?.list_records_for_owner(T::KIND, owner_id)?;
        self.bundle(entries)
    }

    fn list_for_pet(&self, pet_id: &str) -> ServiceResult<Value> {
        let entries = self.db.lock()?.list_records_for_pet(T::KIND, pet_id)?;
        self.bundle(entries)
    }
}
