//! PetCare Core Library
//!
//! Appointment booking and clinical-record lifecycle for the PetCare platform,
//! speaking FHIR JSON at every boundary.
//!
//! # Architecture
//!
//! ```text
//!   FHIR JSON ──► PetCareCore (FFI) ──┬──► AppointmentService ──► slot check
//!                                     │         │                  token issuer
//!                                     │         │                  directory
//!                                     │         ▼
//!                                     │    SQLite (slot + token unique indexes)
//!                                     │         ▲
//!                                     └──► RecordService<T, R> ──► ObjectStorage
//!                                          (pets, immunizations,
//!                                           diabetes logs, documents)
//! ```
//!
//! Encoding and decoding is delegated to [`petcare_fhir`].
//!
//! # Modules
//!
//! - [`db`]: SQLite database layer
//! - [`booking`]: Booking orchestrator, slot availability, token issuance
//! - [`records`]: Record lifecycle service for the other four domains
//! - [`storage`]: Attachment object storage
//! - [`directory`]: Pet and hospital lookups
//! - [`config`]: Startup configuration
//! - [`error`]: Service error taxonomy

pub mod booking;
pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod records;
pub mod storage;

// Re-export commonly used types
pub use booking::{format_token, hospital_initials, AppointmentService, SlotAvailability, TokenIssuer};
pub use config::{ConfigError, CoreConfig};
pub use db::{Database, DbError, SharedDatabase};
pub use directory::{DatabaseDirectory, Directory, PetIdentity};
pub use error::{ServiceError, ServiceResult};
pub use records::{
    DiabetesService, ImmunizationService, MedicalDocumentService, PetService, RecordLifecycle,
    RecordService, StoredRecord,
};
pub use storage::{DirectoryStorage, ObjectStorage, StorageError, Upload};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::Arc;

use chrono::NaiveDate;
use petcare_fhir::AppointmentStatus;
use serde_json::Value;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum PetCareError {
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Slot conflict: {0}")]
    SlotConflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Attachment error: {0}")]
    AttachmentError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for PetCareError {
    fn from(e: ServiceError) -> Self {
        let message = e.to_string();
        match e {
            ServiceError::Decode(_) => PetCareError::InvalidDocument(message),
            ServiceError::SlotConflict { .. } => PetCareError::SlotConflict(message),
            ServiceError::NotFound(_) => PetCareError::NotFound(message),
            ServiceError::InvalidTransition { .. } | ServiceError::NotReschedulable(_) => {
                PetCareError::InvalidTransition(message)
            }
            ServiceError::Storage(_) => PetCareError::AttachmentError(message),
            ServiceError::Internal => PetCareError::Internal(message),
        }
    }
}

impl From<DbError> for PetCareError {
    fn from(e: DbError) -> Self {
        ServiceError::from(e).into()
    }
}

impl From<ConfigError> for PetCareError {
    fn from(e: ConfigError) -> Self {
        PetCareError::ConfigurationError(e.to_string())
    }
}

impl From<StorageError> for PetCareError {
    fn from(e: StorageError) -> Self {
        PetCareError::AttachmentError(e.to_string())
    }
}

impl From<serde_json::Error> for PetCareError {
    fn from(e: serde_json::Error) -> Self {
        PetCareError::InvalidDocument(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for PetCareError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ServiceError::from(e).into()
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create the core with its database and attachment directory.
#[uniffi::export]
pub fn open_core(
    base_url: String,
    database_path: String,
    files_dir: String,
) -> Result<Arc<PetCareCore>, PetCareError> {
    let config = CoreConfig::new(base_url, database_path.into(), files_dir.into())?;
    PetCareCore::from_config(&config)
}

/// Open the core from `PETCARE_*` environment variables.
#[uniffi::export]
pub fn open_core_from_env() -> Result<Arc<PetCareCore>, PetCareError> {
    let config = CoreConfig::from_env()?;
    PetCareCore::from_config(&config)
}

/// Create a core over an in-memory database (for testing).
#[uniffi::export]
pub fn open_core_in_memory(base_url: String, files_dir: String) -> Result<Arc<PetCareCore>, PetCareError> {
    let storage = Arc::new(DirectoryStorage::new(files_dir, base_url.as_str())?);
    Ok(PetCareCore::new(Database::open_in_memory()?, storage, &base_url))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Which record service a call addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum RecordDomain {
    Pet,
    Immunization,
    Diabetes,
    MedicalDocument,
}

/// Thread-safe core for FFI. Documents cross the boundary as FHIR JSON text.
#[derive(uniffi::Object)]
pub struct PetCareCore {
    db: SharedDatabase,
    appointments: AppointmentService,
    pets: PetService,
    immunizations: ImmunizationService,
    diabetes: DiabetesService,
    documents: MedicalDocumentService,
}

impl PetCareCore {
    /// Assemble the services over one database and one object store.
    pub fn new(db: Database, storage: Arc<dyn ObjectStorage>, base_url: &str) -> Arc<Self> {
        let db = db.shared();
        let directory = Arc::new(DatabaseDirectory::new(db.clone()));

        Arc::new(Self {
            appointments: AppointmentService::new(db.clone(), storage.clone(), directory, base_url),
            pets: PetService::pets(db.clone(), storage.clone(), base_url),
            immunizations: ImmunizationService::immunizations(db.clone(), storage.clone(), base_url),
            diabetes: DiabetesService::diabetes_logs(db.clone(), storage.clone(), base_url),
            documents: MedicalDocumentService::medical_documents(db.clone(), storage, base_url),
            db,
        })
    }

    fn from_config(config: &CoreConfig) -> Result<Arc<Self>, PetCareError> {
        let db = Database::open(config.database_path())?;
        let storage = Arc::new(DirectoryStorage::new(config.files_dir(), config.base_url())?);
        tracing::info!(database = %config.database_path().display(), "PetCare core opened");
        Ok(Self::new(db, storage, config.base_url()))
    }

    fn service(&self, domain: RecordDomain) -> &dyn RecordLifecycle {
        match domain {
            RecordDomain::Pet => &self.pets,
            RecordDomain::Immunization => &self.immunizations,
            RecordDomain::Diabetes => &self.diabetes,
            RecordDomain::MedicalDocument => &self.documents,
        }
    }
}

fn parse_document(json: &str) -> Result<Value, PetCareError> {
    serde_json::from_str(json).map_err(|e| PetCareError::InvalidDocument(e.to_string()))
}

fn parse_day(date: &str) -> Result<NaiveDate, PetCareError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| PetCareError::InvalidDocument(format!("invalid date '{date}'")))
}

fn parse_status(status: &str) -> Result<AppointmentStatus, PetCareError> {
    AppointmentStatus::parse(status)
        .or_else(|| AppointmentStatus::from_fhir(status))
        .ok_or_else(|| PetCareError::InvalidDocument(format!("unknown appointment status '{status}'")))
}

fn to_uploads(uploads: Vec<FfiUpload>) -> Vec<Upload> {
    uploads.into_iter().map(Upload::from).collect()
}

#[uniffi::export]
impl PetCareCore {
    // =========================================================================
    // Directory Operations
    // =========================================================================

    /// Add or rename a hospital.
    pub fn register_hospital(&self, hospital_id: String, name: String) -> Result<(), PetCareError> {
        let db = self.db.lock()?;
        db.upsert_hospital(&hospital_id, &name)?;
        Ok(())
    }

    // =========================================================================
    // Appointment Operations
    // =========================================================================

    /// Book an appointment from a FHIR Appointment document.
    pub fn book_appointment(
        &self,
        caller_id: String,
        appointment_json: String,
        uploads: Vec<FfiUpload>,
    ) -> Result<String, PetCareError> {
        let doc = parse_document(&appointment_json)?;
        let booked = self.appointments.book(&caller_id, &doc, &to_uploads(uploads))?;
        Ok(booked.to_string())
    }

    /// Move an appointment to another status (internal or FHIR status code).
    pub fn transition_appointment(&self, id: String, status: String) -> Result<String, PetCareError> {
        let status = parse_status(&status)?;
        Ok(self.appointments.transition(&id, status)?.to_string())
    }

    pub fn cancel_appointment(&self, id: String) -> Result<String, PetCareError> {
        Ok(self.appointments.cancel(&id)?.to_string())
    }

    /// Move an appointment to `date` (YYYY-MM-DD) at `time_slot` ("h:mm AM").
    pub fn reschedule_appointment(
        &self,
        id: String,
        date: String,
        time_slot: String,
    ) -> Result<String, PetCareError> {
        let date = parse_day(&date)?;
        Ok(self.appointments.reschedule(&id, date, &time_slot)?.to_string())
    }

    pub fn booked_slots(&self, veterinarian_id: String, date: String) -> Result<Vec<String>, PetCareError> {
        let date = parse_day(&date)?;
        Ok(self.appointments.booked_slots(&veterinarian_id, date)?)
    }

    /// The candidate times still free for a veterinarian on a day.
    pub fn available_slots(
        &self,
        veterinarian_id: String,
        date: String,
        candidates: Vec<String>,
    ) -> Result<Vec<String>, PetCareError> {
        let date = parse_day(&date)?;
        Ok(self.appointments.available_slots(&veterinarian_id, date, &candidates)?)
    }

    pub fn get_appointment(&self, id: String) -> Result<String, PetCareError> {
        Ok(self.appointments.appointment(&id)?.to_string())
    }

    /// Searchset Bundle of a pet's appointments.
    pub fn appointments_for_pet(&self, pet_id: String) -> Result<String, PetCareError> {
        Ok(self.appointments.appointments_for_pet(&pet_id)?.to_string())
    }

    // =========================================================================
    // Record Operations
    // =========================================================================

    pub fn create_record(
        &self,
        domain: RecordDomain,
        owner_id: String,
        document_json: String,
        uploads: Vec<FfiUpload>,
    ) -> Result<String, PetCareError> {
        let doc = parse_document(&document_json)?;
        let created = self.service(domain).create(&owner_id, &doc, &to_uploads(uploads))?;
        Ok(created.to_string())
    }

    /// Merge a partial document into a stored record.
    pub fn edit_record(
        &self,
        domain: RecordDomain,
        id: String,
        submission_json: String,
        uploads: Vec<FfiUpload>,
    ) -> Result<String, PetCareError> {
        let doc = parse_document(&submission_json)?;
        let edited = self.service(domain).edit(&id, &doc, &to_uploads(uploads))?;
        Ok(edited.to_string())
    }

    pub fn delete_record(&self, domain: RecordDomain, id: String) -> Result<(), PetCareError> {
        Ok(self.service(domain).delete(&id)?)
    }

    pub fn get_record(&self, domain: RecordDomain, id: String) -> Result<String, PetCareError> {
        Ok(self.service(domain).get(&id)?.to_string())
    }

    pub fn list_records_for_owner(&self, domain: RecordDomain, owner_id: String) -> Result<String, PetCareError> {
        Ok(self.service(domain).list_for_owner(&owner_id)?.to_string())
    }

    pub fn list_records_for_pet(&self, domain: RecordDomain, pet_id: String) -> Result<String, PetCareError> {
        Ok(self.service(domain).list_for_pet(&pet_id)?.to_string())
    }

    pub fn mark_document_read(&self, id: String) -> Result<String, PetCareError> {
        Ok(self.documents.mark_read(&id)?.to_string())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// A file attached to a create, edit or booking call.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl From<FfiUpload> for Upload {
    fn from(u: FfiUpload) -> Self {
        Upload::new(u.file_name, u.mime_type, u.bytes)
    }
}
