//! PetCare FHIR Interoperability Layer
//!
//! Every persisted veterinary record leaves (and enters) the platform as an
//! HL7-FHIR-shaped resource, while the rest of the system works with the flat
//! domain records in [`models`]. This crate is the bidirectional codec between
//! the two. It is pure: no I/O, no state kept between calls.
//!
//! # Architecture
//!
//! ```text
//!  inbound JSON ──► ResourceMapper::parse ──► domain record ──► (services)
//!                        │                                          │
//!            resourceType check                                     ▼
//!            typed wire shape                                  persisted record
//!            direct field table                                     │
//!            ExtensionRegistry                                      ▼
//!                                        ResourceMapper::to_external ──► Bundle::wrap
//! ```
//!
//! # Modules
//!
//! - [`models`]: Internal domain records (PetProfile, AppointmentRecord, ...)
//! - [`wire`]: FHIR datatypes and the five resource shapes plus Bundle
//! - [`extension`]: ExtensionCodec trait, scalar/composite codecs and the registry
//! - [`mapper`]: Generic `ResourceMapper<T, R>` built from a per-domain table
//! - [`mappers`]: The five per-domain mapping tables
//! - [`bundle`]: Bundle envelope construction
//! - [`time`]: 12-hour/24-hour conversion and weekday derivation

pub mod bundle;
pub mod extension;
pub mod mapper;
pub mod mappers;
pub mod models;
pub mod time;
pub mod wire;

pub use bundle::BundleKind;
pub use extension::{ExtensionCodec, ExtensionRegistry, ExtensionValue, ValueKind};
pub use mapper::ResourceMapper;
pub use mappers::{
    appointment_mapper, diabetes_mapper, immunization_mapper, medical_document_mapper,
    pet_mapper,
};
pub use models::{
    AppointmentRecord, AppointmentStatus, DiabetesObservation, FileRef, ImmunizationRecord,
    MedicalDocumentRecord, PetProfile,
};
pub use wire::{Bundle, FhirResource};

use chrono::{FixedOffset, Offset, Utc};

/// Seconds east of UTC for the practice's local time (+05:30).
pub const PRACTICE_UTC_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Length of one bookable appointment slot.
pub const SLOT_MINUTES: i64 = 30;

/// The practice-local fixed offset used for every instant this crate emits.
pub fn practice_offset() -> FixedOffset {
    FixedOffset::east_opt(PRACTICE_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Errors produced while decoding or encoding FHIR documents.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum FhirError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("unsupported resource kind: expected '{expected}', got '{found}'")]
    UnsupportedResourceKind { expected: String, found: String },

    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("invalid date in {field}: '{value}'")]
    InvalidDate { field: String, value: String },

    #[error("{later_field} ({later}) precedes {earlier_field} ({earlier})")]
    DateOrderViolation {
        earlier_field: String,
        earlier: String,
        later_field: String,
        later: String,
    },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for FhirError {
    fn from(e: serde_json::Error) -> Self {
        FhirError::Serialization(e.to_string())
    }
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;
