//! Internal domain records.
//!
//! These are the flat shapes the rest of the platform works with. They carry no
//! persistence logic; the FHIR mapping for each lives in [`crate::mappers`].

mod appointment;
mod diabetes;
mod document;
mod file;
mod immunization;
mod pet;

pub use appointment::*;
pub use diabetes::*;
pub use document::*;
pub use file::*;
pub use immunization::*;
pub use pet::*;
