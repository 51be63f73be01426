//! Appointment models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::FileRef;

/// Appointment lifecycle status.
///
/// `Pending → Accepted → CheckedIn → InProgress → Fulfilled`, with `Cancelled`
/// reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    /// Requested, awaiting the practice
    Pending,
    /// Confirmed by the practice
    Accepted,
    /// Pet has arrived
    CheckedIn,
    /// With the veterinarian
    InProgress,
    /// Visit completed
    Fulfilled,
    /// Cancelled by either side
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Accepted => "accepted",
            AppointmentStatus::CheckedIn => "checked-in",
            AppointmentStatus::InProgress => "in-progress",
            AppointmentStatus::Fulfilled => "fulfilled",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AppointmentStatus::Pending),
            "accepted" => Some(AppointmentStatus::Accepted),
            "checked-in" => Some(AppointmentStatus::CheckedIn),
            "in-progress" => Some(AppointmentStatus::InProgress),
            "fulfilled" => Some(AppointmentStatus::Fulfilled),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            _ => None,
        }
    }

    /// FHIR `Appointment.status` code.
    pub fn to_fhir(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Accepted => "booked",
            AppointmentStatus::CheckedIn => "checked-in",
            AppointmentStatus::InProgress => "arrived",
            AppointmentStatus::Fulfilled => "fulfilled",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_fhir(s: &str) -> Option<Self> {
        match s {
            "pending" | "proposed" => Some(AppointmentStatus::Pending),
            "booked" => Some(AppointmentStatus::Accepted),
            "checked-in" => Some(AppointmentStatus::CheckedIn),
            "arrived" => Some(AppointmentStatus::InProgress),
            "fulfilled" => Some(AppointmentStatus::Fulfilled),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            _ => None,
        }
    }

    /// No further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, AppointmentStatus::Fulfilled | AppointmentStatus::Cancelled)
    }

    /// Whether the state machine allows `self → next`.
    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        match (self, next) {
            (from, Cancelled) => !from.is_terminal(),
            (Pending, Accepted)
            | (Accepted, CheckedIn)
            | (CheckedIn, InProgress)
            | (InProgress, Fulfilled) => true,
            _ => false,
        }
    }

    /// Date and time may still be changed.
    pub fn is_reschedulable(self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Accepted)
    }
}

/// A booked (or requested) veterinary appointment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentRecord {
    /// Record ID - None until persisted
    pub id: Option<String>,
    /// Pet owner
    pub owner_id: Option<String>,
    pub pet_id: String,
    pub pet_name: Option<String>,
    pub pet_species: Option<String>,
    pub hospital_id: String,
    pub hospital_name: Option<String>,
    pub department: Option<String>,
    pub veterinarian_id: String,
    /// Practice-local calendar day
    pub date: NaiveDate,
    /// 12-hour display time ("10:00 AM")
    pub time_slot: String,
    /// Derived 24-hour time ("10:00")
    pub time_24h: Option<String>,
    /// Derived English day name ("Friday")
    pub day_of_week: Option<String>,
    pub purpose: Option<String>,
    pub concern: Option<String>,
    pub status: AppointmentStatus,
    /// Booking channel (e.g., "app", "walk-in")
    pub source: Option<String>,
    /// Slot identifier from the availability calendar
    pub slot_id: Option<String>,
    pub documents: Vec<FileRef>,
    /// Visit token, immutable once assigned
    pub token_number: Option<String>,
    pub created: Option<DateTime<Utc>>,
}

impl AppointmentRecord {
    /// Create a pending appointment for a slot.
    pub fn new(
        pet_id: impl Into<String>,
        veterinarian_id: impl Into<String>,
        hospital_id: impl Into<String>,
        date: NaiveDate,
        time_slot: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            owner_id: None,
            pet_id: pet_id.into(),
            pet_name: None,
            pet_species: None,
            hospital_id: hospital_id.into(),
            hospital_name: None,
            department: None,
            veterinarian_id: veterinarian_id.into(),
            date,
            time_slot: time_slot.into(),
            time_24h: None,
            day_of_week: None,
            purpose: None,
            concern: None,
            status: AppointmentStatus::Pending,
            source: None,
            slot_id: None,
            documents: Vec::new(),
            token_number: None,
            created: None,
        }
    }
}
