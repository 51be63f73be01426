//! DiabetesObservation ⇄ Observation.
//!
//! Every clinical value is one `component`, identified by a fixed label that
//! may appear either as `code.text` or as a coding `display`.

use chrono::{DateTime, NaiveDateTime};

use super::non_empty;
use crate::mapper::ResourceMapper;
use crate::models::{DiabetesObservation, FileRef};
use crate::wire::{
    CodeableConcept, Coding, Observation, ObservationComponent, Quantity, Reference,
};
use crate::{practice_offset, FhirError, FhirResult};

/// Prefix added to the record id to form the Observation id.
pub const DIABETES_ID_PREFIX: &str = "diabetes-log-";

const LOINC: &str = "http://loinc.org";
const UCUM: &str = "http://unitsofmeasure.org";
const CATEGORY_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/observation-category";
const IMAGE_LABEL: &str = "Body Condition Image";

pub type DiabetesMapper = ResourceMapper<DiabetesObservation, Observation>;

struct TextComponent {
    label: &'static str,
    get: fn(&DiabetesObservation) -> Option<&str>,
    set: fn(&mut DiabetesObservation, String),
}

struct QuantityComponent {
    label: &'static str,
    loinc: &'static str,
    unit: &'static str,
    get: fn(&DiabetesObservation) -> Option<f64>,
    set: fn(&mut DiabetesObservation, f64),
}

fn text_components() -> [TextComponent; 7] {
    [
        TextComponent {
            label: "Water Intake",
            get: |d| d.water_intake.as_deref(),
            set: |d, v| d.water_intake = Some(v),
        },
        TextComponent {
            label: "Food Intake",
            get: |d| d.food_intake.as_deref(),
            set: |d, v| d.food_intake = Some(v),
        },
        TextComponent {
            label: "Activity Level",
            get: |d| d.activity_level.as_deref(),
            set: |d, v| d.activity_level = Some(v),
        },
        TextComponent {
            label: "Urination",
            get: |d| d.urination.as_deref(),
            set: |d, v| d.urination = Some(v),
        },
        TextComponent {
            label: "Signs of Illness",
            get: |d| d.illness_signs.as_deref(),
            set: |d, v| d.illness_signs = Some(v),
        },
        TextComponent {
            label: "Urine Glucose",
            get: |d| d.urine_glucose.as_deref(),
            set: |d, v| d.urine_glucose = Some(v),
        },
        TextComponent {
            label: "Urine Ketones",
            get: |d| d.urine_ketones.as_deref(),
            set: |d, v| d.urine_ketones = Some(v),
        },
    ]
}

fn quantity_components() -> [QuantityComponent; 2] {
    [
        QuantityComponent {
            label: "Blood Glucose",
            loinc: "2339-0",
            unit: "mg/dL",
            get: |d| d.blood_glucose,
            set: |d, v| d.blood_glucose = Some(v),
        },
        QuantityComponent {
            label: "Weight",
            loinc: "29463-7",
            unit: "kg",
            get: |d| d.weight,
            set: |d, v| d.weight = Some(v),
        },
    ]
}

/// Mapper for diabetes monitoring logs.
pub fn diabetes_mapper() -> DiabetesMapper {
    ResourceMapper::builder(encode, decode).build()
}

fn encode(log: &DiabetesObservation) -> Observation {
    let mut component = Vec::new();

    for field in text_components() {
        if let Some(value) = (field.get)(log) {
            component.push(ObservationComponent {
                code: CodeableConcept::text(field.label),
                value_string: Some(value.to_string()),
                ..ObservationComponent::default()
            });
        }
    }

    for field in quantity_components() {
        if let Some(value) = (field.get)(log) {
            component.push(ObservationComponent {
                code: CodeableConcept {
                    coding: vec![Coding::new(LOINC, field.loinc, field.label)],
                    text: Some(field.label.to_string()),
                },
                value_quantity: Some(Quantity {
                    value: Some(value),
                    unit: Some(field.unit.to_string()),
                    system: Some(UCUM.to_string()),
                    code: Some(field.unit.to_string()),
                }),
                ..ObservationComponent::default()
            });
        }
    }

    for image in &log.body_condition_images {
        component.push(ObservationComponent {
            code: CodeableConcept::text(IMAGE_LABEL),
            value_attachment: Some(image.to_attachment()),
            ..ObservationComponent::default()
        });
    }

    Observation {
        resource_type: "Observation".to_string(),
        id: log.id.as_ref().map(|id| format!("{DIABETES_ID_PREFIX}{id}")),
        status: Some("final".to_string()),
        category: vec![CodeableConcept::coded(Coding::new(
            CATEGORY_SYSTEM,
            "vital-signs",
            "Vital Signs",
        ))],
        code: Some(CodeableConcept {
            coding: vec![Coding::new(LOINC, "55423-8", "Diabetes monitoring log")],
            text: Some("Diabetes Monitoring".to_string()),
        }),
        subject: Some(Reference::to("Patient", &log.pet_id)),
        encounter: log.appointment_id.as_deref().map(|id| Reference::to("Encounter", id)),
        effective_date_time: log
            .recorded_at
            .map(|at| at.format("%Y-%m-%dT%H:%M:%S+05:30").to_string()),
        performer: log
            .vet_id
            .as_deref()
            .map(|id| Reference::to("Practitioner", id))
            .into_iter()
            .collect(),
        component,
        extension: Vec::new(),
    }
}

fn find_component<'a>(components: &'a [ObservationComponent], label: &str) -> Option<&'a ObservationComponent> {
    components.iter().find(|c| c.code.matches_label(label))
}

fn decode(observation: Observation) -> FhirResult<DiabetesObservation> {
    let pet_id = observation
        .subject
        .as_ref()
        .and_then(|s| s.id_for("Patient"))
        .ok_or_else(|| FhirError::MissingRequiredField("subject.reference".into()))?;

    let mut log = DiabetesObservation::new(pet_id);
    log.id = observation
        .id
        .map(|id| id.strip_prefix(DIABETES_ID_PREFIX).map(str::to_string).unwrap_or(id));
    log.appointment_id = observation
        .encounter
        .as_ref()
        .and_then(|e| e.id_for("Encounter"))
        .map(str::to_string);
    log.vet_id = observation
        .performer
        .iter()
        .find_map(|p| p.id_for("Practitioner"))
        .map(str::to_string);
    log.recorded_at = parse_effective(observation.effective_date_time.as_deref())?;

    for field in text_components() {
        let value = find_component(&observation.component, field.label)
            .and_then(|c| c.value_string.clone());
        if let Some(value) = value {
            (field.set)(&mut log, value);
        }
    }

    for field in quantity_components() {
        let value = find_component(&observation.component, field.label)
            .and_then(|c| c.value_quantity.as_ref())
            .and_then(|q| q.value);
        if let Some(value) = value {
            (field.set)(&mut log, value);
        }
    }

    log.body_condition_images = observation
        .component
        .iter()
        .filter(|c| c.code.matches_label(IMAGE_LABEL))
        .filter_map(|c| c.value_attachment.as_ref())
        .map(FileRef::from_attachment)
        .collect();

    Ok(log)
}

/// `effectiveDateTime` as a practice-local wall-clock time.
fn parse_effective(value: Option<&str>) -> FhirResult<Option<NaiveDateTime>> {
    let Some(raw) = non_empty(value) else {
        return Ok(None);
    };
    let instant = DateTime::parse_from_rfc3339(&raw).map_err(|_| FhirError::InvalidDate {
        field: "effectiveDateTime".into(),
        value: raw.clone(),
    })?;
    Ok(Some(instant.with_timezone(&practice_offset()).naive_local()))
}
