//! PetProfile ⇄ Patient.

use chrono::{DateTime, Utc};

use super::{non_empty, parse_optional_date};
use crate::extension::{CompositeExtension, ScalarExtension};
use crate::mapper::ResourceMapper;
use crate::models::{FileRef, PetProfile};
use crate::wire::{CodeableConcept, Coding, HumanName, Meta, Patient, PatientAnimal};
use crate::{FhirError, FhirResult};

const SPECIES_SYSTEM: &str = "http://hl7.org/fhir/animal-species";
const BREED_SYSTEM: &str = "http://hl7.org/fhir/animal-breed";
const GENDER_STATUS_SYSTEM: &str = "http://hl7.org/fhir/animal-genderstatus";

pub type PetMapper = ResourceMapper<PetProfile, Patient>;

/// Mapper for pet profiles.
///
/// Direct fields: `name[0].text`, `gender`, `birthDate`, `active`, `photo[]`,
/// `meta.lastUpdated` and the `animal` element. Everything else travels as an
/// extension.
pub fn pet_mapper() -> PetMapper {
    ResourceMapper::builder(encode, decode)
        .extension(ScalarExtension::string(
            "ownerId",
            |p: &PetProfile| p.owner_id.as_deref(),
            |p, v| p.owner_id = Some(v),
        ))
        .extension(ScalarExtension::string(
            "weight",
            |p: &PetProfile| p.weight.as_deref(),
            |p, v| p.weight = Some(v),
        ))
        .extension(ScalarExtension::string(
            "color",
            |p: &PetProfile| p.color.as_deref(),
            |p, v| p.color = Some(v),
        ))
        .extension(ScalarExtension::string(
            "bloodGroup",
            |p: &PetProfile| p.blood_group.as_deref(),
            |p, v| p.blood_group = Some(v),
        ))
        .extension(ScalarExtension::string(
            "ageWhenNeutered",
            |p: &PetProfile| p.age_when_neutered.as_deref(),
            |p, v| p.age_when_neutered = Some(v),
        ))
        .extension(ScalarExtension::string(
            "microchipNumber",
            |p: &PetProfile| p.microchip_number.as_deref(),
            |p, v| p.microchip_number = Some(v),
        ))
        .extension(ScalarExtension::string(
            "passportNumber",
            |p: &PetProfile| p.passport_number.as_deref(),
            |p, v| p.passport_number = Some(v),
        ))
        .extension(ScalarExtension::string(
            "origin",
            |p: &PetProfile| p.origin.as_deref(),
            |p, v| p.origin = Some(v),
        ))
        .extension(
            CompositeExtension::new("insurance")
                .part(ScalarExtension::string(
                    "company",
                    |p: &PetProfile| p.insurance_company.as_deref(),
                    |p, v| p.insurance_company = Some(v),
                ))
                .part(ScalarExtension::string(
                    "policyNumber",
                    |p: &PetProfile| p.policy_number.as_deref(),
                    |p, v| p.policy_number = Some(v),
                )),
        )
        .build()
}

fn slug(value: &str) -> String {
    value.trim().to_lowercase().replace(' ', "-")
}

fn encode(pet: &PetProfile) -> Patient {
    let species = pet
        .species
        .as_deref()
        .map(|s| CodeableConcept::coded(Coding::new(SPECIES_SYSTEM, &slug(s), s)));

    let breed = pet.breed.as_deref().map(|b| CodeableConcept {
        coding: vec![Coding::new(BREED_SYSTEM, &slug(b), b)],
        text: Some(b.to_string()),
    });

    let gender_status = pet.neutered.map(|neutered| {
        let (code, display) = if neutered {
            ("neutered", "Neutered")
        } else {
            ("intact", "Intact")
        };
        CodeableConcept::coded(Coding::new(GENDER_STATUS_SYSTEM, code, display))
    });

    let animal = if species.is_some() || breed.is_some() || gender_status.is_some() {
        Some(PatientAnimal {
            species,
            breed,
            gender_status,
        })
    } else {
        None
    };

    Patient {
        resource_type: "Patient".to_string(),
        id: pet.id.clone(),
        meta: pet.last_updated.map(|t| Meta {
            last_updated: Some(t.to_rfc3339()),
        }),
        active: Some(pet.active),
        name: vec![HumanName {
            text: Some(pet.name.clone()),
        }],
        gender: pet.gender.as_deref().map(str::to_lowercase),
        birth_date: pet.birth_date.map(|d| d.format("%Y-%m-%d").to_string()),
        photo: pet.images.iter().map(FileRef::to_attachment).collect(),
        animal,
        extension: Vec::new(),
    }
}

/// "male" → "Male"
fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn decode(patient: Patient) -> FhirResult<PetProfile> {
    let name = non_empty(patient.name.first().and_then(|n| n.text.as_deref()))
        .ok_or_else(|| FhirError::MissingRequiredField("name[0].text".into()))?;

    let mut pet = PetProfile::new(name);
    pet.id = patient.id;
    pet.active = patient.active.unwrap_or(true);
    pet.gender = non_empty(patient.gender.as_deref()).map(|g| capitalize(&g));
    pet.birth_date = parse_optional_date("birthDate", patient.birth_date.as_deref())?;
    pet.images = patient.photo.iter().map(FileRef::from_attachment).collect();

    if let Some(animal) = patient.animal {
        pet.species = animal
            .species
            .as_ref()
            .and_then(|s| non_empty(s.first_display()));
        pet.breed = animal
            .breed
            .as_ref()
            .and_then(|b| non_empty(b.text.as_deref()).or_else(|| non_empty(b.first_display())));
        pet.neutered = animal
            .gender_status
            .as_ref()
            .and_then(|g| g.first_code())
            .map(|code| code == "neutered");
    }

    if let Some(raw) = patient.meta.and_then(|m| m.last_updated) {
        let parsed = DateTime::parse_from_rfc3339(&raw).map_err(|_| FhirError::InvalidDate {
            field: "meta.lastUpdated".into(),
            value: raw.clone(),
        })?;
        pet.last_updated = Some(parsed.with_timezone(&Utc));
    }

    Ok(pet)
}
