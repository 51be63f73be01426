//! Generic bidirectional mapper between a domain record and a FHIR resource.
//!
//! One [`ResourceMapper`] exists per domain. It is assembled from a per-domain
//! table (see [`crate::mappers`]): an `encode` function for the direct field
//! mappings, a `decode` function that extracts and validates them, and an
//! [`ExtensionRegistry`] for the ancillary fields.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::extension::{ExtensionCodec, ExtensionRegistry};
use crate::wire::{Extension, FhirResource};
use crate::{FhirError, FhirResult};

/// Bidirectional codec `T` ⇄ `R`.
pub struct ResourceMapper<T, R> {
    encode: fn(&T) -> R,
    decode: fn(R) -> FhirResult<T>,
    extensions: ExtensionRegistry<T>,
}

impl<T, R> ResourceMapper<T, R>
where
    R: FhirResource + Serialize + DeserializeOwned,
{
    /// Start a mapper from its direct field mappings.
    pub fn builder(encode: fn(&T) -> R, decode: fn(R) -> FhirResult<T>) -> ResourceMapperBuilder<T, R> {
        ResourceMapperBuilder {
            encode,
            decode,
            extensions: ExtensionRegistry::new(),
        }
    }

    /// The `resourceType` this mapper accepts and produces.
    pub fn resource_type(&self) -> &'static str {
        R::RESOURCE_TYPE
    }

    /// Extension field names this mapper publishes.
    pub fn extension_fields(&self) -> Vec<&'static str> {
        self.extensions.fields()
    }

    /// Encode a record. Never fails for a well-formed record.
    pub fn to_external(&self, record: &T, base_url: &str) -> R {
        let mut resource = (self.encode)(record);
        let extensions = self.extensions.encode(record, base_url);
        resource.extensions_mut().extend(extensions);
        resource
    }

    /// Encode a record as a JSON document.
    pub fn to_document(&self, record: &T, base_url: &str) -> FhirResult<Value> {
        Ok(serde_json::to_value(self.to_external(record, base_url))?)
    }

    /// Decode a JSON document.
    ///
    /// The declared `resourceType` is checked before any field is read, so a
    /// document of the wrong kind fails with
    /// [`FhirError::UnsupportedResourceKind`] rather than a missing-field error.
    pub fn to_internal(&self, doc: &Value) -> FhirResult<T> {
        check_resource_type(doc, R::RESOURCE_TYPE)?;

        let resource = R::deserialize(doc).map_err(|e| {
            FhirError::MalformedInput(format!("{} shape mismatch: {e}", R::RESOURCE_TYPE))
        })?;
        let extensions = resource.extensions().to_vec();

        let mut record = (self.decode)(resource)?;
        self.extensions.decode(&extensions, &mut record);
        Ok(record)
    }

    /// Parse raw JSON text and decode it.
    pub fn parse(&self, text: &str) -> FhirResult<T> {
        let doc: Value =
            serde_json::from_str(text).map_err(|e| FhirError::MalformedInput(e.to_string()))?;
        self.to_internal(&doc)
    }

    /// Encode and serialize to JSON text.
    pub fn render(&self, record: &T, base_url: &str) -> FhirResult<String> {
        Ok(serde_json::to_string(&self.to_external(record, base_url))?)
    }

    /// Apply an edit submission on top of an existing record.
    ///
    /// The existing record is encoded and the submission is merged into it
    /// element by element:
    ///
    /// - objects merge recursively; a `null` removes the element
    /// - `extension` entries merge by field name
    /// - `component`, `note` and `contained` entries merge by their label,
    ///   note prefix and id; every entry under a submitted key replaces the
    ///   stored entries under that key, the rest are kept
    /// - any other array (`photo`, `content`, `name`, ...) is replaced whole
    ///
    /// The merged document is decoded again, so every decode-time rule is
    /// re-checked.
    pub fn merge(&self, existing: &T, submission: &Value, base_url: &str) -> FhirResult<T> {
        check_resource_type(submission, R::RESOURCE_TYPE)?;

        let mut merged = self.to_document(existing, base_url)?;
        let (Some(target), Some(patch)) = (merged.as_object_mut(), submission.as_object()) else {
            return Err(FhirError::MalformedInput("document is not a JSON object".into()));
        };

        merge_object(target, patch)?;
        self.to_internal(&merged)
    }
}

/// Builder for [`ResourceMapper`].
pub struct ResourceMapperBuilder<T, R> {
    encode: fn(&T) -> R,
    decode: fn(R) -> FhirResult<T>,
    extensions: ExtensionRegistry<T>,
}

impl<T, R> ResourceMapperBuilder<T, R> {
    pub fn extension(mut self, codec: impl ExtensionCodec<T> + 'static) -> Self {
        self.extensions = self.extensions.with(codec);
        self
    }

    pub fn build(self) -> ResourceMapper<T, R> {
        ResourceMapper {
            encode: self.encode,
            decode: self.decode,
            extensions: self.extensions,
        }
    }
}

/// Reject anything that is not an object declaring `expected` as its kind.
pub fn check_resource_type(doc: &Value, expected: &str) -> FhirResult<()> {
    let obj = doc
        .as_object()
        .ok_or_else(|| FhirError::MalformedInput("document is not a JSON object".into()))?;

    match obj.get("resourceType").and_then(Value::as_str) {
        Some(found) if found == expected => Ok(()),
        Some(found) => Err(FhirError::UnsupportedResourceKind {
            expected: expected.to_string(),
            found: found.to_string(),
        }),
        None => Err(FhirError::MissingRequiredField("resourceType".into())),
    }
}

fn merge_object(target: &mut Map<String, Value>, patch: &Map<String, Value>) -> FhirResult<()> {
    for (key, value) in patch {
        if value.is_null() {
            target.remove(key);
            continue;
        }
        let merged = match (key.as_str(), target.remove(key)) {
            ("extension", current) => {
                merge_extensions(current.unwrap_or_else(|| Value::Array(Vec::new())), value)?
            }
            (_, Some(Value::Object(mut current))) if value.is_object() => {
                if let Value::Object(patch) = value {
                    merge_object(&mut current, patch)?;
                }
                Value::Object(current)
            }
            (_, Some(Value::Array(current))) => match (entry_key_for(key), value.as_array()) {
                (Some(entry_key), Some(incoming)) => Value::Array(merge_keyed(current, incoming, entry_key)),
                _ => value.clone(),
            },
            _ => value.clone(),
        };
        target.insert(key.clone(), merged);
    }
    Ok(())
}

/// How entries of a keyed array are identified.
fn entry_key_for(element: &str) -> Option<fn(&Value) -> Option<String>> {
    match element {
        "component" => Some(component_label),
        "note" => Some(note_prefix),
        "contained" => Some(contained_id),
        _ => None,
    }
}

fn component_label(entry: &Value) -> Option<String> {
    let code = entry.get("code")?;
    code.get("text")
        .and_then(Value::as_str)
        .or_else(|| code.pointer("/coding/0/display").and_then(Value::as_str))
        .map(str::to_string)
}

/// "Next due: 2026-01-15" → "Next due"
fn note_prefix(entry: &Value) -> Option<String> {
    let text = entry.get("text")?.as_str()?;
    text.split_once(':').map(|(prefix, _)| prefix.trim().to_string())
}

fn contained_id(entry: &Value) -> Option<String> {
    entry.get("id")?.as_str().map(str::to_string)
}

/// Stored entries whose key is submitted are replaced, in place, by every
/// submitted entry with that key. Unkeyed or new entries are appended.
fn merge_keyed(current: Vec<Value>, incoming: &[Value], key: fn(&Value) -> Option<String>) -> Vec<Value> {
    let submitted: HashSet<String> = incoming.iter().filter_map(key).collect();
    let present: HashSet<String> = current.iter().filter_map(key).collect();
    let mut placed = HashSet::new();
    let mut merged = Vec::with_capacity(current.len() + incoming.len());

    for entry in current {
        match key(&entry) {
            Some(k) if submitted.contains(&k) => {
                if placed.insert(k.clone()) {
                    merged.extend(incoming.iter().filter(|e| key(e).as_ref() == Some(&k)).cloned());
                }
            }
            _ => merged.push(entry),
        }
    }

    merged.extend(
        incoming
            .iter()
            .filter(|e| key(e).map_or(true, |k| !present.contains(&k)))
            .cloned(),
    );
    merged
}

fn merge_extensions(current: Value, incoming: &Value) -> FhirResult<Value> {
    let mut merged: Vec<Extension> = Vec::deserialize(&current)
        .map_err(|e| FhirError::MalformedInput(format!("extension: {e}")))?;
    let incoming: Vec<Extension> = Vec::deserialize(incoming)
        .map_err(|e| FhirError::MalformedInput(format!("extension: {e}")))?;

    for ext in incoming {
        match merged
            .iter_mut()
            .find(|e| e.field_name() == ext.field_name())
        {
            Some(slot) => *slot = ext,
            None => merged.push(ext),
        }
    }

    Ok(serde_json::to_value(merged)?)
}
