//! Bundle envelopes for list responses.

use serde::{Deserialize, Serialize};

use crate::wire::{Bundle, BundleEntry};

/// Bundle `type`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BundleKind {
    Collection,
    Searchset,
}

impl<R> Bundle<R> {
    /// Wrap resources in a bundle. `total` always equals the number of entries.
    pub fn wrap(resources: Vec<R>, kind: BundleKind) -> Self {
        let entry: Vec<BundleEntry<R>> = resources
            .into_iter()
            .map(|resource| BundleEntry { resource })
            .collect();

        Self {
            resource_type: "Bundle".to_string(),
            kind,
            total: entry.len(),
            entry,
        }
    }

    pub fn resources(&self) -> impl Iterator<Item = &R> {
        self.entry.iter().map(|e| &e.resource)
    }
}
