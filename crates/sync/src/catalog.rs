//! Catalog normalization, fingerprinting, and diffing.
//!
//! A descriptor is reduced to its identity fields (id, display name,
//! version). Icons, property schemas and the like are dropped so cosmetic
//! churn upstream never looks like a catalog change.

use chrono::{DateTime, Utc};
use flowsmith_core::error::SyncError;
use flowsmith_core::graph::{CatalogDelta, CatalogEntry};
use flowsmith_core::platform::NodeTypeDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Normalized catalog keyed by node-type id. Iteration is id-ordered.
pub type CatalogMap = BTreeMap<String, CatalogEntry>;

/// Render a descriptor version as a stable string.
///
/// Strings pass through and numbers use their JSON form. Lists and other
/// shapes become compact JSON, so `[1, 2]` and `[2, 1]` stay distinct.
pub fn normalize_version(version: &Value) -> String {
    match version {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

pub fn normalize_entry(descriptor: &NodeTypeDescriptor) -> CatalogEntry {
    CatalogEntry {
        id: descriptor.name.clone(),
        display_name: descriptor.display_name.clone(),
        version: normalize_version(&descriptor.version),
    }
}

/// Normalize a fetched catalog. When an id repeats, the last descriptor wins.
pub fn normalize(descriptors: &[NodeTypeDescriptor]) -> CatalogMap {
    descriptors
        .iter()
        .map(|d| (d.name.clone(), normalize_entry(d)))
        .collect()
}

/// SHA-256 over the id-ordered JSON encoding of the normalized entries.
pub fn fingerprint(catalog: &CatalogMap) -> Result<String, SyncError> {
    let entries: Vec<&CatalogEntry> = catalog.values().collect();
    let bytes =
        serde_json::to_vec(&entries).map_err(|e| SyncError::Serialization(e.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Split the change from `previous` to `current` into three disjoint sets.
///
/// Each set is id-ordered. `removed` carries the entry as it was last seen.
pub fn diff(previous: &CatalogMap, current: &CatalogMap) -> CatalogDelta {
    let mut delta = CatalogDelta::default();

    for (id, entry) in current {
        match previous.get(id) {
            None => delta.added.push(entry.clone()),
            Some(old) if old != entry => delta.modified.push(entry.clone()),
            Some(_) => {}
        }
    }

    delta.removed = previous
        .iter()
        .filter(|(id, _)| !current.contains_key(*id))
        .map(|(_, entry)| entry.clone())
        .collect();

    delta
}

/// The last catalog state the loop applied to the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub fingerprint: String,
    pub entries: Vec<CatalogEntry>,
    pub synced_at: DateTime<Utc>,
}

impl CatalogSnapshot {
    pub fn new(fingerprint: String, catalog: &CatalogMap) -> Self {
        Self {
            fingerprint,
            entries: catalog.values().cloned().collect(),
            synced_at: Utc::now(),
        }
    }

    pub fn to_map(&self) -> CatalogMap {
        self.entries
            .iter()
            .map(|e| (e.id.clone(), e.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
