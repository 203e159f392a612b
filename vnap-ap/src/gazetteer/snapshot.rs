//! Immutable gazetteer snapshot
//!
//! **[APA-IDX-010]** One fully-built, versioned view of the admin unit set.
//! Snapshots are built off to the side and swapped atomically; a search never
//! observes a half-loaded version.

use std::collections::HashMap;

use vnap_common::models::AdminUnit;

use crate::normalizer::normalize_name;

/// Per-unit searchable document: pre-tokenized fields in ranking priority
/// order (normalized name, aliases, folded display name, normalized path).
#[derive(Debug, Clone)]
pub struct SearchDoc {
    pub name_tokens: Vec<String>,
    pub alias_tokens: Vec<Vec<String>>,
    pub display_tokens: Vec<String>,
    pub path_tokens: Vec<String>,
}

/// An immutable, versioned snapshot of the gazetteer.
#[derive(Debug, Default)]
pub struct Snapshot {
    version: String,
    units: Vec<AdminUnit>,
    docs: Vec<SearchDoc>,
    by_id: HashMap<String, usize>,
}

impl Snapshot {
    /// Build a snapshot from a unit set. Tokenization happens once here so
    /// searches are allocation-light.
    pub fn build(units: Vec<AdminUnit>, version: &str) -> Self {
        let mut docs = Vec::with_capacity(units.len());
        let mut by_id = HashMap::with_capacity(units.len());

        for (idx, unit) in units.iter().enumerate() {
            by_id.insert(unit.admin_id.clone(), idx);
            docs.push(SearchDoc {
                name_tokens: tokenize(&unit.normalized_name),
                alias_tokens: unit
                    .aliases
                    .iter()
                    .map(|a| tokenize(&normalize_name(a)))
                    .collect(),
                display_tokens: tokenize(&normalize_name(&unit.name)),
                path_tokens: unit
                    .path_normalized
                    .iter()
                    .flat_map(|p| tokenize(p))
                    .collect(),
            });
        }

        Self {
            version: version.to_string(),
            units,
            docs,
            by_id,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn get(&self, admin_id: &str) -> Option<&AdminUnit> {
        self.by_id.get(admin_id).map(|&idx| &self.units[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AdminUnit, &SearchDoc)> {
        self.units.iter().zip(self.docs.iter())
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}
