//! Storage adapter for the two registry config documents.
//!
//! Patterns are persisted as `{ key, source, flags, targetFieldLabels }` and
//! recompiled on load. A stored pattern that no longer compiles falls back to
//! its built-in counterpart, or is dropped when it has none.

use crate::models::registry::{FieldLabelRegistry, LabeledPattern, PatternRegistry};
use crate::store::{Collection, KeyValueStore, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const FIELD_LABELS_KEY: &str = "fieldLabels";
pub const PATTERNS_KEY: &str = "patterns";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPattern {
    pub key: String,
    pub source: String,
    #[serde(default)]
    pub flags: String,
    #[serde(default)]
    pub target_field_labels: Vec<String>,
}

impl From<&LabeledPattern> for StoredPattern {
    fn from(pattern: &LabeledPattern) -> Self {
        Self {
            key: pattern.key.clone(),
            source: pattern.source.clone(),
            flags: pattern.flags.clone(),
            target_field_labels: pattern.target_field_labels.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PatternDocument {
    patterns: Vec<StoredPattern>,
}

pub fn load_field_labels(store: &dyn KeyValueStore) -> Result<FieldLabelRegistry, StoreError> {
    match store.get(Collection::Config, FIELD_LABELS_KEY)? {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Ok(FieldLabelRegistry::default()),
    }
}

pub fn save_field_labels(
    store: &dyn KeyValueStore,
    registry: &FieldLabelRegistry,
) -> Result<(), StoreError> {
    let value = serde_json::to_value(registry)?;
    store.put(Collection::Config, FIELD_LABELS_KEY, &value)
}

pub fn load_patterns(store: &dyn KeyValueStore) -> Result<PatternRegistry, StoreError> {
    let Some(value) = store.get(Collection::Config, PATTERNS_KEY)? else {
        return Ok(PatternRegistry::default());
    };
    let document: PatternDocument = serde_json::from_value(value)?;
    Ok(compile_stored(document.patterns))
}

pub fn save_patterns(store: &dyn KeyValueStore, registry: &PatternRegistry) -> Result<(), StoreError> {
    let patterns: Vec<StoredPattern> = registry.iter().map(StoredPattern::from).collect();
    store.put(Collection::Config, PATTERNS_KEY, &json!({ "patterns": patterns }))
}

fn compile_stored(stored: Vec<StoredPattern>) -> PatternRegistry {
    let patterns = stored
        .into_iter()
        .filter_map(|entry| {
            match LabeledPattern::new(
                entry.key.clone(),
                entry.source,
                entry.flags,
                entry.target_field_labels,
            ) {
                Ok(pattern) => Some(pattern),
                Err(err) => {
                    let fallback = PatternRegistry::builtin(&entry.key);
                    log::warn!(
                        "Stored pattern '{}' failed to compile ({err}); {}",
                        entry.key,
                        if fallback.is_some() { "using built-in" } else { "dropping it" }
                    );
                    fallback
                }
            }
        })
        .collect();
    PatternRegistry::from_patterns(patterns)
}
