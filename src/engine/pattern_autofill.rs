use crate::models::field::StructuredField;
use crate::models::registry::PatternRegistry;
use crate::store::registry_store::load_patterns;
use crate::store::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub value: String,
    pub pattern_key: String,
    pub target_field_labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedUpdate {
    pub label: String,
    pub value: String,
    pub pattern_key: String,
}

/// One match per line: the first registered pattern that matches the whole line.
pub fn scan(pasted_text: &str, registry: &PatternRegistry, max_lines: usize) -> Vec<PatternMatch> {
    pasted_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(max_lines)
        .filter_map(|line| {
            let pattern = registry.iter().find(|pattern| pattern.matches_line(line));
            match pattern {
                Some(pattern) => {
                    log::debug!("Line matched pattern '{}'", pattern.key);
                    Some(PatternMatch {
                        value: line.to_string(),
                        pattern_key: pattern.key.clone(),
                        target_field_labels: pattern.target_field_labels.clone(),
                    })
                }
                None => None,
            }
        })
        .collect()
}

/// Exact case-insensitive label match first, then substring containment either way.
pub fn best_target<'a>(
    fields: &'a [StructuredField],
    target_labels: &[String],
) -> Option<&'a StructuredField> {
    let targets: Vec<String> = target_labels
        .iter()
        .map(|label| label.trim().to_lowercase())
        .filter(|label| !label.is_empty())
        .collect();

    let exact = fields.iter().find(|field| {
        let label = field.label.trim().to_lowercase();
        targets.iter().any(|target| *target == label)
    });
    if exact.is_some() {
        return exact;
    }

    fields.iter().find(|field| {
        let label = field.label.trim().to_lowercase();
        !label.is_empty()
            && targets
                .iter()
                .any(|target| target.contains(&label) || label.contains(target.as_str()))
    })
}

/// Fills empty fields from `matches` in order; populated fields are never overwritten.
pub fn apply(
    matches: &[PatternMatch],
    fields: &[StructuredField],
    values: &mut HashMap<String, String>,
) -> Vec<AppliedUpdate> {
    let mut applied = Vec::new();

    for found in matches {
        let Some(field) = best_target(fields, &found.target_field_labels) else {
            continue;
        };

        let is_empty = values
            .get(&field.label)
            .map_or(true, |current| current.trim().is_empty());
        if !is_empty {
            log::debug!(
                "Skipping '{}' for pattern '{}': field already populated",
                field.label,
                found.pattern_key
            );
            continue;
        }

        values.insert(field.label.clone(), found.value.clone());
        applied.push(AppliedUpdate {
            label: field.label.clone(),
            value: found.value.clone(),
            pattern_key: found.pattern_key.clone(),
        });
    }

    applied
}

pub struct PatternAutofillEngine {
    registry: PatternRegistry,
    max_lines: usize,
}

impl PatternAutofillEngine {
    /// Reads the pattern registry from the store, degrading to built-in patterns on failure.
    pub fn from_store(store: &dyn KeyValueStore, max_lines: usize) -> Self {
        let registry = load_patterns(store).unwrap_or_else(|e| {
            log::warn!("Pattern registry unavailable ({e}); using built-in patterns");
            PatternRegistry::default()
        });
        Self { registry, max_lines }
    }

    pub fn with_registry(registry: PatternRegistry, max_lines: usize) -> Self {
        Self { registry, max_lines }
    }

    pub fn scan(&self, pasted_text: &str) -> Vec<PatternMatch> {
        scan(pasted_text, &self.registry, self.max_lines)
    }

    pub fn autofill(
        &self,
        pasted_text: &str,
        fields: &[StructuredField],
        values: &mut HashMap<String, String>,
    ) -> Vec<AppliedUpdate> {
        let matches = self.scan(pasted_text);
        apply(&matches, fields, values)
    }
}
