use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldCategory {
    UserId,
    Name,
    Email,
    Phone,
}

impl FieldCategory {
    pub const ALL: [FieldCategory; 4] = [
        FieldCategory::UserId,
        FieldCategory::Name,
        FieldCategory::Email,
        FieldCategory::Phone,
    ];

    /// Built-in label list; also the fallback when the stored registry is unreadable.
    pub fn default_labels(self) -> Vec<String> {
        let labels: &[&str] = match self {
            FieldCategory::UserId => &["User ID", "UserID", "Employee ID", "Username", "Login ID"],
            FieldCategory::Name => &["Name", "User Name", "Full Name", "Caller Name", "Contact Name"],
            FieldCategory::Email => &["Email", "Email Address", "E-mail", "Contact Email"],
            FieldCategory::Phone => &["Phone", "Phone Number", "Callback Number", "Contact Number"],
        };
        labels.iter().map(|label| label.to_string()).collect()
    }
}

impl std::str::FromStr for FieldCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "userId" | "user_id" => Ok(FieldCategory::UserId),
            "name" => Ok(FieldCategory::Name),
            "email" => Ok(FieldCategory::Email),
            "phone" => Ok(FieldCategory::Phone),
            other => Err(format!("Unknown field category: {other}")),
        }
    }
}

/// Acceptable field labels per contact attribute. Order within a category is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLabelRegistry {
    sets: BTreeMap<FieldCategory, Vec<String>>,
}

impl Default for FieldLabelRegistry {
    fn default() -> Self {
        let sets = FieldCategory::ALL
            .iter()
            .map(|category| (*category, category.default_labels()))
            .collect();
        Self { sets }
    }
}

impl FieldLabelRegistry {
    pub fn labels(&self, category: FieldCategory) -> Vec<String> {
        self.sets
            .get(&category)
            .cloned()
            .unwrap_or_else(|| category.default_labels())
    }

    /// Returns false when the label is blank or already listed.
    pub fn add(&mut self, category: FieldCategory, label: &str) -> bool {
        let label = label.trim();
        if label.is_empty() {
            return false;
        }
        let labels = self
            .sets
            .entry(category)
            .or_insert_with(|| category.default_labels());
        if labels.iter().any(|existing| existing == label) {
            return false;
        }
        labels.push(label.to_string());
        true
    }

    pub fn remove(&mut self, category: FieldCategory, label: &str) -> bool {
        let labels = self
            .sets
            .entry(category)
            .or_insert_with(|| category.default_labels());
        let before = labels.len();
        labels.retain(|existing| existing != label);
        labels.len() != before
    }

    pub fn reset(&mut self, category: FieldCategory) {
        self.sets.insert(category, category.default_labels());
    }

    pub fn reset_all(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid pattern for '{key}': {source}")]
    InvalidPattern {
        key: String,
        #[source]
        source: regex::Error,
    },

    #[error("no built-in pattern named '{0}'")]
    UnknownDefault(String),
}

/// A named detection expression and the field labels its matches should populate.
#[derive(Debug, Clone)]
pub struct LabeledPattern {
    pub key: String,
    pub source: String,
    pub flags: String,
    pub target_field_labels: Vec<String>,
    detection: Regex,
    full_line: Regex,
}

impl LabeledPattern {
    /// Compiles `source` with JavaScript-style flag letters (`i`, `m`, `s`; others ignored).
    pub fn new(
        key: impl Into<String>,
        source: impl Into<String>,
        flags: impl Into<String>,
        target_field_labels: Vec<String>,
    ) -> Result<Self, RegistryError> {
        let key = key.into();
        let source = source.into();
        let flags = flags.into();

        let detection = build_regex(&source, &flags).map_err(|source| RegistryError::InvalidPattern {
            key: key.clone(),
            source,
        })?;
        let full_line = build_regex(&format!("^(?:{source})$"), &flags).map_err(|source| {
            RegistryError::InvalidPattern {
                key: key.clone(),
                source,
            }
        })?;

        Ok(Self {
            key,
            source,
            flags,
            target_field_labels,
            detection,
            full_line,
        })
    }

    pub fn detection_pattern(&self) -> &Regex {
        &self.detection
    }

    /// True when the expression can match the entire line, not just a part of it.
    pub fn matches_line(&self, line: &str) -> bool {
        self.full_line.is_match(line)
    }
}

impl PartialEq for LabeledPattern {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && self.source == other.source
            && self.flags == other.flags
            && self.target_field_labels == other.target_field_labels
    }
}

fn build_regex(source: &str, flags: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(source)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build()
}

struct DefaultPattern {
    key: &'static str,
    source: &'static str,
    flags: &'static str,
    targets: &'static [&'static str],
}

const DEFAULT_PATTERNS: &[DefaultPattern] = &[
    DefaultPattern {
        key: "workstation",
        source: r"TH\d{9}[A-Z]",
        flags: "i",
        targets: &["Workstation ID", "Workstation", "Computer Name", "Hostname"],
    },
    DefaultPattern {
        key: "ipAddress",
        source: r"(?:(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)",
        flags: "",
        targets: &["IP Address", "IP"],
    },
    DefaultPattern {
        key: "macAddress",
        source: r"(?:[0-9A-F]{2}[:-]){5}[0-9A-F]{2}",
        flags: "i",
        targets: &["MAC Address", "MAC"],
    },
    DefaultPattern {
        key: "email",
        source: r"[^\s@]+@[^\s@]+\.[^\s@]+",
        flags: "",
        targets: &["Email", "Email Address"],
    },
    DefaultPattern {
        key: "ticketNumber",
        source: r"(?:INC|REQ|RITM)\d{7}",
        flags: "i",
        targets: &["Ticket Number", "Incident Number", "Ticket"],
    },
    DefaultPattern {
        key: "phone",
        source: r"\+?\d[\d\s().-]{6,}\d",
        flags: "",
        targets: &["Phone", "Phone Number", "Callback Number"],
    },
];

fn default_pattern(key: &str) -> Option<LabeledPattern> {
    DEFAULT_PATTERNS
        .iter()
        .find(|pattern| pattern.key == key)
        .and_then(|pattern| {
            LabeledPattern::new(
                pattern.key,
                pattern.source,
                pattern.flags,
                pattern.targets.iter().map(|label| label.to_string()).collect(),
            )
            .ok()
        })
}

/// Ordered set of detection patterns. Iteration order decides which pattern wins a line.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternRegistry {
    patterns: Vec<LabeledPattern>,
}

impl Default for PatternRegistry {
    fn default() -> Self {
        let patterns = DEFAULT_PATTERNS
            .iter()
            .filter_map(|pattern| default_pattern(pattern.key))
            .collect();
        Self { patterns }
    }
}

impl PatternRegistry {
    pub fn empty() -> Self {
        Self { patterns: Vec::new() }
    }

    pub fn from_patterns(patterns: Vec<LabeledPattern>) -> Self {
        Self { patterns }
    }

    pub fn is_builtin(key: &str) -> bool {
        DEFAULT_PATTERNS.iter().any(|pattern| pattern.key == key)
    }

    pub fn builtin(key: &str) -> Option<LabeledPattern> {
        default_pattern(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabeledPattern> {
        self.patterns.iter()
    }

    pub fn get(&self, key: &str) -> Option<&LabeledPattern> {
        self.patterns.iter().find(|pattern| pattern.key == key)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Replaces the entry in place, or appends it when the key is new.
    pub fn update(
        &mut self,
        key: &str,
        source: &str,
        flags: &str,
        target_field_labels: Vec<String>,
    ) -> Result<(), RegistryError> {
        let pattern = LabeledPattern::new(key, source, flags, target_field_labels)?;
        self.upsert(pattern);
        Ok(())
    }

    pub fn upsert(&mut self, pattern: LabeledPattern) {
        match self.patterns.iter_mut().find(|existing| existing.key == pattern.key) {
            Some(slot) => *slot = pattern,
            None => self.patterns.push(pattern),
        }
    }

    pub fn reset(&mut self, key: &str) -> Result<(), RegistryError> {
        let pattern =
            default_pattern(key).ok_or_else(|| RegistryError::UnknownDefault(key.to_string()))?;
        self.upsert(pattern);
        Ok(())
    }

    pub fn reset_all(&mut self) {
        *self = Self::default();
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.patterns.len();
        self.patterns.retain(|pattern| pattern.key != key);
        self.patterns.len() != before
    }
}
