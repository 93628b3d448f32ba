use serde::{Deserialize, Serialize};

/// One structured input unit of a template.
///
/// On the wire a field is a flat record (`{ label, type, defaultValue?,
/// options?, allowCustomValue? }`); in memory the kind is a tagged union so a
/// select can never exist without options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawField", into = "RawField")]
pub struct StructuredField {
    pub label: String,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Text {
        default_value: Option<String>,
    },
    Select {
        options: Vec<String>,
        default_value: Option<String>,
        allow_custom_value: bool,
    },
}

impl StructuredField {
    pub fn text(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: FieldKind::Text { default_value: None },
        }
    }

    pub fn text_with_default(label: impl Into<String>, default_value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: FieldKind::Text {
                default_value: Some(default_value.into()),
            },
        }
    }

    /// Builds a select field. An empty option list yields a text field.
    pub fn select(label: impl Into<String>, options: Vec<String>) -> Self {
        let label = label.into();
        if options.is_empty() {
            return Self::text(label);
        }
        Self {
            label,
            kind: FieldKind::Select {
                options,
                default_value: None,
                allow_custom_value: false,
            },
        }
    }

    pub fn is_select(&self) -> bool {
        matches!(self.kind, FieldKind::Select { .. })
    }

    pub fn options(&self) -> Option<&[String]> {
        match &self.kind {
            FieldKind::Select { options, .. } => Some(options),
            FieldKind::Text { .. } => None,
        }
    }

    pub fn default_value(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Text { default_value } | FieldKind::Select { default_value, .. } => {
                default_value.as_deref()
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawField {
    #[serde(default)]
    label: String,
    #[serde(rename = "type", alias = "kind", default)]
    kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    allow_custom_value: Option<bool>,
}

impl From<RawField> for StructuredField {
    fn from(raw: RawField) -> Self {
        let options = raw.options.unwrap_or_default();
        let wants_select = raw.kind.as_deref() == Some("select");

        // A stored select without options is unusable as a dropdown.
        let kind = if wants_select && !options.is_empty() {
            FieldKind::Select {
                options,
                default_value: raw.default_value,
                allow_custom_value: raw.allow_custom_value.unwrap_or(false),
            }
        } else {
            FieldKind::Text {
                default_value: raw.default_value,
            }
        };

        StructuredField {
            label: raw.label,
            kind,
        }
    }
}

impl From<StructuredField> for RawField {
    fn from(field: StructuredField) -> Self {
        match field.kind {
            FieldKind::Text { default_value } => RawField {
                label: field.label,
                kind: Some("text".to_string()),
                default_value,
                options: None,
                allow_custom_value: None,
            },
            FieldKind::Select {
                options,
                default_value,
                allow_custom_value,
            } => RawField {
                label: field.label,
                kind: Some("select".to_string()),
                default_value,
                options: Some(options),
                allow_custom_value: allow_custom_value.then_some(true),
            },
        }
    }
}
