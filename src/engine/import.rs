//! Import/export of the issue and template collections.
//!
//! Each collection may arrive as a bare array (legacy files) or wrapped in an
//! export object carrying metadata; the combined export holds both arrays.
//! Entities are checked member by member on the raw JSON, metrics are
//! backfilled, and the cross-references between issues and templates must
//! hold before anything is returned.

use crate::models::catalog::{CatalogSnapshot, Issue, Metrics, Template};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("{source_name} is not valid JSON: {message}")]
    MalformedJson { source_name: String, message: String },

    #[error("unrecognized {source_name} format: expected an array or an object with '{expected}'")]
    UnrecognizedShape {
        source_name: String,
        expected: String,
    },

    #[error("invalid {entity} at index {index}: {reason}")]
    InvalidEntity {
        entity: &'static str,
        index: usize,
        reason: String,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("template '{template}' listed under issue '{issue}' does not exist")]
    MissingTemplate { template: String, issue: String },

    #[error("template '{template}' listed under issue '{issue}' is defined {count} times")]
    DuplicateTemplate {
        template: String,
        issue: String,
        count: usize,
    },

    #[error("template '{template}' is listed under issue '{issue}' but belongs to '{actual_issue}'")]
    IssueMismatch {
        template: String,
        issue: String,
        actual_issue: String,
    },

    #[error("issue '{issue}' is defined more than once")]
    DuplicateIssue { issue: String },
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityError),
}

#[derive(Clone, Copy)]
enum EntityKind {
    Issue,
    Template,
}

impl EntityKind {
    fn name(self) -> &'static str {
        match self {
            EntityKind::Issue => "issue",
            EntityKind::Template => "template",
        }
    }

    fn array_key(self) -> &'static str {
        match self {
            EntityKind::Issue => "issues",
            EntityKind::Template => "templates",
        }
    }

    fn string_members(self) -> &'static [&'static str] {
        match self {
            EntityKind::Issue => &["name"],
            EntityKind::Template => &["issue", "name", "kba"],
        }
    }
}

/// Parses the issues file and templates file of a split export.
pub fn parse_collections(
    issues_text: &str,
    templates_text: &str,
) -> Result<CatalogSnapshot, ImportError> {
    let issues = parse_issues(issues_text)?;
    let templates = parse_templates(templates_text)?;
    confirm_matching_templates(&issues, &templates)?;

    log::info!(
        "Parsed import: {} issues, {} templates",
        issues.len(),
        templates.len()
    );
    Ok(CatalogSnapshot { issues, templates })
}

/// Parses a combined export holding both collections in one object.
pub fn parse_combined(combined_text: &str) -> Result<CatalogSnapshot, ImportError> {
    let root = parse_json(combined_text, "combined export")?;
    let (Some(issues_value), Some(templates_value)) = (
        root.get("issues").filter(|value| value.is_array()),
        root.get("templates").filter(|value| value.is_array()),
    ) else {
        return Err(FormatError::UnrecognizedShape {
            source_name: "combined export".to_string(),
            expected: "issues' and 'templates".to_string(),
        }
        .into());
    };

    let issues = normalize_entities(issues_value, EntityKind::Issue)?;
    let templates = normalize_entities(templates_value, EntityKind::Template)?;
    confirm_matching_templates(&issues, &templates)?;

    log::info!(
        "Parsed combined import: {} issues, {} templates",
        issues.len(),
        templates.len()
    );
    Ok(CatalogSnapshot { issues, templates })
}

pub fn parse_issues(text: &str) -> Result<Vec<Issue>, FormatError> {
    let root = parse_json(text, "issues file")?;
    let entities = unwrap_collection(&root, EntityKind::Issue, "issues file")?;
    normalize_entities(entities, EntityKind::Issue)
}

pub fn parse_templates(text: &str) -> Result<Vec<Template>, FormatError> {
    let root = parse_json(text, "templates file")?;
    let entities = unwrap_collection(&root, EntityKind::Template, "templates file")?;
    normalize_entities(entities, EntityKind::Template)
}

/// Checks that every template an issue lists exists exactly once and points back at that issue.
pub fn confirm_matching_templates(
    issues: &[Issue],
    templates: &[Template],
) -> Result<(), IntegrityError> {
    let mut by_name: HashMap<&str, Vec<&Template>> = HashMap::new();
    for template in templates {
        by_name
            .entry(template.template_name.as_str())
            .or_default()
            .push(template);
    }

    let mut seen_issues = HashSet::new();
    for issue in issues {
        if !seen_issues.insert(issue.issue_name.as_str()) {
            return Err(IntegrityError::DuplicateIssue {
                issue: issue.issue_name.clone(),
            });
        }

        for template_name in &issue.related_template_names {
            let matches = by_name
                .get(template_name.as_str())
                .map(Vec::as_slice)
                .unwrap_or_default();

            match matches {
                [] => {
                    return Err(IntegrityError::MissingTemplate {
                        template: template_name.clone(),
                        issue: issue.issue_name.clone(),
                    })
                }
                [template] if template.issue_name != issue.issue_name => {
                    return Err(IntegrityError::IssueMismatch {
                        template: template_name.clone(),
                        issue: issue.issue_name.clone(),
                        actual_issue: template.issue_name.clone(),
                    })
                }
                [_] => {}
                many => {
                    return Err(IntegrityError::DuplicateTemplate {
                        template: template_name.clone(),
                        issue: issue.issue_name.clone(),
                        count: many.len(),
                    })
                }
            }
        }
    }

    Ok(())
}

/// Combined export document, the inverse of [`parse_combined`].
pub fn export_combined(issues: &[Issue], templates: &[Template]) -> Value {
    json!({
        "exportDate": export_date(),
        "totalIssues": issues.len(),
        "totalTemplates": templates.len(),
        "issues": issues,
        "templates": templates,
    })
}

pub fn export_issues(issues: &[Issue]) -> Value {
    json!({
        "exportDate": export_date(),
        "totalIssues": issues.len(),
        "issues": issues,
    })
}

pub fn export_templates(templates: &[Template]) -> Value {
    json!({
        "exportDate": export_date(),
        "totalTemplates": templates.len(),
        "templates": templates,
    })
}

fn export_date() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn parse_json(text: &str, source_name: &str) -> Result<Value, FormatError> {
    serde_json::from_str(text).map_err(|e| FormatError::MalformedJson {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })
}

fn unwrap_collection<'a>(
    root: &'a Value,
    kind: EntityKind,
    source_name: &str,
) -> Result<&'a Value, FormatError> {
    match root {
        Value::Array(_) => Ok(root),
        Value::Object(map) => map
            .get(kind.array_key())
            .filter(|value| value.is_array())
            .ok_or_else(|| FormatError::UnrecognizedShape {
                source_name: source_name.to_string(),
                expected: kind.array_key().to_string(),
            }),
        _ => Err(FormatError::UnrecognizedShape {
            source_name: source_name.to_string(),
            expected: kind.array_key().to_string(),
        }),
    }
}

fn normalize_entities<T: DeserializeOwned>(
    entities: &Value,
    kind: EntityKind,
) -> Result<Vec<T>, FormatError> {
    let Some(items) = entities.as_array() else {
        return Err(FormatError::UnrecognizedShape {
            source_name: kind.array_key().to_string(),
            expected: kind.array_key().to_string(),
        });
    };

    let mut backfilled = 0usize;
    let mut out = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let invalid = |reason: String| FormatError::InvalidEntity {
            entity: kind.name(),
            index,
            reason,
        };

        let Some(object) = item.as_object() else {
            return Err(invalid("expected an object".to_string()));
        };
        check_members(object, kind).map_err(invalid)?;

        let mut object = object.clone();
        if backfill_metrics(&mut object) {
            backfilled += 1;
        }

        let entity = serde_json::from_value(Value::Object(object))
            .map_err(|e| invalid(e.to_string()))?;
        out.push(entity);
    }

    if backfilled > 0 {
        log::debug!("Backfilled metrics on {backfilled} {}", kind.array_key());
    }

    Ok(out)
}

fn check_members(object: &Map<String, Value>, kind: EntityKind) -> Result<(), String> {
    for member in kind.string_members() {
        if !object.get(*member).is_some_and(Value::is_string) {
            return Err(format!("missing string '{member}'"));
        }
    }

    match kind {
        EntityKind::Issue => {
            let names = object.get("templateNames").and_then(Value::as_array);
            match names {
                Some(names) if names.iter().all(Value::is_string) => Ok(()),
                Some(_) => Err("'templateNames' must contain only strings".to_string()),
                None => Err("missing array 'templateNames'".to_string()),
            }
        }
        EntityKind::Template => {
            if object.get("fields").is_some_and(Value::is_array) {
                Ok(())
            } else {
                Err("missing array 'fields'".to_string())
            }
        }
    }
}

/// Returns true when a zeroed metrics object had to be inserted.
fn backfill_metrics(object: &mut Map<String, Value>) -> bool {
    if object.get("metrics").is_some_and(Value::is_object) {
        return false;
    }
    let zeroed = serde_json::to_value(Metrics::default()).unwrap_or_else(|_| json!({}));
    object.insert("metrics".to_string(), zeroed);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::field::StructuredField;

    fn issue(name: &str, templates: &[&str]) -> Issue {
        Issue {
            issue_name: name.to_string(),
            related_template_names: templates.iter().map(|t| t.to_string()).collect(),
            metrics: Metrics::default(),
        }
    }

    fn template(issue: &str, name: &str) -> Template {
        Template {
            issue_name: issue.to_string(),
            template_name: name.to_string(),
            article_id: "KBA00012345".to_string(),
            fields: vec![StructuredField::text("User Name")],
            metrics: Metrics::default(),
        }
    }

    #[test]
    fn legacy_arrays_parse_and_backfill_metrics() {
        let issues = r#"[{ "name": "VPN", "templateNames": ["VPN Reset"] }]"#;
        let templates = r#"[{ "issue": "VPN", "name": "VPN Reset", "kba": "KBA00000001",
            "fields": [{ "label": "User Name", "type": "text" }] }]"#;

        let snapshot = parse_collections(issues, templates).expect("parse legacy");
        assert_eq!(snapshot.issues[0].metrics, Metrics::default());
        assert_eq!(snapshot.templates[0].fields, vec![StructuredField::text("User Name")]);
    }

    #[test]
    fn export_shapes_are_unwrapped() {
        let issues = r#"{ "exportDate": "2024-01-01", "totalIssues": 1,
            "issues": [{ "name": "VPN", "templateNames": [] }] }"#;
        let templates = r#"{ "exportDate": "2024-01-01", "totalTemplates": 0, "templates": [] }"#;

        let snapshot = parse_collections(issues, templates).expect("parse export shape");
        assert_eq!(snapshot.issues.len(), 1);
        assert!(snapshot.templates.is_empty());
    }

    #[test]
    fn malformed_json_is_a_format_error() {
        let err = parse_collections("[", "[]").expect_err("malformed");
        assert!(matches!(
            err,
            ImportError::Format(FormatError::MalformedJson { .. })
        ));
    }

    #[test]
    fn unrecognized_shape_is_a_format_error() {
        let err = parse_issues(r#"{ "templates": [] }"#).expect_err("wrong key");
        assert!(matches!(err, FormatError::UnrecognizedShape { .. }));
        assert!(parse_templates("42").is_err());
    }

    #[test]
    fn entity_missing_members_is_rejected_with_index() {
        let err = parse_templates(r#"[{ "issue": "VPN", "name": "A", "kba": "KBA00000001", "fields": [] },
            { "issue": "VPN", "name": "B", "fields": [] }]"#)
        .expect_err("missing kba");
        match err {
            FormatError::InvalidEntity { entity, index, reason } => {
                assert_eq!(entity, "template");
                assert_eq!(index, 1);
                assert!(reason.contains("kba"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = parse_issues(r#"[{ "name": "VPN", "templateNames": [1] }]"#).expect_err("bad names");
        assert!(err.to_string().contains("templateNames"));
    }

    #[test]
    fn integrity_rejects_missing_and_mismatched_templates() {
        let missing = confirm_matching_templates(&[issue("VPN", &["Ghost"])], &[]);
        assert_eq!(
            missing,
            Err(IntegrityError::MissingTemplate {
                template: "Ghost".into(),
                issue: "VPN".into()
            })
        );

        let mismatch = confirm_matching_templates(
            &[issue("VPN", &["Reset"])],
            &[template("Email", "Reset")],
        );
        assert!(matches!(mismatch, Err(IntegrityError::IssueMismatch { .. })));

        let duplicated = confirm_matching_templates(
            &[issue("VPN", &["Reset"])],
            &[template("VPN", "Reset"), template("VPN", "Reset")],
        );
        assert!(matches!(
            duplicated,
            Err(IntegrityError::DuplicateTemplate { count: 2, .. })
        ));

        let duplicate_issue =
            confirm_matching_templates(&[issue("VPN", &[]), issue("VPN", &[])], &[]);
        assert!(matches!(duplicate_issue, Err(IntegrityError::DuplicateIssue { .. })));
    }

    #[test]
    fn integrity_failure_rejects_whole_import() {
        let issues = r#"[{ "name": "VPN", "templateNames": ["Reset"] }]"#;
        let templates = r#"[{ "issue": "Email", "name": "Reset", "kba": "KBA00000001", "fields": [] }]"#;
        let err = parse_collections(issues, templates).expect_err("mismatch");
        let message = err.to_string();
        assert!(message.contains("Reset"));
        assert!(message.contains("VPN"));
    }

    #[test]
    fn combined_requires_both_arrays() {
        let err = parse_combined(r#"{ "issues": [] }"#).expect_err("missing templates");
        assert!(matches!(
            err,
            ImportError::Format(FormatError::UnrecognizedShape { .. })
        ));
        assert!(parse_combined("[]").is_err());
    }

    #[test]
    fn combined_export_round_trips() {
        let mut issues = vec![issue("VPN", &["Reset", "Install"])];
        issues[0].metrics.record_use(10, Some(5), Some("first call".into()));
        let templates = vec![template("VPN", "Reset"), template("VPN", "Install")];

        let exported = export_combined(&issues, &templates);
        assert_eq!(exported["totalIssues"], json!(1));
        assert_eq!(exported["totalTemplates"], json!(2));

        let snapshot = parse_combined(&exported.to_string()).expect("round trip");
        assert_eq!(snapshot.issues, issues);
        assert_eq!(snapshot.templates, templates);
    }

    #[test]
    fn single_collection_exports_parse_back() {
        let issues = vec![issue("VPN", &[])];
        let parsed = parse_issues(&export_issues(&issues).to_string()).expect("issues");
        assert_eq!(parsed, issues);

        let templates = vec![template("VPN", "Reset")];
        let parsed = parse_templates(&export_templates(&templates).to_string()).expect("templates");
        assert_eq!(parsed, templates);
    }
}
