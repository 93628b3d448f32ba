//! Validated mutations over the issue and template collections.
//!
//! Templates and issues are written together so that every name an issue lists
//! resolves to a template pointing back at it. Deletion does not cascade: an
//! issue may keep listing a deleted template. That gap is reported through
//! [`find_dangling_references`] and a warning on delete, not repaired.

use crate::engine::import::{confirm_matching_templates, IntegrityError};
use crate::models::catalog::{
    CatalogSnapshot, DanglingReference, Issue, Template, TemplateDraft,
};
use crate::models::field::StructuredField;
use crate::store::{Collection, KeyValueStore, StoreError, StoreWrite};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use thiserror::Error;

static ARTICLE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^KBA\d{8}$").expect("static regex must compile"));

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid article id '{0}': expected KBA followed by 8 digits")]
    InvalidArticleId(String),

    #[error("{what} name must not be empty")]
    EmptyName { what: &'static str },

    #[error("template '{0}' already exists")]
    DuplicateTemplate(String),

    #[error("template '{0}' not found")]
    TemplateNotFound(String),

    #[error("issue '{0}' not found")]
    IssueNotFound(String),

    #[error("invalid field: {0}")]
    InvalidField(String),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

pub fn is_valid_article_id(article_id: &str) -> bool {
    ARTICLE_ID.is_match(article_id)
}

pub fn load_issues(store: &dyn KeyValueStore) -> Result<Vec<Issue>> {
    load_all(store, Collection::Issues)
}

pub fn load_templates(store: &dyn KeyValueStore) -> Result<Vec<Template>> {
    load_all(store, Collection::Templates)
}

pub fn load_snapshot(store: &dyn KeyValueStore) -> Result<CatalogSnapshot> {
    Ok(CatalogSnapshot {
        issues: load_issues(store)?,
        templates: load_templates(store)?,
    })
}

fn load_all<T: serde::de::DeserializeOwned>(
    store: &dyn KeyValueStore,
    collection: Collection,
) -> Result<Vec<T>> {
    store
        .get_all(collection)?
        .into_iter()
        .map(|value| serde_json::from_value(value).map_err(|e| CatalogError::Store(e.into())))
        .collect()
}

fn load_one<T: serde::de::DeserializeOwned>(
    store: &dyn KeyValueStore,
    collection: Collection,
    key: &str,
) -> Result<Option<T>> {
    match store.get(collection, key)? {
        Some(value) => Ok(Some(
            serde_json::from_value(value).map_err(StoreError::from)?,
        )),
        None => Ok(None),
    }
}

fn put_issue(issue: &Issue) -> Result<StoreWrite> {
    let value = serde_json::to_value(issue).map_err(StoreError::from)?;
    Ok(StoreWrite::put(Collection::Issues, issue.issue_name.clone(), value))
}

fn put_template(template: &Template) -> Result<StoreWrite> {
    let value = serde_json::to_value(template).map_err(StoreError::from)?;
    Ok(StoreWrite::put(
        Collection::Templates,
        template.template_name.clone(),
        value,
    ))
}

fn validate_fields(fields: &[StructuredField]) -> Result<()> {
    let mut seen = HashSet::new();
    for field in fields {
        let label = field.label.trim();
        if label.is_empty() {
            return Err(CatalogError::InvalidField("label must not be empty".to_string()));
        }
        if !seen.insert(label) {
            return Err(CatalogError::InvalidField(format!("duplicate label '{label}'")));
        }
    }
    Ok(())
}

fn validate_identity(issue_name: &str, template_name: &str, article_id: &str) -> Result<()> {
    if issue_name.trim().is_empty() {
        return Err(CatalogError::EmptyName { what: "issue" });
    }
    if template_name.trim().is_empty() {
        return Err(CatalogError::EmptyName { what: "template" });
    }
    if !is_valid_article_id(article_id) {
        return Err(CatalogError::InvalidArticleId(article_id.to_string()));
    }
    Ok(())
}

/// Rechecks the cross-reference invariant as if the pending writes were applied.
///
/// Rechecked issues are the ones being written plus every stored issue that
/// lists the name of a template being written. Other issues may keep known
/// dangling names.
fn confirm_after(
    store: &dyn KeyValueStore,
    issues: &[Issue],
    templates: &[Template],
    removed_templates: &[&str],
) -> Result<()> {
    let mut snapshot = load_snapshot(store)?;

    for issue in issues {
        snapshot.issues.retain(|existing| existing.issue_name != issue.issue_name);
        snapshot.issues.push(issue.clone());
    }
    snapshot.templates.retain(|existing| {
        !removed_templates.contains(&existing.template_name.as_str())
            && !templates
                .iter()
                .any(|template| template.template_name == existing.template_name)
    });
    snapshot.templates.extend(templates.iter().cloned());

    let touched: Vec<Issue> = snapshot
        .issues
        .into_iter()
        .filter(|issue| {
            issues.iter().any(|changed| changed.issue_name == issue.issue_name)
                || templates
                    .iter()
                    .any(|template| issue.references(&template.template_name))
        })
        .collect();
    confirm_matching_templates(&touched, &snapshot.templates)?;
    Ok(())
}

/// Creates a template and attaches it to its issue, creating the issue when it is new.
pub fn create_template(store: &dyn KeyValueStore, draft: TemplateDraft) -> Result<Template> {
    let issue_name = draft.issue_name.trim().to_string();
    let template_name = draft.template_name.trim().to_string();
    let article_id = draft.article_id.trim().to_string();

    validate_identity(&issue_name, &template_name, &article_id)?;
    validate_fields(&draft.fields)?;

    if store.get(Collection::Templates, &template_name)?.is_some() {
        return Err(CatalogError::DuplicateTemplate(template_name));
    }

    let mut issue = load_one::<Issue>(store, Collection::Issues, &issue_name)?
        .unwrap_or_else(|| Issue::new(issue_name.clone()));
    if !issue.references(&template_name) {
        issue.related_template_names.push(template_name.clone());
    }

    let template = Template {
        issue_name,
        template_name,
        article_id,
        fields: draft.fields,
        metrics: Default::default(),
    };

    confirm_after(store, std::slice::from_ref(&issue), std::slice::from_ref(&template), &[])?;
    store.put_batch(&[put_template(&template)?, put_issue(&issue)?])?;

    log::info!(
        "Created template '{}' under issue '{}'",
        template.template_name,
        template.issue_name
    );
    Ok(template)
}

/// Replaces a stored template, moving or renaming its issue reference as needed.
/// Usage metrics of the stored template are kept.
pub fn update_template(
    store: &dyn KeyValueStore,
    original_name: &str,
    updated: Template,
) -> Result<Template> {
    let existing: Template = load_one(store, Collection::Templates, original_name)?
        .ok_or_else(|| CatalogError::TemplateNotFound(original_name.to_string()))?;

    let updated = Template {
        issue_name: updated.issue_name.trim().to_string(),
        template_name: updated.template_name.trim().to_string(),
        article_id: updated.article_id.trim().to_string(),
        fields: updated.fields,
        metrics: existing.metrics.clone(),
    };
    validate_identity(&updated.issue_name, &updated.template_name, &updated.article_id)?;
    validate_fields(&updated.fields)?;

    let renamed = updated.template_name != existing.template_name;
    if renamed && store.get(Collection::Templates, &updated.template_name)?.is_some() {
        return Err(CatalogError::DuplicateTemplate(updated.template_name));
    }

    let mut touched_issues = Vec::new();

    let mut old_issue = load_one::<Issue>(store, Collection::Issues, &existing.issue_name)?;
    if let Some(issue) = old_issue.as_mut() {
        issue
            .related_template_names
            .retain(|name| name != &existing.template_name);
    }

    let mut new_issue = if updated.issue_name == existing.issue_name {
        old_issue.take().unwrap_or_else(|| Issue::new(updated.issue_name.clone()))
    } else {
        load_one::<Issue>(store, Collection::Issues, &updated.issue_name)?
            .unwrap_or_else(|| Issue::new(updated.issue_name.clone()))
    };
    if !new_issue.references(&updated.template_name) {
        new_issue
            .related_template_names
            .push(updated.template_name.clone());
    }

    if let Some(issue) = old_issue {
        touched_issues.push(issue);
    }
    touched_issues.push(new_issue);

    let removed: Vec<&str> = if renamed {
        vec![existing.template_name.as_str()]
    } else {
        Vec::new()
    };
    confirm_after(store, &touched_issues, std::slice::from_ref(&updated), &removed)?;

    let mut writes = Vec::new();
    if renamed {
        writes.push(StoreWrite::delete(
            Collection::Templates,
            existing.template_name.clone(),
        ));
    }
    writes.push(put_template(&updated)?);
    for issue in &touched_issues {
        writes.push(put_issue(issue)?);
    }
    store.put_batch(&writes)?;

    log::info!("Updated template '{original_name}'");
    Ok(updated)
}

/// Replaces the template list of an issue. Every listed name must resolve to a
/// template of this issue; this is how an agent clears a dangling reference.
pub fn update_issue_templates(
    store: &dyn KeyValueStore,
    issue_name: &str,
    template_names: Vec<String>,
) -> Result<Issue> {
    let mut issue: Issue = load_one(store, Collection::Issues, issue_name)?
        .ok_or_else(|| CatalogError::IssueNotFound(issue_name.to_string()))?;

    let mut seen = HashSet::new();
    issue.related_template_names = template_names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty() && seen.insert(name.clone()))
        .collect();

    confirm_after(store, std::slice::from_ref(&issue), &[], &[])?;
    store.put_batch(&[put_issue(&issue)?])?;

    log::info!("Updated template list of issue '{issue_name}'");
    Ok(issue)
}

/// Removes a template. Issues that still list it are left untouched and reported.
pub fn delete_template(store: &dyn KeyValueStore, name: &str) -> Result<Vec<DanglingReference>> {
    if store.get(Collection::Templates, name)?.is_none() {
        return Err(CatalogError::TemplateNotFound(name.to_string()));
    }
    store.delete(Collection::Templates, name)?;

    let dangling: Vec<DanglingReference> = find_dangling_references(store)?
        .into_iter()
        .filter(|reference| reference.template_name == name)
        .collect();
    for reference in &dangling {
        log::warn!(
            "Issue '{}' still lists deleted template '{}'",
            reference.issue_name,
            reference.template_name
        );
    }

    log::info!("Deleted template '{name}'");
    Ok(dangling)
}

/// Removes an issue. Its templates are kept.
pub fn delete_issue(store: &dyn KeyValueStore, name: &str) -> Result<()> {
    if store.get(Collection::Issues, name)?.is_none() {
        return Err(CatalogError::IssueNotFound(name.to_string()));
    }
    store.delete(Collection::Issues, name)?;
    log::info!("Deleted issue '{name}'");
    Ok(())
}

/// Lists every issue entry whose template no longer exists.
pub fn find_dangling_references(store: &dyn KeyValueStore) -> Result<Vec<DanglingReference>> {
    let snapshot = load_snapshot(store)?;
    let names: HashSet<&str> = snapshot
        .templates
        .iter()
        .map(|template| template.template_name.as_str())
        .collect();

    Ok(snapshot
        .issues
        .iter()
        .flat_map(|issue| {
            issue
                .related_template_names
                .iter()
                .filter(|name| !names.contains(name.as_str()))
                .map(|name| DanglingReference {
                    issue_name: issue.issue_name.clone(),
                    template_name: name.clone(),
                })
        })
        .collect())
}

/// Bumps usage counters on a template and its issue, optionally logging work minutes.
pub fn record_template_usage(
    store: &dyn KeyValueStore,
    name: &str,
    minutes: Option<u32>,
    note: Option<String>,
) -> Result<Template> {
    let mut template: Template = load_one(store, Collection::Templates, name)?
        .ok_or_else(|| CatalogError::TemplateNotFound(name.to_string()))?;
    let now = chrono::Utc::now().timestamp();

    template.metrics.record_use(now, minutes, note.clone());
    let mut writes = vec![put_template(&template)?];

    if let Some(mut issue) = load_one::<Issue>(store, Collection::Issues, &template.issue_name)? {
        issue.metrics.record_use(now, minutes, note);
        writes.push(put_issue(&issue)?);
    }

    store.put_batch(&writes)?;
    Ok(template)
}

/// Writes an import in one batch; existing records with the same names are replaced.
///
/// The merged catalog is rechecked first, so an imported template cannot move
/// a name that a stored issue still lists over to another issue.
pub fn commit_import(store: &dyn KeyValueStore, snapshot: &CatalogSnapshot) -> Result<()> {
    confirm_after(store, &snapshot.issues, &snapshot.templates, &[])?;

    let mut writes = Vec::with_capacity(snapshot.issues.len() + snapshot.templates.len());
    for template in &snapshot.templates {
        writes.push(put_template(template)?);
    }
    for issue in &snapshot.issues {
        writes.push(put_issue(issue)?);
    }
    store.put_batch(&writes)?;

    log::info!(
        "Imported {} issues and {} templates",
        snapshot.issues.len(),
        snapshot.templates.len()
    );
    Ok(())
}
