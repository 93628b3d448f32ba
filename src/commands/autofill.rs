use crate::commands::db::open_store;
use crate::commands::settings::load_effective_settings;
use crate::engine::contact_autofill::{Contact, ContactAutofillResolver, ContactUpdate};
use crate::engine::pattern_autofill::{AppliedUpdate, PatternAutofillEngine, PatternMatch};
use crate::models::field::StructuredField;
use crate::models::registry::FieldCategory;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutofillResult<U> {
    pub values: HashMap<String, String>,
    pub updates: Vec<U>,
}

#[tauri::command]
pub async fn resolve_contact_target(
    data_dir: String,
    fields: Vec<StructuredField>,
    category: String,
) -> Result<Option<String>, String> {
    let category: FieldCategory = category.parse()?;
    let store = open_store(&data_dir).map_err(|e| format!("DB error: {e}"))?;
    Ok(ContactAutofillResolver::from_store(&store).resolve_target(&fields, category))
}

#[tauri::command]
pub async fn fill_contact(
    data_dir: String,
    fields: Vec<StructuredField>,
    values: HashMap<String, String>,
    contact: Contact,
) -> Result<AutofillResult<ContactUpdate>, String> {
    fill_contact_internal(&data_dir, &fields, values, &contact)
}

pub fn fill_contact_internal(
    data_dir: &str,
    fields: &[StructuredField],
    mut values: HashMap<String, String>,
    contact: &Contact,
) -> Result<AutofillResult<ContactUpdate>, String> {
    let settings = load_effective_settings(data_dir)?;
    let store = open_store(data_dir).map_err(|e| format!("DB error: {e}"))?;

    let resolver = ContactAutofillResolver::from_store(&store);
    let updates = resolver.fill_contact(fields, &mut values, contact, settings.contact_overwrite);
    Ok(AutofillResult { values, updates })
}

#[tauri::command]
pub async fn scan_pasted_text(data_dir: String, text: String) -> Result<Vec<PatternMatch>, String> {
    let settings = load_effective_settings(&data_dir)?;
    let store = open_store(&data_dir).map_err(|e| format!("DB error: {e}"))?;
    Ok(PatternAutofillEngine::from_store(&store, settings.max_paste_lines).scan(&text))
}

#[tauri::command]
pub async fn autofill_from_paste(
    data_dir: String,
    text: String,
    fields: Vec<StructuredField>,
    values: HashMap<String, String>,
) -> Result<AutofillResult<AppliedUpdate>, String> {
    autofill_from_paste_internal(&data_dir, &text, &fields, values)
}

pub fn autofill_from_paste_internal(
    data_dir: &str,
    text: &str,
    fields: &[StructuredField],
    mut values: HashMap<String, String>,
) -> Result<AutofillResult<AppliedUpdate>, String> {
    let settings = load_effective_settings(data_dir)?;
    let store = open_store(data_dir).map_err(|e| format!("DB error: {e}"))?;

    let engine = PatternAutofillEngine::from_store(&store, settings.max_paste_lines);
    let updates = engine.autofill(text, fields, &mut values);
    log::debug!("Paste autofill applied {} updates", updates.len());
    Ok(AutofillResult { values, updates })
}
