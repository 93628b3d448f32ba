use crate::commands::db::open_store;
use crate::engine::catalog;
use crate::engine::template_text;
use crate::models::catalog::{CatalogSnapshot, DanglingReference, Issue, Template, TemplateDraft};
use crate::models::field::StructuredField;

#[tauri::command]
pub async fn parse_template_text(text: String) -> Result<Vec<StructuredField>, String> {
    Ok(template_text::parse(&text))
}

#[tauri::command]
pub async fn create_template(data_dir: String, draft: TemplateDraft) -> Result<Template, String> {
    let store = open_store(&data_dir).map_err(|e| format!("DB error: {e}"))?;
    catalog::create_template(&store, draft).map_err(|e| format!("Create failed: {e}"))
}

#[tauri::command]
pub async fn update_template(
    data_dir: String,
    original_name: String,
    template: Template,
) -> Result<Template, String> {
    let store = open_store(&data_dir).map_err(|e| format!("DB error: {e}"))?;
    catalog::update_template(&store, &original_name, template)
        .map_err(|e| format!("Update failed: {e}"))
}

#[tauri::command]
pub async fn update_issue_templates(
    data_dir: String,
    issue_name: String,
    template_names: Vec<String>,
) -> Result<Issue, String> {
    let store = open_store(&data_dir).map_err(|e| format!("DB error: {e}"))?;
    catalog::update_issue_templates(&store, &issue_name, template_names)
        .map_err(|e| format!("Update failed: {e}"))
}

#[tauri::command]
pub async fn delete_template(
    data_dir: String,
    name: String,
) -> Result<Vec<DanglingReference>, String> {
    let store = open_store(&data_dir).map_err(|e| format!("DB error: {e}"))?;
    catalog::delete_template(&store, &name).map_err(|e| format!("Delete failed: {e}"))
}

#[tauri::command]
pub async fn delete_issue(data_dir: String, name: String) -> Result<serde_json::Value, String> {
    let store = open_store(&data_dir).map_err(|e| format!("DB error: {e}"))?;
    catalog::delete_issue(&store, &name).map_err(|e| format!("Delete failed: {e}"))?;
    Ok(serde_json::json!({"status": "deleted"}))
}

#[tauri::command]
pub async fn list_catalog(data_dir: String) -> Result<CatalogSnapshot, String> {
    let store = open_store(&data_dir).map_err(|e| format!("DB error: {e}"))?;
    catalog::load_snapshot(&store).map_err(|e| format!("Read error: {e}"))
}

#[tauri::command]
pub async fn record_template_usage(
    data_dir: String,
    name: String,
    minutes: Option<u32>,
    note: Option<String>,
) -> Result<Template, String> {
    let store = open_store(&data_dir).map_err(|e| format!("DB error: {e}"))?;
    catalog::record_template_usage(&store, &name, minutes, note)
        .map_err(|e| format!("Usage update failed: {e}"))
}

#[tauri::command]
pub async fn find_dangling_references(data_dir: String) -> Result<Vec<DanglingReference>, String> {
    let store = open_store(&data_dir).map_err(|e| format!("DB error: {e}"))?;
    catalog::find_dangling_references(&store).map_err(|e| format!("Read error: {e}"))
}
