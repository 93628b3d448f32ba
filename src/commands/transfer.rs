use crate::commands::db::open_store;
use crate::engine::catalog::{commit_import, load_snapshot};
use crate::engine::import::{self, ImportError};
use crate::models::catalog::CatalogSnapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSummary {
    pub issue_count: usize,
    pub template_count: usize,
}

impl From<&CatalogSnapshot> for ImportSummary {
    fn from(snapshot: &CatalogSnapshot) -> Self {
        Self {
            issue_count: snapshot.issues.len(),
            template_count: snapshot.templates.len(),
        }
    }
}

#[tauri::command]
pub async fn import_collections(
    data_dir: String,
    issues_text: String,
    templates_text: String,
) -> Result<ImportSummary, String> {
    let snapshot = import::parse_collections(&issues_text, &templates_text).map_err(describe)?;
    commit(&data_dir, &snapshot)
}

#[tauri::command]
pub async fn import_combined(data_dir: String, text: String) -> Result<ImportSummary, String> {
    let snapshot = import::parse_combined(&text).map_err(describe)?;
    commit(&data_dir, &snapshot)
}

#[tauri::command]
pub async fn export_catalog(data_dir: String) -> Result<Value, String> {
    let store = open_store(&data_dir).map_err(|e| format!("DB error: {e}"))?;
    let snapshot = load_snapshot(&store).map_err(|e| format!("Read error: {e}"))?;
    Ok(import::export_combined(&snapshot.issues, &snapshot.templates))
}

fn commit(data_dir: &str, snapshot: &CatalogSnapshot) -> Result<ImportSummary, String> {
    let store = open_store(data_dir).map_err(|e| format!("DB error: {e}"))?;
    commit_import(&store, snapshot).map_err(|e| format!("Import failed: {e}"))?;
    Ok(ImportSummary::from(snapshot))
}

fn describe(err: ImportError) -> String {
    log::warn!("Import rejected: {err}");
    match err {
        ImportError::Format(e) => format!("Invalid import file: {e}"),
        ImportError::Integrity(e) => format!("Import rejected: {e}"),
    }
}
