use crate::commands::db::open_store;
use crate::models::registry::FieldCategory;
use crate::store::registry_store::{
    load_field_labels, load_patterns, save_field_labels, save_patterns, StoredPattern,
};
use serde_json::{json, Value};

#[tauri::command]
pub async fn field_labels_crud(
    data_dir: String,
    operation: String,
    category: Option<String>,
    label: Option<String>,
) -> Result<Value, String> {
    let store = open_store(&data_dir).map_err(|e| format!("DB error: {e}"))?;
    let mut registry = load_field_labels(&store).map_err(|e| format!("Read error: {e}"))?;

    let category = category
        .map(|value| value.parse::<FieldCategory>())
        .transpose()?;

    match operation.as_str() {
        "list" => {
            return serde_json::to_value(&registry).map_err(|e| format!("Encode error: {e}"));
        }
        "add" => {
            let category = category.ok_or("category required for add")?;
            let label = label.ok_or("label required for add")?;
            if !registry.add(category, &label) {
                return Err(format!("Label '{}' is empty or already listed", label.trim()));
            }
        }
        "remove" => {
            let category = category.ok_or("category required for remove")?;
            let label = label.ok_or("label required for remove")?;
            if !registry.remove(category, &label) {
                return Err(format!("Label '{label}' not found"));
            }
        }
        "reset" => {
            let category = category.ok_or("category required for reset")?;
            registry.reset(category);
        }
        "reset_all" => registry.reset_all(),
        _ => return Err(format!("Unknown operation: {operation}")),
    }

    save_field_labels(&store, &registry).map_err(|e| format!("Write error: {e}"))?;
    serde_json::to_value(&registry).map_err(|e| format!("Encode error: {e}"))
}

#[tauri::command]
pub async fn patterns_crud(
    data_dir: String,
    operation: String,
    key: Option<String>,
    pattern: Option<StoredPattern>,
) -> Result<Value, String> {
    let store = open_store(&data_dir).map_err(|e| format!("DB error: {e}"))?;
    let mut registry = load_patterns(&store).map_err(|e| format!("Read error: {e}"))?;

    match operation.as_str() {
        "list" => {}
        "update" => {
            let pattern = pattern.ok_or("pattern required for update")?;
            registry
                .update(
                    &pattern.key,
                    &pattern.source,
                    &pattern.flags,
                    pattern.target_field_labels,
                )
                .map_err(|e| e.to_string())?;
            save_patterns(&store, &registry).map_err(|e| format!("Write error: {e}"))?;
        }
        "reset" => {
            let key = key.ok_or("key required for reset")?;
            registry.reset(&key).map_err(|e| e.to_string())?;
            save_patterns(&store, &registry).map_err(|e| format!("Write error: {e}"))?;
        }
        "reset_all" => {
            registry.reset_all();
            save_patterns(&store, &registry).map_err(|e| format!("Write error: {e}"))?;
        }
        "remove" => {
            let key = key.ok_or("key required for remove")?;
            if !registry.remove(&key) {
                return Err(format!("Pattern '{key}' not found"));
            }
            save_patterns(&store, &registry).map_err(|e| format!("Write error: {e}"))?;
        }
        _ => return Err(format!("Unknown operation: {operation}")),
    }

    let patterns: Vec<StoredPattern> = registry.iter().map(StoredPattern::from).collect();
    Ok(json!({ "patterns": patterns }))
}
