use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_SCHEMA_VERSION: i64 = 2;
const DEFAULT_ARTICLE_URL_TEMPLATE: &str = "https://support.example.com/kb/{id}";
const DEFAULT_MAX_PASTE_LINES: u64 = 500;

#[derive(Debug, Clone)]
pub struct EffectiveSettings {
    pub article_url_template: String,
    pub max_paste_lines: usize,
    pub contact_overwrite: bool,
}

#[tauri::command]
pub async fn get_settings(data_dir: String) -> Result<Value, String> {
    load_settings_from_disk(&data_dir)
}

#[tauri::command]
pub async fn save_settings(data_dir: String, settings: Value) -> Result<Value, String> {
    save_settings_to_disk(&data_dir, settings)
}

pub fn load_effective_settings(data_dir: &str) -> Result<EffectiveSettings, String> {
    let settings = load_settings_from_disk(data_dir)?;
    Ok(effective_from(&settings))
}

fn effective_from(settings: &Value) -> EffectiveSettings {
    EffectiveSettings {
        article_url_template: settings
            .get("articleUrlTemplate")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_ARTICLE_URL_TEMPLATE)
            .to_string(),
        max_paste_lines: settings
            .get("maxPasteLines")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_MAX_PASTE_LINES) as usize,
        contact_overwrite: settings
            .get("contactOverwrite")
            .and_then(Value::as_bool)
            .unwrap_or(true),
    }
}

pub fn load_settings_from_disk(data_dir: &str) -> Result<Value, String> {
    let path = settings_path(data_dir);
    ensure_data_dir(data_dir)?;

    let original = if path.exists() {
        let raw = fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read settings.json: {e}"))?;
        serde_json::from_str::<Value>(&raw).unwrap_or_else(|e| {
            log::warn!("settings.json is not valid JSON ({e}); starting from defaults");
            json!({})
        })
    } else {
        json!({})
    };

    let migrated = migrate_settings(original.clone());
    if migrated != original || !path.exists() {
        write_settings_file(&path, &migrated)?;
    }

    Ok(migrated)
}

pub fn save_settings_to_disk(data_dir: &str, settings: Value) -> Result<Value, String> {
    let path = settings_path(data_dir);
    ensure_data_dir(data_dir)?;

    let mut merged = load_settings_from_disk(data_dir).unwrap_or_else(|_| default_settings());
    merge_settings(&mut merged, &settings);

    let migrated = migrate_settings(merged);
    write_settings_file(&path, &migrated)?;
    Ok(migrated)
}

fn settings_path(data_dir: &str) -> PathBuf {
    Path::new(data_dir).join("settings.json")
}

fn ensure_data_dir(data_dir: &str) -> Result<(), String> {
    fs::create_dir_all(data_dir).map_err(|e| format!("Failed to create data directory: {e}"))
}

fn write_settings_file(path: &Path, settings: &Value) -> Result<(), String> {
    let raw = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {e}"))?;
    fs::write(path, raw).map_err(|e| format!("Failed to write settings.json: {e}"))
}

fn migrate_settings(input: Value) -> Value {
    let mut out = match input {
        Value::Object(map) => Value::Object(map),
        _ => Value::Object(Map::new()),
    };

    let version = out
        .get("schema_version")
        .and_then(Value::as_i64)
        .unwrap_or(0);

    if version < 2 {
        // V2 replaced the bare base URL with a template carrying an {id} slot.
        migrate_article_base_url(&mut out);
    }

    deep_merge_defaults(&mut out, &default_settings());
    sanitize_settings(&mut out);
    if let Some(obj) = out.as_object_mut() {
        obj.insert("schema_version".to_string(), json!(SETTINGS_SCHEMA_VERSION));
    }

    out
}

fn default_settings() -> Value {
    json!({
        "schema_version": SETTINGS_SCHEMA_VERSION,
        "articleUrlTemplate": DEFAULT_ARTICLE_URL_TEMPLATE,
        "maxPasteLines": DEFAULT_MAX_PASTE_LINES,
        "contactOverwrite": true,
        "autofillOnPaste": true
    })
}

fn deep_merge_defaults(target: &mut Value, defaults: &Value) {
    let (Some(target_obj), Some(default_obj)) = (target.as_object_mut(), defaults.as_object()) else {
        return;
    };

    for (key, default_value) in default_obj {
        match target_obj.get_mut(key) {
            Some(existing) => {
                if existing.is_object() && default_value.is_object() {
                    deep_merge_defaults(existing, default_value);
                }
            }
            None => {
                target_obj.insert(key.clone(), default_value.clone());
            }
        }
    }
}

fn merge_settings(target: &mut Value, incoming: &Value) {
    match (target, incoming) {
        (Value::Object(target_obj), Value::Object(incoming_obj)) => {
            for (key, value) in incoming_obj {
                if let Some(existing) = target_obj.get_mut(key) {
                    merge_settings(existing, value);
                } else {
                    target_obj.insert(key.clone(), value.clone());
                }
            }
        }
        (target_slot, incoming_value) => {
            *target_slot = incoming_value.clone();
        }
    }
}

fn migrate_article_base_url(settings: &mut Value) {
    let Some(obj) = settings.as_object_mut() else {
        return;
    };
    let Some(base) = obj.remove("articleBaseUrl") else {
        return;
    };
    if obj.contains_key("articleUrlTemplate") {
        return;
    }
    if let Some(base) = base.as_str().filter(|base| !base.trim().is_empty()) {
        let template = format!("{}/{{id}}", base.trim().trim_end_matches('/'));
        obj.insert("articleUrlTemplate".to_string(), json!(template));
    }
}

fn sanitize_settings(settings: &mut Value) {
    let Some(obj) = settings.as_object_mut() else {
        return;
    };

    clamp_u64(obj, "maxPasteLines", 10, 5000, DEFAULT_MAX_PASTE_LINES);
    ensure_bool(obj, "contactOverwrite", true);
    ensure_bool(obj, "autofillOnPaste", true);

    let template_ok = obj
        .get("articleUrlTemplate")
        .and_then(Value::as_str)
        .is_some_and(|template| {
            template.contains("{id}")
                && (template.starts_with("https://") || template.starts_with("http://"))
        });
    if !template_ok {
        obj.insert(
            "articleUrlTemplate".to_string(),
            json!(DEFAULT_ARTICLE_URL_TEMPLATE),
        );
    }
}

fn clamp_u64(map: &mut Map<String, Value>, key: &str, min: u64, max: u64, default: u64) {
    let raw = map.get(key).and_then(Value::as_u64).unwrap_or(default);
    map.insert(key.to_string(), json!(raw.clamp(min, max)));
}

fn ensure_bool(map: &mut Map<String, Value>, key: &str, default: bool) {
    let value = map.get(key).and_then(Value::as_bool).unwrap_or(default);
    map.insert(key.to_string(), json!(value));
}
