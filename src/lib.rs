pub mod commands;
pub mod engine;
pub mod models;
pub mod store;

use commands::{
    article::open_article,
    autofill::{autofill_from_paste, fill_contact, resolve_contact_target, scan_pasted_text},
    catalog::{
        create_template, delete_issue, delete_template, find_dangling_references, list_catalog,
        parse_template_text, record_template_usage, update_issue_templates, update_template,
    },
    registries::{field_labels_crud, patterns_crud},
    settings::{get_settings, save_settings},
    transfer::{export_catalog, import_collections, import_combined},
};

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .invoke_handler(tauri::generate_handler![
            parse_template_text,
            create_template,
            update_template,
            update_issue_templates,
            delete_template,
            delete_issue,
            list_catalog,
            record_template_usage,
            find_dangling_references,
            import_collections,
            import_combined,
            export_catalog,
            field_labels_crud,
            patterns_crud,
            resolve_contact_target,
            fill_contact,
            scan_pasted_text,
            autofill_from_paste,
            get_settings,
            save_settings,
            open_article,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
