use serde_json::json;
use std::collections::HashMap;
use tempfile::TempDir;
use templatedesk_lib::commands::autofill::{
    autofill_from_paste_internal, fill_contact_internal, resolve_contact_target, scan_pasted_text,
};
use templatedesk_lib::commands::catalog::{
    create_template, delete_template, find_dangling_references, list_catalog, parse_template_text,
    record_template_usage, update_template,
};
use templatedesk_lib::commands::registries::{field_labels_crud, patterns_crud};
use templatedesk_lib::commands::settings::{get_settings, save_settings};
use templatedesk_lib::commands::transfer::{export_catalog, import_collections, import_combined};
use templatedesk_lib::engine::contact_autofill::Contact;
use templatedesk_lib::models::catalog::TemplateDraft;
use templatedesk_lib::models::field::StructuredField;
use templatedesk_lib::store::registry_store::StoredPattern;

fn create_data_dir() -> (TempDir, String) {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let data_dir = temp_dir.path().join("data").to_string_lossy().to_string();
    (temp_dir, data_dir)
}

async fn seed_template(data_dir: &str, issue: &str, name: &str, text: &str) {
    let fields = parse_template_text(text.to_string())
        .await
        .expect("parse template text");
    create_template(
        data_dir.to_string(),
        TemplateDraft {
            issue_name: issue.to_string(),
            template_name: name.to_string(),
            article_id: "KBA00012345".to_string(),
            fields,
        },
    )
    .await
    .expect("create template");
}

#[tokio::test]
async fn parse_template_text_returns_wire_shaped_fields() {
    let fields = parse_template_text("User Name\nReady? (Yes or No)\nNotes; N/A".to_string())
        .await
        .expect("parse");

    let value = serde_json::to_value(&fields).expect("encode");
    assert_eq!(
        value,
        json!([
            { "label": "User Name", "type": "text" },
            { "label": "Ready? (Yes or No)", "type": "select", "options": ["Y", "N"] },
            { "label": "Notes", "type": "text", "defaultValue": "N/A" }
        ])
    );
}

#[tokio::test]
async fn template_lifecycle_keeps_issue_references_consistent() {
    let (_tmp, data_dir) = create_data_dir();
    seed_template(&data_dir, "VPN", "VPN Reset", "User Name\nWorkstation ID").await;
    seed_template(&data_dir, "VPN", "VPN Install", "User Name\nOS (Windows/macOS)").await;

    let bad = create_template(
        data_dir.clone(),
        TemplateDraft {
            issue_name: "VPN".to_string(),
            template_name: "Broken".to_string(),
            article_id: "KBA123".to_string(),
            fields: vec![],
        },
    )
    .await
    .expect_err("invalid article id");
    assert!(bad.contains("KBA123"));

    let catalog = list_catalog(data_dir.clone()).await.expect("list");
    assert_eq!(catalog.issues.len(), 1);
    assert_eq!(
        catalog.issues[0].related_template_names,
        vec!["VPN Reset", "VPN Install"]
    );

    let mut renamed = catalog
        .templates
        .iter()
        .find(|t| t.template_name == "VPN Reset")
        .cloned()
        .expect("template");
    renamed.template_name = "VPN Token Reset".to_string();
    update_template(data_dir.clone(), "VPN Reset".to_string(), renamed)
        .await
        .expect("rename");

    let used = record_template_usage(
        data_dir.clone(),
        "VPN Token Reset".to_string(),
        Some(7),
        Some("walked through token sync".to_string()),
    )
    .await
    .expect("usage");
    assert_eq!(used.metrics.usage_count, 1);

    let dangling = delete_template(data_dir.clone(), "VPN Install".to_string())
        .await
        .expect("delete");
    assert_eq!(dangling.len(), 1);
    assert_eq!(dangling[0].issue_name, "VPN");

    let audit = find_dangling_references(data_dir.clone())
        .await
        .expect("audit");
    assert_eq!(audit, dangling);
}

#[tokio::test]
async fn import_is_all_or_nothing_and_export_round_trips() {
    let (_tmp, data_dir) = create_data_dir();

    let rejected = import_collections(
        data_dir.clone(),
        json!([{ "name": "Printer", "templateNames": ["Jam"] }]).to_string(),
        json!([
            { "issue": "Printer", "name": "Toner", "kba": "KBA00000002", "fields": [] }
        ])
        .to_string(),
    )
    .await
    .expect_err("missing template");
    assert!(rejected.contains("Jam"));
    assert!(rejected.contains("Printer"));
    let empty = list_catalog(data_dir.clone()).await.expect("list");
    assert!(empty.templates.is_empty());

    let summary = import_collections(
        data_dir.clone(),
        json!({
            "exportDate": "2024-05-01T00:00:00.000Z",
            "totalIssues": 1,
            "issues": [{ "name": "Printer", "templateNames": ["Jam"] }]
        })
        .to_string(),
        json!([
            { "issue": "Printer", "name": "Jam", "kba": "KBA00000001",
              "fields": [{ "label": "Printer Name", "type": "text" }] }
        ])
        .to_string(),
    )
    .await
    .expect("import");
    assert_eq!(summary.issue_count, 1);
    assert_eq!(summary.template_count, 1);

    let exported = export_catalog(data_dir.clone()).await.expect("export");
    assert_eq!(exported["totalTemplates"], json!(1));
    assert_eq!(exported["templates"][0]["metrics"]["usageCount"], json!(0));

    let (_other_tmp, other_dir) = create_data_dir();
    import_combined(other_dir.clone(), exported.to_string())
        .await
        .expect("combined import");
    let first = list_catalog(data_dir.clone()).await.expect("list first");
    let second = list_catalog(other_dir).await.expect("list second");
    assert_eq!(first, second);

    let malformed = import_combined(data_dir, "{ not json".to_string())
        .await
        .expect_err("malformed");
    assert!(malformed.starts_with("Invalid import file"));
}

#[tokio::test]
async fn registries_support_crud_contract() {
    let (_tmp, data_dir) = create_data_dir();

    let added = field_labels_crud(
        data_dir.clone(),
        "add".to_string(),
        Some("name".to_string()),
        Some("Requester".to_string()),
    )
    .await
    .expect("add label");
    let names = added["sets"]["name"].as_array().expect("name labels");
    assert_eq!(names.last(), Some(&json!("Requester")));

    field_labels_crud(data_dir.clone(), "reset".to_string(), Some("name".to_string()), None)
        .await
        .expect("reset labels");
    let listed = field_labels_crud(data_dir.clone(), "list".to_string(), None, None)
        .await
        .expect("list labels");
    assert!(!listed["sets"]["name"]
        .as_array()
        .expect("name labels")
        .contains(&json!("Requester")));

    let updated = patterns_crud(
        data_dir.clone(),
        "update".to_string(),
        None,
        Some(StoredPattern {
            key: "assetTag".to_string(),
            source: r"AT-\d{5}".to_string(),
            flags: "i".to_string(),
            target_field_labels: vec!["Asset Tag".to_string()],
        }),
    )
    .await
    .expect("update pattern");
    let patterns = updated["patterns"].as_array().expect("patterns");
    assert_eq!(patterns.last().map(|p| p["key"].clone()), Some(json!("assetTag")));

    let invalid = patterns_crud(
        data_dir.clone(),
        "update".to_string(),
        None,
        Some(StoredPattern {
            key: "broken".to_string(),
            source: "(".to_string(),
            flags: String::new(),
            target_field_labels: vec![],
        }),
    )
    .await
    .expect_err("invalid regex");
    assert!(invalid.contains("broken"));

    let matches = scan_pasted_text(data_dir.clone(), "at-12345\n10.1.2.3".to_string())
        .await
        .expect("scan");
    let keys: Vec<&str> = matches.iter().map(|m| m.pattern_key.as_str()).collect();
    assert_eq!(keys, vec!["assetTag", "ipAddress"]);

    patterns_crud(data_dir.clone(), "reset_all".to_string(), None, None)
        .await
        .expect("reset all");
    let matches = scan_pasted_text(data_dir, "at-12345".to_string())
        .await
        .expect("scan after reset");
    assert!(matches.is_empty());
}

#[tokio::test]
async fn autofill_commands_fill_only_what_they_should() {
    let (_tmp, data_dir) = create_data_dir();
    let fields = vec![
        StructuredField::text("User Name"),
        StructuredField::text("Email"),
        StructuredField::text("Workstation ID"),
        StructuredField::text("IP Address"),
    ];

    let target = resolve_contact_target(data_dir.clone(), fields.clone(), "name".to_string())
        .await
        .expect("resolve");
    assert_eq!(target.as_deref(), Some("User Name"));

    let pasted = autofill_from_paste_internal(
        &data_dir,
        "TH123456789A\n192.168.1.100",
        &fields,
        HashMap::from([("Workstation ID".to_string(), "existing".to_string())]),
    )
    .expect("paste autofill");
    assert_eq!(pasted.updates.len(), 1);
    assert_eq!(pasted.updates[0].label, "IP Address");
    assert_eq!(pasted.values["Workstation ID"], "existing");

    save_settings(data_dir.clone(), json!({ "contactOverwrite": false }))
        .await
        .expect("save settings");
    let settings = get_settings(data_dir.clone()).await.expect("settings");
    assert_eq!(settings["contactOverwrite"], json!(false));

    let contact = Contact {
        name: Some("Jane Doe".to_string()),
        email: Some("jane@example.com".to_string()),
        ..Contact::default()
    };
    let filled = fill_contact_internal(
        &data_dir,
        &fields,
        HashMap::from([("User Name".to_string(), "Typed by agent".to_string())]),
        &contact,
    )
    .expect("fill contact");
    assert_eq!(filled.updates.len(), 1);
    assert_eq!(filled.values["Email"], "jane@example.com");
    assert_eq!(filled.values["User Name"], "Typed by agent");
}
