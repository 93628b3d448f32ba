use crate::models::field::StructuredField;
use crate::models::registry::{FieldCategory, FieldLabelRegistry};
use crate::store::registry_store::load_field_labels;
use crate::store::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Contact attributes as picked by the agent; absent attributes are skipped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Contact {
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Contact {
    pub fn attribute(&self, category: FieldCategory) -> Option<&str> {
        let value = match category {
            FieldCategory::UserId => self.user_id.as_deref(),
            FieldCategory::Name => self.name.as_deref(),
            FieldCategory::Email => self.email.as_deref(),
            FieldCategory::Phone => self.phone.as_deref(),
        };
        value.map(str::trim).filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactUpdate {
    pub category: FieldCategory,
    pub label: String,
    pub value: String,
}

/// Field order decides the winner; the order of `labels` does not.
pub fn resolve_target(fields: &[StructuredField], labels: &[String]) -> Option<String> {
    fields
        .iter()
        .find(|field| labels.iter().any(|label| *label == field.label))
        .map(|field| field.label.clone())
}

pub struct ContactAutofillResolver {
    registry: FieldLabelRegistry,
}

impl ContactAutofillResolver {
    /// Reads the label registry from the store, degrading to built-in labels on failure.
    pub fn from_store(store: &dyn KeyValueStore) -> Self {
        let registry = load_field_labels(store).unwrap_or_else(|e| {
            log::warn!("Field label registry unavailable ({e}); using built-in labels");
            FieldLabelRegistry::default()
        });
        Self { registry }
    }

    pub fn with_registry(registry: FieldLabelRegistry) -> Self {
        Self { registry }
    }

    pub fn resolve_target(
        &self,
        fields: &[StructuredField],
        category: FieldCategory,
    ) -> Option<String> {
        resolve_target(fields, &self.registry.labels(category))
    }

    /// Writes each present contact attribute into its resolved field.
    ///
    /// With `overwrite` off, fields that already hold a non-blank value are left alone.
    pub fn fill_contact(
        &self,
        fields: &[StructuredField],
        values: &mut HashMap<String, String>,
        contact: &Contact,
        overwrite: bool,
    ) -> Vec<ContactUpdate> {
        let mut updates = Vec::new();

        for category in FieldCategory::ALL {
            let Some(value) = contact.attribute(category) else {
                continue;
            };
            let Some(label) = self.resolve_target(fields, category) else {
                continue;
            };

            let occupied = values
                .get(&label)
                .is_some_and(|current| !current.trim().is_empty());
            if occupied && !overwrite {
                continue;
            }

            values.insert(label.clone(), value.to_string());
            updates.push(ContactUpdate {
                category,
                label,
                value: value.to_string(),
            });
        }

        updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Collection, MemoryStore, StoreError, StoreWrite};
    use serde_json::{json, Value};

    fn fields(labels: &[&str]) -> Vec<StructuredField> {
        labels.iter().map(|label| StructuredField::text(*label)).collect()
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _: Collection, _: &str) -> Result<Option<Value>, StoreError> {
            Err(StoreError::Poisoned)
        }
        fn put(&self, _: Collection, _: &str, _: &Value) -> Result<(), StoreError> {
            Err(StoreError::Poisoned)
        }
        fn delete(&self, _: Collection, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Poisoned)
        }
        fn get_all(&self, _: Collection) -> Result<Vec<Value>, StoreError> {
            Err(StoreError::Poisoned)
        }
        fn put_batch(&self, _: &[StoreWrite]) -> Result<(), StoreError> {
            Err(StoreError::Poisoned)
        }
    }

    #[test]
    fn first_field_in_field_order_wins() {
        let labels = vec!["Full Name".to_string(), "Name".to_string()];
        let target = resolve_target(&fields(&["Ticket", "Name", "Full Name"]), &labels);
        assert_eq!(target.as_deref(), Some("Name"));
    }

    #[test]
    fn matching_is_exact() {
        let labels = vec!["Email".to_string()];
        assert_eq!(resolve_target(&fields(&["email", "Email Address"]), &labels), None);
    }

    #[test]
    fn unreadable_registry_degrades_to_defaults() {
        let resolver = ContactAutofillResolver::from_store(&BrokenStore);
        let target = resolver.resolve_target(&fields(&["Notes", "Phone Number"]), FieldCategory::Phone);
        assert_eq!(target.as_deref(), Some("Phone Number"));
    }

    #[test]
    fn custom_labels_from_store_are_used() {
        let store = MemoryStore::new();
        let mut registry = FieldLabelRegistry::default();
        registry.add(FieldCategory::UserId, "Associate ID");
        crate::store::registry_store::save_field_labels(&store, &registry).expect("save");

        let resolver = ContactAutofillResolver::from_store(&store);
        let target = resolver.resolve_target(&fields(&["Associate ID"]), FieldCategory::UserId);
        assert_eq!(target.as_deref(), Some("Associate ID"));
    }

    #[test]
    fn fill_contact_respects_overwrite_flag() {
        let resolver = ContactAutofillResolver::with_registry(FieldLabelRegistry::default());
        let form = fields(&["User ID", "Name", "Email"]);
        let contact: Contact = serde_json::from_value(json!({
            "user_id": "jdoe",
            "name": "Jane Doe",
            "email": "  ",
        }))
        .expect("contact");

        let mut values = HashMap::from([("Name".to_string(), "Existing".to_string())]);
        let updates = resolver.fill_contact(&form, &mut values, &contact, false);
        assert_eq!(updates.len(), 1);
        assert_eq!(values["User ID"], "jdoe");
        assert_eq!(values["Name"], "Existing");
        assert!(!values.contains_key("Email"));

        let updates = resolver.fill_contact(&form, &mut values, &contact, true);
        assert_eq!(updates.len(), 2);
        assert_eq!(values["Name"], "Jane Doe");
    }
}
