//! Key-value persistence seam.
//!
//! The engines only see [`KeyValueStore`]; the desktop backend plugs in the
//! SQLite adapter from `commands::db`, tests use [`MemoryStore`].

pub mod registry_store;

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Collection {
    Issues,
    Templates,
    Config,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Issues => "issues",
            Collection::Templates => "templates",
            Collection::Config => "config",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("record encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

/// One pending write inside an atomic batch. `None` deletes the key.
#[derive(Debug, Clone)]
pub struct StoreWrite {
    pub collection: Collection,
    pub key: String,
    pub record: Option<Value>,
}

impl StoreWrite {
    pub fn put(collection: Collection, key: impl Into<String>, record: Value) -> Self {
        Self {
            collection,
            key: key.into(),
            record: Some(record),
        }
    }

    pub fn delete(collection: Collection, key: impl Into<String>) -> Self {
        Self {
            collection,
            key: key.into(),
            record: None,
        }
    }
}

pub trait KeyValueStore {
    fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>, StoreError>;

    fn put(&self, collection: Collection, key: &str, record: &Value) -> Result<(), StoreError>;

    fn delete(&self, collection: Collection, key: &str) -> Result<(), StoreError>;

    /// All records of a collection, ordered by key.
    fn get_all(&self, collection: Collection) -> Result<Vec<Value>, StoreError>;

    /// Applies every write or none of them.
    fn put_batch(&self, writes: &[StoreWrite]) -> Result<(), StoreError>;
}

/// In-process store used by tests and as a scratch backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<(Collection, String), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>, StoreError> {
        let records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(records.get(&(collection, key.to_string())).cloned())
    }

    fn put(&self, collection: Collection, key: &str, record: &Value) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        records.insert((collection, key.to_string()), record.clone());
        Ok(())
    }

    fn delete(&self, collection: Collection, key: &str) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        records.remove(&(collection, key.to_string()));
        Ok(())
    }

    fn get_all(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        let records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(records
            .iter()
            .filter(|((c, _), _)| *c == collection)
            .map(|(_, value)| value.clone())
            .collect())
    }

    fn put_batch(&self, writes: &[StoreWrite]) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        for write in writes {
            let key = (write.collection, write.key.clone());
            match &write.record {
                Some(record) => {
                    records.insert(key, record.clone());
                }
                None => {
                    records.remove(&key);
                }
            }
        }
        Ok(())
    }
}
