use crate::store::{Collection, KeyValueStore, StoreError, StoreWrite};
use rusqlite::{params, Connection, OptionalExtension, Result};
use serde_json::Value;
use std::path::Path;

const DB_SCHEMA_VERSION: i64 = 2;

type StoreResult<T> = std::result::Result<T, StoreError>;

pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;

    let mut version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        apply_migration_1(conn)?;
        version = 1;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version < 2 {
        apply_migration_2(conn)?;
        version = 2;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version > DB_SCHEMA_VERSION {
        // Future schema; do not fail reads/writes for forward-compatible changes.
        conn.pragma_update(None, "user_version", version)?;
    }

    Ok(())
}

fn apply_migration_1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS records (
            collection TEXT NOT NULL CHECK(collection IN ('issues', 'templates', 'config')),
            key TEXT NOT NULL,
            body TEXT NOT NULL,
            PRIMARY KEY (collection, key)
        );
        ",
    )
}

fn apply_migration_2(conn: &Connection) -> Result<()> {
    add_column_if_missing(conn, "records", "updated_at INTEGER NOT NULL DEFAULT 0")?;
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_records_updated_at ON records(collection, updated_at);",
    )
}

fn add_column_if_missing(conn: &Connection, table: &str, column_def: &str) -> Result<()> {
    let column_name = column_def
        .split_whitespace()
        .next()
        .unwrap_or(column_def)
        .to_string();

    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let exists = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .filter_map(|res| res.ok())
        .any(|name| name == column_name);

    if !exists {
        conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {column_def}"), [])?;
    }

    Ok(())
}

pub fn get_db_connection(data_dir: &str) -> Result<Connection> {
    let db_path = Path::new(data_dir).join("templatedesk.db");
    let conn = Connection::open(db_path)?;
    initialize_schema(&conn)?;
    Ok(conn)
}

/// Opens the store under `data_dir`, creating the directory on first use.
pub fn open_store(data_dir: &str) -> StoreResult<SqliteStore> {
    std::fs::create_dir_all(data_dir)?;
    Ok(SqliteStore::new(get_db_connection(data_dir)?))
}

/// [`KeyValueStore`] backed by a single `records` table.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn upsert_record(
    conn: &Connection,
    collection: Collection,
    key: &str,
    record: &Value,
) -> StoreResult<()> {
    let body = serde_json::to_string(record)?;
    let now = chrono::Utc::now().timestamp();

    conn.execute(
        "
        INSERT INTO records (collection, key, body, updated_at) VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(collection, key) DO UPDATE SET
            body = excluded.body,
            updated_at = excluded.updated_at
        ",
        params![collection.as_str(), key, body, now],
    )?;
    Ok(())
}

fn delete_record(conn: &Connection, collection: Collection, key: &str) -> StoreResult<()> {
    conn.execute(
        "DELETE FROM records WHERE collection = ?1 AND key = ?2",
        params![collection.as_str(), key],
    )?;
    Ok(())
}

impl KeyValueStore for SqliteStore {
    fn get(&self, collection: Collection, key: &str) -> StoreResult<Option<Value>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM records WHERE collection = ?1 AND key = ?2",
                params![collection.as_str(), key],
                |row| row.get(0),
            )
            .optional()?;

        match body {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    fn put(&self, collection: Collection, key: &str, record: &Value) -> StoreResult<()> {
        upsert_record(&self.conn, collection, key, record)
    }

    fn delete(&self, collection: Collection, key: &str) -> StoreResult<()> {
        delete_record(&self.conn, collection, key)
    }

    fn get_all(&self, collection: Collection) -> StoreResult<Vec<Value>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, body FROM records WHERE collection = ?1 ORDER BY key ASC")?;

        let rows = stmt
            .query_map(params![collection.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>>>()?;

        let mut records = Vec::with_capacity(rows.len());
        for (key, body) in rows {
            match serde_json::from_str(&body) {
                Ok(value) => records.push(value),
                Err(e) => log::warn!(
                    "Skipping unreadable {} record '{key}': {e}",
                    collection.as_str()
                ),
            }
        }
        Ok(records)
    }

    fn put_batch(&self, writes: &[StoreWrite]) -> StoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for write in writes {
            match &write.record {
                Some(record) => upsert_record(&tx, write.collection, &write.key, record)?,
                None => delete_record(&tx, write.collection, &write.key)?,
            }
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_initializes_with_expected_version() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        initialize_schema(&conn).expect("schema init");
        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("schema version");
        assert_eq!(version, DB_SCHEMA_VERSION);
    }

    #[test]
    fn migration_adds_updated_at_to_v1_tables() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        apply_migration_1(&conn).expect("v1 schema");
        conn.pragma_update(None, "user_version", 1).expect("mark v1");
        conn.execute(
            "INSERT INTO records (collection, key, body) VALUES ('issues', 'VPN', '{}')",
            [],
        )
        .expect("legacy row");

        initialize_schema(&conn).expect("migrate");
        let updated_at: i64 = conn
            .query_row("SELECT updated_at FROM records WHERE key = 'VPN'", [], |row| row.get(0))
            .expect("updated_at");
        assert_eq!(updated_at, 0);
    }

    #[test]
    fn record_round_trip_and_ordering() {
        let store = SqliteStore::open_in_memory().expect("store");
        store
            .put(Collection::Templates, "b", &json!({ "name": "b" }))
            .expect("put b");
        store
            .put(Collection::Templates, "a", &json!({ "name": "a" }))
            .expect("put a");
        store
            .put(Collection::Templates, "a", &json!({ "name": "a", "v": 2 }))
            .expect("overwrite a");

        let all = store.get_all(Collection::Templates).expect("all");
        assert_eq!(all, vec![json!({ "name": "a", "v": 2 }), json!({ "name": "b" })]);
        assert!(store.get(Collection::Issues, "a").expect("get").is_none());

        store.delete(Collection::Templates, "a").expect("delete");
        assert_eq!(store.get_all(Collection::Templates).expect("all").len(), 1);
    }

    #[test]
    fn batch_is_committed_as_one_unit() {
        let store = SqliteStore::open_in_memory().expect("store");
        store
            .put_batch(&[
                StoreWrite::put(Collection::Issues, "VPN", json!({ "name": "VPN" })),
                StoreWrite::put(Collection::Templates, "Reset", json!({ "name": "Reset" })),
            ])
            .expect("batch");
        assert!(store.get(Collection::Issues, "VPN").expect("issue").is_some());
        assert!(store.get(Collection::Templates, "Reset").expect("template").is_some());
    }
}
