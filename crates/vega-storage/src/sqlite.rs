use crate::error::Result;
use crate::DocumentStore;
use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use vega_common::tenant::TeamId;

const DOCUMENTS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    tenant TEXT NOT NULL,
    key TEXT NOT NULL,
    body TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (tenant, key)
);
CREATE INDEX IF NOT EXISTS idx_documents_key ON documents(key);
";

const LOG_ENTRIES_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS log_entries (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant TEXT NOT NULL,
    key TEXT NOT NULL,
    entry_id TEXT NOT NULL,
    body TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_log_entries_tenant_key_seq ON log_entries(tenant, key, seq);
CREATE INDEX IF NOT EXISTS idx_log_entries_entry_id ON log_entries(tenant, key, entry_id);
";

/// SQLite-backed document store (single file, WAL mode).
///
/// Log entries are rows of their own, so an append is one insert plus at
/// most one delete of the oldest row.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store = Self::init(conn)?;
        tracing::info!(path = %path.display(), "Initialized document store");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(DOCUMENTS_SCHEMA)?;
        conn.execute_batch(LOG_ENTRIES_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn get(&self, key: &str, tenant: &TeamId) -> Result<Option<Value>> {
        let conn = self.lock_conn();
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE tenant = ?1 AND key = ?2",
                rusqlite::params![tenant.as_str(), key],
                |row| row.get(0),
            )
            .optional()?;
        match body {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, tenant: &TeamId, value: &Value) -> Result<()> {
        let body = serde_json::to_string(value)?;
        let now = chrono::Utc::now().timestamp_millis();
        self.lock_conn().execute(
            "INSERT INTO documents (tenant, key, body, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(tenant, key) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            rusqlite::params![tenant.as_str(), key, body, now],
        )?;
        Ok(())
    }

    fn tenants_with(&self, key: &str) -> Result<Vec<TeamId>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(
            "SELECT tenant FROM documents WHERE key = ?1
             UNION SELECT DISTINCT tenant FROM log_entries WHERE key = ?1
             ORDER BY 1",
        )?;
        let rows = stmt.query_map(rusqlite::params![key], |row| row.get::<_, String>(0))?;
        let mut tenants = Vec::new();
        for row in rows {
            tenants.push(TeamId::new(row?));
        }
        Ok(tenants)
    }

    fn log_append(
        &self,
        key: &str,
        tenant: &TeamId,
        id: &str,
        entry: &Value,
        capacity: usize,
    ) -> Result<Option<String>> {
        let body = serde_json::to_string(entry)?;
        let conn = self.lock_conn();
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO log_entries (tenant, key, entry_id, body) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![tenant.as_str(), key, id, body],
        )?;
        let count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM log_entries WHERE tenant = ?1 AND key = ?2",
            rusqlite::params![tenant.as_str(), key],
            |row| row.get(0),
        )?;

        let overflow = count - capacity as i64;
        let mut evicted = None;
        if overflow > 0 {
            let doomed: Vec<(i64, String)> = {
                let mut stmt = tx.prepare_cached(
                    "SELECT seq, entry_id FROM log_entries WHERE tenant = ?1 AND key = ?2
                     ORDER BY seq ASC LIMIT ?3",
                )?;
                let rows = stmt.query_map(
                    rusqlite::params![tenant.as_str(), key, overflow],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                rows.collect::<std::result::Result<_, _>>()?
            };
            for (seq, entry_id) in doomed {
                tx.execute("DELETE FROM log_entries WHERE seq = ?1", rusqlite::params![seq])?;
                evicted.get_or_insert(entry_id);
            }
        }
        tx.commit()?;
        Ok(evicted)
    }

    fn log_entries(&self, key: &str, tenant: &TeamId) -> Result<Vec<Value>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(
            "SELECT body FROM log_entries WHERE tenant = ?1 AND key = ?2 ORDER BY seq DESC",
        )?;
        let rows = stmt.query_map(rusqlite::params![tenant.as_str(), key], |row| {
            row.get::<_, String>(0)
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(serde_json::from_str(&row?)?);
        }
        Ok(entries)
    }

    fn log_replace(&self, key: &str, tenant: &TeamId, id: &str, entry: &Value) -> Result<bool> {
        let body = serde_json::to_string(entry)?;
        let changed = self.lock_conn().execute(
            "UPDATE log_entries SET body = ?1 WHERE tenant = ?2 AND key = ?3 AND entry_id = ?4",
            rusqlite::params![body, tenant.as_str(), key, id],
        )?;
        Ok(changed > 0)
    }
}
