use crate::bounded::{BoundedLog, LogEntry};
use crate::error::Result;
use crate::DocumentStore;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};
use vega_common::tenant::TeamId;

type DocKey = (String, TeamId);

struct StoredEntry {
    id: String,
    body: Value,
}

impl LogEntry for StoredEntry {
    fn entry_id(&self) -> &str {
        &self.id
    }
}

/// Process-local store. Contents vanish with the process.
#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: Mutex<HashMap<DocKey, Value>>,
    logs: Mutex<HashMap<DocKey, BoundedLog<StoredEntry>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn get(&self, key: &str, tenant: &TeamId) -> Result<Option<Value>> {
        Ok(lock(&self.docs)
            .get(&(key.to_string(), tenant.clone()))
            .cloned())
    }

    fn set(&self, key: &str, tenant: &TeamId, value: &Value) -> Result<()> {
        lock(&self.docs).insert((key.to_string(), tenant.clone()), value.clone());
        Ok(())
    }

    fn tenants_with(&self, key: &str) -> Result<Vec<TeamId>> {
        let docs = lock(&self.docs);
        let logs = lock(&self.logs);
        let tenants: BTreeSet<TeamId> = docs
            .keys()
            .chain(logs.keys())
            .filter(|(k, _)| k == key)
            .map(|(_, t)| t.clone())
            .collect();
        Ok(tenants.into_iter().collect())
    }

    fn log_append(
        &self,
        key: &str,
        tenant: &TeamId,
        id: &str,
        entry: &Value,
        capacity: usize,
    ) -> Result<Option<String>> {
        let mut logs = lock(&self.logs);
        let log = logs
            .entry((key.to_string(), tenant.clone()))
            .or_insert_with(|| BoundedLog::new(capacity));
        Ok(log.append(StoredEntry {
            id: id.to_string(),
            body: entry.clone(),
        }))
    }

    fn log_entries(&self, key: &str, tenant: &TeamId) -> Result<Vec<Value>> {
        Ok(lock(&self.logs)
            .get(&(key.to_string(), tenant.clone()))
            .map(|log| log.iter().map(|e| e.body.clone()).collect())
            .unwrap_or_default())
    }

    fn log_replace(&self, key: &str, tenant: &TeamId, id: &str, entry: &Value) -> Result<bool> {
        let mut logs = lock(&self.logs);
        let Some(log) = logs.get_mut(&(key.to_string(), tenant.clone())) else {
            return Ok(false);
        };
        match log.find_mut(id) {
            Some(stored) => {
                stored.body = entry.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
