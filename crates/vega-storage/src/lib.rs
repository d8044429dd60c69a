//! Tenant-scoped document storage.
//!
//! Every record is a JSON document addressed by `(key, tenant)`. Rolling
//! histories (triggered alerts, reports) live in capped logs so that an
//! append evicts at most the oldest entry instead of rewriting the list.
//! Two backends are provided: [`sqlite::SqliteDocumentStore`] for durable
//! deployments and [`memory::MemoryDocumentStore`] for tests.

pub mod bounded;
pub mod error;
pub mod memory;
pub mod sqlite;


use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use vega_common::tenant::TeamId;

pub use bounded::{BoundedLog, LogEntry};
pub use error::StorageError;
pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

/// Well-known document keys.
pub mod keys {
    pub const ALERT_RULES: &str = "vega_alert_rules";
    pub const TRIGGERED_ALERTS: &str = "vega_triggered_alerts";
    pub const REPORTS: &str = "vega_reports";
    pub const NOTIFICATION_CONFIG: &str = "vega_notification_config";
    pub const SCHEDULE_CONFIG: &str = "vega_schedule_config";
    /// Last local date each report period ran, per tenant.
    pub const REPORT_RUNS: &str = "vega_report_runs";
    /// Stored under a caller id; holds the team that caller belongs to.
    pub const TEAM_ID: &str = "vega_team_id";

    pub const TRIGGERED_ALERTS_CAPACITY: usize = 100;
    pub const REPORTS_CAPACITY: usize = 50;
}

/// Key/value document persistence partitioned by tenant.
///
/// Implementations must be `Send + Sync`: the HTTP handlers, the alert
/// engine and the report scheduler share one store. Absent keys read as
/// `None` (or an empty log); there is no schema migration.
pub trait DocumentStore: Send + Sync {
    fn get(&self, key: &str, tenant: &TeamId) -> Result<Option<Value>>;

    fn set(&self, key: &str, tenant: &TeamId, value: &Value) -> Result<()>;

    /// Tenants that currently hold a document under `key`.
    fn tenants_with(&self, key: &str) -> Result<Vec<TeamId>>;

    /// Appends `entry` to the capped log under `key`, evicting the oldest
    /// entry once more than `capacity` are held. Returns the evicted id.
    fn log_append(
        &self,
        key: &str,
        tenant: &TeamId,
        id: &str,
        entry: &Value,
        capacity: usize,
    ) -> Result<Option<String>>;

    /// Log entries, newest first.
    fn log_entries(&self, key: &str, tenant: &TeamId) -> Result<Vec<Value>>;

    /// Replaces the entry with `id` in place. Returns `false` when absent.
    fn log_replace(&self, key: &str, tenant: &TeamId, id: &str, entry: &Value) -> Result<bool>;
}

/// Typed helpers over [`DocumentStore`].
pub trait DocumentStoreExt: DocumentStore {
    fn get_as<T: DeserializeOwned>(&self, key: &str, tenant: &TeamId) -> Result<Option<T>> {
        match self.get(key, tenant)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    fn set_as<T: Serialize>(&self, key: &str, tenant: &TeamId, value: &T) -> Result<()> {
        self.set(key, tenant, &serde_json::to_value(value)?)
    }

    fn log_append_as<T: Serialize + LogEntry>(
        &self,
        key: &str,
        tenant: &TeamId,
        entry: &T,
        capacity: usize,
    ) -> Result<Option<String>> {
        let value = serde_json::to_value(entry)?;
        self.log_append(key, tenant, entry.entry_id(), &value, capacity)
    }

    fn log_entries_as<T: DeserializeOwned>(&self, key: &str, tenant: &TeamId) -> Result<Vec<T>> {
        self.log_entries(key, tenant)?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(Into::into))
            .collect()
    }

    fn log_replace_as<T: Serialize + LogEntry>(
        &self,
        key: &str,
        tenant: &TeamId,
        entry: &T,
    ) -> Result<bool> {
        let value = serde_json::to_value(entry)?;
        self.log_replace(key, tenant, entry.entry_id(), &value)
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}
