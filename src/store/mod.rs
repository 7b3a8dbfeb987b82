//! Persistent store for expert profiles, scoped by namespace.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use libsql_backend::LibSqlExpertStore;
pub use memory::InMemoryExpertStore;
pub use traits::ExpertStore;

/// Hierarchical scope for stored records, e.g. `[tenant, "experts", expert]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace(Vec<String>);

impl Namespace {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Namespace holding one expert's records for a tenant.
    pub fn for_expert(tenant_id: &str, expert_id: &str) -> Self {
        Self::new([tenant_id, "experts", expert_id])
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    /// Stable string form used as a storage key (a JSON array).
    pub fn to_key(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// A value stored under `(namespace, key)`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub namespace: Namespace,
    pub key: String,
    pub value: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
