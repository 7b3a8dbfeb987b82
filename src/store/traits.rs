//! Backend-agnostic store trait.

use async_trait::async_trait;

use crate::error::StoreError;

use super::{Namespace, StoredRecord};

/// Key-value persistence for expert records, grouped by namespace.
#[async_trait]
pub trait ExpertStore: Send + Sync {
    /// All records in a namespace, ordered by key.
    async fn search(&self, namespace: &Namespace) -> Result<Vec<StoredRecord>, StoreError>;

    /// One record, if present.
    async fn get(
        &self,
        namespace: &Namespace,
        key: &str,
    ) -> Result<Option<StoredRecord>, StoreError>;

    /// Insert or replace the value at `(namespace, key)`.
    async fn upsert(
        &self,
        namespace: &Namespace,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), StoreError>;
}
