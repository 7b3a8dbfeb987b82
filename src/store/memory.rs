//! In-process store, used when no database path is configured and in tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::StoreError;

use super::traits::ExpertStore;
use super::{Namespace, StoredRecord};

#[derive(Default)]
pub struct InMemoryExpertStore {
    records: RwLock<BTreeMap<(Namespace, String), StoredRecord>>,
}

impl InMemoryExpertStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExpertStore for InMemoryExpertStore {
    async fn search(&self, namespace: &Namespace) -> Result<Vec<StoredRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn get(
        &self,
        namespace: &Namespace,
        key: &str,
    ) -> Result<Option<StoredRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(&(namespace.clone(), key.to_string())).cloned())
    }

    async fn upsert(
        &self,
        namespace: &Namespace,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut records = self.records.write().await;
        records
            .entry((namespace.clone(), key.to_string()))
            .and_modify(|r| {
                r.value = value.clone();
                r.updated_at = now;
            })
            .or_insert_with(|| StoredRecord {
                namespace: namespace.clone(),
                key: key.to_string(),
                value: value.clone(),
                created_at: now,
                updated_at: now,
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn upsert_then_search_is_scoped() {
        let store = InMemoryExpertStore::new();
        let mine = Namespace::for_expert("t1", "e1");
        let other = Namespace::for_expert("t1", "e2");

        store.upsert(&mine, "profile", &json!({"name": "Ana"})).await.unwrap();
        store.upsert(&other, "profile", &json!({"name": "Bo"})).await.unwrap();

        let found = store.search(&mine).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value["name"], "Ana");
    }

    #[tokio::test]
    async fn upsert_replaces_value_and_keeps_created_at() {
        let store = InMemoryExpertStore::new();
        let ns = Namespace::for_expert("t", "e");
        store.upsert(&ns, "profile", &json!({"name": "A"})).await.unwrap();
        let first = store.get(&ns, "profile").await.unwrap().unwrap();

        store.upsert(&ns, "profile", &json!({"name": "B"})).await.unwrap();
        let second = store.get(&ns, "profile").await.unwrap().unwrap();

        assert_eq!(second.value["name"], "B");
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(store.search(&ns).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_record_is_none() {
        let store = InMemoryExpertStore::new();
        let ns = Namespace::for_expert("t", "e");
        assert!(store.get(&ns, "profile").await.unwrap().is_none());
        assert!(store.search(&ns).await.unwrap().is_empty());
    }
}
