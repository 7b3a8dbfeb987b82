//! libSQL backend for [`ExpertStore`]. Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::StoreError;

use super::migrations;
use super::traits::ExpertStore;
use super::{Namespace, StoredRecord};

/// libSQL-backed expert store.
///
/// Holds a single connection reused for all operations.
pub struct LibSqlExpertStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlExpertStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Expert store opened");
        Ok(store)
    }

    /// Create an in-memory database.
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                StoreError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, StoreError> {
        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn row_to_record(namespace: &Namespace, row: &libsql::Row) -> Result<StoredRecord, StoreError> {
    let key: String = row
        .get(0)
        .map_err(|e| StoreError::Query(format!("read key: {e}")))?;
    let value_str: String = row
        .get(1)
        .map_err(|e| StoreError::Query(format!("read value: {e}")))?;
    let created_at: String = row.get(2).unwrap_or_default();
    let updated_at: String = row.get(3).unwrap_or_default();

    let value = serde_json::from_str(&value_str)
        .map_err(|e| StoreError::Serialization(format!("record {key}: {e}")))?;

    Ok(StoredRecord {
        namespace: namespace.clone(),
        key,
        value,
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    })
}

#[async_trait]
impl ExpertStore for LibSqlExpertStore {
    async fn search(&self, namespace: &Namespace) -> Result<Vec<StoredRecord>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT key, value, created_at, updated_at FROM expert_records
                 WHERE namespace = ?1 ORDER BY key",
                params![namespace.to_key()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("search: {e}")))?;

        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("search: {e}")))?
        {
            records.push(row_to_record(namespace, &row)?);
        }
        debug!(namespace = %namespace, count = records.len(), "Searched expert store");
        Ok(records)
    }

    async fn get(
        &self,
        namespace: &Namespace,
        key: &str,
    ) -> Result<Option<StoredRecord>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT key, value, created_at, updated_at FROM expert_records
                 WHERE namespace = ?1 AND key = ?2",
                params![namespace.to_key(), key],
            )
            .await
            .map_err(|e| StoreError::Query(format!("get: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_record(namespace, &row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("get: {e}"))),
        }
    }

    async fn upsert(
        &self,
        namespace: &Namespace,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let value_str =
            serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))?;

        self.conn()
            .execute(
                "INSERT INTO expert_records (namespace, key, value, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT (namespace, key) DO UPDATE SET value = ?3, updated_at = ?4",
                params![namespace.to_key(), key, value_str, now],
            )
            .await
            .map_err(|e| StoreError::Query(format!("upsert: {e}")))?;

        debug!(namespace = %namespace, key, "Upserted expert record");
        Ok(())
    }
}
