//! Cache entry operations on the SQLite store.
//!
//! Entries are keyed by cache key and hold the serialized envelope. They are
//! only ever overwritten or explicitly removed, never expired.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::key::CacheKey;
use super::store::PersistentStore;
use crate::Error;

/// A stored entry together with its bookkeeping columns.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

impl CacheDb {
    /// Insert or overwrite the entry for a key.
    pub async fn put_entry(&self, key: &str, value: &str) -> Result<(), Error> {
        let key = key.to_string();
        let value = value.to_string();
        let updated_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entries (key, value, updated_at) VALUES (?1, ?2, ?3)
                    ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        updated_at = excluded.updated_at",
                    params![key, value, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get an entry by key.
    ///
    /// Returns None if the key doesn't exist in the cache.
    pub async fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt = conn.prepare("SELECT key, value, updated_at FROM entries WHERE key = ?1")?;

                let result = stmt.query_row(params![key], |row| {
                    Ok(CacheEntry { key: row.get(0)?, value: row.get(1)?, updated_at: row.get(2)? })
                });

                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the entry for a key.
    ///
    /// Returns the number of deleted entries (0 or 1).
    pub async fn delete_entry(&self, key: &str) -> Result<u64, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM entries WHERE key = ?1", params![key])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of stored entries.
    pub async fn entry_count(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl PersistentStore for CacheDb {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, Error> {
        Ok(self.get_entry(key.as_str()).await?.map(|entry| entry.value))
    }

    async fn set(&self, key: &CacheKey, value: &str) -> Result<(), Error> {
        self.put_entry(key.as_str(), value).await
    }

    async fn remove(&self, key: &CacheKey) -> Result<(), Error> {
        self.delete_entry(key.as_str()).await.map(|_| ())
    }
}
