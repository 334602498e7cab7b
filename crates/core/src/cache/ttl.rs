//! Namespaced key/value cache with lazy TTL eviction.
//!
//! Backend errors never reach callers of `get`/`put`/`invalidate`: they are
//! logged and treated as a miss or a no-op so the cache can only cost a
//! remote call, never fail one.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Serialize, de::DeserializeOwned};
use tokio_rusqlite::{params, rusqlite};

use super::CacheNamespace;
use crate::{Error, LocalDb};

/// A stored cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub namespace: String,
    pub key: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CacheEntry {
    /// An entry is expired once `now >= created_at + ttl`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        (now - self.created_at).num_milliseconds() >= duration_to_ms(self.ttl)
    }
}

fn ms_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

fn duration_to_ms(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

/// One cache namespace backed by the `cache_entries` table.
#[derive(Debug, Clone)]
pub struct TtlCache {
    db: LocalDb,
    namespace: CacheNamespace,
    ttl: Duration,
}

impl TtlCache {
    pub fn new(db: LocalDb, namespace: CacheNamespace, ttl: Duration) -> Self {
        Self { db, namespace, ttl }
    }

    pub fn namespace(&self) -> CacheNamespace {
        self.namespace
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the live value for `key`, evicting it if it has expired.
    pub async fn get(&self, key: &str) -> Option<String> {
        match self.try_get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(namespace = %self.namespace, key, error = %e, "cache read failed; treating as miss");
                None
            }
        }
    }

    /// Check expiry and evict inside one serialized database call.
    ///
    /// The delete matches the observed `created_at_ms`, so an entry rewritten
    /// by a concurrent `put` is left alone.
    async fn try_get(&self, key: &str) -> Result<Option<String>, Error> {
        let namespace = self.namespace.as_str();
        let key = key.to_string();
        let now = Utc::now();

        self.db
            .conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let row = conn.query_row(
                    "SELECT value, created_at_ms, ttl_ms FROM cache_entries WHERE namespace = ?1 AND key = ?2",
                    params![namespace, key],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?)),
                );

                let (value, created_at_ms, ttl_ms) = match row {
                    Ok(found) => found,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };

                let entry = CacheEntry {
                    namespace: namespace.to_string(),
                    key,
                    value,
                    created_at: ms_to_datetime(created_at_ms),
                    ttl: Duration::from_millis(ttl_ms.max(0) as u64),
                };

                if entry.is_expired_at(now) {
                    conn.execute(
                        "DELETE FROM cache_entries WHERE namespace = ?1 AND key = ?2 AND created_at_ms = ?3",
                        params![namespace, entry.key, created_at_ms],
                    )?;
                    return Ok(None);
                }

                Ok(Some(entry.value))
            })
            .await
            .map_err(Error::from)
    }

    /// Store `value` under `key` with the namespace's default TTL.
    pub async fn put(&self, key: &str, value: &str) {
        self.put_with_ttl(key, value, self.ttl).await;
    }

    /// Store `value` under `key`, replacing any existing entry.
    pub async fn put_with_ttl(&self, key: &str, value: &str, ttl: Duration) {
        if let Err(e) = self.try_put(key, value, ttl).await {
            tracing::warn!(namespace = %self.namespace, key, error = %e, "cache write failed; ignoring");
        }
    }

    async fn try_put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), Error> {
        let namespace = self.namespace.as_str();
        let key = key.to_string();
        let value = value.to_string();
        let created_at_ms = Utc::now().timestamp_millis();
        let ttl_ms = duration_to_ms(ttl);

        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cache_entries (namespace, key, value, created_at_ms, ttl_ms)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(namespace, key) DO UPDATE SET
                        value = excluded.value,
                        created_at_ms = excluded.created_at_ms,
                        ttl_ms = excluded.ttl_ms",
                    params![namespace, key, value, created_at_ms, ttl_ms],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Remove `key`. Returns whether an entry existed.
    pub async fn invalidate(&self, key: &str) -> bool {
        let namespace = self.namespace.as_str();
        let owned = key.to_string();
        let result = self
            .db
            .conn
            .call(move |conn| -> Result<usize, Error> {
                Ok(conn.execute(
                    "DELETE FROM cache_entries WHERE namespace = ?1 AND key = ?2",
                    params![namespace, owned],
                )?)
            })
            .await
            .map_err(Error::from);

        match result {
            Ok(deleted) => deleted > 0,
            Err(e) => {
                tracing::warn!(namespace = %self.namespace, key, error = %e, "cache invalidation failed");
                false
            }
        }
    }

    /// Decode a JSON value. Undecodable entries are dropped and reported as a miss.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(namespace = %self.namespace, key, error = %e, "discarding undecodable cache entry");
                self.invalidate(key).await;
                None
            }
        }
    }

    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.put(key, &raw).await,
            Err(e) => tracing::warn!(namespace = %self.namespace, key, error = %e, "cache value not serializable"),
        }
    }

    /// Delete every expired entry in this namespace.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_expired(&self) -> Result<u64, Error> {
        let namespace = self.namespace.as_str();
        let now_ms = Utc::now().timestamp_millis();
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM cache_entries WHERE namespace = ?1 AND created_at_ms + ttl_ms <= ?2",
                    params![namespace, now_ms],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
