//! SQLite-backed TTL caches.
//!
//! Three namespaces share the `cache_entries` table:
//!
//! - `schema`: remote container schemas (default 1h)
//! - `content`: rendered page content (default 10m)
//! - `mapping`: secondary-object handles keyed by `compute_cache_key` (default 30d)
//!
//! Eviction is lazy: an expired entry is removed by the read that finds it,
//! or in bulk by `TtlCache::purge_expired`.

use std::fmt;

pub mod hash;
pub mod ttl;

pub use hash::compute_cache_key;
pub use ttl::{CacheEntry, TtlCache};

use crate::{AppConfig, LocalDb};

/// Cache namespace; stored verbatim in `cache_entries.namespace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    Schema,
    Content,
    Mapping,
}

impl CacheNamespace {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::Content => "content",
            Self::Mapping => "mapping",
        }
    }
}

impl fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three engine caches, each with its configured TTL.
#[derive(Debug, Clone)]
pub struct Caches {
    pub schema: TtlCache,
    pub content: TtlCache,
    pub mapping: TtlCache,
}

impl Caches {
    pub fn new(db: &LocalDb, config: &AppConfig) -> Self {
        Self {
            schema: TtlCache::new(db.clone(), CacheNamespace::Schema, config.schema_cache_ttl()),
            content: TtlCache::new(db.clone(), CacheNamespace::Content, config.content_cache_ttl()),
            mapping: TtlCache::new(db.clone(), CacheNamespace::Mapping, config.mapping_cache_ttl()),
        }
    }

    /// Purge expired entries from every namespace. Returns the total removed.
    pub async fn purge_expired(&self) -> Result<u64, crate::Error> {
        let mut total = 0;
        for cache in [&self.schema, &self.content, &self.mapping] {
            total += cache.purge_expired().await?;
        }
        Ok(total)
    }
}
