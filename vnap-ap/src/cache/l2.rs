//! Durable cache tier over the address_cache table
//!
//! Thin service wrapper around the shared query layer so the hybrid front
//! can treat both tiers uniformly.

use sqlx::SqlitePool;
use vnap_common::db::address_cache;
use vnap_common::models::CacheEntry;
use vnap_common::Result;

#[derive(Clone)]
pub struct DurableCache {
    pool: SqlitePool,
}

impl DurableCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, fingerprint: &str) -> Result<Option<CacheEntry>> {
        address_cache::get(&self.pool, fingerprint).await
    }

    pub async fn put(&self, entry: &CacheEntry) -> Result<()> {
        address_cache::upsert(&self.pool, entry).await
    }

    pub async fn touch(&self, fingerprint: &str) -> Result<()> {
        address_cache::touch_access(&self.pool, fingerprint).await
    }

    pub async fn invalidate_version(&self, version: &str) -> Result<u64> {
        address_cache::invalidate_version(&self.pool, version).await
    }

    pub async fn purge_stale(&self, current_version: &str) -> Result<u64> {
        address_cache::purge_stale(&self.pool, current_version).await
    }

    pub async fn top_accessed(&self, current_version: &str, limit: i64) -> Result<Vec<CacheEntry>> {
        address_cache::top_accessed(&self.pool, current_version, limit).await
    }

    pub async fn len(&self) -> Result<i64> {
        address_cache::count(&self.pool).await
    }
}
