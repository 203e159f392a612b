//! Two-tier cache front
//!
//! **[APA-CSH-010]** Read path: L1 (wait-free) → L2; an L2 hit is promoted
//! into L1 and its access statistics updated off the response path. Write
//! path: L1 synchronously, L2 fire-and-forget — a broken durable tier never
//! delays or fails the caller. A served entry's gazetteer version always
//! equals the current version at the moment of return.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use vnap_common::models::{AddressResult, CacheEntry};

use super::l1::L1Cache;
use super::l2::DurableCache;

/// Aggregate cache counters for the stats endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub l1_entries: usize,
}

pub struct HybridCache {
    l1: Arc<L1Cache>,
    l2: Option<DurableCache>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl HybridCache {
    pub fn new(l1_size: usize, l2: Option<DurableCache>) -> Arc<Self> {
        Arc::new(Self {
            l1: Arc::new(L1Cache::new(l1_size)),
            l2,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Look up a previously parsed result. `normalized` keys L1,
    /// `fingerprint` keys L2; only entries of the current version are served.
    pub async fn get(
        &self,
        normalized: &str,
        fingerprint: &str,
        current_version: &str,
    ) -> Option<AddressResult> {
        if let Some(result) = self.l1.get(normalized) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = normalized, "L1 cache hit");
            return Some(result);
        }

        if let Some(l2) = &self.l2 {
            match l2.get(fingerprint).await {
                Ok(Some(entry)) if entry.is_current(current_version) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(fingerprint, "L2 cache hit");

                    // Promote into L1 and bump access stats off the response
                    // path; failures are logged and dropped
                    let l1 = self.l1.clone();
                    let l2 = l2.clone();
                    let key = normalized.to_string();
                    let fp = fingerprint.to_string();
                    let result = entry.result.clone();
                    tokio::spawn(async move {
                        l1.insert(&key, result);
                        if let Err(e) = l2.touch(&fp).await {
                            tracing::warn!(error = %e, "L2 access-stat update failed");
                        }
                    });

                    return Some(entry.result);
                }
                Ok(Some(_)) => {
                    tracing::debug!(fingerprint, "L2 entry stale, not served");
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "L2 read failed, bypassing durable tier");
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Write-through: L1 now, L2 in the background.
    pub fn put(&self, normalized: &str, result: &AddressResult, version: &str) {
        self.l1.insert(normalized, result.clone());

        if let Some(l2) = &self.l2 {
            let l2 = l2.clone();
            let entry = CacheEntry::new(result.clone(), version);
            tokio::spawn(async move {
                if let Err(e) = l2.put(&entry).await {
                    tracing::warn!(error = %e, "L2 cache write failed (dropped)");
                }
            });
        }
    }

    /// Purge entries carrying the given (old) version.
    pub async fn invalidate_version(&self, version: &str) -> u64 {
        self.l1.clear();
        if let Some(l2) = &self.l2 {
            match l2.invalidate_version(version).await {
                Ok(n) => return n,
                Err(e) => tracing::warn!(error = %e, "L2 invalidation failed"),
            }
        }
        0
    }

    /// Version switch: purge L1 entirely and delete stale L2 rows.
    pub async fn on_version_switch(&self, current_version: &str) -> u64 {
        self.l1.clear();
        if let Some(l2) = &self.l2 {
            match l2.purge_stale(current_version).await {
                Ok(n) => return n,
                Err(e) => tracing::warn!(error = %e, "L2 stale purge failed"),
            }
        }
        0
    }

    /// Preload the most-accessed current-version L2 entries into L1.
    pub async fn warm_up(&self, current_version: &str, limit: i64) -> usize {
        let Some(l2) = &self.l2 else {
            return 0;
        };
        match l2.top_accessed(current_version, limit).await {
            Ok(entries) => {
                let count = entries.len();
                for entry in entries {
                    self.l1.insert(&entry.normalized, entry.result);
                }
                tracing::info!(count, "L1 cache warmed from durable tier");
                count
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cache warm-up failed");
                0
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
            l1_entries: self.l1.len(),
        }
    }
}
