//! Durable cache entry for parsed addresses

use super::AddressResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the durable (L2) address cache, keyed by fingerprint.
///
/// **[APA-CSH-010]** An entry is invalid when its `gazetteer_version` differs
/// from the current one; invalid entries must never be served.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub raw: String,
    pub normalized: String,
    pub result: AddressResult,
    pub gazetteer_version: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: i64,
    /// Editorially confirmed entries survive invalidation as seed data but
    /// are still never served when stale
    pub manually_verified: bool,
}

impl CacheEntry {
    pub fn new(result: AddressResult, gazetteer_version: &str) -> Self {
        let now = Utc::now();
        Self {
            fingerprint: result.fingerprint.clone(),
            raw: result.raw.clone(),
            normalized: result.normalized_no_diacritics.clone(),
            result,
            gazetteer_version: gazetteer_version.to_string(),
            created_at: now,
            last_accessed: now,
            access_count: 1,
            manually_verified: false,
        }
    }

    /// Whether this entry may be served under the given current version.
    pub fn is_current(&self, current_version: &str) -> bool {
        self.gazetteer_version == current_version
    }
}
