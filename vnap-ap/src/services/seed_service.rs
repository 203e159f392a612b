//! Gazetteer seeding and index administration
//!
//! **[APA-SEED-010]** Dry-run validation reports problems without touching
//! state; a live seed is an atomic replacement (database transaction +
//! snapshot swap) followed by cache invalidation. Synonym rebuilds fold the
//! approved learned aliases into the index settings.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use sqlx::SqlitePool;

use vnap_common::db::{admin_units, learned_aliases};
use vnap_common::models::AdminUnit;
use vnap_common::{Error, Result};

use crate::cache::HybridCache;
use crate::gazetteer::{GazetteerIndex, IndexSettings};
use crate::normalizer::normalize_name;

/// Dry-run validation report.
#[derive(Debug, Clone, Serialize)]
pub struct SeedReport {
    pub passed: bool,
    pub warnings: Vec<String>,
    pub units_validated: usize,
    pub estimated_build_time: String,
}

/// Live seed outcome.
#[derive(Debug, Clone, Serialize)]
pub struct SeedOutcome {
    pub units_processed: u64,
    pub indexes_built: bool,
    pub cache_entries_purged: u64,
}

pub struct SeedService {
    pool: SqlitePool,
    index: Arc<GazetteerIndex>,
    cache: Arc<HybridCache>,
}

impl SeedService {
    pub fn new(pool: SqlitePool, index: Arc<GazetteerIndex>, cache: Arc<HybridCache>) -> Self {
        Self { pool, index, cache }
    }

    /// Structural validation of a seed payload: per-unit invariants,
    /// duplicate ids and dangling parent references.
    pub fn validate(units: &[AdminUnit]) -> SeedReport {
        let mut warnings = Vec::new();

        if units.is_empty() {
            warnings.push("no units in payload".to_string());
        }

        let ids: HashSet<&str> = units.iter().map(|u| u.admin_id.as_str()).collect();
        let mut seen: HashSet<&str> = HashSet::with_capacity(units.len());

        for unit in units {
            if !seen.insert(unit.admin_id.as_str()) {
                warnings.push(format!("duplicate admin_id: {}", unit.admin_id));
            }
            warnings.extend(unit.validate());
            if let Some(parent) = &unit.parent_id {
                if !ids.contains(parent.as_str()) {
                    warnings.push(format!(
                        "{}: parent {} not in payload",
                        unit.admin_id, parent
                    ));
                }
            }
        }

        let estimated_seconds = (units.len() / 100).max(1);

        SeedReport {
            passed: warnings.is_empty(),
            warnings,
            units_validated: units.len(),
            estimated_build_time: format!("{}s", estimated_seconds),
        }
    }

    /// Live seed: validate, persist atomically, swap the snapshot, rebuild
    /// settings if asked, and drop cache entries from older versions.
    pub async fn seed(
        &self,
        version: &str,
        mut units: Vec<AdminUnit>,
        rebuild_indexes: bool,
    ) -> Result<SeedOutcome> {
        if version.is_empty() {
            return Err(Error::InvalidInput("gazetteer_version required".into()));
        }

        let report = Self::validate(&units);
        if !report.passed {
            return Err(Error::InvalidInput(format!(
                "seed validation failed: {}",
                report.warnings.join("; ")
            )));
        }

        for unit in &mut units {
            if unit.normalized_name.is_empty() {
                unit.normalized_name = normalized_unit_name(&unit.name);
            }
            unit.gazetteer_version = version.to_string();
        }

        let units_processed = admin_units::replace_all(&self.pool, &units, version).await?;
        self.index.bulk_load(units, version).await;

        let mut indexes_built = false;
        if rebuild_indexes {
            self.rebuild_synonyms().await?;
            indexes_built = true;
        }

        let cache_entries_purged = self.cache.on_version_switch(version).await;

        tracing::info!(
            gazetteer_version = version,
            units = units_processed,
            indexes_built,
            cache_entries_purged,
            "Gazetteer seeded"
        );

        Ok(SeedOutcome {
            units_processed,
            indexes_built,
            cache_entries_purged,
        })
    }

    /// Rebuild index settings, folding approved learned aliases into the
    /// synonym table. Returns the number of learned synonyms applied.
    pub async fn rebuild_synonyms(&self) -> Result<usize> {
        let mut settings = IndexSettings::default();
        let learned = learned_aliases::approved(&self.pool).await?;
        let count = learned.len();
        for alias in learned {
            settings.synonyms.insert(alias.alias, alias.canonical);
        }
        self.index.apply_settings(settings).await;
        tracing::info!(learned = count, "Index settings rebuilt");
        Ok(count)
    }
}

/// Distinctive normalized name for a unit: the folded display name minus its
/// administrative-type prefix, so "Quận Long Biên" indexes and scores as
/// "long bien". The full folded display name stays searchable separately.
fn normalized_unit_name(name: &str) -> String {
    let folded = normalize_name(name);
    let tokens: Vec<&str> = folded.split_whitespace().collect();
    let skip = match tokens.as_slice() {
        ["thanh", "pho", ..] | ["thi", "xa", ..] | ["thi", "tran", ..] => 2,
        ["quan", ..] | ["huyen", ..] | ["phuong", ..] | ["xa", ..] | ["tinh", ..] => 1,
        _ => 0,
    };
    if tokens.len() > skip {
        tokens[skip..].join(" ")
    } else {
        folded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures;
    use vnap_common::db;

    async fn service() -> SeedService {
        let pool = db::init_memory_pool().await.unwrap();
        let index = Arc::new(GazetteerIndex::new());
        let cache = HybridCache::new(16, None);
        SeedService::new(pool, index, cache)
    }

    #[tokio::test]
    async fn valid_payload_passes_dry_run() {
        let report = SeedService::validate(&test_fixtures::seed_units());
        assert!(report.passed, "{:?}", report.warnings);
        assert_eq!(report.units_validated, test_fixtures::seed_units().len());
    }

    #[tokio::test]
    async fn duplicate_ids_are_reported() {
        let mut units = test_fixtures::seed_units();
        let dup = units[1].clone();
        units.push(dup);
        let report = SeedService::validate(&units);
        assert!(!report.passed);
        assert!(report.warnings.iter().any(|w| w.contains("duplicate admin_id")));
    }

    #[tokio::test]
    async fn orphan_parent_is_reported() {
        let mut units = test_fixtures::seed_units();
        units.retain(|u| u.admin_id != "01");
        let report = SeedService::validate(&units);
        assert!(!report.passed);
        assert!(report.warnings.iter().any(|w| w.contains("not in payload")));
    }

    #[tokio::test]
    async fn live_seed_loads_index_and_db() {
        let svc = service().await;
        let outcome = svc
            .seed("2024-10", test_fixtures::seed_units(), true)
            .await
            .unwrap();

        assert_eq!(outcome.units_processed, test_fixtures::seed_units().len() as u64);
        assert!(outcome.indexes_built);
        assert!(svc.index.health().await);
        assert_eq!(svc.index.version().await, "2024-10");
        assert_eq!(
            admin_units::current_version(&svc.pool).await.unwrap(),
            Some("2024-10".to_string())
        );
    }

    #[tokio::test]
    async fn live_seed_rejects_invalid_payload() {
        let svc = service().await;
        let mut units = test_fixtures::seed_units();
        units[0].admin_id = String::new();
        assert!(svc.seed("v1", units, false).await.is_err());
        // State untouched
        assert!(!svc.index.health().await);
    }

    #[tokio::test]
    async fn reseeding_same_data_is_idempotent() {
        let svc = service().await;
        svc.seed("v1", test_fixtures::seed_units(), false).await.unwrap();
        let first = admin_units::load_all(&svc.pool).await.unwrap();
        svc.seed("v1", test_fixtures::seed_units(), false).await.unwrap();
        let second = admin_units::load_all(&svc.pool).await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn normalized_unit_name_strips_type_prefix() {
        assert_eq!(normalized_unit_name("Quận Long Biên"), "long bien");
        assert_eq!(normalized_unit_name("Thành phố Hồ Chí Minh"), "ho chi minh");
        assert_eq!(normalized_unit_name("Tỉnh Quảng Ninh"), "quang ninh");
        assert_eq!(normalized_unit_name("Phường Bồ Đề"), "bo de");
        assert_eq!(normalized_unit_name("Thị xã Sơn Tây"), "son tay");
        // A name that IS a bare keyword is left intact
        assert_eq!(normalized_unit_name("Phường"), "phuong");
    }

    #[tokio::test]
    async fn filled_normalized_names_use_distinctive_form() {
        let svc = service().await;
        let mut units = test_fixtures::seed_units();
        for unit in &mut units {
            unit.normalized_name = String::new();
        }
        svc.seed("v1", units, false).await.unwrap();

        let loaded = admin_units::load_all(&svc.pool).await.unwrap();
        let long_bien = loaded.iter().find(|u| u.admin_id == "01-004").unwrap();
        assert_eq!(long_bien.normalized_name, "long bien");
    }

    #[tokio::test]
    async fn learned_aliases_feed_synonyms() {
        let svc = service().await;
        svc.seed("v1", test_fixtures::seed_units(), false).await.unwrap();

        learned_aliases::upsert(
            &svc.pool,
            &learned_aliases::LearnedAlias {
                alias: "thu do".into(),
                canonical: "ha noi".into(),
                admin_id: Some("01".into()),
                level: Some(2),
                approved: true,
            },
        )
        .await
        .unwrap();

        let applied = svc.rebuild_synonyms().await.unwrap();
        assert_eq!(applied, 1);

        let hits = svc
            .index
            .search("thu do", &crate::gazetteer::SearchFilter::default(), 5)
            .await;
        assert_eq!(hits[0].unit.admin_id, "01");
    }
}
