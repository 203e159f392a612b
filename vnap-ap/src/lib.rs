//! vnap-ap - Address Parser microservice
//!
//! **Module Identity:**
//! - Name: vnap-ap (Address Parser)
//! - Port: 5731
//!
//! **[APA-OV-010]** Resolves free-form Vietnamese postal addresses into the
//! canonical four-level administrative hierarchy plus non-administrative
//! components, at bulk-ingestion scale: normalization → gazetteer retrieval →
//! scoring → result assembly, fronted by a two-tier cache.

pub mod api;
pub mod cache;
pub mod error;
pub mod gazetteer;
pub mod matcher;
pub mod normalizer;
pub mod services;
pub mod test_fixtures;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use vnap_common::config::ParserConfig;

use crate::cache::{DurableCache, HybridCache};
use crate::gazetteer::GazetteerIndex;
use crate::matcher::AddressMatcher;
use crate::services::{ExternalParserClient, JobRunner, ParseService, SeedService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool **[APA-DB-010]**
    pub db: SqlitePool,
    /// Gazetteer snapshot index **[APA-IDX-010]**
    pub index: Arc<GazetteerIndex>,
    /// Two-tier request cache **[APA-CSH-010]**
    pub cache: Arc<HybridCache>,
    /// Parse orchestration **[APA-SVC-010]**
    pub parse: Arc<ParseService>,
    /// Batch job runner **[APA-JOB-010]**
    pub jobs: Arc<JobRunner>,
    /// Seeding / admin operations **[APA-SEED-010]**
    pub seed: Arc<SeedService>,
    pub config: ParserConfig,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire the full service graph over a database pool and configuration.
    pub fn new(db: SqlitePool, config: ParserConfig) -> Self {
        let index = Arc::new(GazetteerIndex::new());
        let cache = HybridCache::new(
            config.cache.l1_size,
            Some(DurableCache::new(db.clone())),
        );

        let external = config
            .external_parser_url
            .as_deref()
            .and_then(|url| match ExternalParserClient::new(url) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    tracing::warn!(error = %e, "External parser client unavailable");
                    None
                }
            });

        let matcher = AddressMatcher::new(index.clone(), config.clone(), external);
        let parse = Arc::new(ParseService::new(
            matcher,
            cache.clone(),
            index.clone(),
            config.clone(),
        ));
        let jobs = JobRunner::new(parse.clone(), config.jobs.workers, config.jobs.max_addresses);
        let seed = Arc::new(SeedService::new(db.clone(), index.clone(), cache.clone()));

        Self {
            db,
            index,
            cache,
            parse,
            jobs,
            seed,
            config,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
///
/// **[APA-API-010]** Stable surface under /v1:
/// - POST /v1/addresses/parse - Parse a single address
/// - POST /v1/addresses/jobs - Submit a batch job
/// - GET  /v1/addresses/jobs/:id/status - Poll job progress
/// - GET  /v1/addresses/jobs/:id/results - Fetch results (json | ndjson, gzip)
/// - POST /v1/admin/seed - Seed the gazetteer (dry_run supported)
/// - POST /v1/admin/cache/invalidate - Purge cache by version
/// - POST /v1/admin/indexes/build - Rebuild search settings and synonyms
/// - GET  /v1/admin/stats - Operational statistics
/// - GET  /health, /ready, /live - Probes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::parse_routes())
        .merge(api::job_routes())
        .merge(api::admin_routes())
        .merge(api::health_routes())
        .with_state(state)
}
