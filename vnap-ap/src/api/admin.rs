//! Admin endpoints: seeding, cache invalidation, index rebuild, statistics

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use vnap_common::db::{address_cache, admin_units, learned_aliases};
use vnap_common::models::AdminUnit;

use crate::cache::CacheStats;
use crate::error::{ApiError, ApiResult};
use crate::services::SeedService;
use crate::AppState;

/// POST /v1/admin/seed request
#[derive(Debug, Deserialize)]
pub struct SeedRequest {
    pub gazetteer_version: String,
    pub data: Vec<AdminUnit>,
    #[serde(default)]
    pub rebuild_indexes: bool,
}

#[derive(Debug, Deserialize)]
pub struct SeedQuery {
    #[serde(default)]
    pub dry_run: Option<String>,
}

/// POST /v1/admin/seed response
#[derive(Debug, Serialize)]
pub struct SeedResponse {
    pub validation_passed: bool,
    pub warnings: Vec<String>,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units_processed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexes_built: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_build_time: Option<String>,
    pub processing_time_ms: u64,
}

/// **[APA-SEED-010]** POST /v1/admin/seed?dry_run=true|false
///
/// Dry run validates and reports without state change; a live run performs
/// the atomic replacement and invalidates stale cache entries.
pub async fn seed_gazetteer(
    State(state): State<AppState>,
    Query(query): Query<SeedQuery>,
    Json(request): Json<SeedRequest>,
) -> ApiResult<Json<SeedResponse>> {
    let started = std::time::Instant::now();
    let dry_run = query.dry_run.as_deref() == Some("true");

    if dry_run {
        let report = SeedService::validate(&request.data);
        return Ok(Json(SeedResponse {
            validation_passed: report.passed,
            warnings: report.warnings,
            dry_run: true,
            units_processed: None,
            indexes_built: None,
            estimated_build_time: Some(report.estimated_build_time),
            processing_time_ms: started.elapsed().as_millis() as u64,
        }));
    }

    let outcome = state
        .seed
        .seed(&request.gazetteer_version, request.data, request.rebuild_indexes)
        .await?;

    Ok(Json(SeedResponse {
        validation_passed: true,
        warnings: Vec::new(),
        dry_run: false,
        units_processed: Some(outcome.units_processed),
        indexes_built: Some(outcome.indexes_built),
        estimated_build_time: None,
        processing_time_ms: started.elapsed().as_millis() as u64,
    }))
}

#[derive(Debug, Deserialize)]
pub struct InvalidateQuery {
    pub gazetteer_version: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub gazetteer_version: String,
    pub entries_purged: u64,
}

/// POST /v1/admin/cache/invalidate?gazetteer_version=...
pub async fn invalidate_cache(
    State(state): State<AppState>,
    Query(query): Query<InvalidateQuery>,
) -> ApiResult<Json<InvalidateResponse>> {
    let version = query
        .gazetteer_version
        .ok_or_else(|| ApiError::BadRequest("gazetteer_version required".into()))?;

    let entries_purged = state.cache.invalidate_version(&version).await;
    tracing::info!(gazetteer_version = %version, entries_purged, "Cache invalidated");

    Ok(Json(InvalidateResponse {
        gazetteer_version: version,
        entries_purged,
    }))
}

#[derive(Debug, Serialize)]
pub struct BuildIndexesResponse {
    pub learned_synonyms_applied: usize,
    pub processing_time_ms: u64,
}

/// POST /v1/admin/indexes/build — rebuild search settings and synonyms.
pub async fn build_indexes(
    State(state): State<AppState>,
) -> ApiResult<Json<BuildIndexesResponse>> {
    let started = std::time::Instant::now();
    let learned_synonyms_applied = state.seed.rebuild_synonyms().await?;
    Ok(Json(BuildIndexesResponse {
        learned_synonyms_applied,
        processing_time_ms: started.elapsed().as_millis() as u64,
    }))
}

/// GET /v1/admin/stats response
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub gazetteer_version: String,
    pub total_parsed: u64,
    pub avg_latency_ms: f64,
    pub review_queue_size: i64,
    pub cache: CacheStats,
    pub uptime_seconds: u64,
    pub active_jobs: usize,
    pub database: DatabaseStats,
}

#[derive(Debug, Serialize)]
pub struct DatabaseStats {
    pub admin_units: i64,
    pub address_cache: i64,
    pub learned_aliases: i64,
}

/// GET /v1/admin/stats
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<StatsResponse>> {
    let thresholds = &state.config.thresholds;

    let admin_units = admin_units::count(&state.db).await.map_err(ApiError::Common)?;
    let cached = address_cache::count(&state.db).await.map_err(ApiError::Common)?;
    let aliases = learned_aliases::count(&state.db).await.map_err(ApiError::Common)?;
    let review_queue_size =
        address_cache::review_count(&state.db, thresholds.review_low, thresholds.high)
            .await
            .map_err(ApiError::Common)?;

    let uptime = chrono::Utc::now().signed_duration_since(state.startup_time);

    Ok(Json(StatsResponse {
        gazetteer_version: state.index.version().await,
        total_parsed: state.parse.total_parsed(),
        avg_latency_ms: state.parse.avg_latency_ms(),
        review_queue_size,
        cache: state.cache.stats(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        active_jobs: state.jobs.job_count().await,
        database: DatabaseStats {
            admin_units,
            address_cache: cached,
            learned_aliases: aliases,
        },
    }))
}

/// Build admin routes
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/seed", post(seed_gazetteer))
        .route("/v1/admin/cache/invalidate", post(invalidate_cache))
        .route("/v1/admin/indexes/build", post(build_indexes))
        .route("/v1/admin/stats", get(stats))
}
