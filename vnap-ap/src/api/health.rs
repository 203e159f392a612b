//! Health, readiness and liveness probes

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub gazetteer_version: String,
    pub gazetteer_units: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let index_ok = state.index.health().await;

    Json(HealthResponse {
        status: if index_ok { "ok" } else { "degraded" }.to_string(),
        module: "vnap-ap".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        gazetteer_version: state.index.version().await,
        gazetteer_units: state.index.unit_count().await,
    })
}

/// GET /ready — 200 only when the gazetteer snapshot is resident and the
/// database answers.
pub async fn ready(State(state): State<AppState>) -> StatusCode {
    if !state.index.health().await {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness probe: database unreachable");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// GET /live — process liveness only.
pub async fn live() -> StatusCode {
    StatusCode::OK
}

/// Build health routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready))
        .route("/live", get(live))
}
