//! Single-address parse endpoint

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use vnap_common::models::AddressResult;

use crate::error::{ApiError, ApiResult};
use crate::services::ParseOptions;
use crate::AppState;

/// POST /v1/addresses/parse request
#[derive(Debug, Deserialize)]
pub struct ParseAddressRequest {
    pub address: String,
    #[serde(default)]
    pub options: ParseOptions,
}

/// POST /v1/addresses/parse response
#[derive(Debug, Serialize)]
pub struct ParseAddressResponse {
    pub level_config_used: u8,
    pub gazetteer_version: String,
    pub results: Vec<AddressResult>,
    pub processing_time_ms: u64,
    pub cache_hit: bool,
}

/// **[APA-API-020]** POST /v1/addresses/parse
///
/// Parse one address. 400 on empty input; partial outcomes (needs_review,
/// unmatched) are 200s with the status in the body.
pub async fn parse_address(
    State(state): State<AppState>,
    Json(request): Json<ParseAddressRequest>,
) -> ApiResult<Json<ParseAddressResponse>> {
    if request.address.trim().is_empty() {
        return Err(ApiError::BadRequest("address must not be empty".into()));
    }

    let started = std::time::Instant::now();
    let levels = request
        .options
        .levels
        .unwrap_or(state.config.parser.level_config);

    let outcome = state.parse.parse(&request.address, &request.options).await?;
    let gazetteer_version = state.parse.gazetteer_version().await;

    tracing::debug!(
        address = %request.address,
        cache_hit = outcome.cache_hit,
        status = outcome.result.status.as_str(),
        "Parse request served"
    );

    Ok(Json(ParseAddressResponse {
        level_config_used: levels,
        gazetteer_version,
        results: vec![outcome.result],
        processing_time_ms: started.elapsed().as_millis() as u64,
        cache_hit: outcome.cache_hit,
    }))
}

/// Build parse routes
pub fn parse_routes() -> Router<AppState> {
    Router::new().route("/v1/addresses/parse", post(parse_address))
}
