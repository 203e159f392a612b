//! Batch job endpoints
//!
//! **[APA-API-030]** Submission returns 202 with a job id; progress is
//! polled; results stream as a JSON array or length-delimited JSON (NDJSON),
//! optionally gzip-encoded with a flush per record.

use std::convert::Infallible;
use std::io::Write;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vnap_common::models::AddressResult;

use crate::error::{ApiError, ApiResult};
use crate::services::{JobState, ParseOptions};
use crate::AppState;

/// POST /v1/addresses/jobs request
#[derive(Debug, Deserialize)]
pub struct BatchParseRequest {
    pub addresses: Vec<String>,
    #[serde(default)]
    pub options: ParseOptions,
}

/// POST /v1/addresses/jobs response (202)
#[derive(Debug, Serialize)]
pub struct BatchParseResponse {
    pub job_id: Uuid,
    pub estimated_seconds: u64,
    pub total_addresses: usize,
}

/// GET /v1/addresses/jobs/:id/status response
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobState,
    pub progress: f64,
    pub processed: usize,
    pub total: usize,
    pub estimated_remaining: Option<u64>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub gzip: Option<String>,
}

/// **[APA-API-030]** POST /v1/addresses/jobs
///
/// Accepts up to the configured batch cap; the job runs in the background.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<BatchParseRequest>,
) -> ApiResult<(StatusCode, Json<BatchParseResponse>)> {
    if request.addresses.is_empty() {
        return Err(ApiError::BadRequest("addresses must not be empty".into()));
    }
    if request.addresses.len() > state.jobs.max_addresses() {
        return Err(ApiError::TooManyAddresses(format!(
            "batch size {} exceeds the limit of {}",
            request.addresses.len(),
            state.jobs.max_addresses()
        )));
    }

    let total_addresses = request.addresses.len();
    let (job_id, estimated_seconds) = state
        .jobs
        .submit(request.addresses, request.options)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchParseResponse {
            job_id,
            estimated_seconds,
            total_addresses,
        }),
    ))
}

/// GET /v1/addresses/jobs/:id/status
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<JobStatusResponse>> {
    let status = state
        .jobs
        .status(job_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("job {}", job_id)))?;

    Ok(Json(JobStatusResponse {
        job_id,
        status: status.status,
        progress: status.progress,
        processed: status.processed,
        total: status.total,
        estimated_remaining: status.estimated_remaining_seconds,
        message: status.message,
    }))
}

/// GET /v1/addresses/jobs/:id/results?format=json|ndjson&gzip=0|1
///
/// NDJSON lines are ordered by input index, one object per line, each line
/// newline-terminated, no surrounding brackets. With gzip the stream is
/// flushed per record.
pub async fn job_results(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Query(query): Query<ResultsQuery>,
) -> ApiResult<Response> {
    if state.jobs.status(job_id).await.is_none() {
        return Err(ApiError::NotFound(format!("job {}", job_id)));
    }
    let results = state
        .jobs
        .results(job_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("job {} results not ready", job_id)))?;

    let gzip = query.gzip.as_deref() == Some("1");
    let format = query.format.as_deref().unwrap_or("json");

    match format {
        "ndjson" => Ok(ndjson_response(results, gzip)?),
        "json" => {
            let body = serde_json::to_vec(results.as_ref())
                .map_err(|e| ApiError::Internal(e.to_string()))?;
            let mut builder = Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/json");
            let body = if gzip {
                builder = builder.header(header::CONTENT_ENCODING, "gzip");
                gzip_all(&body)?
            } else {
                body
            };
            builder
                .body(Body::from(body))
                .map_err(|e| ApiError::Internal(e.to_string()))
        }
        other => Err(ApiError::BadRequest(format!("unknown format: {}", other))),
    }
}

/// Stream results as NDJSON, optionally gzip-encoded with per-record flush.
fn ndjson_response(results: Arc<Vec<AddressResult>>, gzip: bool) -> ApiResult<Response> {
    let stream = async_stream::stream! {
        let mut encoder = gzip.then(|| GzEncoder::new(Vec::new(), Compression::default()));

        for result in results.iter() {
            let mut line = match serde_json::to_vec(result) {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!(error = %e, "NDJSON encode failed, skipping record");
                    continue;
                }
            };
            line.push(b'\n');

            match encoder.as_mut() {
                Some(enc) => {
                    // Flush per record so consumers see progress
                    if enc.write_all(&line).and_then(|_| enc.flush()).is_err() {
                        break;
                    }
                    let chunk = std::mem::take(enc.get_mut());
                    if !chunk.is_empty() {
                        yield Ok::<Bytes, Infallible>(Bytes::from(chunk));
                    }
                }
                None => yield Ok::<Bytes, Infallible>(Bytes::from(line)),
            }
        }

        if let Some(enc) = encoder {
            if let Ok(tail) = enc.finish() {
                if !tail.is_empty() {
                    yield Ok::<Bytes, Infallible>(Bytes::from(tail));
                }
            }
        }
    };

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson");
    if gzip {
        builder = builder.header(header::CONTENT_ENCODING, "gzip");
    }
    builder
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

fn gzip_all(data: &[u8]) -> Result<Vec<u8>, ApiError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Build batch job routes
pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/addresses/jobs", post(submit_job))
        .route("/v1/addresses/jobs/:job_id/status", get(job_status))
        .route("/v1/addresses/jobs/:job_id/results", get(job_results))
}
