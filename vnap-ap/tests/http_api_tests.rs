//! HTTP API integration tests
//!
//! Router-level tests over an in-memory database and a seeded gazetteer
//! snapshot, exercising the full parse / jobs / admin / probe surface.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use vnap_ap::{build_router, test_fixtures, AppState};
use vnap_common::config::ParserConfig;

/// Test app state with in-memory database and seeded gazetteer.
async fn test_state() -> AppState {
    let pool = vnap_common::db::init_memory_pool().await.unwrap();
    let state = AppState::new(pool, ParserConfig::default());
    state
        .seed
        .seed("test-v1", test_fixtures::seed_units(), true)
        .await
        .unwrap();
    state
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn parse_empty_address_is_400() {
    let app = build_router(test_state().await);
    let response = app
        .oneshot(post_json("/v1/addresses/parse", json!({"address": ""})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn parse_known_address_matches() {
    let app = build_router(test_state().await);
    let response = app
        .oneshot(post_json(
            "/v1/addresses/parse",
            json!({
                "address": "SO 199 HOANG NHU TIEP, PHUONG BO DE, QUAN LONG BIEN, THANH PHO HA NOI"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["gazetteer_version"], "test-v1");
    assert_eq!(body["cache_hit"], false);
    let result = &body["results"][0];
    assert_eq!(result["status"], "matched");
    // score = 0.35 + 0.25 + 0.15 + 0.10 = 0.85;
    // confidence = 0.60·0.85 + 0.25·1.0 + 0.15·1 = 0.91
    let confidence = result["confidence"].as_f64().unwrap();
    assert!((confidence - 0.91).abs() < 1e-6, "confidence {}", confidence);
    let score = result["quality"]["score"].as_f64().unwrap();
    assert!((score - 0.85).abs() < 1e-6, "score {}", score);
    assert_eq!(result["components"]["house"]["number"], "199");
    assert!(result["fingerprint"]
        .as_str()
        .unwrap()
        .starts_with("sha256:"));
    let path: Vec<&str> = result["admin_path"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(
        &path[path.len() - 2..],
        &["Quận Long Biên", "Thành phố Hà Nội"]
    );
}

#[tokio::test]
async fn second_parse_reports_cache_hit() {
    let state = test_state().await;
    let body = json!({"address": "phuong bo de quan long bien thanh pho ha noi"});

    let first = build_router(state.clone())
        .oneshot(post_json("/v1/addresses/parse", body.clone()))
        .await
        .unwrap();
    let first = body_json(first).await;
    assert_eq!(first["cache_hit"], false);

    let second = build_router(state)
        .oneshot(post_json("/v1/addresses/parse", body))
        .await
        .unwrap();
    let second = body_json(second).await;
    assert_eq!(second["cache_hit"], true);
    assert_eq!(
        first["results"][0]["fingerprint"],
        second["results"][0]["fingerprint"]
    );
    assert_eq!(
        first["results"][0]["confidence"],
        second["results"][0]["confidence"]
    );
}

#[tokio::test]
async fn multilingual_scenario_resolves() {
    let app = build_router(test_state().await);
    let response = app
        .oneshot(post_json(
            "/v1/addresses/parse",
            json!({"address": "Ward 5 District 5 Ho Chi Minh City"}),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    let result = &body["results"][0];
    assert_eq!(
        result["normalized_no_diacritics"],
        "phuong 5 quan 5 thanh pho ho chi minh"
    );
    // No house or street fragment: completeness 3/4 routes this to review
    // at confidence 0.60·0.85 + 0.25·0.75 + 0.15·1 = 0.8475
    assert_eq!(result["status"], "needs_review");
    let confidence = result["confidence"].as_f64().unwrap();
    assert!((confidence - 0.8475).abs() < 1e-6, "confidence {}", confidence);
}

#[tokio::test]
async fn oversized_batch_is_rejected() {
    let mut config = ParserConfig::default();
    config.jobs.max_addresses = 2;
    let pool = vnap_common::db::init_memory_pool().await.unwrap();
    let state = AppState::new(pool, config);
    let app = build_router(state);

    let response = app
        .oneshot(post_json(
            "/v1/addresses/jobs",
            json!({"addresses": ["a", "b", "c"]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "TOO_MANY_ADDRESSES");
}

async fn wait_for_done(state: &AppState, job_id: &str) {
    for _ in 0..200 {
        let response = build_router(state.clone())
            .oneshot(get(&format!("/v1/addresses/jobs/{}/status", job_id)))
            .await
            .unwrap();
        let body = body_json(response).await;
        if body["status"] == "done" {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("job never finished");
}

#[tokio::test]
async fn batch_job_lifecycle_with_ndjson_results() {
    let state = test_state().await;
    let addresses = vec![
        "phuong bo de quan long bien thanh pho ha noi",
        "CT1234 0912345678",
        "Ward 5 District 5 Ho Chi Minh City",
    ];

    let response = build_router(state.clone())
        .oneshot(post_json(
            "/v1/addresses/jobs",
            json!({"addresses": addresses}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let accepted = body_json(response).await;
    let job_id = accepted["job_id"].as_str().unwrap().to_string();
    assert_eq!(accepted["total_addresses"], 3);
    assert!(accepted["estimated_seconds"].as_u64().unwrap() >= 1);

    wait_for_done(&state, &job_id).await;

    // NDJSON: one object per line, input order, no array brackets
    let response = build_router(state.clone())
        .oneshot(get(&format!(
            "/v1/addresses/jobs/{}/results?format=ndjson",
            job_id
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/x-ndjson"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.ends_with('\n'));
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    for (line, raw) in lines.iter().zip(addresses.iter()) {
        let value: Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["raw"], *raw);
    }
    let noise: Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(noise["status"], "unmatched");

    // JSON array format
    let response = build_router(state.clone())
        .oneshot(get(&format!("/v1/addresses/jobs/{}/results", job_id)))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn gzip_results_decode_to_same_ndjson() {
    use std::io::Read;

    let state = test_state().await;
    let response = build_router(state.clone())
        .oneshot(post_json(
            "/v1/addresses/jobs",
            json!({"addresses": ["phuong bo de quan long bien ha noi"]}),
        ))
        .await
        .unwrap();
    let accepted = body_json(response).await;
    let job_id = accepted["job_id"].as_str().unwrap().to_string();
    wait_for_done(&state, &job_id).await;

    let response = build_router(state.clone())
        .oneshot(get(&format!(
            "/v1/addresses/jobs/{}/results?format=ndjson&gzip=1",
            job_id
        )))
        .await
        .unwrap();
    assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let mut decoder = flate2::read::GzDecoder::new(bytes.as_ref());
    let mut text = String::new();
    decoder.read_to_string(&mut text).unwrap();
    let value: Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
    assert_eq!(value["raw"], "phuong bo de quan long bien ha noi");
}

#[tokio::test]
async fn unknown_job_is_404() {
    let app = build_router(test_state().await);
    let response = app
        .oneshot(get(
            "/v1/addresses/jobs/00000000-0000-0000-0000-000000000000/status",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn seed_dry_run_reports_without_state_change() {
    let pool = vnap_common::db::init_memory_pool().await.unwrap();
    let state = AppState::new(pool, ParserConfig::default());

    let mut units = test_fixtures::seed_units();
    units[0].admin_id = String::new(); // provoke a warning

    let response = build_router(state.clone())
        .oneshot(post_json(
            "/v1/admin/seed?dry_run=true",
            json!({"gazetteer_version": "v9", "data": units, "rebuild_indexes": true}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["dry_run"], true);
    assert_eq!(body["validation_passed"], false);
    assert!(!body["warnings"].as_array().unwrap().is_empty());

    // Nothing was loaded
    let ready = build_router(state).oneshot(get("/ready")).await.unwrap();
    assert_eq!(ready.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn live_seed_then_version_invalidation() {
    let pool = vnap_common::db::init_memory_pool().await.unwrap();
    let state = AppState::new(pool, ParserConfig::default());

    let response = build_router(state.clone())
        .oneshot(post_json(
            "/v1/admin/seed",
            json!({
                "gazetteer_version": "v1",
                "data": test_fixtures::seed_units(),
                "rebuild_indexes": true
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["validation_passed"], true);
    assert!(body["units_processed"].as_u64().unwrap() > 0);

    // Parse once to populate the cache under v1, and let the
    // fire-and-forget durable write land before invalidating
    build_router(state.clone())
        .oneshot(post_json(
            "/v1/addresses/parse",
            json!({"address": "phuong bo de quan long bien ha noi"}),
        ))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let response = build_router(state.clone())
        .oneshot(post_json(
            "/v1/admin/cache/invalidate?gazetteer_version=v1",
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // After invalidation the same parse is a cache miss again
    let reparse = build_router(state)
        .oneshot(post_json(
            "/v1/addresses/parse",
            json!({"address": "phuong bo de quan long bien ha noi"}),
        ))
        .await
        .unwrap();
    let reparse = body_json(reparse).await;
    assert_eq!(reparse["cache_hit"], false);
}

#[tokio::test]
async fn stats_and_probes() {
    let state = test_state().await;

    build_router(state.clone())
        .oneshot(post_json(
            "/v1/addresses/parse",
            json!({"address": "phuong bo de quan long bien ha noi"}),
        ))
        .await
        .unwrap();

    let response = build_router(state.clone())
        .oneshot(get("/v1/admin/stats"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["gazetteer_version"], "test-v1");
    assert!(body["total_parsed"].as_u64().unwrap() >= 1);
    assert!(body["database"]["admin_units"].as_i64().unwrap() > 0);

    let health = build_router(state.clone()).oneshot(get("/health")).await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    let health = body_json(health).await;
    assert_eq!(health["module"], "vnap-ap");
    assert_eq!(health["status"], "ok");

    let ready = build_router(state.clone()).oneshot(get("/ready")).await.unwrap();
    assert_eq!(ready.status(), StatusCode::OK);

    let live = build_router(state).oneshot(get("/live")).await.unwrap();
    assert_eq!(live.status(), StatusCode::OK);
}

#[tokio::test]
async fn index_rebuild_endpoint_applies_learned_aliases() {
    let state = test_state().await;

    vnap_common::db::learned_aliases::upsert(
        &state.db,
        &vnap_common::db::learned_aliases::LearnedAlias {
            alias: "thu do".into(),
            canonical: "ha noi".into(),
            admin_id: Some("01".into()),
            level: Some(2),
            approved: true,
        },
    )
    .await
    .unwrap();

    let response = build_router(state.clone())
        .oneshot(post_json("/v1/admin/indexes/build", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["learned_synonyms_applied"], 1);

    // The learned alias now retrieves the capital
    let parse = build_router(state)
        .oneshot(post_json(
            "/v1/addresses/parse",
            json!({"address": "thu do phuong bo de quan long bien"}),
        ))
        .await
        .unwrap();
    let parse = body_json(parse).await;
    let path = parse["results"][0]["admin_path"].as_array().unwrap();
    assert!(path.iter().any(|v| v == "Thành phố Hà Nội"));
}
