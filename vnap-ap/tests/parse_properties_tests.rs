//! Pipeline property tests: determinism, idempotence, round-trips

use std::sync::Arc;

use vnap_ap::cache::HybridCache;
use vnap_ap::gazetteer::GazetteerIndex;
use vnap_ap::matcher::AddressMatcher;
use vnap_ap::normalizer::TextNormalizer;
use vnap_ap::services::{ParseOptions, ParseService};
use vnap_ap::test_fixtures;
use vnap_common::config::ParserConfig;
use vnap_common::models::ParseStatus;

async fn service() -> Arc<ParseService> {
    let index = Arc::new(GazetteerIndex::new());
    index.bulk_load(test_fixtures::seed_units(), "prop-v1").await;
    let config = ParserConfig::default();
    let cache = HybridCache::new(64, None);
    let matcher = AddressMatcher::new(index.clone(), config.clone(), None);
    Arc::new(ParseService::new(matcher, cache, index, config))
}

const INPUTS: &[&str] = &[
    "SO 199 HOANG NHU TIEP, PHUONG BO DE, QUAN LONG BIEN, THANH PHO HA NOI",
    "Ward 5 District 5 Ho Chi Minh City",
    "72 TRAN THU DO, HAI HOA, TP MONG CAI, QU ANG NINH   , QUẢNG NINH",
    "CT1234 0912345678",
    "p.5 q.8 tphcm",
    "phuong minh khai quan bac tu liem hn",
];

#[tokio::test]
async fn parse_is_byte_identical_across_runs() {
    let svc = service().await;
    let opts = ParseOptions {
        use_cache: Some(false),
        ..Default::default()
    };

    for input in INPUTS {
        let a = svc.parse(input, &opts).await.unwrap().result;
        let b = svc.parse(input, &opts).await.unwrap().result;
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap(),
            "non-deterministic result for {:?}",
            input
        );
    }
}

#[tokio::test]
async fn every_result_respects_universal_invariants() {
    let svc = service().await;
    let opts = ParseOptions::default();
    let fingerprint_re = regex::Regex::new(r"^sha256:[0-9a-f]{64}$").unwrap();

    for input in INPUTS {
        let result = svc.parse(input, &opts).await.unwrap().result;

        assert!(
            !result.normalized_no_diacritics.is_empty(),
            "empty normalized for {:?}",
            input
        );
        assert!(fingerprint_re.is_match(&result.fingerprint), "{}", result.fingerprint);
        assert!((0.0..=1.0).contains(&result.confidence));

        // Status consistent with confidence and default thresholds
        match result.status {
            ParseStatus::Matched => assert!(result.confidence >= 0.90),
            ParseStatus::NeedsReview => {
                assert!(result.confidence >= 0.60 && result.confidence < 0.90)
            }
            ParseStatus::Unmatched => {
                assert!(result.confidence < 0.60 || result.candidates.is_empty())
            }
        }

        // Every returned candidate path is hierarchy-consistent: each unit's
        // parent is the next unit in the list
        for candidate in &result.candidates {
            let units = &candidate.admin_units;
            for pair in units.windows(2) {
                assert_eq!(
                    pair[0].parent_id.as_deref(),
                    Some(pair[1].admin_id.as_str()),
                    "broken hierarchy in candidate for {:?}",
                    input
                );
            }
        }
    }
}

#[tokio::test]
async fn normalizing_normalized_text_is_identity() {
    let normalizer = TextNormalizer::new();
    for input in INPUTS {
        let once = normalizer.normalize(input, "v");
        let twice = normalizer.normalize(&once.normalized, "v");
        assert_eq!(once.normalized, twice.normalized, "not idempotent: {:?}", input);
    }
}

#[tokio::test]
async fn reparsing_canonical_text_preserves_admin_path() {
    let svc = service().await;
    let opts = ParseOptions {
        use_cache: Some(false),
        ..Default::default()
    };

    let first = svc
        .parse(
            "SO 199 HOANG NHU TIEP, PHUONG BO DE, QUAN LONG BIEN, THANH PHO HA NOI",
            &opts,
        )
        .await
        .unwrap()
        .result;
    assert_eq!(first.status, ParseStatus::Matched);

    let second = svc.parse(&first.canonical_text, &opts).await.unwrap().result;
    assert_eq!(first.admin_path, second.admin_path);
}

#[tokio::test]
async fn ambiguous_ward_input_yields_multiple_candidates() {
    let svc = service().await;
    let result = svc
        .parse("phuong 5 thanh pho ho chi minh", &ParseOptions::default())
        .await
        .unwrap()
        .result;

    assert!(result.candidates.len() >= 2);
    let wards: Vec<&str> = result
        .candidates
        .iter()
        .filter_map(|c| c.admin_units.first())
        .map(|u| u.normalized_name.as_str())
        .collect();
    assert!(wards.iter().filter(|w| **w == "5").count() >= 2);
}
