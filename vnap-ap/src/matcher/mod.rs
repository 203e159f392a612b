//! Address matching: normalize → retrieve → score → assemble
//!
//! **[APA-MTC-010]** The matcher owns the per-request resolution path. It is
//! deadline-aware: candidate retrieval checks the request deadline between
//! levels and whatever is in hand when time runs out is still scored and
//! returned with reduced completeness rather than failed.

mod assembler;
mod candidates;
mod scorer;

pub use candidates::{CandidateBuilder, CandidatePath};
pub use scorer::{PathScorer, ScoreParts, ScoredPath};

use std::sync::Arc;
use tokio::time::Instant;

use vnap_common::config::ParserConfig;
use vnap_common::models::AddressResult;

use crate::gazetteer::GazetteerIndex;
use crate::normalizer::TextNormalizer;
use crate::services::external_parser::ExternalParserClient;

/// Per-request matching options, resolved from the API request and config.
#[derive(Debug, Clone)]
pub struct MatchOptions {
    /// 3 stops at districts, 4 resolves wards
    pub levels: u8,
    pub return_candidates: bool,
    pub top_k: usize,
}

/// The resolution pipeline behind the parse service.
pub struct AddressMatcher {
    normalizer: TextNormalizer,
    builder: CandidateBuilder,
    scorer: PathScorer,
    assembler: assembler::ResultAssembler,
    external: Option<Arc<ExternalParserClient>>,
    config: ParserConfig,
}

impl AddressMatcher {
    pub fn new(
        index: Arc<GazetteerIndex>,
        config: ParserConfig,
        external: Option<Arc<ExternalParserClient>>,
    ) -> Self {
        Self {
            normalizer: TextNormalizer::new(),
            builder: CandidateBuilder::new(index, &config),
            scorer: PathScorer::new(config.clone()),
            assembler: assembler::ResultAssembler::new(config.clone()),
            external,
            config,
        }
    }

    /// Resolve one raw address against the given gazetteer version.
    pub async fn resolve(
        &self,
        raw: &str,
        gazetteer_version: &str,
        opts: &MatchOptions,
        deadline: Instant,
    ) -> AddressResult {
        let norm = self.normalizer.normalize(raw, gazetteer_version);
        self.resolve_normalized(raw, &norm, opts, deadline).await
    }

    /// Resolve with normalization already done (the parse service normalizes
    /// once for its cache lookup and hands the result down).
    pub async fn resolve_normalized(
        &self,
        raw: &str,
        norm: &crate::normalizer::NormalizedAddress,
        opts: &MatchOptions,
        deadline: Instant,
    ) -> AddressResult {
        let start = std::time::Instant::now();

        let paths = self
            .builder
            .build(&norm.normalized, &norm.admin_tokens, opts.levels, deadline)
            .await;

        let mut scored: Vec<ScoredPath> = paths
            .iter()
            .map(|path| {
                let (score, parts) = self.scorer.score_path(&norm, path, 0.0, opts.levels);
                ScoredPath {
                    path: path.clone(),
                    score,
                    parts,
                }
            })
            .collect();

        // External parser pass: only when forced by config or the rule-based
        // best score is below the trigger, and only as one extra score term
        if let Some(external) = &self.external {
            let best = scored
                .iter()
                .map(|s| s.score)
                .fold(f64::NEG_INFINITY, f64::max);
            let triggered = self.config.parser.use_external_parser
                || (best.is_finite() && best < self.config.parser.external_trigger_below);
            if triggered && Instant::now() < deadline {
                if let Some(coverage) = external.coverage(&norm.normalized).await {
                    for sp in &mut scored {
                        let (score, parts) =
                            self.scorer
                                .score_path(&norm, &sp.path, coverage, opts.levels);
                        sp.score = score;
                        sp.parts = parts;
                    }
                }
            }
        }

        let ranked = self.scorer.rank(scored);
        let result = self.assembler.assemble(
            raw,
            &norm,
            &ranked,
            &self.scorer,
            opts.levels,
            opts.return_candidates,
            opts.top_k,
        );

        tracing::debug!(
            raw,
            confidence = result.confidence,
            status = result.status.as_str(),
            candidates = result.candidates.len(),
            took_ms = start.elapsed().as_millis() as u64,
            "Address matching done"
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures;
    use std::time::Duration;
    use vnap_common::models::{ParseStatus, QualityFlag};

    async fn matcher() -> AddressMatcher {
        let index = Arc::new(GazetteerIndex::new());
        index.bulk_load(test_fixtures::seed_units(), "test-v1").await;
        AddressMatcher::new(index, ParserConfig::default(), None)
    }

    fn opts() -> MatchOptions {
        MatchOptions {
            levels: 4,
            return_candidates: true,
            top_k: 20,
        }
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_millis(1500)
    }

    #[tokio::test]
    async fn full_address_matches_with_high_confidence() {
        let m = matcher().await;
        let result = m
            .resolve(
                "SO 199 HOANG NHU TIEP, PHUONG BO DE, QUAN LONG BIEN, THANH PHO HA NOI",
                "test-v1",
                &opts(),
                deadline(),
            )
            .await;

        assert_eq!(result.status, ParseStatus::Matched);
        // Perfect three-level match with a house number:
        // score = 0.35 + 0.25 + 0.15 + 0.10 = 0.85,
        // confidence = 0.60·0.85 + 0.25·1.0 + 0.15·1 = 0.91
        assert!(
            (result.quality.score - 0.85).abs() < 1e-6,
            "score {}",
            result.quality.score
        );
        assert!(
            (result.confidence - 0.91).abs() < 1e-6,
            "confidence {}",
            result.confidence
        );
        assert_eq!(
            result.admin_path,
            vec!["Phường Bồ Đề", "Quận Long Biên", "Thành phố Hà Nội"]
        );
        let house = result.components.house.as_ref().unwrap();
        assert_eq!(house.number.as_deref(), Some("199"));
        let street = result.components.street.as_ref().unwrap();
        assert_eq!(street.name, "hoang nhu tiep");
        assert!(result.canonical_text.ends_with("Việt Nam"));
        assert!(result.fingerprint.starts_with("sha256:"));
    }

    #[tokio::test]
    async fn diacritic_input_gets_exact_strategy() {
        let m = matcher().await;
        let result = m
            .resolve(
                "Số 5, Phường Bồ Đề, Quận Long Biên, Thành phố Hà Nội",
                "test-v1",
                &opts(),
                deadline(),
            )
            .await;
        assert_eq!(result.match_strategy.as_str(), "exact");
        assert!(result.quality.flags.contains(&QualityFlag::ExactMatch));
    }

    #[tokio::test]
    async fn multilingual_input_resolves() {
        let m = matcher().await;
        let result = m
            .resolve("Ward 5 District 5 Ho Chi Minh City", "test-v1", &opts(), deadline())
            .await;

        // Full admin path but no house or street fragment, so completeness
        // is 3/4 and the result routes to review:
        // confidence = 0.60·0.85 + 0.25·0.75 + 0.15·1 = 0.8475
        assert_eq!(result.status, ParseStatus::NeedsReview);
        assert!(
            (result.confidence - 0.8475).abs() < 1e-6,
            "confidence {}",
            result.confidence
        );
        assert_eq!(
            result.admin_path,
            vec!["Phường 5", "Quận 5", "Thành phố Hồ Chí Minh"]
        );
        assert!(result.quality.flags.contains(&QualityFlag::MultiLanguage));
    }

    #[tokio::test]
    async fn ambiguous_ward_is_flagged_with_candidates() {
        let m = matcher().await;
        // "phuong 5" exists in both Quận 5 and Quận 8
        let result = m
            .resolve("phuong 5 thanh pho ho chi minh", "test-v1", &opts(), deadline())
            .await;

        assert!(result.candidates.len() >= 2);
        assert!(result.quality.flags.contains(&QualityFlag::AmbiguousWard));
    }

    #[tokio::test]
    async fn noise_only_input_is_unmatched_with_residual() {
        let m = matcher().await;
        let result = m
            .resolve("CT1234 0912345678", "test-v1", &opts(), deadline())
            .await;

        assert_eq!(result.status, ParseStatus::Unmatched);
        assert!(result.residual.contains("CT1234"));
        assert!(result.residual.contains("0912345678"));
    }

    #[tokio::test]
    async fn corrupt_tail_still_finds_province_and_city() {
        let m = matcher().await;
        let result = m
            .resolve(
                "72 TRAN THU DO, HAI HOA, TP MONG CAI, QU ANG NINH   , QUẢNG NINH",
                "test-v1",
                &opts(),
                deadline(),
            )
            .await;

        assert_ne!(result.status, ParseStatus::Unmatched);
        assert!(result
            .admin_path
            .iter()
            .any(|n| n == "Tỉnh Quảng Ninh"));
        assert!(result.admin_path.iter().any(|n| n == "Thành phố Móng Cái"));
        let has_low_conf_flag = result.quality.flags.contains(&QualityFlag::LowConfidence);
        assert_eq!(has_low_conf_flag, result.confidence < 0.90);
    }

    #[tokio::test]
    async fn poi_and_phone_scenario() {
        let m = matcher().await;
        let result = m
            .resolve(
                "+84978615724 Daikin Service, đường CN3, Phường Minh Khai, Quận Bắc Từ Liêm, Thành phố Hà Nội",
                "test-v1",
                &opts(),
                deadline(),
            )
            .await;

        assert_eq!(result.status, ParseStatus::Matched);
        assert!(result.residual.contains("84978615724"));
        assert!(!result.normalized_no_diacritics.contains("84978615724"));
        assert!(result
            .components
            .poi
            .as_deref()
            .unwrap()
            .contains("daikin"));
        assert_eq!(result.admin_path.len(), 3);
        assert!(result.quality.flags.contains(&QualityFlag::PoiExtracted));
    }

    #[tokio::test]
    async fn determinism_across_runs() {
        let m = matcher().await;
        let raw = "phuong 5 quan 5 tp hcm";
        let a = m.resolve(raw, "test-v1", &opts(), deadline()).await;
        let b = m.resolve(raw, "test-v1", &opts(), deadline()).await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn district_level_match_sets_missing_ward() {
        let m = matcher().await;
        let result = m
            .resolve("quan long bien thanh pho ha noi", "test-v1", &opts(), deadline())
            .await;

        assert!(result.components.ward.is_none());
        assert!(result.quality.flags.contains(&QualityFlag::MissingWard));
    }

    #[tokio::test]
    async fn three_level_option_omits_ward_tier() {
        let m = matcher().await;
        let three = MatchOptions {
            levels: 3,
            return_candidates: true,
            top_k: 20,
        };
        let result = m
            .resolve(
                "phuong bo de quan long bien thanh pho ha noi",
                "test-v1",
                &three,
                deadline(),
            )
            .await;
        assert!(result.components.ward.is_none());
        assert_eq!(result.admin_path.len(), 2);
    }

    #[tokio::test]
    async fn candidates_suppressed_when_not_requested() {
        let m = matcher().await;
        let quiet = MatchOptions {
            levels: 4,
            return_candidates: false,
            top_k: 20,
        };
        let result = m
            .resolve("phuong bo de quan long bien ha noi", "test-v1", &quiet, deadline())
            .await;
        assert!(result.candidates.is_empty());
    }
}
