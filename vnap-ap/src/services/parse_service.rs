//! Parse orchestration service
//!
//! **[APA-SVC-010]** Owns the per-request path: normalize → cache lookup →
//! deadline-bounded matching → cache write-through, plus the latency
//! accounting surfaced by the stats endpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;

use vnap_common::config::ParserConfig;
use vnap_common::models::{AddressResult, ParseStatus, QualityFlag};
use vnap_common::{Error, Result};

use crate::cache::HybridCache;
use crate::gazetteer::GazetteerIndex;
use crate::matcher::{AddressMatcher, MatchOptions};
use crate::normalizer::TextNormalizer;

/// API-facing parse options; unset fields fall back to configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParseOptions {
    pub levels: Option<u8>,
    pub use_cache: Option<bool>,
    pub return_candidates: Option<bool>,
    pub min_confidence: Option<f64>,
    pub top_k: Option<usize>,
}

/// A parse with its cache provenance.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub result: AddressResult,
    pub cache_hit: bool,
}

pub struct ParseService {
    matcher: AddressMatcher,
    normalizer: TextNormalizer,
    cache: Arc<HybridCache>,
    index: Arc<GazetteerIndex>,
    config: ParserConfig,
    total_latency_ms: AtomicU64,
    total_parsed: AtomicU64,
}

impl ParseService {
    pub fn new(
        matcher: AddressMatcher,
        cache: Arc<HybridCache>,
        index: Arc<GazetteerIndex>,
        config: ParserConfig,
    ) -> Self {
        Self {
            matcher,
            normalizer: TextNormalizer::new(),
            cache,
            index,
            config,
            total_latency_ms: AtomicU64::new(0),
            total_parsed: AtomicU64::new(0),
        }
    }

    /// Parse one address. Empty input is an input error; everything else
    /// resolves to a result whose status carries the outcome.
    pub async fn parse(&self, raw: &str, options: &ParseOptions) -> Result<ParseOutcome> {
        if raw.trim().is_empty() {
            return Err(Error::InvalidInput("address must not be empty".into()));
        }

        let started = std::time::Instant::now();
        let levels = options.levels.unwrap_or(self.config.parser.level_config);
        if levels != 3 && levels != 4 {
            return Err(Error::InvalidInput(format!(
                "levels must be 3 or 4, got {}",
                levels
            )));
        }
        let use_cache = options.use_cache.unwrap_or(true);
        let version = self.index.version().await;

        let norm = self.normalizer.normalize(raw, &version);

        if use_cache {
            if let Some(result) = self
                .cache
                .get(&norm.normalized, &norm.fingerprint, &version)
                .await
            {
                self.record_latency(started);
                return Ok(ParseOutcome {
                    result,
                    cache_hit: true,
                });
            }
        }

        // A missing snapshot is a dependency outage, not a parse failure:
        // degrade to an explicitly flagged unmatched result
        if !self.index.health().await {
            tracing::warn!("Gazetteer index empty or unavailable, degrading to unmatched");
            let mut result = AddressResult::unmatched(
                raw,
                &norm.normalized,
                &norm.fingerprint,
                norm.signals.residual.join(" "),
            );
            result.quality.flags.push(QualityFlag::IndexUnavailable);
            self.record_latency(started);
            return Ok(ParseOutcome {
                result,
                cache_hit: false,
            });
        }

        let match_opts = MatchOptions {
            levels,
            return_candidates: options.return_candidates.unwrap_or(true),
            top_k: options.top_k.unwrap_or(20),
        };
        let deadline =
            Instant::now() + Duration::from_millis(self.config.cache.request_timeout_ms);

        let mut result = self
            .matcher
            .resolve_normalized(raw, &norm, &match_opts, deadline)
            .await;

        // Caller-requested confidence floor: matched results below it are
        // demoted to review, and weaker alternatives are dropped
        if let Some(floor) = options.min_confidence {
            if result.status == ParseStatus::Matched && result.confidence < floor {
                result.status = ParseStatus::NeedsReview;
            }
            result.candidates.retain(|c| c.score >= floor);
        }

        // Only results that found a path are worth remembering
        if use_cache && result.status != ParseStatus::Unmatched {
            self.cache.put(&norm.normalized, &result, &version);
        }

        self.record_latency(started);
        Ok(ParseOutcome {
            result,
            cache_hit: false,
        })
    }

    pub async fn gazetteer_version(&self) -> String {
        self.index.version().await
    }

    fn record_latency(&self, started: std::time::Instant) {
        self.total_latency_ms
            .fetch_add(started.elapsed().as_millis() as u64, Ordering::Relaxed);
        self.total_parsed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_parsed(&self) -> u64 {
        self.total_parsed.load(Ordering::Relaxed)
    }

    pub fn avg_latency_ms(&self) -> f64 {
        let total = self.total_parsed.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        self.total_latency_ms.load(Ordering::Relaxed) as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures;

    async fn service() -> Arc<ParseService> {
        let index = Arc::new(GazetteerIndex::new());
        index.bulk_load(test_fixtures::seed_units(), "v1").await;
        let config = ParserConfig::default();
        let cache = HybridCache::new(64, None);
        let matcher = AddressMatcher::new(index.clone(), config.clone(), None);
        Arc::new(ParseService::new(matcher, cache, index, config))
    }

    #[tokio::test]
    async fn empty_address_is_an_input_error() {
        let svc = service().await;
        assert!(svc.parse("", &ParseOptions::default()).await.is_err());
        assert!(svc.parse("   ", &ParseOptions::default()).await.is_err());
    }

    #[tokio::test]
    async fn second_parse_hits_cache_with_same_fingerprint() {
        let svc = service().await;
        let raw = "phuong bo de quan long bien thanh pho ha noi";

        let first = svc.parse(raw, &ParseOptions::default()).await.unwrap();
        assert!(!first.cache_hit);

        let second = svc.parse(raw, &ParseOptions::default()).await.unwrap();
        assert!(second.cache_hit);
        assert_eq!(first.result.fingerprint, second.result.fingerprint);
        assert_eq!(first.result.confidence, second.result.confidence);
    }

    #[tokio::test]
    async fn cache_can_be_bypassed() {
        let svc = service().await;
        let raw = "phuong bo de quan long bien thanh pho ha noi";
        let opts = ParseOptions {
            use_cache: Some(false),
            ..Default::default()
        };
        svc.parse(raw, &opts).await.unwrap();
        let again = svc.parse(raw, &opts).await.unwrap();
        assert!(!again.cache_hit);
    }

    #[tokio::test]
    async fn unmatched_results_are_not_cached() {
        let svc = service().await;
        let first = svc.parse("CT1234 0912345678", &ParseOptions::default()).await.unwrap();
        assert_eq!(first.result.status, ParseStatus::Unmatched);
        let second = svc.parse("CT1234 0912345678", &ParseOptions::default()).await.unwrap();
        assert!(!second.cache_hit);
    }

    #[tokio::test]
    async fn min_confidence_demotes_and_filters() {
        let svc = service().await;
        let opts = ParseOptions {
            min_confidence: Some(0.99),
            ..Default::default()
        };
        let outcome = svc
            .parse("phuong bo de quan long bien thanh pho ha noi", &opts)
            .await
            .unwrap();
        assert_ne!(outcome.result.status, ParseStatus::Matched);
        assert!(outcome.result.candidates.iter().all(|c| c.score >= 0.99));
    }

    #[tokio::test]
    async fn empty_index_degrades_with_flag() {
        let index = Arc::new(GazetteerIndex::new());
        let config = ParserConfig::default();
        let cache = HybridCache::new(16, None);
        let matcher = AddressMatcher::new(index.clone(), config.clone(), None);
        let svc = ParseService::new(matcher, cache, index, config);

        let outcome = svc
            .parse("phuong bo de ha noi", &ParseOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.result.status, ParseStatus::Unmatched);
        assert!(outcome
            .result
            .quality
            .flags
            .contains(&QualityFlag::IndexUnavailable));
    }

    #[tokio::test]
    async fn latency_accounting_moves() {
        let svc = service().await;
        svc.parse("phuong bo de quan long bien ha noi", &ParseOptions::default())
            .await
            .unwrap();
        assert_eq!(svc.total_parsed(), 1);
        assert!(svc.avg_latency_ms() >= 0.0);
    }
}
