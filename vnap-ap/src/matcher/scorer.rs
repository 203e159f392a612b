//! Candidate path scoring and confidence model
//!
//! **[APA-SCR-010]** Per-level similarity is a convex Jaro-Winkler /
//! normalized-Levenshtein blend over the admin-token slices. The path score
//! aggregates per-level similarity with structural, road-code and POI
//! bonuses plus the optional external-coverage term; the externally reported
//! confidence is a second convex combination over best score, completeness
//! and path consistency. All weights come from configuration.

use vnap_common::config::ParserConfig;
use vnap_common::models::MatchStrategy;

use super::candidates::CandidatePath;
use crate::normalizer::NormalizedAddress;

/// Per-level and bonus score components for one path.
#[derive(Debug, Clone, Default)]
pub struct ScoreParts {
    pub sim_ward: f64,
    pub sim_district: f64,
    pub sim_province: f64,
    pub structural: f64,
    pub road_bonus: f64,
    pub poi_bonus: f64,
    pub external_coverage: f64,
}

/// A path with its computed score.
#[derive(Debug, Clone)]
pub struct ScoredPath {
    pub path: CandidatePath,
    pub score: f64,
    pub parts: ScoreParts,
}

pub struct PathScorer {
    config: ParserConfig,
}

impl PathScorer {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Jaro-Winkler + normalized Levenshtein blend, weights from config.
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        let jw = strsim::jaro_winkler(a, b);
        let dist = strsim::levenshtein(a, b);
        let denom = a.chars().count().max(b.chars().count()) as f64;
        let lev = 1.0 - dist as f64 / denom;
        self.config.similarity.jw_weight * jw + self.config.similarity.lev_weight * lev
    }

    /// Score one candidate path against the normalized request.
    pub fn score_path(
        &self,
        norm: &NormalizedAddress,
        path: &CandidatePath,
        external_coverage: f64,
        levels: u8,
    ) -> (f64, ScoreParts) {
        let sim_ward = match &path.ward {
            Some(ward) => self.level_similarity(
                norm.admin_tokens.ward.as_deref(),
                &ward.normalized_name,
                &norm.normalized,
            ),
            None => 0.0,
        };
        let sim_district = self.level_similarity(
            norm.admin_tokens.district.as_deref(),
            &path.district.normalized_name,
            &norm.normalized,
        );
        let sim_province = self.level_similarity(
            norm.admin_tokens.province.as_deref(),
            &path.province.normalized_name,
            &norm.normalized,
        );

        let path_valid = path.is_valid();
        let all_levels = path.ward.is_some() || levels == 3;
        let structural = if path_valid && all_levels { 1.0 } else { 0.0 };

        let path_text = path.normalized_text();
        let road_bonus = match (&norm.signals.road_type, &norm.signals.road_code) {
            (Some(rt), Some(code)) => {
                let fused = format!("{}{}", rt.as_str(), code);
                let spaced = format!("{} {}", rt.as_str(), code);
                if path_text.contains(&fused) || path_text.contains(&spaced) {
                    1.0
                } else {
                    0.0
                }
            }
            _ => 0.0,
        };
        let poi_bonus = match &norm.signals.poi {
            Some(poi) if !poi.is_empty() && path_text.contains(poi.as_str()) => 1.0,
            _ => 0.0,
        };

        let parts = ScoreParts {
            sim_ward,
            sim_district,
            sim_province,
            structural,
            road_bonus,
            poi_bonus,
            external_coverage,
        };

        // Weighted sum, clamped to [0, 1]. The configured weights sum to at
        // most 1.0, so the aggregate lands in range without rescaling.
        let w = &self.config.scoring;
        let score = w.ward * parts.sim_ward
            + w.district * parts.sim_district
            + w.province * parts.sim_province
            + w.structural_bonus * parts.structural
            + w.roadcode_bonus * parts.road_bonus
            + w.poi_bonus * parts.poi_bonus
            + w.external_coverage * parts.external_coverage;

        (score.clamp(0.0, 1.0), parts)
    }

    /// Similarity for one level: the extracted admin-token slice when
    /// present, otherwise the best window of the normalized text with the
    /// candidate name's width.
    fn level_similarity(&self, slice: Option<&str>, candidate: &str, normalized: &str) -> f64 {
        if let Some(slice) = slice {
            return self.similarity(slice, candidate);
        }
        let tokens: Vec<&str> = normalized.split_whitespace().collect();
        let width = candidate.split_whitespace().count().max(1);
        if tokens.is_empty() {
            return 0.0;
        }
        let mut best: f64 = 0.0;
        let upper = tokens.len().saturating_sub(width) + 1;
        for start in 0..upper {
            let window = tokens[start..(start + width).min(tokens.len())].join(" ");
            best = best.max(self.similarity(&window, candidate));
        }
        best
    }

    /// Rank scored paths: score desc, then ward similarity, then district
    /// similarity, then lexicographic admin ids for determinism.
    pub fn rank(&self, mut paths: Vec<ScoredPath>) -> Vec<ScoredPath> {
        paths.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.parts
                        .sim_ward
                        .partial_cmp(&a.parts.sim_ward)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| {
                    b.parts
                        .sim_district
                        .partial_cmp(&a.parts.sim_district)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.path.key().cmp(&b.path.key()))
        });
        paths
    }

    /// Completeness over the recovered component slots. The ward slot is
    /// omitted when the request resolves three levels only.
    pub fn completeness(
        &self,
        has_house_or_street: bool,
        has_ward: bool,
        has_district: bool,
        has_province: bool,
        levels: u8,
    ) -> f64 {
        let mut found = 0usize;
        let mut total = 4usize;
        if has_house_or_street {
            found += 1;
        }
        if levels == 3 {
            total = 3;
        } else if has_ward {
            found += 1;
        }
        if has_district {
            found += 1;
        }
        if has_province {
            found += 1;
        }
        found as f64 / total as f64
    }

    /// Externally reported confidence.
    pub fn confidence(&self, best_score: f64, completeness: f64, path_valid: bool) -> f64 {
        let w = &self.config.confidence;
        let conf = w.score_weight * best_score
            + w.completeness_weight * completeness
            + w.path_weight * if path_valid { 1.0 } else { 0.0 };
        conf.clamp(0.0, 1.0)
    }

    /// Strategy label from the score band. A strict diacritic-exact
    /// comparison can override this with `exact` at assembly time.
    pub fn infer_strategy(&self, score: f64) -> MatchStrategy {
        if score >= 0.95 {
            MatchStrategy::Exact
        } else if score >= 0.85 {
            MatchStrategy::AsciiExact
        } else if score >= 0.70 {
            MatchStrategy::Alias
        } else {
            MatchStrategy::Fuzzy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::TextNormalizer;
    use crate::test_fixtures;
    use vnap_common::models::AdminLevel;

    fn scorer() -> PathScorer {
        PathScorer::new(ParserConfig::default())
    }

    fn path_for(ward_id: Option<&str>, district_id: &str, province_id: &str) -> CandidatePath {
        let units = test_fixtures::seed_units();
        let find = |id: &str| units.iter().find(|u| u.admin_id == id).unwrap().clone();
        CandidatePath {
            ward: ward_id.map(find),
            district: find(district_id),
            province: find(province_id),
        }
    }

    #[test]
    fn similarity_is_convex_blend() {
        let s = scorer();
        assert!((s.similarity("long bien", "long bien") - 1.0).abs() < 1e-9);
        let close = s.similarity("long biem", "long bien");
        assert!(close > 0.85 && close < 1.0);
        assert_eq!(s.similarity("", "long bien"), 0.0);
    }

    #[test]
    fn exact_address_scores_literal_weighted_sum() {
        let s = scorer();
        let norm = TextNormalizer::new().normalize(
            "phuong bo de quan long bien thanh pho ha noi",
            "test",
        );
        let path = path_for(Some("01-004-00127"), "01-004", "01");
        let (score, parts) = s.score_path(&norm, &path, 0.0, 4);
        // Perfect similarities, no road or POI signal:
        // 0.35·1 + 0.25·1 + 0.15·1 + 0.10·1 = 0.85
        assert!((score - 0.85).abs() < 1e-9, "score was {}", score);
        assert_eq!(parts.structural, 1.0);
        assert!((parts.sim_ward - 1.0).abs() < 1e-9);
        assert!((parts.sim_district - 1.0).abs() < 1e-9);
        assert!((parts.sim_province - 1.0).abs() < 1e-9);
    }

    #[test]
    fn wrong_province_scores_lower() {
        let s = scorer();
        let norm = TextNormalizer::new().normalize(
            "phuong bo de quan long bien thanh pho ha noi",
            "test",
        );
        let right = path_for(Some("01-004-00127"), "01-004", "01");
        let wrong = path_for(Some("79-760-27301"), "79-760", "79");
        let (right_score, _) = s.score_path(&norm, &right, 0.0, 4);
        let (wrong_score, _) = s.score_path(&norm, &wrong, 0.0, 4);
        assert!(right_score > wrong_score);
    }

    #[test]
    fn missing_ward_loses_structural_bonus() {
        let s = scorer();
        let norm = TextNormalizer::new().normalize("quan long bien thanh pho ha noi", "test");
        let with_ward = path_for(Some("01-004-00127"), "01-004", "01");
        let without = path_for(None, "01-004", "01");
        let (_, parts_with) = s.score_path(&norm, &with_ward, 0.0, 4);
        let (_, parts_without) = s.score_path(&norm, &without, 0.0, 4);
        assert_eq!(parts_with.structural, 1.0);
        assert_eq!(parts_without.structural, 0.0);
    }

    #[test]
    fn three_level_config_keeps_structural_bonus() {
        let s = scorer();
        let norm = TextNormalizer::new().normalize("quan long bien thanh pho ha noi", "test");
        let path = path_for(None, "01-004", "01");
        let (_, parts) = s.score_path(&norm, &path, 0.0, 3);
        assert_eq!(parts.structural, 1.0);
    }

    #[test]
    fn strategy_bands() {
        let s = scorer();
        assert_eq!(s.infer_strategy(0.97), MatchStrategy::Exact);
        assert_eq!(s.infer_strategy(0.95), MatchStrategy::Exact);
        assert_eq!(s.infer_strategy(0.90), MatchStrategy::AsciiExact);
        assert_eq!(s.infer_strategy(0.75), MatchStrategy::Alias);
        assert_eq!(s.infer_strategy(0.40), MatchStrategy::Fuzzy);
    }

    #[test]
    fn confidence_combination_and_clamp() {
        let s = scorer();
        let conf = s.confidence(1.0, 1.0, true);
        assert!((conf - 1.0).abs() < 1e-9);
        let partial = s.confidence(0.8, 0.75, true);
        // 0.6*0.8 + 0.25*0.75 + 0.15 = 0.8175
        assert!((partial - 0.8175).abs() < 1e-9);
        assert_eq!(s.confidence(0.0, 0.0, false), 0.0);
    }

    #[test]
    fn completeness_counts_slots() {
        let s = scorer();
        assert_eq!(s.completeness(true, true, true, true, 4), 1.0);
        assert_eq!(s.completeness(false, true, true, true, 4), 0.75);
        assert_eq!(s.completeness(true, false, true, true, 3), 1.0);
    }

    #[test]
    fn ranking_is_deterministic_on_ties() {
        let s = scorer();
        let a = ScoredPath {
            path: path_for(Some("79-760-27301"), "79-760", "79"),
            score: 0.8,
            parts: ScoreParts::default(),
        };
        let b = ScoredPath {
            path: path_for(Some("79-776-27433"), "79-776", "79"),
            score: 0.8,
            parts: ScoreParts::default(),
        };
        let ranked_one = s.rank(vec![a.clone(), b.clone()]);
        let ranked_two = s.rank(vec![b, a]);
        assert_eq!(ranked_one[0].path.key(), ranked_two[0].path.key());
    }

    #[test]
    fn level_enum_used_in_fixtures() {
        // Guard: fixtures must stay structurally valid for the other tests
        for u in test_fixtures::seed_units() {
            assert!(u.validate().is_empty(), "{:?}", u.validate());
            if u.level == AdminLevel::Ward {
                assert!(u.parent_id.is_some());
            }
        }
    }
}
