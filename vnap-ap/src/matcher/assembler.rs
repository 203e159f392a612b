//! Result assembly
//!
//! **[APA-ASM-010]** Turns the ranked candidate paths, signals and normalized
//! text into the final AddressResult: canonical text, component breakdown,
//! admin path, residual, quality flags and status.

use vnap_common::config::ParserConfig;
use vnap_common::models::{
    AddressComponents, AddressResult, AdminLevel, AdminSubtype, AdminUnit, AlleyInfo, Candidate,
    HouseInfo, MatchStrategy, ParseStatus, QualityFlag, QualityInfo, RoadCodeInfo, StreetInfo,
};

use super::scorer::{PathScorer, ScoredPath};
use crate::normalizer::{normalize_name, NormalizedAddress};

pub struct ResultAssembler {
    config: ParserConfig,
}

impl ResultAssembler {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Build the final result from ranked paths. `ranked` is already sorted
    /// best-first; an empty list yields an unmatched result.
    pub fn assemble(
        &self,
        raw: &str,
        norm: &NormalizedAddress,
        ranked: &[ScoredPath],
        scorer: &PathScorer,
        levels: u8,
        return_candidates: bool,
        top_k: usize,
    ) -> AddressResult {
        let Some(best) = ranked.first() else {
            let mut result = AddressResult::unmatched(
                raw,
                &norm.normalized,
                &norm.fingerprint,
                residual_text(norm, None),
            );
            result.quality.flags = self.base_flags(norm, MatchStrategy::Fuzzy, false);
            return result;
        };

        let path = &best.path;
        let components = self.components(norm, path);
        let canonical_text = canonical(norm, path);
        let admin_path = admin_path(path);

        let completeness = scorer.completeness(
            norm.signals.has_house_or_street(&norm.street),
            path.ward.is_some(),
            true,
            true,
            levels,
        );
        let path_valid = path.is_valid();
        let confidence = scorer.confidence(best.score, completeness, path_valid);

        // Strategy from the score band, overridden by a strict comparison
        // with diacritics against the raw input
        let mut match_strategy = scorer.infer_strategy(best.score);
        let strict_exact = strict_diacritic_match(raw, path);
        if strict_exact {
            match_strategy = MatchStrategy::Exact;
        }

        // Match level heuristic: exact needs the diacritic names verbatim,
        // ascii_exact needs the folded names verbatim, anything else is fuzzy
        let folded_raw = normalize_name(raw);
        let ascii_exact = folded_raw.contains(path.district.normalized_name.as_str())
            && folded_raw.contains(path.province.normalized_name.as_str());
        let match_level = if strict_exact {
            "exact"
        } else if ascii_exact {
            "ascii_exact"
        } else {
            "fuzzy"
        };

        let mut flags = self.base_flags(norm, match_strategy, path.ward.is_none() && levels >= 4);
        let tied = ranked.len() >= 2
            && (best.score - ranked[1].score).abs() <= self.config.scoring.candidate_epsilon;
        let ambiguous = has_ambiguous_ward(ranked);
        if tied || ambiguous {
            flags.push(QualityFlag::MultipleCandidates);
        }
        if ambiguous {
            flags.push(QualityFlag::AmbiguousWard);
        }
        if confidence < self.config.thresholds.high {
            flags.push(QualityFlag::LowConfidence);
        }

        let status = if confidence >= self.config.thresholds.high {
            ParseStatus::Matched
        } else if confidence >= self.config.thresholds.review_low {
            ParseStatus::NeedsReview
        } else {
            ParseStatus::Unmatched
        };

        let candidates = if return_candidates {
            ranked
                .iter()
                .take(top_k)
                .map(|sp| Candidate {
                    path: admin_path_names(&sp.path).join(" > "),
                    score: sp.score,
                    admin_units: path_units(&sp.path),
                })
                .collect()
        } else {
            Vec::new()
        };

        AddressResult {
            raw: raw.to_string(),
            canonical_text,
            normalized_no_diacritics: norm.normalized.clone(),
            components,
            quality: QualityInfo {
                score: best.score,
                match_level: match_level.to_string(),
                flags,
            },
            residual: residual_text(norm, Some(path)),
            fingerprint: norm.fingerprint.clone(),
            confidence,
            match_strategy,
            admin_path,
            candidates,
            status,
        }
    }

    fn components(
        &self,
        norm: &NormalizedAddress,
        path: &super::candidates::CandidatePath,
    ) -> AddressComponents {
        let signals = &norm.signals;
        let mut components = AddressComponents::default();

        if signals.house_number.is_some()
            || signals.unit.is_some()
            || signals.floor.is_some()
            || signals.alley_number.is_some()
            || signals.alley_name.is_some()
        {
            components.house = Some(HouseInfo {
                number: signals.house_number.clone(),
                unit: signals.unit.clone(),
                floor: signals.floor.clone(),
                alley: AlleyInfo {
                    number: signals.alley_number.clone(),
                    name: signals.alley_name.clone(),
                },
            });
        }
        if let Some(street) = &norm.street {
            components.street = Some(StreetInfo {
                name: street.clone(),
                street_type: Some("duong".to_string()),
            });
        }
        if let (Some(rt), Some(code)) = (&signals.road_type, &signals.road_code) {
            components.road_code = Some(RoadCodeInfo {
                road_type: rt.as_str().to_string(),
                code: code.clone(),
            });
        }
        components.poi = signals.poi.clone();

        components.ward = path.ward.clone();
        match path.district.admin_subtype {
            AdminSubtype::CityUnderProvince | AdminSubtype::Town => {
                components.city = Some(path.district.clone());
            }
            _ => components.district = Some(path.district.clone()),
        }
        match path.province.admin_subtype {
            AdminSubtype::Municipality => {
                // A municipality is simultaneously the city and the
                // province-level unit
                components.province = Some(path.province.clone());
                if components.city.is_none() {
                    components.city = Some(path.province.clone());
                }
            }
            _ => components.province = Some(path.province.clone()),
        }
        components.country = Some(vietnam_unit());

        components
    }

    fn base_flags(
        &self,
        norm: &NormalizedAddress,
        strategy: MatchStrategy,
        missing_ward: bool,
    ) -> Vec<QualityFlag> {
        let mut flags = Vec::with_capacity(4);
        flags.push(match strategy {
            MatchStrategy::Exact => QualityFlag::ExactMatch,
            MatchStrategy::AsciiExact => QualityFlag::AsciiExact,
            MatchStrategy::Alias | MatchStrategy::Fuzzy => QualityFlag::FuzzyMatch,
        });
        if norm.signals.unit.is_some() || norm.signals.floor.is_some() {
            flags.push(QualityFlag::ApartmentUnit);
        }
        if norm.signals.poi.is_some() {
            flags.push(QualityFlag::PoiExtracted);
        }
        if norm.multilingual {
            flags.push(QualityFlag::MultiLanguage);
        }
        if missing_ward {
            flags.push(QualityFlag::MissingWard);
        }
        flags
    }
}

/// Canonical text: most specific non-admin fragment first, then the admin
/// hierarchy leaf-to-root, then the country. Missing fragments are omitted.
fn canonical(norm: &NormalizedAddress, path: &super::candidates::CandidatePath) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(5);

    let mut left = Vec::new();
    if let Some(number) = &norm.signals.house_number {
        left.push(number.clone());
    }
    if let Some(street) = &norm.street {
        left.push(street.clone());
    }
    if !left.is_empty() {
        parts.push(left.join(" "));
    }

    parts.extend(admin_path_names(path));
    parts.push("Việt Nam".to_string());
    parts.join(", ")
}

fn admin_path(path: &super::candidates::CandidatePath) -> Vec<String> {
    admin_path_names(path)
}

fn admin_path_names(path: &super::candidates::CandidatePath) -> Vec<String> {
    let mut names = Vec::with_capacity(3);
    if let Some(ward) = &path.ward {
        names.push(ward.name.clone());
    }
    names.push(path.district.name.clone());
    names.push(path.province.name.clone());
    names
}

fn path_units(path: &super::candidates::CandidatePath) -> Vec<AdminUnit> {
    let mut units = Vec::with_capacity(3);
    if let Some(ward) = &path.ward {
        units.push(ward.clone());
    }
    units.push(path.district.clone());
    units.push(path.province.clone());
    units
}

/// Strict exact check: every chosen unit's diacritic name appears verbatim
/// (case-insensitively) in the raw input.
fn strict_diacritic_match(raw: &str, path: &super::candidates::CandidatePath) -> bool {
    let raw_lower = raw.to_lowercase();
    let mut names = vec![
        path.district.name.to_lowercase(),
        path.province.name.to_lowercase(),
    ];
    if let Some(ward) = &path.ward {
        names.push(ward.name.to_lowercase());
    }
    names.iter().all(|n| raw_lower.contains(n.as_str()))
}

/// Residual: leftover normalized tokens not consumed by signals, admin
/// phrases or the matched unit names, plus the noise excised in step 1.
fn residual_text(
    norm: &NormalizedAddress,
    path: Option<&super::candidates::CandidatePath>,
) -> String {
    let path_text = path.map(|p| p.normalized_text()).unwrap_or_default();
    let mut parts: Vec<String> = norm
        .leftover
        .iter()
        .filter(|t| !path_text.contains(t.as_str()))
        .cloned()
        .collect();
    parts.extend(norm.signals.residual.iter().cloned());
    parts.join(" ")
}

/// ≥2 ranked paths sharing a ward name under different districts.
fn has_ambiguous_ward(ranked: &[ScoredPath]) -> bool {
    for (i, a) in ranked.iter().enumerate() {
        let Some(ward_a) = &a.path.ward else { continue };
        for b in ranked.iter().skip(i + 1) {
            let Some(ward_b) = &b.path.ward else { continue };
            if ward_a.normalized_name == ward_b.normalized_name
                && a.path.district.admin_id != b.path.district.admin_id
            {
                return true;
            }
        }
    }
    false
}

/// The country-level unit used to complete component sets.
fn vietnam_unit() -> AdminUnit {
    AdminUnit {
        admin_id: "84".to_string(),
        parent_id: None,
        level: AdminLevel::Country,
        admin_subtype: AdminSubtype::Country,
        name: "Việt Nam".to_string(),
        normalized_name: "viet nam".to_string(),
        aliases: vec!["vietnam".to_string(), "vn".to_string()],
        path: vec!["84".to_string()],
        path_normalized: vec!["viet nam".to_string()],
        gazetteer_version: String::new(),
    }
}
