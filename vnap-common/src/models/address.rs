//! Address resolution output entities
//!
//! **[APA-MDL-020]** AddressResult is the per-request output of the pipeline:
//! canonical text, component breakdown, ranked candidates, confidence and the
//! three-valued status consumed by downstream review tooling.

use super::AdminUnit;
use serde::{Deserialize, Serialize};

/// Three-valued resolution outcome derived from confidence and thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStatus {
    Matched,
    NeedsReview,
    Unmatched,
}

impl ParseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ParseStatus::Matched => "matched",
            ParseStatus::NeedsReview => "needs_review",
            ParseStatus::Unmatched => "unmatched",
        }
    }
}

/// Label for how the top candidate was matched, inferred from its score band
/// unless a strict diacritic-exact comparison overrides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Exact,
    AsciiExact,
    Alias,
    Fuzzy,
}

impl MatchStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStrategy::Exact => "exact",
            MatchStrategy::AsciiExact => "ascii_exact",
            MatchStrategy::Alias => "alias",
            MatchStrategy::Fuzzy => "fuzzy",
        }
    }
}

/// Named quality markers attached to a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityFlag {
    ExactMatch,
    AsciiExact,
    FuzzyMatch,
    PoiExtracted,
    ApartmentUnit,
    MultiLanguage,
    AmbiguousWard,
    MultipleCandidates,
    LowConfidence,
    MissingWard,
    IndexUnavailable,
}

/// House-level detail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HouseInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<String>,
    #[serde(default)]
    pub alley: AlleyInfo,
}

/// Alley (hẻm/ngõ/ngách/kiệt) detail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlleyInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Street detail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreetInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_type: Option<String>,
}

/// Numbered road reference (quốc lộ, đường tỉnh, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadCodeInfo {
    /// Road class: ql, dt, tl, hl or dh
    pub road_type: String,
    pub code: String,
}

/// Structured component breakdown of a resolved address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressComponents {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub house: Option<HouseInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<StreetInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub road_code: Option<RoadCodeInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ward: Option<AdminUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<AdminUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<AdminUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<AdminUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<AdminUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poi: Option<String>,
}

/// Quality summary riding along the result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityInfo {
    /// Best path score in [0, 1]
    pub score: f64,
    /// Match level heuristic (exact / ascii_exact / fuzzy)
    pub match_level: String,
    pub flags: Vec<QualityFlag>,
}

/// One ranked alternative: an admissible admin path with its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Human-readable path, leaf to root
    pub path: String,
    pub score: f64,
    /// The units of the path, ward (if present) → district → province
    pub admin_units: Vec<AdminUnit>,
}

/// The output entity of the resolution pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressResult {
    pub raw: String,
    /// Comma-joined canonical form with diacritics
    pub canonical_text: String,
    pub normalized_no_diacritics: String,
    pub components: AddressComponents,
    pub quality: QualityInfo,
    /// Normalized tokens not consumed by signals or admin names, plus excised noise
    pub residual: String,
    /// `sha256:<64 hex>` over normalized text and gazetteer version
    pub fingerprint: String,
    pub confidence: f64,
    pub match_strategy: MatchStrategy,
    /// Names of the chosen path units, ward → district → province
    pub admin_path: Vec<String>,
    pub candidates: Vec<Candidate>,
    pub status: ParseStatus,
}

impl AddressResult {
    /// Minimal result for inputs that produced no candidates.
    pub fn unmatched(raw: &str, normalized: &str, fingerprint: &str, residual: String) -> Self {
        Self {
            raw: raw.to_string(),
            canonical_text: String::new(),
            normalized_no_diacritics: normalized.to_string(),
            components: AddressComponents::default(),
            quality: QualityInfo {
                score: 0.0,
                match_level: "fuzzy".to_string(),
                flags: Vec::new(),
            },
            residual,
            fingerprint: fingerprint.to_string(),
            confidence: 0.0,
            match_strategy: MatchStrategy::Fuzzy,
            admin_path: Vec::new(),
            candidates: Vec::new(),
            status: ParseStatus::Unmatched,
        }
    }
}
