//! Configuration schema and loading for VNAP services
//!
//! **[APA-CFG-010]** Declarative configuration with TOML file + environment
//! override. Priority order:
//! 1. Environment variables (highest)
//! 2. TOML config file (explicit path, then `~/.config/vnap/vnap-ap.toml`)
//! 3. Compiled defaults (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Status thresholds over the reported confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    /// Confidence at or above which a result is `matched`
    #[serde(default = "default_threshold_high")]
    pub high: f64,
    /// Confidence at or above which a result is `needs_review`
    #[serde(default = "default_threshold_review_low")]
    pub review_low: f64,
}

fn default_threshold_high() -> f64 {
    0.90
}
fn default_threshold_review_low() -> f64 {
    0.60
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            high: default_threshold_high(),
            review_low: default_threshold_review_low(),
        }
    }
}

/// Per-level similarity weights for the Jaro-Winkler / Levenshtein blend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityWeights {
    #[serde(default = "default_jw_weight")]
    pub jw_weight: f64,
    #[serde(default = "default_lev_weight")]
    pub lev_weight: f64,
}

fn default_jw_weight() -> f64 {
    0.7
}
fn default_lev_weight() -> f64 {
    0.3
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            jw_weight: default_jw_weight(),
            lev_weight: default_lev_weight(),
        }
    }
}

/// Path score aggregation weights. The sum stays at or below 1.0 so the
/// aggregate lands in [0, 1] without rescaling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeights {
    #[serde(default = "default_w_ward")]
    pub ward: f64,
    #[serde(default = "default_w_district")]
    pub district: f64,
    #[serde(default = "default_w_province")]
    pub province: f64,
    #[serde(default = "default_w_structural")]
    pub structural_bonus: f64,
    #[serde(default = "default_w_roadcode")]
    pub roadcode_bonus: f64,
    #[serde(default = "default_w_poi")]
    pub poi_bonus: f64,
    /// Weight of the optional external parser coverage term
    #[serde(default = "default_w_external")]
    pub external_coverage: f64,
    /// Two candidates within this score distance count as tied
    /// (MULTIPLE_CANDIDATES flag)
    #[serde(default = "default_candidate_epsilon")]
    pub candidate_epsilon: f64,
}

fn default_w_ward() -> f64 {
    0.35
}
fn default_w_district() -> f64 {
    0.25
}
fn default_w_province() -> f64 {
    0.15
}
fn default_w_structural() -> f64 {
    0.10
}
fn default_w_roadcode() -> f64 {
    0.07
}
fn default_w_poi() -> f64 {
    0.05
}
fn default_w_external() -> f64 {
    0.03
}
fn default_candidate_epsilon() -> f64 {
    0.05
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            ward: default_w_ward(),
            district: default_w_district(),
            province: default_w_province(),
            structural_bonus: default_w_structural(),
            roadcode_bonus: default_w_roadcode(),
            poi_bonus: default_w_poi(),
            external_coverage: default_w_external(),
            candidate_epsilon: default_candidate_epsilon(),
        }
    }
}

/// Weights of the externally reported confidence combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    #[serde(default = "default_score_weight")]
    pub score_weight: f64,
    #[serde(default = "default_completeness_weight")]
    pub completeness_weight: f64,
    #[serde(default = "default_path_weight")]
    pub path_weight: f64,
}

fn default_score_weight() -> f64 {
    0.60
}
fn default_completeness_weight() -> f64 {
    0.25
}
fn default_path_weight() -> f64 {
    0.15
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            score_weight: default_score_weight(),
            completeness_weight: default_completeness_weight(),
            path_weight: default_path_weight(),
        }
    }
}

/// Per-level retrieval depth for the candidate builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopK {
    #[serde(default = "default_topk_ward")]
    pub topk_ward: usize,
    #[serde(default = "default_topk_district")]
    pub topk_district: usize,
    #[serde(default = "default_topk_province")]
    pub topk_province: usize,
}

fn default_topk_ward() -> usize {
    20
}
fn default_topk_district() -> usize {
    15
}
fn default_topk_province() -> usize {
    10
}

impl Default for TopK {
    fn default() -> Self {
        Self {
            topk_ward: default_topk_ward(),
            topk_district: default_topk_district(),
            topk_province: default_topk_province(),
        }
    }
}

/// Cache sizing and request deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum entries held in the volatile L1 tier
    #[serde(default = "default_l1_size")]
    pub l1_size: usize,
    /// Overall per-request deadline in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_l1_size() -> usize {
    10_000
}
fn default_request_timeout_ms() -> u64 {
    1_500
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l1_size: default_l1_size(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Batch job limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Maximum addresses accepted per batch submission
    #[serde(default = "default_max_addresses")]
    pub max_addresses: usize,
    /// Bounded worker pool size for batch processing
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_max_addresses() -> usize {
    20_000
}
fn default_workers() -> usize {
    8
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            max_addresses: default_max_addresses(),
            workers: default_workers(),
        }
    }
}

/// Parser behavior flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserFlags {
    /// Administrative depth: 3 stops at district, 4 resolves wards
    #[serde(default = "default_level_config")]
    pub level_config: u8,
    /// Consult the external auxiliary parser for low-confidence results
    #[serde(default)]
    pub use_external_parser: bool,
    /// Rule-based score below which the external parser is consulted
    #[serde(default = "default_external_trigger")]
    pub external_trigger_below: f64,
    /// Bounded fan-out for per-province / per-district index queries
    #[serde(default = "default_fan_out")]
    pub query_fan_out: usize,
}

fn default_level_config() -> u8 {
    4
}
fn default_external_trigger() -> f64 {
    0.70
}
fn default_fan_out() -> usize {
    10
}

impl Default for ParserFlags {
    fn default() -> Self {
        Self {
            level_config: default_level_config(),
            use_external_parser: false,
            external_trigger_below: default_external_trigger(),
            query_fan_out: default_fan_out(),
        }
    }
}

/// Complete VNAP parser configuration.
///
/// **[APA-CFG-010]** All weights and thresholds are configuration, not code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParserConfig {
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub similarity: SimilarityWeights,
    #[serde(default)]
    pub scoring: ScoringWeights,
    #[serde(default)]
    pub confidence: ConfidenceWeights,
    #[serde(default)]
    pub topk: TopK,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub jobs: JobConfig,
    #[serde(default)]
    pub parser: ParserFlags,
    /// SQLite database path; overridden by VNAP_DB_PATH
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// HTTP bind address; overridden by VNAP_BIND_ADDR
    #[serde(default)]
    pub bind_addr: Option<String>,
    /// External parser endpoint; overridden by VNAP_EXTERNAL_PARSER_URL
    #[serde(default)]
    pub external_parser_url: Option<String>,
}

impl ParserConfig {
    /// Load configuration with the documented priority order.
    ///
    /// An explicit `path` is authoritative and must parse; without one the
    /// user config file is consulted if present, otherwise defaults apply.
    /// Environment overrides are applied last in either case.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .map_err(|e| Error::Config(format!("read {}: {}", p.display(), e)))?;
                toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("parse {}: {}", p.display(), e)))?
            }
            None => match default_config_path() {
                Some(p) if p.exists() => {
                    let content = std::fs::read_to_string(&p)
                        .map_err(|e| Error::Config(format!("read {}: {}", p.display(), e)))?;
                    toml::from_str(&content)
                        .map_err(|e| Error::Config(format!("parse {}: {}", p.display(), e)))?
                }
                _ => Self::default(),
            },
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides (highest priority tier).
    pub fn apply_env_overrides(&mut self) {
        match std::env::var("USE_EXTERNAL_PARSER").as_deref() {
            Ok("1") | Ok("true") => self.parser.use_external_parser = true,
            Ok("0") | Ok("false") => self.parser.use_external_parser = false,
            _ => {}
        }
        if let Ok(path) = std::env::var("VNAP_DB_PATH") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Ok(addr) = std::env::var("VNAP_BIND_ADDR") {
            self.bind_addr = Some(addr);
        }
        if let Ok(url) = std::env::var("VNAP_EXTERNAL_PARSER_URL") {
            self.external_parser_url = Some(url);
        }
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.thresholds.review_low > self.thresholds.high {
            return Err(Error::Config(format!(
                "review_low ({}) must not exceed high ({})",
                self.thresholds.review_low, self.thresholds.high
            )));
        }
        let sim = self.similarity.jw_weight + self.similarity.lev_weight;
        if (sim - 1.0).abs() > 1e-6 {
            return Err(Error::Config(format!(
                "jw_weight + lev_weight must equal 1.0, got {}",
                sim
            )));
        }
        if self.parser.level_config != 3 && self.parser.level_config != 4 {
            return Err(Error::Config(format!(
                "level_config must be 3 or 4, got {}",
                self.parser.level_config
            )));
        }
        if self.jobs.workers == 0 || self.parser.query_fan_out == 0 {
            return Err(Error::Config("worker and fan-out sizes must be non-zero".into()));
        }
        Ok(())
    }

    /// Resolved database path (env → config → default `vnap.db`).
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("vnap.db"))
    }

    /// Resolved bind address (env → config → default).
    pub fn bind_addr(&self) -> String {
        self.bind_addr
            .clone()
            .unwrap_or_else(|| "127.0.0.1:5731".to_string())
    }
}

/// Default user configuration file path for the platform.
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("vnap").join("vnap-ap.toml"))
}
