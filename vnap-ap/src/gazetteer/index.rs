//! In-process gazetteer search index
//!
//! **[APA-IDX-020]** Filtered fuzzy retrieval over the resident snapshot.
//! Ranking combines token overlap, typo tolerance, proximity and exactness,
//! in that order of influence, matching the retrieval semantics the candidate
//! builder depends on. Filters are conjunctive pushdowns over level,
//! parent_id, admin_subtype and admin_id.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use vnap_common::models::{AdminLevel, AdminSubtype, AdminUnit};

use super::snapshot::{SearchDoc, Snapshot};
use crate::normalizer::normalize_name;

/// Conjunctive search filters.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub level: Option<AdminLevel>,
    pub parent_id: Option<String>,
    pub subtypes: Option<Vec<AdminSubtype>>,
    pub admin_id: Option<String>,
}

impl SearchFilter {
    fn accepts(&self, unit: &AdminUnit) -> bool {
        if let Some(level) = self.level {
            if unit.level != level {
                return false;
            }
        }
        if let Some(parent) = &self.parent_id {
            if unit.parent_id.as_deref() != Some(parent.as_str()) {
                return false;
            }
        }
        if let Some(subtypes) = &self.subtypes {
            if !subtypes.contains(&unit.admin_subtype) {
                return false;
            }
        }
        if let Some(id) = &self.admin_id {
            if unit.admin_id != *id {
                return false;
            }
        }
        true
    }
}

/// One ranked hit.
#[derive(Debug, Clone)]
pub struct ScoredUnit {
    pub unit: AdminUnit,
    pub score: f64,
}

/// Index configuration. Applying settings is idempotent; synonym changes
/// take effect atomically for subsequent queries.
#[derive(Debug, Clone)]
pub struct IndexSettings {
    pub searchable: Vec<String>,
    pub filterable: Vec<String>,
    pub sortable: Vec<String>,
    pub ranking_rules: Vec<String>,
    pub stop_words: Vec<String>,
    /// Alias phrase → canonical phrase
    pub synonyms: BTreeMap<String, String>,
    pub typo_enabled: bool,
    /// Minimum token length to allow one typo
    pub one_typo_min: usize,
    /// Minimum token length to allow two typos
    pub two_typo_min: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        let mut synonyms = BTreeMap::new();
        for (alias, canonical) in [
            ("tp", "thanh pho"),
            ("tp hcm", "thanh pho ho chi minh"),
            ("tphcm", "thanh pho ho chi minh"),
            ("hcm", "ho chi minh"),
            ("hcmc", "ho chi minh"),
            ("sai gon", "ho chi minh"),
            ("saigon", "ho chi minh"),
            ("sg", "ho chi minh"),
            ("hn", "ha noi"),
            ("hanoi", "ha noi"),
            ("danang", "da nang"),
            ("q", "quan"),
            ("p", "phuong"),
            ("brvt", "ba ria vung tau"),
        ] {
            synonyms.insert(alias.to_string(), canonical.to_string());
        }

        Self {
            searchable: vec![
                "name".into(),
                "normalized_name".into(),
                "aliases".into(),
                "path_normalized".into(),
            ],
            filterable: vec![
                "admin_id".into(),
                "level".into(),
                "parent_id".into(),
                "admin_subtype".into(),
            ],
            sortable: vec!["level".into(), "admin_id".into()],
            ranking_rules: vec![
                "words".into(),
                "typo".into(),
                "proximity".into(),
                "attribute".into(),
                "sort".into(),
                "exactness".into(),
            ],
            stop_words: ["cua", "va", "tai", "o", "trong"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            synonyms,
            typo_enabled: true,
            one_typo_min: 3,
            two_typo_min: 7,
        }
    }
}

/// The searchable gazetteer store. Snapshot swaps are atomic: readers clone
/// the Arc and keep the view they started with.
pub struct GazetteerIndex {
    snapshot: RwLock<Arc<Snapshot>>,
    settings: RwLock<Arc<IndexSettings>>,
}

impl Default for GazetteerIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl GazetteerIndex {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            settings: RwLock::new(Arc::new(IndexSettings::default())),
        }
    }

    /// Atomic snapshot replacement. **[APA-IDX-010]**
    pub async fn bulk_load(&self, units: Vec<AdminUnit>, version: &str) {
        let next = Arc::new(Snapshot::build(units, version));
        let count = next.len();
        *self.snapshot.write().await = next;
        tracing::info!(units = count, gazetteer_version = version, "Gazetteer snapshot loaded");
    }

    /// Idempotent settings application.
    pub async fn apply_settings(&self, settings: IndexSettings) {
        *self.settings.write().await = Arc::new(settings);
        tracing::debug!("Gazetteer index settings applied");
    }

    pub async fn settings(&self) -> Arc<IndexSettings> {
        self.settings.read().await.clone()
    }

    /// Liveness: a snapshot with at least one unit is resident.
    pub async fn health(&self) -> bool {
        !self.snapshot.read().await.is_empty()
    }

    pub async fn version(&self) -> String {
        self.snapshot.read().await.version().to_string()
    }

    pub async fn unit_count(&self) -> usize {
        self.snapshot.read().await.len()
    }

    /// Point lookup by admin_id.
    pub async fn get(&self, admin_id: &str) -> Option<AdminUnit> {
        self.snapshot.read().await.get(admin_id).cloned()
    }

    /// Ranked, filtered retrieval. An empty query returns filter matches in
    /// admin_id order with a neutral score.
    pub async fn search(&self, query: &str, filter: &SearchFilter, limit: usize) -> Vec<ScoredUnit> {
        let snapshot = self.snapshot.read().await.clone();
        let settings = self.settings.read().await.clone();

        let query_tokens = rewrite_query(query, &settings);

        let mut hits: Vec<ScoredUnit> = snapshot
            .iter()
            .filter(|(unit, _)| filter.accepts(unit))
            .filter_map(|(unit, doc)| {
                if query_tokens.is_empty() {
                    return Some(ScoredUnit {
                        unit: unit.clone(),
                        score: 1.0,
                    });
                }
                let score = rank(&query_tokens, doc, &settings);
                if score > 0.0 {
                    Some(ScoredUnit {
                        unit: unit.clone(),
                        score,
                    })
                } else {
                    None
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.unit.admin_id.cmp(&b.unit.admin_id))
        });
        hits.truncate(limit);
        hits
    }
}

/// Normalize, tokenize, drop stop words and fold synonyms into canonical
/// phrases. Multi-token synonym keys are matched longest-first.
fn rewrite_query(query: &str, settings: &IndexSettings) -> Vec<String> {
    let normalized = normalize_name(query);
    let tokens: Vec<&str> = normalized
        .split_whitespace()
        .filter(|t| !settings.stop_words.iter().any(|s| s == t))
        .collect();

    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    let mut i = 0;
    'outer: while i < tokens.len() {
        // Longest synonym key at this position wins (keys are 1-4 tokens)
        for span in (1..=4usize.min(tokens.len() - i)).rev() {
            let phrase = tokens[i..i + span].join(" ");
            if let Some(canonical) = settings.synonyms.get(&phrase) {
                out.extend(canonical.split(' ').map(str::to_string));
                i += span;
                continue 'outer;
            }
        }
        out.push(tokens[i].to_string());
        i += 1;
    }
    out
}

/// Score one document against the query tokens: the best field score,
/// weighted by field priority (attribute ranking).
fn rank(query: &[String], doc: &SearchDoc, settings: &IndexSettings) -> f64 {
    let mut best: f64 = 0.0;

    best = best.max(1.00 * field_score(query, &doc.name_tokens, settings));
    for alias in &doc.alias_tokens {
        best = best.max(0.95 * field_score(query, alias, settings));
    }
    best = best.max(0.90 * field_score(query, &doc.display_tokens, settings));
    best = best.max(0.60 * field_score(query, &doc.path_tokens, settings));

    best
}

/// Field score: token overlap with typo-discounted quality, field fit
/// (proximity proxy: how much of the field the query covers, in order) and
/// an exactness bonus.
fn field_score(query: &[String], field: &[String], settings: &IndexSettings) -> f64 {
    if field.is_empty() {
        return 0.0;
    }

    let mut matched_quality = 0.0;
    let mut matched_field_positions: Vec<usize> = Vec::new();

    for qt in query {
        let mut best_quality = 0.0;
        let mut best_pos = None;
        for (pos, ft) in field.iter().enumerate() {
            if qt == ft {
                best_quality = 1.0;
                best_pos = Some(pos);
                break;
            }
            if settings.typo_enabled {
                let allowance = typo_allowance(qt.chars().count(), settings);
                if allowance > 0 {
                    let dist = strsim::levenshtein(qt, ft);
                    if dist <= allowance {
                        let quality = 1.0 - 0.25 * dist as f64;
                        if quality > best_quality {
                            best_quality = quality;
                            best_pos = Some(pos);
                        }
                    }
                }
            }
        }
        matched_quality += best_quality;
        if let Some(pos) = best_pos {
            matched_field_positions.push(pos);
        }
    }

    if matched_field_positions.is_empty() {
        return 0.0;
    }

    let coverage = matched_quality / query.len() as f64;
    let mut unique_positions = matched_field_positions.clone();
    unique_positions.sort_unstable();
    unique_positions.dedup();
    let field_fit = unique_positions.len() as f64 / field.len() as f64;
    let in_order = matched_field_positions.windows(2).all(|w| w[0] < w[1]);
    let proximity = if in_order { 1.0 } else { 0.5 };
    let exact = if query == field { 1.0 } else { 0.0 };

    0.5 * coverage + 0.25 * field_fit * proximity + 0.05 * proximity + 0.2 * exact
}

fn typo_allowance(len: usize, settings: &IndexSettings) -> usize {
    if len >= settings.two_typo_min {
        2
    } else if len >= settings.one_typo_min {
        1
    } else {
        0
    }
}
