//! Hierarchical candidate path builder
//!
//! **[APA-CND-010]** Province-first retrieval: the rightmost-is-province
//! convention in Vietnamese postal strings lets each level prune the next, so
//! the search space stays quadratic in per-level top-K instead of exponential
//! in the text. Per-province and per-district queries run concurrently with a
//! bounded fan-out; the overall request deadline is checked between levels
//! and partial results are kept rather than discarded.

use std::sync::Arc;
use tokio::time::Instant;

use futures::stream::{self, StreamExt};
use vnap_common::config::{ParserConfig, TopK};
use vnap_common::models::{AdminSubtype, AdminUnit};

use crate::gazetteer::{GazetteerIndex, SearchFilter};
use crate::normalizer::AdminTokens;

/// The scoring unit: an admissible ward ⊂ district ⊂ province path. The ward
/// is absent for district-level paths (no ward survived filtering, or the
/// request asked for three levels).
#[derive(Debug, Clone)]
pub struct CandidatePath {
    pub ward: Option<AdminUnit>,
    pub district: AdminUnit,
    pub province: AdminUnit,
}

impl CandidatePath {
    /// Dedup key over the admin_id tuple.
    pub fn key(&self) -> String {
        format!(
            "{}>{}>{}",
            self.ward.as_ref().map(|w| w.admin_id.as_str()).unwrap_or("-"),
            self.district.admin_id,
            self.province.admin_id
        )
    }

    /// Hierarchy invariant: each member's parent_id links to the next level.
    pub fn is_valid(&self) -> bool {
        let district_ok = self.district.parent_id.as_deref() == Some(self.province.admin_id.as_str());
        match &self.ward {
            Some(ward) => {
                district_ok && ward.parent_id.as_deref() == Some(self.district.admin_id.as_str())
            }
            None => district_ok,
        }
    }

    /// Concatenated normalized names, for road/POI bonus checks.
    pub fn normalized_text(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if let Some(ward) = &self.ward {
            parts.push(ward.normalized_name.as_str());
        }
        parts.push(self.district.normalized_name.as_str());
        parts.push(self.province.normalized_name.as_str());
        parts.join(" ")
    }
}

/// Builds admissible candidate paths from the gazetteer index.
pub struct CandidateBuilder {
    index: Arc<GazetteerIndex>,
    topk: TopK,
    fan_out: usize,
    max_paths: usize,
}

impl CandidateBuilder {
    pub fn new(index: Arc<GazetteerIndex>, config: &ParserConfig) -> Self {
        Self {
            index,
            topk: config.topk.clone(),
            fan_out: config.parser.query_fan_out,
            max_paths: 20,
        }
    }

    /// Produce up to N admissible paths. `levels = 3` stops at districts.
    ///
    /// **[APA-CND-020]** Partial results already in hand when the deadline
    /// expires are returned, not discarded.
    pub async fn build(
        &self,
        normalized: &str,
        admin: &AdminTokens,
        levels: u8,
        deadline: Instant,
    ) -> Vec<CandidatePath> {
        let province_query = admin.province.as_deref().unwrap_or(normalized);
        let provinces = self
            .index
            .search(
                province_query,
                &SearchFilter {
                    subtypes: Some(AdminSubtype::PROVINCE_TIER.to_vec()),
                    ..Default::default()
                },
                self.topk.topk_province,
            )
            .await;

        if provinces.is_empty() || Instant::now() >= deadline {
            return Vec::new();
        }

        // Districts per province, bounded fan-out, order-preserving. With no
        // district phrase in the text, every district of the province stays
        // admissible (the ward tier can still disambiguate), so the text
        // hits are topped up with a filter-only sweep.
        let district_query = admin.district.as_deref().unwrap_or(normalized).to_string();
        let sweep_districts = admin.district.is_none();
        let district_sets: Vec<(AdminUnit, Vec<AdminUnit>)> = stream::iter(
            provinces.into_iter().map(|p| {
                let index = self.index.clone();
                let query = district_query.clone();
                let limit = self.topk.topk_district;
                async move {
                    let filter = SearchFilter {
                        parent_id: Some(p.unit.admin_id.clone()),
                        subtypes: Some(AdminSubtype::DISTRICT_TIER.to_vec()),
                        ..Default::default()
                    };
                    let mut districts: Vec<AdminUnit> = index
                        .search(&query, &filter, limit)
                        .await
                        .into_iter()
                        .map(|h| h.unit)
                        .collect();
                    if sweep_districts {
                        for hit in index.search("", &filter, limit).await {
                            if districts.len() >= limit {
                                break;
                            }
                            if !districts.iter().any(|d| d.admin_id == hit.unit.admin_id) {
                                districts.push(hit.unit);
                            }
                        }
                    }
                    (p.unit, districts)
                }
            }),
        )
        .buffered(self.fan_out)
        .collect()
        .await;

        let mut paths = Vec::new();

        if levels >= 4 && Instant::now() < deadline {
            let ward_query = admin.ward.as_deref().unwrap_or(normalized).to_string();
            let pairs: Vec<(AdminUnit, AdminUnit)> = district_sets
                .iter()
                .flat_map(|(p, ds)| ds.iter().map(move |d| (p.clone(), d.clone())))
                .collect();

            let ward_sets: Vec<(AdminUnit, AdminUnit, Vec<AdminUnit>)> =
                stream::iter(pairs.into_iter().map(|(p, d)| {
                    let index = self.index.clone();
                    let query = ward_query.clone();
                    let limit = self.topk.topk_ward;
                    async move {
                        let hits = index
                            .search(
                                &query,
                                &SearchFilter {
                                    parent_id: Some(d.admin_id.clone()),
                                    subtypes: Some(AdminSubtype::WARD_TIER.to_vec()),
                                    ..Default::default()
                                },
                                limit,
                            )
                            .await;
                        (p, d, hits.into_iter().map(|h| h.unit).collect())
                    }
                }))
                .buffered(self.fan_out)
                .collect()
                .await;

            for (province, district, wards) in ward_sets {
                if wards.is_empty() {
                    // District-level path: ward absent (partial-match policy)
                    paths.push(CandidatePath {
                        ward: None,
                        district,
                        province,
                    });
                } else {
                    for ward in wards {
                        paths.push(CandidatePath {
                            ward: Some(ward),
                            district: district.clone(),
                            province: province.clone(),
                        });
                    }
                }
            }
        } else {
            for (province, districts) in district_sets {
                for district in districts {
                    paths.push(CandidatePath {
                        ward: None,
                        district,
                        province: province.clone(),
                    });
                }
            }
        }

        // Enforce hierarchy invariants, dedup on the admin_id tuple, cap at N
        let mut seen = std::collections::HashSet::new();
        paths.retain(|p| p.is_valid() && seen.insert(p.key()));
        paths.truncate(self.max_paths);

        tracing::debug!(paths = paths.len(), "Candidate paths assembled");
        paths
    }
}
