//! Structural pattern tagging
//!
//! **[APA-NRM-090]** Final pipeline stage: recognize house numbers, road
//! codes, alleys, units/floors and locality numerics in the normalized token
//! stream and tag them into `Signals`. Tagging is token-based with
//! neighbor context rather than whole-string regex so that a ward number
//! (`phuong 5`) is never mistaken for a house number.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::dictionary::is_admin_keyword;

/// Numbered-road class recognized in Vietnamese addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoadType {
    Ql,
    Dt,
    Tl,
    Hl,
    Dh,
}

impl RoadType {
    pub fn as_str(self) -> &'static str {
        match self {
            RoadType::Ql => "ql",
            RoadType::Dt => "dt",
            RoadType::Tl => "tl",
            RoadType::Hl => "hl",
            RoadType::Dh => "dh",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "ql" => Some(RoadType::Ql),
            "dt" => Some(RoadType::Dt),
            "tl" => Some(RoadType::Tl),
            "hl" => Some(RoadType::Hl),
            "dh" => Some(RoadType::Dh),
            _ => None,
        }
    }
}

/// Structural fragments extracted per request. Not persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Signals {
    pub house_number: Option<String>,
    pub alley_number: Option<String>,
    pub alley_name: Option<String>,
    pub unit: Option<String>,
    pub floor: Option<String>,
    pub poi: Option<String>,
    pub road_type: Option<RoadType>,
    pub road_code: Option<String>,
    /// Noise that was cut during normalization: phone numbers, order codes
    pub residual: Vec<String>,
}

impl Signals {
    /// True when any house-level or street-level fragment was recovered.
    pub fn has_house_or_street(&self, street: &Option<String>) -> bool {
        self.house_number.is_some()
            || self.road_code.is_some()
            || self.alley_number.is_some()
            || street.is_some()
    }
}

/// Extraction output: signals, a street name if one was recognized, and the
/// per-token claim mask used later for residual computation.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub signals: Signals,
    pub street: Option<String>,
    pub claimed: Vec<bool>,
}

static NUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").unwrap());
static HOUSE_NUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+(?:[/-][0-9]+)*$").unwrap());
static NV_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^nv[0-9]+(?:-[0-9]+)?$").unwrap());
static ROAD_NUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+[a-z]?$").unwrap());
static FUSED_ROAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(ql|dt|tl|hl|dh)([0-9]+[a-z]?)$").unwrap());
static ALNUM_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9.-]+$").unwrap());
static ALPHA: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9]*$").unwrap());

/// Run structural extraction over the normalized token stream.
pub fn extract(tokens: &[&str]) -> Extraction {
    let mut ex = Extraction {
        claimed: vec![false; tokens.len()],
        ..Default::default()
    };

    let is_num = |t: &str| NUM.is_match(t);

    let mut i = 0;
    while i < tokens.len() {
        if ex.claimed[i] {
            i += 1;
            continue;
        }
        let tok = tokens[i];
        let next = tokens.get(i + 1).copied().filter(|_| !ex.claimed[i + 1]);

        // Apartment / unit / floor (high priority)
        if tok == "can" && next == Some("ho") {
            if let Some(n) = tokens.get(i + 2).filter(|t| HOUSE_NUM.is_match(t)) {
                ex.signals.unit = Some((*n).to_string());
                claim(&mut ex.claimed, i, 3);
                i += 3;
                continue;
            }
        }
        if tok == "ch" {
            if let Some(n) = next.filter(|t| HOUSE_NUM.is_match(t)) {
                ex.signals.unit = Some(n.to_string());
                claim(&mut ex.claimed, i, 2);
                i += 2;
                continue;
            }
        }
        if (tok == "tang" || tok == "lau") && next.map_or(false, is_num) {
            ex.signals.floor = Some(next.unwrap().to_string());
            claim(&mut ex.claimed, i, 2);
            i += 2;
            continue;
        }
        if tok == "van" && next == Some("phong") {
            if let Some(n) = tokens.get(i + 2).filter(|t| NUM.is_match(t)) {
                ex.signals.unit = Some((*n).to_string());
                claim(&mut ex.claimed, i, 3);
                i += 3;
                continue;
            }
        }
        if tok == "phong" && next.map_or(false, is_num) {
            ex.signals.unit = Some(next.unwrap().to_string());
            claim(&mut ex.claimed, i, 2);
            i += 2;
            continue;
        }

        // Road codes: `ql 1a`, `dt743`, ...
        if let Some(rt) = RoadType::parse(tok) {
            if let Some(code) = next.filter(|t| ROAD_NUM.is_match(t)) {
                ex.signals.road_type = Some(rt);
                ex.signals.road_code = Some(code.to_string());
                claim(&mut ex.claimed, i, 2);
                i += 2;
                continue;
            }
        }
        if let Some(caps) = FUSED_ROAD.captures(tok) {
            ex.signals.road_type = RoadType::parse(&caps[1]);
            ex.signals.road_code = Some(caps[2].to_string());
            claim(&mut ex.claimed, i, 1);
            i += 1;
            continue;
        }

        // Alleys
        if matches!(tok, "hem" | "ngo" | "ngach" | "kiet") {
            if let Some(n) = next.filter(|t| HOUSE_NUM.is_match(t)) {
                ex.signals.alley_number = Some(n.to_string());
                claim(&mut ex.claimed, i, 2);
                i += 2;
                continue;
            }
            // Named alley: capture a short run of word tokens
            let mut name = Vec::new();
            let mut j = i + 1;
            while j < tokens.len() && name.len() < 3 {
                let t = tokens[j];
                if ex.claimed[j] || is_admin_keyword(t) || !ALPHA.is_match(t) {
                    break;
                }
                name.push(t);
                j += 1;
            }
            if !name.is_empty() {
                ex.signals.alley_name = Some(name.join(" "));
                claim(&mut ex.claimed, i, 1 + name.len());
                i = j;
                continue;
            }
        }

        // House numbers: `so 199`, leading `72`, `199/5`, `nv12`, `lo a3-b4`
        if ex.signals.house_number.is_none() {
            if tok == "so" {
                if let Some(n) = next.filter(|t| HOUSE_NUM.is_match(t)) {
                    ex.signals.house_number = Some(n.to_string());
                    claim(&mut ex.claimed, i, 2);
                    i += 2;
                    continue;
                }
            }
            let preceded_by_keyword = i > 0 && is_admin_keyword(tokens[i - 1]);
            if !preceded_by_keyword
                && HOUSE_NUM.is_match(tok)
                && (i == 0 || tok.contains('/'))
            {
                ex.signals.house_number = Some(tok.to_string());
                claim(&mut ex.claimed, i, 1);
                i += 1;
                continue;
            }
            if NV_CODE.is_match(tok) {
                ex.signals.house_number = Some(tok.to_string());
                claim(&mut ex.claimed, i, 1);
                i += 1;
                continue;
            }
            if tok == "lo" {
                if let Some(code) = next.filter(|t| ALNUM_CODE.is_match(t) && *t != "lo") {
                    ex.signals.house_number = Some(format!("lo {}", code));
                    claim(&mut ex.claimed, i, 2);
                    i += 2;
                    continue;
                }
            }
        }

        // Locality numerics: khu pho / to / ap / thon / xom N. Tagged (and
        // claimed, so they never leak into the residual) but carried in the
        // normalized text for retrieval.
        if matches!(tok, "to" | "ap" | "thon" | "xom") && next.map_or(false, is_num) {
            claim(&mut ex.claimed, i, 2);
            i += 2;
            continue;
        }
        if tok == "khu" && next == Some("pho") {
            if tokens.get(i + 2).map_or(false, |t| NUM.is_match(t)) {
                claim(&mut ex.claimed, i, 3);
                i += 3;
                continue;
            }
        }

        i += 1;
    }

    extract_street(tokens, &mut ex);
    ex
}

/// Street recognition: an explicit `duong <name>` phrase, otherwise the word
/// run following the house number up to the first admin keyword.
fn extract_street(tokens: &[&str], ex: &mut Extraction) {
    // Explicit marker
    for i in 0..tokens.len() {
        if tokens[i] == "duong" && !ex.claimed[i] {
            let mut name = Vec::new();
            let mut j = i + 1;
            while j < tokens.len() && name.len() < 4 {
                let t = tokens[j];
                if ex.claimed[j] || is_admin_keyword(t) || NUM.is_match(t) {
                    break;
                }
                if !ALNUM_CODE.is_match(t) {
                    break;
                }
                name.push(t);
                j += 1;
            }
            if !name.is_empty() {
                ex.street = Some(name.join(" "));
                claim(&mut ex.claimed, i, 1 + name.len());
                return;
            }
        }
    }

    // Implicit: words right after the house number
    let Some(house) = &ex.signals.house_number else {
        return;
    };
    let Some(pos) = tokens.iter().position(|t| *t == house) else {
        return;
    };
    let mut name = Vec::new();
    let mut j = pos + 1;
    while j < tokens.len() && name.len() < 4 {
        let t = tokens[j];
        if ex.claimed[j] || is_admin_keyword(t) || NUM.is_match(t) || !ALPHA.is_match(t) {
            break;
        }
        name.push((j, t));
        j += 1;
    }
    if !name.is_empty() {
        ex.street = Some(name.iter().map(|(_, t)| *t).collect::<Vec<_>>().join(" "));
        for (idx, _) in name {
            ex.claimed[idx] = true;
        }
    }
}

fn claim(mask: &mut [bool], start: usize, len: usize) {
    for slot in mask.iter_mut().skip(start).take(len) {
        *slot = true;
    }
}
