//! Deterministic raw → canonical normalization pipeline
//!
//! **[APA-NRM-010]** Nine ordered steps, each operating on the output of the
//! previous one:
//!
//! 1. Noise excision (phones, order codes, role prefixes) → residual
//! 2. Punctuation folding
//! 3. Case + diacritic stripping
//! 4. ASCII gating
//! 5. POI extraction
//! 6. Abbreviation expansion (context-gated, two-tier dictionary)
//! 7. Multilingual folding
//! 8. Disambiguation of `p`
//! 9. Structural pattern tagging
//!
//! The pipeline is pure and total: any input with at least one alphanumeric
//! character yields non-empty normalized text via the fallback chain.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use super::accents;
use super::dictionary::{
    self, ENGLISH_PREFIX, ENGLISH_SUFFIX, NGRAMS, POI_BUILDING, POI_COMPANY, POI_COMPLEX, UNIGRAMS,
};
use super::patterns::{self, Signals};

/// Admin-name slices recovered from the normalized text, used for per-level
/// retrieval queries and per-level similarity scoring.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminTokens {
    pub ward: Option<String>,
    pub district: Option<String>,
    pub province: Option<String>,
}

/// Complete normalization output for one request.
#[derive(Debug, Clone)]
pub struct NormalizedAddress {
    /// Lowercase, diacritic-free, abbreviation-expanded text
    pub normalized: String,
    pub signals: Signals,
    pub admin_tokens: AdminTokens,
    /// Street name recognized next to the house number, if any
    pub street: Option<String>,
    /// Normalized tokens not consumed by signals or admin phrases
    pub leftover: Vec<String>,
    /// `sha256:<hex>` over normalized text and gazetteer version
    pub fingerprint: String,
    /// Whether any multilingual fold was applied
    pub multilingual: bool,
}

/// The address text normalizer. Stateless; all pattern tables are static.
#[derive(Debug, Default)]
pub struct TextNormalizer;

static PHONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:\+84|0)[0-9]{8,11}\b").unwrap());
static ORDER_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Z]{2}[0-9]{6,}\b").unwrap());
static CT_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bctn?[0-9]+\b").unwrap());
static ROLE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:địa chỉ|dia chi|address|mr|ms)\s*:?\s+").unwrap());
static WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static P_DOT_NUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^p\.?([0-9]{1,2})$").unwrap());
static P_DOT_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^p\.([a-z]+)$").unwrap());
static P_ROOM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^p([0-9]{3,5})$").unwrap());
static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").unwrap());
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9]*$").unwrap());

impl TextNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize a raw address. Never fails; the fallback chain guarantees
    /// non-empty output for any input containing an alphanumeric character.
    pub fn normalize(&self, raw: &str, gazetteer_version: &str) -> NormalizedAddress {
        let mut residual = Vec::new();

        // Step 1: noise excision, collecting excised spans
        let after_noise = excise_noise(raw.trim(), &mut residual);

        // The first comma-separated segment often carries a free-form POI
        // ("Daikin Service, đường CN3, ..."); remember it before folding.
        let first_segment = after_noise
            .split([',', ';'])
            .next()
            .unwrap_or("")
            .to_string();

        // Steps 2-4: punctuation folding, diacritic strip, ASCII gate
        let folded = fold_punctuation(&after_noise);
        let stripped = accents::fold(&folded);
        let gated = ascii_gate(&stripped, false);

        if gated.is_empty() {
            return self.fallback(raw, residual, gazetteer_version);
        }

        // Step 5: POI extraction
        let first_segment_gated = ascii_gate(&accents::fold(&first_segment), false);
        let (tokens, poi) = extract_poi(tokenize(&gated), &first_segment_gated);

        // Step 6: abbreviation expansion
        let tokens = split_dotted_abbrevs(tokens);
        let tokens = expand_ngrams(tokens);
        let tokens = expand_unigrams(tokens);

        // Step 7: multilingual folding
        let (tokens, multilingual) = fold_english(tokens);

        // Step 8: p. disambiguation
        let tokens = disambiguate_p(tokens);

        let normalized = tokens.join(" ");
        let token_refs: Vec<&str> = tokens.iter().map(String::as_str).collect();

        // Step 9: structural pattern tagging
        let mut extraction = patterns::extract(&token_refs);
        extraction.signals.residual = residual;
        extraction.signals.poi = extraction.signals.poi.take().or(poi);

        // Admin phrase slicing for retrieval and scoring
        let (admin_tokens, phrase_mask) = slice_admin_phrases(&token_refs);

        let leftover: Vec<String> = token_refs
            .iter()
            .enumerate()
            .filter(|(i, _)| !extraction.claimed[*i] && !phrase_mask[*i])
            .map(|(_, t)| t.to_string())
            .collect();

        NormalizedAddress {
            fingerprint: fingerprint(&normalized, gazetteer_version),
            normalized,
            signals: extraction.signals,
            admin_tokens,
            street: extraction.street,
            leftover,
            multilingual,
        }
    }

    /// Relaxed fallback: lowercase + ASCII gate over the raw input; if that
    /// is also empty, the lowercased raw string verbatim.
    fn fallback(
        &self,
        raw: &str,
        residual: Vec<String>,
        gazetteer_version: &str,
    ) -> NormalizedAddress {
        let relaxed = ascii_gate(&accents::fold(raw), true);
        let normalized = if relaxed.is_empty() {
            raw.to_lowercase()
        } else {
            relaxed
        };
        let signals = Signals {
            residual,
            ..Default::default()
        };
        NormalizedAddress {
            fingerprint: fingerprint(&normalized, gazetteer_version),
            normalized,
            signals,
            admin_tokens: AdminTokens::default(),
            street: None,
            leftover: Vec::new(),
            multilingual: false,
        }
    }
}

/// `sha256:<64 hex>` over `normalized ∥ 0x1F ∥ gazetteer_version`.
pub fn fingerprint(normalized: &str, gazetteer_version: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hasher.update([0x1F]);
    hasher.update(gazetteer_version.as_bytes());
    format!("sha256:{:x}", hasher.finalize())
}

/// Normalize an admin unit name the same way request text is normalized:
/// diacritic-free, lowercase, whitespace-collapsed. Used at seed time.
pub fn normalize_name(name: &str) -> String {
    ascii_gate(&accents::fold(name), true)
}

fn excise_noise(input: &str, residual: &mut Vec<String>) -> String {
    let mut text = input.to_string();
    for re in [&*PHONE, &*ORDER_CODE, &*CT_CODE] {
        for m in re.find_iter(&text) {
            residual.push(m.as_str().to_string());
        }
        text = re.replace_all(&text, " ").into_owned();
    }
    ROLE_PREFIX.replace(&text, "").into_owned()
}

/// Collapse `–—,;:` runs to single spaces; fold `/ . -` to a space only when
/// not joining two alphanumerics, so `199/5`, `p.5` and `ql-1a` survive for
/// structural tagging.
fn fold_punctuation(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '–' | '—' | ',' | ';' | ':' => out.push(' '),
            '/' | '.' | '-' => {
                let prev_alnum = i > 0 && chars[i - 1].is_alphanumeric();
                let next_alnum = i + 1 < chars.len() && chars[i + 1].is_alphanumeric();
                if prev_alnum && next_alnum {
                    out.push(c);
                } else {
                    out.push(' ');
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Keep `[a-z0-9 /.-]` (or only `[a-z0-9 ]` in strict mode) and collapse
/// whitespace.
fn ascii_gate(input: &str, strict: bool) -> String {
    let kept: String = input
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' => c,
            '/' | '.' | '-' if !strict => c,
            _ => ' ',
        })
        .collect();
    WS.replace_all(kept.trim(), " ").into_owned()
}

fn tokenize(input: &str) -> Vec<String> {
    input.split_whitespace().map(str::to_string).collect()
}

/// Step 5: POI extraction. Vocabulary markers anywhere in the stream, plus
/// the leading-segment heuristic for unmarked organization names.
fn extract_poi(tokens: Vec<String>, first_segment: &str) -> (Vec<String>, Option<String>) {
    let mut tokens = tokens;
    let mut poi: Option<String> = None;

    // Marker-based capture (company, complex, building), first hit wins
    for (markers, cap) in [(POI_COMPANY, 4), (POI_COMPLEX, 3), (POI_BUILDING, 2)] {
        if poi.is_some() {
            break;
        }
        if let Some((span, captured)) = find_marker_capture(&tokens, markers, cap) {
            poi = Some(captured);
            tokens.drain(span.0..span.1);
        }
    }

    // Leading-segment heuristic: a short all-word first segment with no
    // admin keywords is an organization name ("Daikin Service")
    if poi.is_none() {
        let seg_tokens: Vec<&str> = first_segment.split_whitespace().collect();
        let looks_like_poi = !seg_tokens.is_empty()
            && seg_tokens.len() <= 4
            && seg_tokens
                .iter()
                .all(|t| WORD.is_match(t) && !dictionary::is_admin_keyword(t));
        if looks_like_poi && tokens.len() > seg_tokens.len() {
            let leads = tokens
                .iter()
                .take(seg_tokens.len())
                .map(String::as_str)
                .eq(seg_tokens.iter().copied());
            if leads {
                poi = Some(seg_tokens.join(" "));
                tokens.drain(..seg_tokens.len());
            }
        }
    }

    (tokens, poi)
}

/// Find the first marker phrase and capture a bounded run of following
/// word tokens.
fn find_marker_capture(
    tokens: &[String],
    markers: &[&str],
    cap: usize,
) -> Option<((usize, usize), String)> {
    for i in 0..tokens.len() {
        for marker in markers {
            let parts: Vec<&str> = marker.split(' ').collect();
            if i + parts.len() > tokens.len() {
                continue;
            }
            if !tokens[i..i + parts.len()]
                .iter()
                .map(String::as_str)
                .eq(parts.iter().copied())
            {
                continue;
            }
            let mut j = i + parts.len();
            let mut captured = Vec::new();
            while j < tokens.len() && captured.len() < cap {
                let t = &tokens[j];
                if dictionary::is_admin_keyword(t) || !t.chars().all(|c| c.is_alphanumeric()) {
                    break;
                }
                if DIGITS.is_match(t) && captured.is_empty() && parts[0] != "toa" {
                    break;
                }
                captured.push(t.clone());
                j += 1;
            }
            if !captured.is_empty() {
                let label = format!("{} {}", marker, captured.join(" "));
                return Some(((i, j), label));
            }
        }
    }
    None
}

/// Split dotted abbreviation forms (`q.3`, `tp.hcm`, `h.gia lam`) into the
/// abbreviation and its argument so the dictionary tiers can see them.
fn split_dotted_abbrevs(tokens: Vec<String>) -> Vec<String> {
    static DOTTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([a-z]{1,5})\.([a-z0-9]+)$").unwrap());
    let mut out = Vec::with_capacity(tokens.len());
    for tok in tokens {
        if let Some(caps) = DOTTED.captures(&tok) {
            if UNIGRAMS.iter().any(|(key, _, _)| *key == &caps[1]) {
                out.push(caps[1].to_string());
                out.push(caps[2].to_string());
                continue;
            }
        }
        out.push(tok);
    }
    out
}

/// Step 6a: multi-token abbreviation rewrite, longest key first per position.
fn expand_ngrams(tokens: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    'outer: while i < tokens.len() {
        for (key, replacement) in NGRAMS {
            let parts: Vec<&str> = key.split(' ').collect();
            if i + parts.len() <= tokens.len()
                && tokens[i..i + parts.len()]
                    .iter()
                    .map(String::as_str)
                    .eq(parts.iter().copied())
            {
                out.extend(replacement.split(' ').map(str::to_string));
                i += parts.len();
                continue 'outer;
            }
        }
        out.push(tokens[i].clone());
        i += 1;
    }
    out
}

/// Step 6b: unigram expansion with single-letter context gating.
fn expand_unigrams(tokens: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(tokens.len());
    for i in 0..tokens.len() {
        let tok = tokens[i].as_str();
        let next = tokens.get(i + 1).map(String::as_str);
        let replacement = UNIGRAMS.iter().find(|(key, _, _)| *key == tok);
        match replacement {
            Some((_, rep, gated)) if !gated => {
                out.extend(rep.split(' ').map(str::to_string));
            }
            Some((key, rep, _)) => {
                if single_letter_context_ok(key, next) {
                    out.extend(rep.split(' ').map(str::to_string));
                } else {
                    out.push(tok.to_string());
                }
            }
            None => out.push(tok.to_string()),
        }
    }
    out
}

/// Gate for single-letter expansions: the abbreviation must be followed by a
/// plausible name token. A bare `p` before a 3+ digit run is a room number
/// and is left for the disambiguation step.
fn single_letter_context_ok(key: &str, next: Option<&str>) -> bool {
    let Some(next) = next else {
        return false;
    };
    match key {
        "p" | "q" => {
            if DIGITS.is_match(next) {
                next.len() <= 2
            } else {
                WORD.is_match(next) && !dictionary::is_admin_keyword(next)
            }
        }
        "h" | "d" => WORD.is_match(next) && !dictionary::is_admin_keyword(next),
        _ => true,
    }
}

/// Step 7: English administrative nouns → canonical Vietnamese forms.
/// Prefix nouns keep their position (`ward 5` → `phuong 5`); suffix nouns
/// move in front of their name (`ho chi minh city` → `thanh pho ho chi minh`).
fn fold_english(tokens: Vec<String>) -> (Vec<String>, bool) {
    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    let mut folded = false;

    for tok in tokens {
        if let Some((_, vn)) = ENGLISH_PREFIX.iter().find(|(en, _)| *en == tok) {
            out.extend(vn.split(' ').map(str::to_string));
            folded = true;
            continue;
        }
        if let Some((_, vn)) = ENGLISH_SUFFIX.iter().find(|(en, _)| *en == tok) {
            // Pull back the name run this suffix belongs to (up to 4 words)
            let mut start = out.len();
            while start > 0
                && out.len() - start < 4
                && WORD.is_match(&out[start - 1])
                && !dictionary::is_admin_keyword(&out[start - 1])
            {
                start -= 1;
            }
            let name: Vec<String> = out.drain(start..).collect();
            out.extend(vn.split(' ').map(str::to_string));
            out.extend(name);
            folded = true;
            continue;
        }
        out.push(tok);
    }

    (out, folded)
}

/// Step 8: `p.` disambiguation. `p.<1-20>` and `p.<letters>` are wards,
/// `p <3-5 digits>` is a room.
fn disambiguate_p(tokens: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let tok = tokens[i].as_str();

        if let Some(caps) = P_DOT_NUM.captures(tok) {
            let n: u32 = caps[1].parse().unwrap_or(0);
            if (1..=20).contains(&n) {
                out.push("phuong".to_string());
                out.push(caps[1].to_string());
                i += 1;
                continue;
            }
        }
        if let Some(caps) = P_DOT_WORD.captures(tok) {
            out.push("phuong".to_string());
            out.push(caps[1].to_string());
            i += 1;
            continue;
        }
        if let Some(caps) = P_ROOM.captures(tok) {
            out.push("phong".to_string());
            out.push(caps[1].to_string());
            i += 1;
            continue;
        }
        if tok == "p" {
            if let Some(next) = tokens.get(i + 1) {
                if DIGITS.is_match(next) && (3..=5).contains(&next.len()) {
                    out.push("phong".to_string());
                    out.push(next.clone());
                    i += 2;
                    continue;
                }
            }
        }

        out.push(tok.to_string());
        i += 1;
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhraseKind {
    Ward,
    District,
    City,
    Province,
}

struct Phrase {
    kind: PhraseKind,
    name: String,
    span: (usize, usize),
}

/// Slice admin-name phrases out of the normalized token stream:
/// "phuong X", "quan|huyen|thi xa|thi tran X", "thanh pho X", "tinh X".
/// The rightmost city/tinh phrase is the province; a city phrase displaced
/// by a trailing province tail is a city-under-province (district tier).
fn slice_admin_phrases(tokens: &[&str]) -> (AdminTokens, Vec<bool>) {
    let mut phrases: Vec<Phrase> = Vec::new();
    let mut mask = vec![false; tokens.len()];

    // A trailing country mention is not an admin phrase; claim it so it
    // neither pollutes the province slice nor lands in the residual
    let mut len = tokens.len();
    if len >= 2 && tokens[len - 2] == "viet" && tokens[len - 1] == "nam" {
        mask[len - 2] = true;
        mask[len - 1] = true;
        len -= 2;
    } else if len >= 1 && matches!(tokens[len - 1], "vietnam" | "vn") {
        mask[len - 1] = true;
        len -= 1;
    }
    let tokens = &tokens[..len];

    let keyword_at = |i: usize| -> Option<(PhraseKind, usize)> {
        match tokens[i] {
            "thanh" if tokens.get(i + 1) == Some(&"pho") => Some((PhraseKind::City, 2)),
            "thi" if tokens.get(i + 1) == Some(&"xa") => Some((PhraseKind::District, 2)),
            "thi" if tokens.get(i + 1) == Some(&"tran") => Some((PhraseKind::District, 2)),
            "quan" | "huyen" => Some((PhraseKind::District, 1)),
            "phuong" | "xa" => Some((PhraseKind::Ward, 1)),
            "tinh" => Some((PhraseKind::Province, 1)),
            _ => None,
        }
    };

    let mut i = 0;
    while i < tokens.len() {
        let Some((kind, kw_len)) = keyword_at(i) else {
            i += 1;
            continue;
        };
        let mut j = i + kw_len;
        let mut name = Vec::new();
        while j < tokens.len() && name.len() < 3 {
            if keyword_at(j).is_some() {
                break;
            }
            name.push(tokens[j]);
            j += 1;
        }
        if !name.is_empty() {
            for slot in mask.iter_mut().take(j).skip(i) {
                *slot = true;
            }
            phrases.push(Phrase {
                kind,
                name: name.join(" "),
                span: (i, j),
            });
            i = j;
        } else {
            i += kw_len;
        }
    }

    // Unconsumed tail after the last phrase: often an unmarked province name
    let tail_start = phrases.last().map(|p| p.span.1).unwrap_or(tokens.len());
    let tail: Vec<&str> = tokens[tail_start..]
        .iter()
        .filter(|t| WORD.is_match(t))
        .copied()
        .collect();

    let mut admin = AdminTokens::default();

    admin.ward = phrases
        .iter()
        .find(|p| p.kind == PhraseKind::Ward)
        .map(|p| p.name.clone());

    admin.province = phrases
        .iter()
        .rev()
        .find(|p| p.kind == PhraseKind::Province)
        .map(|p| p.name.clone());

    let mut province_city_span: Option<(usize, usize)> = None;
    if admin.province.is_none() {
        if !tail.is_empty() {
            let take = tail.len().min(3);
            admin.province = Some(tail[tail.len() - take..].join(" "));
            let claim_from = tokens.len() - take;
            for slot in mask.iter_mut().skip(claim_from) {
                *slot = true;
            }
        } else if let Some(city) = phrases.iter().rev().find(|p| p.kind == PhraseKind::City) {
            admin.province = Some(city.name.clone());
            province_city_span = Some(city.span);
        }
    }

    admin.district = phrases
        .iter()
        .find(|p| p.kind == PhraseKind::District)
        .map(|p| p.name.clone())
        .or_else(|| {
            phrases
                .iter()
                .find(|p| p.kind == PhraseKind::City && Some(p.span) != province_city_span)
                .map(|p| p.name.clone())
        });

    (admin, mask)
}
