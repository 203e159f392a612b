//! Abbreviation and translation dictionaries for the normalizer
//!
//! **[APA-NRM-060]** Two-tier expansion: ngrams run before unigrams so
//! `tp hcm` is rewritten as a whole before a bare `tp` would fire. Expansion
//! of single letters is context-gated by the pipeline to avoid false
//! positives (a bare `p` before a long digit run is a room, not a ward).

/// Multi-token abbreviations, checked longest-first at each position.
/// Both sides are diacritic-free lowercase token sequences.
pub const NGRAMS: &[(&str, &str)] = &[
    ("tp hcm", "thanh pho ho chi minh"),
    ("tp ho chi minh", "thanh pho ho chi minh"),
    ("t p", "thanh pho"),
    ("khu pho", "khu pho"),
    ("khu cong nghiep", "khu cong nghiep"),
    ("khu do thi", "khu do thi"),
    ("khu dan cu", "khu dan cu"),
    ("thi xa", "thi xa"),
    ("thi tran", "thi tran"),
];

/// Single-token abbreviations. The bool marks entries that are single
/// letters and therefore require context gating before expansion.
pub const UNIGRAMS: &[(&str, &str, bool)] = &[
    // Administrative levels
    ("tp", "thanh pho", false),
    ("tphcm", "thanh pho ho chi minh", false),
    ("hcm", "ho chi minh", false),
    ("hcmc", "ho chi minh", false),
    ("q", "quan", true),
    ("p", "phuong", true),
    ("px", "phuong", false),
    ("tx", "thi xa", false),
    ("tt", "thi tran", false),
    ("ttg", "thi tran", false),
    ("h", "huyen", true),
    // Street types
    ("d", "duong", true),
    ("dg", "duong", false),
    ("dl", "dai lo", false),
    // Locality / building
    ("kdc", "khu dan cu", false),
    ("kdt", "khu do thi", false),
    ("kcn", "khu cong nghiep", false),
    ("kp", "khu pho", false),
    ("cc", "chung cu", false),
    ("vh", "van phong", false),
    // Business entities
    ("cty", "cong ty", false),
    ("tnhh", "trach nhiem huu han", false),
    ("bv", "benh vien", false),
    ("nh", "ngan hang", false),
    ("st", "sieu thi", false),
    ("ks", "khach san", false),
    // Well-known place shorthands
    ("hn", "ha noi", false),
    ("brvt", "ba ria vung tau", false),
];

/// English administrative nouns that precede their name (`ward 5`).
pub const ENGLISH_PREFIX: &[(&str, &str)] = &[("ward", "phuong"), ("district", "quan")];

/// English administrative nouns that follow their name (`Ho Chi Minh City`):
/// the Vietnamese form moves in front of the name.
pub const ENGLISH_SUFFIX: &[(&str, &str)] = &[
    ("city", "thanh pho"),
    ("province", "tinh"),
    ("street", "duong"),
    ("road", "duong"),
    ("avenue", "dai lo"),
];

/// Company / organization POI markers (one or two tokens).
pub const POI_COMPANY: &[&str] = &[
    "cong ty",
    "cty",
    "ngan hang",
    "benh vien",
    "trung tam",
    "truong",
    "sieu thi",
    "khach san",
];

/// Building POI markers followed by a short code.
pub const POI_BUILDING: &[&str] = &["tower", "block", "toa", "suite"];

/// Complex / zone POI markers.
pub const POI_COMPLEX: &[&str] = &[
    "vinhomes",
    "royal city",
    "somerset",
    "vcci",
    "kcn",
    "kdc",
    "kdt",
    "khu cong nghiep",
    "khu dan cu",
    "khu do thi",
];

/// Admin keywords that terminate a free-text capture (POI, street, phrase).
pub const ADMIN_KEYWORDS: &[&str] = &[
    "phuong", "quan", "huyen", "xa", "tinh", "thanh", "pho", "thi", "tran", "duong", "so", "hem",
    "ngo", "ngach", "kiet", "khu", "to", "ap", "thon", "xom", "ql", "dt", "tl", "hl", "dh",
    "tang", "lau", "phong",
];

/// Whether a token terminates a free-text capture.
pub fn is_admin_keyword(token: &str) -> bool {
    ADMIN_KEYWORDS.contains(&token)
}
