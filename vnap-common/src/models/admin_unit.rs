//! Gazetteer entity: the four-level Vietnamese administrative hierarchy
//!
//! **[APA-MDL-010]** AdminUnits are immutable within a gazetteer version;
//! a new version replaces the whole set atomically.

use serde::{Deserialize, Serialize};

/// Administrative level: country → province → district → ward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum AdminLevel {
    Country,
    Province,
    District,
    Ward,
}

impl AdminLevel {
    pub fn as_u8(self) -> u8 {
        match self {
            AdminLevel::Country => 1,
            AdminLevel::Province => 2,
            AdminLevel::District => 3,
            AdminLevel::Ward => 4,
        }
    }
}

impl TryFrom<u8> for AdminLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(AdminLevel::Country),
            2 => Ok(AdminLevel::Province),
            3 => Ok(AdminLevel::District),
            4 => Ok(AdminLevel::Ward),
            other => Err(format!("invalid admin level: {}", other)),
        }
    }
}

impl From<AdminLevel> for u8 {
    fn from(level: AdminLevel) -> Self {
        level.as_u8()
    }
}

/// Administrative subtype, partitioned by level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminSubtype {
    Country,
    Province,
    Municipality,
    UrbanDistrict,
    RuralDistrict,
    CityUnderProvince,
    Town,
    Ward,
    Commune,
    Township,
}

impl AdminSubtype {
    /// The level this subtype belongs to. Subtypes partition levels:
    /// a unit's subtype must agree with its level.
    pub fn level(self) -> AdminLevel {
        match self {
            AdminSubtype::Country => AdminLevel::Country,
            AdminSubtype::Province | AdminSubtype::Municipality => AdminLevel::Province,
            AdminSubtype::UrbanDistrict
            | AdminSubtype::RuralDistrict
            | AdminSubtype::CityUnderProvince
            | AdminSubtype::Town => AdminLevel::District,
            AdminSubtype::Ward | AdminSubtype::Commune | AdminSubtype::Township => AdminLevel::Ward,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AdminSubtype::Country => "country",
            AdminSubtype::Province => "province",
            AdminSubtype::Municipality => "municipality",
            AdminSubtype::UrbanDistrict => "urban_district",
            AdminSubtype::RuralDistrict => "rural_district",
            AdminSubtype::CityUnderProvince => "city_under_province",
            AdminSubtype::Town => "town",
            AdminSubtype::Ward => "ward",
            AdminSubtype::Commune => "commune",
            AdminSubtype::Township => "township",
        }
    }

    /// Subtypes admissible at the province tier of a candidate path.
    pub const PROVINCE_TIER: [AdminSubtype; 2] =
        [AdminSubtype::Province, AdminSubtype::Municipality];

    /// Subtypes admissible at the district tier of a candidate path.
    pub const DISTRICT_TIER: [AdminSubtype; 4] = [
        AdminSubtype::UrbanDistrict,
        AdminSubtype::RuralDistrict,
        AdminSubtype::CityUnderProvince,
        AdminSubtype::Town,
    ];

    /// Subtypes admissible at the ward tier of a candidate path.
    pub const WARD_TIER: [AdminSubtype; 3] =
        [AdminSubtype::Ward, AdminSubtype::Commune, AdminSubtype::Township];
}

/// A node in the versioned administrative gazetteer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminUnit {
    /// Stable identifier, unique across versions
    pub admin_id: String,
    /// Parent unit id; the country has none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Hierarchy level
    pub level: AdminLevel,
    /// Subtype, consistent with `level`
    pub admin_subtype: AdminSubtype,
    /// Original name with diacritics
    pub name: String,
    /// Diacritic-free lowercase space-separated name
    pub normalized_name: String,
    /// Alternative surface forms: abbreviations, historical names
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Ancestor admin_ids ending with self; `path.len() == level`
    #[serde(default)]
    pub path: Vec<String>,
    /// Normalized names parallel to `path`
    #[serde(default)]
    pub path_normalized: Vec<String>,
    /// Opaque snapshot token supplied by the seeding caller
    #[serde(default)]
    pub gazetteer_version: String,
}

impl AdminUnit {
    /// Validate the structural invariants of a single unit. Returns the list
    /// of violations; empty means the unit is well-formed.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.admin_id.is_empty() {
            problems.push("missing admin_id".to_string());
        }
        if self.name.is_empty() {
            problems.push(format!("{}: missing name", self.admin_id));
        }
        if self.admin_subtype.level() != self.level {
            problems.push(format!(
                "{}: subtype {} inconsistent with level {}",
                self.admin_id,
                self.admin_subtype.as_str(),
                self.level.as_u8()
            ));
        }
        if self.path.len() != self.level.as_u8() as usize {
            problems.push(format!(
                "{}: path length {} != level {}",
                self.admin_id,
                self.path.len(),
                self.level.as_u8()
            ));
        }
        if self.path.last().map(String::as_str) != Some(self.admin_id.as_str()) {
            problems.push(format!("{}: path does not end with self", self.admin_id));
        }
        match (&self.parent_id, self.path.len()) {
            (Some(parent), n) if n >= 2 => {
                if self.path[n - 2] != *parent {
                    problems.push(format!(
                        "{}: parent_id {} does not match path[-2]",
                        self.admin_id, parent
                    ));
                }
            }
            (Some(parent), _) => {
                problems.push(format!(
                    "{}: parent_id {} set but path too short",
                    self.admin_id, parent
                ));
            }
            (None, _) if self.level != AdminLevel::Country => {
                problems.push(format!("{}: non-country unit without parent", self.admin_id));
            }
            _ => {}
        }

        problems
    }
}
