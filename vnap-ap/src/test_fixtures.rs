//! Gazetteer seed fixtures shared by unit and integration tests

use vnap_common::models::{AdminLevel, AdminSubtype, AdminUnit};

fn unit(
    admin_id: &str,
    parent_id: Option<&str>,
    level: AdminLevel,
    admin_subtype: AdminSubtype,
    name: &str,
    normalized_name: &str,
    aliases: &[&str],
    path: &[&str],
    path_normalized: &[&str],
) -> AdminUnit {
    AdminUnit {
        admin_id: admin_id.to_string(),
        parent_id: parent_id.map(str::to_string),
        level,
        admin_subtype,
        name: name.to_string(),
        normalized_name: normalized_name.to_string(),
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
        path: path.iter().map(|p| p.to_string()).collect(),
        path_normalized: path_normalized.iter().map(|p| p.to_string()).collect(),
        gazetteer_version: String::new(),
    }
}

/// A small but structurally complete gazetteer: three provinces, five
/// districts, six wards, including a ward name ("Phường 5") that repeats
/// across districts to exercise ambiguity handling.
pub fn seed_units() -> Vec<AdminUnit> {
    use AdminLevel as L;
    use AdminSubtype as S;

    vec![
        unit("84", None, L::Country, S::Country, "Việt Nam", "viet nam", &["vietnam", "vn"], &["84"], &["viet nam"]),
        // Provinces / municipalities
        unit("01", Some("84"), L::Province, S::Municipality, "Thành phố Hà Nội", "ha noi", &["hn", "hanoi"], &["84", "01"], &["viet nam", "ha noi"]),
        unit("79", Some("84"), L::Province, S::Municipality, "Thành phố Hồ Chí Minh", "ho chi minh", &["tphcm", "hcm", "sai gon", "sg"], &["84", "79"], &["viet nam", "ho chi minh"]),
        unit("22", Some("84"), L::Province, S::Province, "Tỉnh Quảng Ninh", "quang ninh", &["qn"], &["84", "22"], &["viet nam", "quang ninh"]),
        // Districts
        unit("01-004", Some("01"), L::District, S::UrbanDistrict, "Quận Long Biên", "long bien", &[], &["84", "01", "01-004"], &["viet nam", "ha noi", "long bien"]),
        unit("01-021", Some("01"), L::District, S::UrbanDistrict, "Quận Bắc Từ Liêm", "bac tu liem", &[], &["84", "01", "01-021"], &["viet nam", "ha noi", "bac tu liem"]),
        unit("79-760", Some("79"), L::District, S::UrbanDistrict, "Quận 5", "5", &["quan 5"], &["84", "79", "79-760"], &["viet nam", "ho chi minh", "5"]),
        unit("79-776", Some("79"), L::District, S::UrbanDistrict, "Quận 8", "8", &["quan 8"], &["84", "79", "79-776"], &["viet nam", "ho chi minh", "8"]),
        unit("22-193", Some("22"), L::District, S::CityUnderProvince, "Thành phố Móng Cái", "mong cai", &[], &["84", "22", "22-193"], &["viet nam", "quang ninh", "mong cai"]),
        // Wards
        unit("01-004-00127", Some("01-004"), L::Ward, S::Ward, "Phường Bồ Đề", "bo de", &[], &["84", "01", "01-004", "01-004-00127"], &["viet nam", "ha noi", "long bien", "bo de"]),
        unit("01-021-00622", Some("01-021"), L::Ward, S::Ward, "Phường Minh Khai", "minh khai", &[], &["84", "01", "01-021", "01-021-00622"], &["viet nam", "ha noi", "bac tu liem", "minh khai"]),
        unit("79-760-27301", Some("79-760"), L::Ward, S::Ward, "Phường 5", "5", &["phuong 5"], &["84", "79", "79-760", "79-760-27301"], &["viet nam", "ho chi minh", "5", "5"]),
        unit("79-776-27433", Some("79-776"), L::Ward, S::Ward, "Phường 5", "5", &["phuong 5"], &["84", "79", "79-776", "79-776-27433"], &["viet nam", "ho chi minh", "8", "5"]),
        unit("22-193-07012", Some("22-193"), L::Ward, S::Ward, "Phường Hải Hòa", "hai hoa", &[], &["84", "22", "22-193", "22-193-07012"], &["viet nam", "quang ninh", "mong cai", "hai hoa"]),
        unit("22-193-07006", Some("22-193"), L::Ward, S::Ward, "Phường Trần Phú", "tran phu", &[], &["84", "22", "22-193", "22-193-07006"], &["viet nam", "quang ninh", "mong cai", "tran phu"]),
    ]
}

/// The country unit used to fill the `country` component when absent.
pub fn vietnam() -> AdminUnit {
    seed_units().into_iter().next().expect("country fixture")
}
