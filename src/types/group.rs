use super::{Shift, SecondShiftGroups};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Group-name grammar:
///
/// ```text
/// group     := specialty '-' two_digits rest
/// specialty := Cyrillic+
/// two_digits:= first=year_digit second=subgroup_parity_digit
/// rest      := (' ' ('О'|'Г')?)? subgroup?
/// subgroup  := '/' [12] '/' | '\' [12] '\' | '-' [12]
/// ```
///
/// "АРХ-21 О" is a 2nd-year АРХ group; "АРХ-21 О /1/" is its first
/// subgroup. Stripping subgroup notation yields the *base group*, the unit
/// across which student mutual exclusion is enforced.
static SPECIALTY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([А-ЯЁа-яё]+)").expect("valid regex"));

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-(\d)(\d)").expect("valid regex"));

static SUBGROUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/([12])/|\\([12])\\|-([12])\s*$").expect("valid regex"));

/// Language of instruction, derived from the group number's second digit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupLanguage {
    Kazakh,
    Russian,
}

/// Extract the specialty prefix ("АРХ-21 О" -> "АРХ")
pub fn parse_specialty(group: &str) -> Option<String> {
    SPECIALTY_RE
        .captures(group)
        .map(|c| c[1].to_uppercase())
}

/// Extract the study year, the first digit of the two-digit number
/// ("АРХ-21 О" -> 2, "ЮР-17 О" -> 1)
pub fn parse_year(group: &str) -> Option<u8> {
    let caps = YEAR_RE.captures(group)?;
    let year = caps[1].parse::<u8>().ok()?;
    (1..=5).contains(&year).then_some(year)
}

/// Language derived from the second digit's parity: odd -> Kazakh,
/// even -> Russian. Affects only renderers.
pub fn parse_language(group: &str) -> Option<GroupLanguage> {
    let caps = YEAR_RE.captures(group)?;
    let second = caps[2].parse::<u8>().ok()?;
    if second % 2 == 1 {
        Some(GroupLanguage::Kazakh)
    } else {
        Some(GroupLanguage::Russian)
    }
}

/// Subgroup index (1 or 2) if the name carries subgroup notation
pub fn parse_subgroup(group: &str) -> Option<u8> {
    let caps = SUBGROUP_RE.captures(group)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .and_then(|m| m.as_str().parse().ok())
}

/// Strip subgroup notation to yield the base group
/// ("АРХ-21 О /1/" -> "АРХ-21 О")
pub fn base_group(group: &str) -> String {
    SUBGROUP_RE.replace(group, "").trim().to_string()
}

/// Whether two raw group names are subgroup siblings: identical base group,
/// different subgroup markers
pub fn are_subgroup_siblings(a: &str, b: &str) -> bool {
    a != b
        && base_group(a) == base_group(b)
        && parse_subgroup(a).is_some()
        && parse_subgroup(b).is_some()
        && parse_subgroup(a) != parse_subgroup(b)
}

/// All unique specialties of a group list
pub fn specialties_of(groups: &[String]) -> Vec<String> {
    let mut out: Vec<String> = groups.iter().filter_map(|g| parse_specialty(g)).collect();
    out.sort();
    out.dedup();
    out
}

/// Shift for a single study year:
/// year 2 -> second; years 1 and 3 -> first; years 4-5 -> automatic,
/// defaulting to second
pub fn shift_for_year(year: Option<u8>) -> Shift {
    match year {
        Some(1) | Some(3) => Shift::First,
        _ => Shift::Second,
    }
}

/// Shift for a set of groups: majority of the per-year shifts, ties
/// resolved toward second shift (more slots available). Groups on the
/// forced-second-shift list override the year rule.
pub fn shift_for_groups(groups: &[String], forced_second: &SecondShiftGroups) -> Shift {
    if groups
        .iter()
        .any(|g| forced_second.contains(&base_group(g)))
    {
        return Shift::Second;
    }

    let shifts: Vec<Shift> = groups
        .iter()
        .filter_map(|g| parse_year(g).map(Some).map(shift_for_year))
        .collect();
    if shifts.is_empty() {
        return Shift::Second;
    }

    let first = shifts.iter().filter(|s| **s == Shift::First).count();
    if first > shifts.len() - first {
        Shift::First
    } else {
        Shift::Second
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_specialty() {
        assert_eq!(parse_specialty("АРХ-21 О"), Some("АРХ".to_string()));
        assert_eq!(parse_specialty("ВЕТ-31 О"), Some("ВЕТ".to_string()));
        assert_eq!(parse_specialty("ЮР-17 О /1/"), Some("ЮР".to_string()));
        assert_eq!(parse_specialty("123"), None);
    }

    #[test]
    fn test_year() {
        assert_eq!(parse_year("АРХ-21 О"), Some(2));
        assert_eq!(parse_year("ЮР-17 О"), Some(1));
        assert_eq!(parse_year("СТР-31 О"), Some(3));
        assert_eq!(parse_year("СТР-51"), Some(5));
        assert_eq!(parse_year("СТР"), None);
    }

    #[test]
    fn test_language_parity() {
        assert_eq!(parse_language("АРХ-21 О"), Some(GroupLanguage::Kazakh));
        assert_eq!(parse_language("АРХ-22 О"), Some(GroupLanguage::Russian));
        assert_eq!(parse_language("ЮР-14"), Some(GroupLanguage::Russian));
    }

    #[test]
    fn test_subgroup_notation() {
        assert_eq!(parse_subgroup("АРХ-21 О /1/"), Some(1));
        assert_eq!(parse_subgroup(r"АРХ-21 О \2\"), Some(2));
        assert_eq!(parse_subgroup("АРХ-21 О-1"), Some(1));
        assert_eq!(parse_subgroup("АРХ-21 О"), None);
        // The group number itself is not a subgroup marker
        assert_eq!(parse_subgroup("АРХ-21"), None);
    }

    #[test]
    fn test_base_group() {
        assert_eq!(base_group("АРХ-21 О /1/"), "АРХ-21 О");
        assert_eq!(base_group(r"АРХ-21 О \2\"), "АРХ-21 О");
        assert_eq!(base_group("АРХ-21 О-2"), "АРХ-21 О");
        assert_eq!(base_group("АРХ-21 О"), "АРХ-21 О");
        assert_eq!(base_group("АРХ-21"), "АРХ-21");
    }

    #[test]
    fn test_siblings() {
        assert!(are_subgroup_siblings("АРХ-21 О /1/", "АРХ-21 О /2/"));
        assert!(are_subgroup_siblings("АРХ-21 О /1/", r"АРХ-21 О \2\"));
        assert!(!are_subgroup_siblings("АРХ-21 О /1/", "АРХ-21 О /1/"));
        assert!(!are_subgroup_siblings("АРХ-21 О /1/", "АРХ-23 О /2/"));
        assert!(!are_subgroup_siblings("АРХ-21 О", "АРХ-21 О /2/"));
    }

    #[test]
    fn test_shift_rules() {
        assert_eq!(shift_for_year(Some(1)), Shift::First);
        assert_eq!(shift_for_year(Some(2)), Shift::Second);
        assert_eq!(shift_for_year(Some(3)), Shift::First);
        assert_eq!(shift_for_year(Some(4)), Shift::Second);
        assert_eq!(shift_for_year(Some(5)), Shift::Second);
        assert_eq!(shift_for_year(None), Shift::Second);
    }

    #[test]
    fn test_shift_for_groups_majority_and_tie() {
        let none = HashSet::new();
        let first_year = vec!["ЮР-11 О".to_string(), "ЮР-13 О".to_string()];
        assert_eq!(shift_for_groups(&first_year, &none), Shift::First);

        // Tie breaks toward second shift
        let mixed = vec!["ЮР-11 О".to_string(), "ЮР-21 О".to_string()];
        assert_eq!(shift_for_groups(&mixed, &none), Shift::Second);
    }

    #[test]
    fn test_forced_second_shift_overrides() {
        let mut forced = HashSet::new();
        forced.insert("ЮР-11 О".to_string());
        let groups = vec!["ЮР-11 О /1/".to_string()];
        assert_eq!(shift_for_groups(&groups, &forced), Shift::Second);
    }
}
