use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Academic-title prefixes stripped from instructor names before comparison.
///
/// Workload documents carry titles verbatim ("а.о. Утебалиев М.М.",
/// "с.п.Уахасов Қ.С."); configuration files carry clean names. Matching is
/// case-insensitive and anchored at the start of the name.
const PREFIX_PATTERNS: &[&str] = &[
    r"^а\.о\.\s*",
    r"^а\.о\s+",
    r"^с\.п\.\.*\s*",
    r"^с\.п\s+",
    r"^доцент\s*",
    r"^д\.\s*",
    r"^асс\.проф\.\s*",
    r"^қ\.проф\.\s*",
    r"^проф\.\s*",
    r"^профессор\s*",
    r"^ст\.преп\.\s*",
    r"^преподаватель\s*",
    r"^п\.\s*",
    r"^о\.\s*",
    r"^prof\.\s*",
    r"^Dr\s+",
];

static PREFIX_REGEXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    PREFIX_PATTERNS
        .iter()
        .map(|p| {
            Regex::new(&format!("(?i){p}")).expect("prefix patterns are valid")
        })
        .collect()
});

/// Normalized instructor identity.
///
/// The only way to construct one is through the normalizer, so every map
/// keyed by `InstructorId` compares titled and untitled spellings of the
/// same person as equal. Raw spellings survive only inside `Stream` and
/// `Assignment` records for display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstructorId(String);

impl InstructorId {
    /// Normalize a raw instructor name: strip title prefixes from the
    /// closed list and collapse runs of whitespace.
    pub fn normalize(raw: &str) -> InstructorId {
        let mut cleaned = raw.trim().to_string();
        for re in PREFIX_REGEXES.iter() {
            cleaned = re.replace(&cleaned, "").into_owned();
        }
        let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
        InstructorId(collapsed)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstructorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
