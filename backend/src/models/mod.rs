//! Domain models for the mortality atlas.
//!
//! - [`DepartmentKey`] - normalized department identifier used for every join
//! - [`Month`] - the twelve canonical Spanish month names, in calendar order
//! - [`Scale`] - the rate multiplier `k`
//! - [`YearSelection`] / [`DepartmentFilter`] - user filter parameters
//! - record types for each input source

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::QueryError;

// =============================================================================
// Department Key
// =============================================================================

/// Canonical department identifier.
///
/// Built from any spelling found in the source files: trimmed, accent-folded,
/// uppercased, punctuation other than `.` removed, whitespace collapsed, and
/// finally mapped through [`DEPARTMENT_ALIASES`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepartmentKey(String);

/// Known spelling variants, keyed by their normalized form.
pub const DEPARTMENT_ALIASES: &[(&str, &str)] = &[
    ("BOGOTA", "BOGOTA D.C."),
    ("BOGOTA DC", "BOGOTA D.C."),
    ("BOGOTA D.C", "BOGOTA D.C."),
    ("BOGOTA D. C.", "BOGOTA D.C."),
    ("SANTAFE DE BOGOTA", "BOGOTA D.C."),
    ("SANTAFE DE BOGOTA D.C", "BOGOTA D.C."),
    ("SANTAFE DE BOGOTA D.C.", "BOGOTA D.C."),
    ("ARCHIPIELAGO DE SAN ANDRES PROVIDENCIA Y SANTA CATALINA", "SAN ANDRES"),
    ("SAN ANDRES PROVIDENCIA Y SANTA CATALINA", "SAN ANDRES"),
    ("SAN ANDRES Y PROVIDENCIA", "SAN ANDRES"),
    ("NORTE SANTANDER", "NORTE DE SANTANDER"),
    ("VALLE", "VALLE DEL CAUCA"),
    ("GUAJIRA", "LA GUAJIRA"),
];

static NON_KEY_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Z0-9. ]+").expect("valid department key pattern"));
static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

impl DepartmentKey {
    /// Normalize a department name as written in any source.
    pub fn from_name(name: &str) -> Self {
        let folded: String = name
            .trim()
            .chars()
            .filter(|c| !is_combining_mark(*c))
            .map(fold_char)
            .collect::<String>()
            .to_uppercase();
        let stripped = NON_KEY_CHARS.replace_all(&folded, " ");
        let collapsed = WHITESPACE.replace_all(stripped.trim(), " ").into_owned();

        let canonical = DEPARTMENT_ALIASES
            .iter()
            .find(|(variant, _)| *variant == collapsed)
            .map(|(_, canonical)| canonical.to_string())
            .unwrap_or(collapsed);

        DepartmentKey(canonical)
    }

    /// Wrap a value that is already a key, as read back from a frame column.
    pub(crate) fn from_normalized(key: &str) -> Self {
        DepartmentKey(key.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DepartmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Combining diacritics of decomposed (NFD) text, e.g. the tilde in `N\u{303}`.
fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
}

/// Fold Spanish diacritics to their base letter.
fn fold_char(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' => 'a',
        'Á' | 'À' | 'Ä' | 'Â' => 'A',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'É' | 'È' | 'Ë' | 'Ê' => 'E',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'Í' | 'Ì' | 'Ï' | 'Î' => 'I',
        'ó' | 'ò' | 'ö' | 'ô' => 'o',
        'Ó' | 'Ò' | 'Ö' | 'Ô' => 'O',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'Ú' | 'Ù' | 'Ü' | 'Û' => 'U',
        'ñ' => 'n',
        'Ñ' => 'N',
        other => other,
    }
}

// =============================================================================
// Month
// =============================================================================

/// Month of death.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Month {
    Enero,
    Febrero,
    Marzo,
    Abril,
    Mayo,
    Junio,
    Julio,
    Agosto,
    Septiembre,
    Octubre,
    Noviembre,
    Diciembre,
}

impl Month {
    /// Calendar order; the x-axis of every monthly chart.
    pub const ALL: [Month; 12] = [
        Month::Enero,
        Month::Febrero,
        Month::Marzo,
        Month::Abril,
        Month::Mayo,
        Month::Junio,
        Month::Julio,
        Month::Agosto,
        Month::Septiembre,
        Month::Octubre,
        Month::Noviembre,
        Month::Diciembre,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Month::Enero => "Enero",
            Month::Febrero => "Febrero",
            Month::Marzo => "Marzo",
            Month::Abril => "Abril",
            Month::Mayo => "Mayo",
            Month::Junio => "Junio",
            Month::Julio => "Julio",
            Month::Agosto => "Agosto",
            Month::Septiembre => "Septiembre",
            Month::Octubre => "Octubre",
            Month::Noviembre => "Noviembre",
            Month::Diciembre => "Diciembre",
        }
    }

    /// Zero-based position in [`Month::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Month {
    type Err = QueryError;

    /// Accepts the Spanish name in any case (with or without accents) or 1-12.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<usize>() {
            if (1..=12).contains(&n) {
                return Ok(Month::ALL[n - 1]);
            }
        }
        let folded: String = trimmed.chars().map(fold_char).collect();
        Month::ALL
            .iter()
            .copied()
            .find(|m| m.name().eq_ignore_ascii_case(&folded))
            .or_else(|| folded.eq_ignore_ascii_case("Setiembre").then_some(Month::Septiembre))
            .ok_or_else(|| QueryError::UnknownMonth(trimmed.to_string()))
    }
}

impl Serialize for Month {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Month {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Scale
// =============================================================================

/// Rate multiplier: deaths per `k` inhabitants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub enum Scale {
    #[default]
    Hundred,
    Thousand,
    TenThousand,
    HundredThousand,
    Million,
}

impl Scale {
    pub const ALL: [Scale; 5] = [
        Scale::Hundred,
        Scale::Thousand,
        Scale::TenThousand,
        Scale::HundredThousand,
        Scale::Million,
    ];

    pub fn value(self) -> u64 {
        match self {
            Scale::Hundred => 100,
            Scale::Thousand => 1_000,
            Scale::TenThousand => 10_000,
            Scale::HundredThousand => 100_000,
            Scale::Million => 1_000_000,
        }
    }

    pub fn factor(self) -> f64 {
        self.value() as f64
    }
}

impl TryFrom<u64> for Scale {
    type Error = QueryError;

    fn try_from(k: u64) -> Result<Self, Self::Error> {
        Scale::ALL
            .iter()
            .copied()
            .find(|s| s.value() == k)
            .ok_or(QueryError::InvalidScale(k))
    }
}

impl From<Scale> for u64 {
    fn from(scale: Scale) -> Self {
        scale.value()
    }
}

// =============================================================================
// Filter Parameters
// =============================================================================

/// Sentinel accepted for "no restriction" in year and department selectors.
pub const ALL_SENTINEL: &str = "Todos";

fn is_all_sentinel(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || s.eq_ignore_ascii_case(ALL_SENTINEL) || s.eq_ignore_ascii_case("all")
}

/// Years a query covers. Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearSelection {
    All,
    Single(i32),
    Range(i32, i32),
}

impl YearSelection {
    /// Inclusive range; collapses to [`YearSelection::Single`] when `start == end`.
    pub fn range(start: i32, end: i32) -> Result<Self, QueryError> {
        match start.cmp(&end) {
            std::cmp::Ordering::Greater => Err(QueryError::InvalidYearRange { start, end }),
            std::cmp::Ordering::Equal => Ok(YearSelection::Single(start)),
            std::cmp::Ordering::Less => Ok(YearSelection::Range(start, end)),
        }
    }

    pub fn contains(&self, year: i32) -> bool {
        match *self {
            YearSelection::All => true,
            YearSelection::Single(y) => year == y,
            YearSelection::Range(start, end) => (start..=end).contains(&year),
        }
    }

    /// True when exactly one year is selected.
    pub fn is_single_year(&self) -> bool {
        matches!(self, YearSelection::Single(_))
    }

    /// Label used in chart titles.
    pub fn label(&self) -> String {
        match *self {
            YearSelection::All => "Todos los años".to_string(),
            YearSelection::Single(y) => y.to_string(),
            YearSelection::Range(start, end) => format!("{}-{}", start, end),
        }
    }
}

impl FromStr for YearSelection {
    type Err = QueryError;

    /// `Todos` / `all` / empty, a single year, or `start-end`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if is_all_sentinel(s) {
            return Ok(YearSelection::All);
        }
        let invalid = || QueryError::InvalidYear(s.trim().to_string());
        match s.trim().split_once('-') {
            Some((start, end)) => {
                let start = start.trim().parse().map_err(|_| invalid())?;
                let end = end.trim().parse().map_err(|_| invalid())?;
                YearSelection::range(start, end)
            }
            None => s.trim().parse().map(YearSelection::Single).map_err(|_| invalid()),
        }
    }
}

/// Department restriction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepartmentFilter {
    All,
    Only(DepartmentKey),
}

impl DepartmentFilter {
    /// Parse a selector value; `Todos` / `all` / empty mean no restriction.
    pub fn parse(s: &str) -> Self {
        if is_all_sentinel(s) {
            DepartmentFilter::All
        } else {
            DepartmentFilter::Only(DepartmentKey::from_name(s))
        }
    }

    pub fn matches(&self, key: &DepartmentKey) -> bool {
        match self {
            DepartmentFilter::All => true,
            DepartmentFilter::Only(wanted) => wanted == key,
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// One registered death.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeathRecord {
    pub department: DepartmentKey,
    pub municipality: String,
    pub year: i32,
    pub month: Month,
    pub age_group: String,
    pub marital_status: String,
}

/// Pre-aggregated deaths per department and year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MortalityTotal {
    pub department: DepartmentKey,
    pub year: i32,
    pub deaths: u64,
}

/// Pre-aggregated deaths per department, year and month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyMortality {
    pub department: DepartmentKey,
    pub year: i32,
    pub month: Month,
    pub deaths: u64,
}

/// Female population of a department in a year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulationRecord {
    pub department: DepartmentKey,
    pub year: i32,
    pub women: f64,
}

/// Department outline as a raw GeoJSON geometry object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoBoundary {
    pub department: DepartmentKey,
    /// Name exactly as written in the boundary file
    pub name: String,
    pub geometry: serde_json::Value,
}
