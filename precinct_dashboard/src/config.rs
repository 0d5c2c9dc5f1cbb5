// ********* Input data structures ***********

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;
use std::str::FromStr;

use geo::Rect;

/// One line of the tabular results: the votes of one party for one office in
/// one precinct and one year.
///
/// Rows are never mutated after parsing.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ElectionRow {
    pub precinct_id: String,
    pub year: u32,
    pub office: String,
    pub party: String,
    pub votes: u64,
    pub registered: u64,
    pub county: String,
    pub precinct_name: String,
    pub turnout_eligible: u64,
}

/// A precinct of the geographic layer, reduced to what the dashboard needs:
/// its property bag and its extent, in the coordinates of the layer. The
/// polygon itself belongs to the renderer.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct PrecinctFeature {
    pub properties: BTreeMap<String, String>,
    pub bbox: Option<Rect<f64>>,
}

impl PrecinctFeature {
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(|s| s.as_str())
    }

    /// The first non-blank value among the given property names, trimmed.
    pub fn lookup(&self, aliases: &[String]) -> Option<&str> {
        aliases
            .iter()
            .filter_map(|name| self.property(name))
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
    }
}

/// Descriptive data for a precinct, folded over all the years.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct PrecinctMeta {
    pub county: String,
    pub precinct_name: String,
    pub registered: u64,
    pub turnout_eligible: u64,
}

// ******** Output data structures *********

/// The per-precinct summary for one (precinct, year, office).
///
/// All the percentages are in [0, 100], the margin is in [-100, 100] and is
/// positive when the DEM candidate leads.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Kpi {
    pub precinct_id: String,
    pub precinct_name: String,
    pub county: String,
    pub registered: u64,
    pub turnout_pct: f64,
    pub dem: u64,
    pub gop: u64,
    pub oth: u64,
    pub total: u64,
    pub dem_share: f64,
    pub gop_share: f64,
    pub margin: f64,
}

/// The quantity driving the coloring of the map.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Metric {
    TurnoutPct,
    DemShare,
    GopShare,
    Margin,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::TurnoutPct,
        Metric::DemShare,
        Metric::GopShare,
        Metric::Margin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::TurnoutPct => "turnout_pct",
            Metric::DemShare => "dem_share",
            Metric::GopShare => "gop_share",
            Metric::Margin => "margin",
        }
    }
}

impl Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ParseMetricError {
    pub name: String,
}

impl Error for ParseMetricError {}

impl Display for ParseMetricError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown metric {:?} (expected one of turnout_pct, dem_share, gop_share, margin)",
            self.name
        )
    }
}

impl FromStr for Metric {
    type Err = ParseMetricError;

    fn from_str(s: &str) -> Result<Metric, ParseMetricError> {
        Metric::ALL
            .iter()
            .find(|m| m.as_str() == s.trim())
            .cloned()
            .ok_or_else(|| ParseMetricError {
                name: s.to_string(),
            })
    }
}

// ********* Configuration **********

/// The filters, in cascade order. A filter only depends on the ones before it.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum FilterLevel {
    County,
    /// The larger legislative district (state senate).
    Senior,
    /// The legislative district nested in the senior one (state house).
    Junior,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum FilterMode {
    /// Child options are restricted to what is consistent with the selected parents.
    Scoped,
    /// Child options always enumerate every value of the geographic layer.
    Unscoped,
}

/// The property names under which each attribute may be found on a feature.
/// Names are tried in order.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FieldAliases {
    pub precinct_id: Vec<String>,
    pub county: Vec<String>,
    pub senior: Vec<String>,
    pub junior: Vec<String>,
}

fn names(l: &[&str]) -> Vec<String> {
    l.iter().map(|s| s.to_string()).collect()
}

impl FieldAliases {
    pub const PRECINCT_ID_FALLBACKS: [&'static str; 3] = ["precinct_id", "VTDID", "vtdid"];
    pub const COUNTY_FALLBACKS: [&'static str; 4] = ["county", "COUNTYNAME", "countyname", "County"];
    pub const SENIOR_FALLBACKS: [&'static str; 3] = ["mn_senate", "MNSENDIST", "mn_senate_district"];
    pub const JUNIOR_FALLBACKS: [&'static str; 1] = ["mn_house"];

    pub fn for_level(&self, level: FilterLevel) -> &[String] {
        match level {
            FilterLevel::County => &self.county,
            FilterLevel::Senior => &self.senior,
            FilterLevel::Junior => &self.junior,
        }
    }
}

impl Default for FieldAliases {
    fn default() -> FieldAliases {
        FieldAliases {
            precinct_id: names(&FieldAliases::PRECINCT_ID_FALLBACKS),
            county: names(&FieldAliases::COUNTY_FALLBACKS),
            senior: names(&FieldAliases::SENIOR_FALLBACKS),
            junior: names(&FieldAliases::JUNIOR_FALLBACKS),
        }
    }
}

/// How the dependent filters react when a parent filter changes.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FilterConfig {
    pub mode: FilterMode,
    pub auto_select_children: bool,
    pub preserve_child_if_still_valid: bool,
    pub fields: FieldAliases,
}

impl Default for FilterConfig {
    fn default() -> FilterConfig {
        FilterConfig {
            mode: FilterMode::Scoped,
            auto_select_children: true,
            preserve_child_if_still_valid: true,
            fields: FieldAliases::default(),
        }
    }
}
