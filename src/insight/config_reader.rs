use std::time::Duration;

use crate::insight::{io_common::fetch_text, *};

use serde::{Deserialize, Serialize};

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct FilteringSettings {
    pub mode: Option<String>,
    pub precedence: Option<Vec<String>>,
    pub auto_select_children: Option<bool>,
    pub preserve_child_if_still_valid: Option<bool>,
}

/// A field may be named by a single property or by a list of candidates.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldNames {
    One(String),
    Many(Vec<String>),
}

impl FieldNames {
    fn names(&self) -> Vec<String> {
        match self {
            FieldNames::One(s) => vec![s.clone()],
            FieldNames::Many(l) => l.clone(),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct FieldSettings {
    pub county: Option<FieldNames>,
    pub senate: Option<FieldNames>,
    pub house: Option<FieldNames>,
    pub precinct_id: Option<FieldNames>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct UiConfig {
    pub filtering: Option<FilteringSettings>,
    pub fields: Option<FieldSettings>,
}

const DEFAULT_PRECEDENCE: [FilterLevel; 3] =
    [FilterLevel::County, FilterLevel::Senior, FilterLevel::Junior];

fn precedence_level(name: &str) -> Option<FilterLevel> {
    match name.trim().to_ascii_lowercase().as_str() {
        "county" => Some(FilterLevel::County),
        "senate" | "mn_senate" => Some(FilterLevel::Senior),
        "house" | "mn_house" => Some(FilterLevel::Junior),
        _ => None,
    }
}

/// Whether a configured precedence names the only supported order,
/// county then senate then house.
pub fn is_default_precedence(precedence: &[String]) -> bool {
    precedence
        .iter()
        .map(|s| precedence_level(s))
        .eq(DEFAULT_PRECEDENCE.iter().map(|l| Some(*l)))
}

/// "scoped" in any case selects the scoped mode, every other value the unscoped one.
fn filter_mode(mode: Option<&str>) -> FilterMode {
    match mode.map(|m| m.trim()) {
        None => FilterMode::Scoped,
        Some(m) if m.eq_ignore_ascii_case("scoped") => FilterMode::Scoped,
        Some(m) => {
            if !m.eq_ignore_ascii_case("unscoped") {
                warn!("Unknown filtering mode {:?}, using unscoped", m);
            }
            FilterMode::Unscoped
        }
    }
}

/// Configured names first, then the built-in ones that were not configured.
fn merge_aliases(configured: &Option<FieldNames>, fallbacks: &[&str]) -> Vec<String> {
    let mut res: Vec<String> = configured
        .as_ref()
        .map(|f| f.names())
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    for name in fallbacks.iter() {
        if !res.iter().any(|s| s == name) {
            res.push(name.to_string());
        }
    }
    res
}

pub fn parse_ui_config(text: &str, path: &str) -> InsightResult<UiConfig> {
    let config: UiConfig = serde_json::from_str(text).context(ParsingJsonSnafu { path })?;
    Ok(config)
}

/// Turns the raw configuration into the filter settings, key by key over the defaults.
pub fn validate_ui_config(config: &UiConfig) -> FilterConfig {
    let defaults = FilterConfig::default();
    let filtering = config.filtering.clone().unwrap_or_default();
    let fields = config.fields.clone().unwrap_or_default();

    let mode = filter_mode(filtering.mode.as_deref());
    if let Some(p) = &filtering.precedence {
        if !is_default_precedence(p) {
            warn!(
                "Filter precedence {:?} is not supported, using {:?}",
                p, DEFAULT_PRECEDENCE
            );
        }
    }

    FilterConfig {
        mode,
        auto_select_children: filtering
            .auto_select_children
            .unwrap_or(defaults.auto_select_children),
        preserve_child_if_still_valid: filtering
            .preserve_child_if_still_valid
            .unwrap_or(defaults.preserve_child_if_still_valid),
        fields: FieldAliases {
            precinct_id: merge_aliases(&fields.precinct_id, &FieldAliases::PRECINCT_ID_FALLBACKS),
            county: merge_aliases(&fields.county, &FieldAliases::COUNTY_FALLBACKS),
            senior: merge_aliases(&fields.senate, &FieldAliases::SENIOR_FALLBACKS),
            junior: merge_aliases(&fields.house, &FieldAliases::JUNIOR_FALLBACKS),
        },
    }
}

fn try_read_ui_config(source: &str, timeout: Duration) -> InsightResult<FilterConfig> {
    let text = fetch_text(source, timeout)?;
    let config = parse_ui_config(&text, source)?;
    debug!("try_read_ui_config: {:?}", config);
    Ok(validate_ui_config(&config))
}

/// Reads the UI configuration. It is optional: any failure falls back to
/// the defaults with a warning.
pub fn read_ui_config(source: Option<&str>, timeout: Duration) -> FilterConfig {
    match source {
        None => FilterConfig::default(),
        Some(s) => match try_read_ui_config(s, timeout) {
            Ok(config) => config,
            Err(e) => {
                warn!("Could not use the UI config {}: {}. Using defaults.", s, e);
                FilterConfig::default()
            }
        },
    }
}
