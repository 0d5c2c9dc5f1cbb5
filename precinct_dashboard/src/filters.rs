use log::{debug, info};

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::config::*;
use crate::state::{AppState, Selection};

// ******** Natural ordering *********

#[derive(Debug, Clone, Copy)]
enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

fn chunks(s: &str) -> Vec<Chunk<'_>> {
    let mut res: Vec<Chunk> = Vec::new();
    let mut start = 0;
    let mut in_digits: Option<bool> = None;
    for (idx, c) in s.char_indices() {
        let is_digit = c.is_ascii_digit();
        match in_digits {
            Some(d) if d != is_digit => {
                res.push(make_chunk(&s[start..idx], d));
                start = idx;
            }
            _ => {}
        }
        in_digits = Some(is_digit);
    }
    if let Some(d) = in_digits {
        res.push(make_chunk(&s[start..], d));
    }
    res
}

fn make_chunk(s: &str, digits: bool) -> Chunk<'_> {
    if digits {
        Chunk::Digits(s)
    } else {
        Chunk::Text(s)
    }
}

fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Compares strings the way people read district names: runs of digits
/// compare by their numeric value, so "3" < "10" and "2A" < "3" < "3A".
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let ca = chunks(a);
    let cb = chunks(b);
    for (x, y) in ca.iter().zip(cb.iter()) {
        let o = match (x, y) {
            (Chunk::Digits(x), Chunk::Digits(y)) => cmp_digits(x, y),
            (Chunk::Text(x), Chunk::Text(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
            (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
            (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
        };
        if o != Ordering::Equal {
            return o;
        }
    }
    ca.len().cmp(&cb.len()).then_with(|| a.cmp(b))
}

pub fn natural_sort(values: &mut [String]) {
    values.sort_by(|a, b| natural_cmp(a, b));
}

// ******** Option sets *********

pub(crate) fn norm(v: Option<&str>) -> Option<String> {
    v.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty())
}

pub(crate) fn matches(want: &Option<String>, have: Option<&str>) -> bool {
    match want {
        None => true,
        Some(w) => norm(have).as_deref() == Some(w.as_str()),
    }
}

/// The ancestor filters constraining an option set. A filter is active when
/// it holds a non-blank value.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct Scope<'a> {
    pub county: Option<&'a str>,
    pub senior: Option<&'a str>,
}

/// Distinct values of `level` among the features consistent with the scope,
/// in natural order. Only the ancestors of `level` are looked at.
pub fn available_values(
    level: FilterLevel,
    scope: Scope,
    fields: &FieldAliases,
    features: &[PrecinctFeature],
) -> Vec<String> {
    let want_county = match level {
        FilterLevel::County => None,
        _ => norm(scope.county),
    };
    let want_senior = match level {
        FilterLevel::Junior => norm(scope.senior),
        _ => None,
    };
    let aliases = fields.for_level(level);

    let set: BTreeSet<String> = features
        .iter()
        .filter(|f| matches(&want_county, f.lookup(&fields.county)))
        .filter(|f| matches(&want_senior, f.lookup(&fields.senior)))
        .filter_map(|f| f.lookup(aliases))
        .map(|v| v.to_string())
        .collect();
    let mut res: Vec<String> = set.into_iter().collect();
    natural_sort(&mut res);
    res
}

/// Senior districts of the features in the selected county (all of them
/// without a county filter).
pub fn available_senior(
    scope: Scope,
    fields: &FieldAliases,
    features: &[PrecinctFeature],
) -> Vec<String> {
    available_values(FilterLevel::Senior, scope, fields, features)
}

/// Junior districts of the features matching both the county and the senior
/// district, for each of them that is active.
pub fn available_junior(
    scope: Scope,
    fields: &FieldAliases,
    features: &[PrecinctFeature],
) -> Vec<String> {
    available_values(FilterLevel::Junior, scope, fields, features)
}

/// Every distinct value of the geographic layer, regardless of any scope.
pub fn all_values(
    level: FilterLevel,
    fields: &FieldAliases,
    features: &[PrecinctFeature],
) -> Vec<String> {
    available_values(level, Scope::default(), fields, features)
}

// ******** Reconciliation *********

/// What happened to a dependent filter after its options were recomputed.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Reconciliation {
    /// The previous value is still an option and was kept.
    Preserved,
    /// The first option was selected.
    AutoSelected,
    /// The filter no longer has a value.
    Cleared,
}

/// Decides the new value of a dependent filter given its new option set.
pub fn reconcile(
    previous: Option<&str>,
    options: &[String],
    config: &FilterConfig,
) -> (Option<String>, Reconciliation) {
    match previous {
        Some(p) if config.preserve_child_if_still_valid && options.iter().any(|o| o == p) => {
            (Some(p.to_string()), Reconciliation::Preserved)
        }
        _ if config.auto_select_children && !options.is_empty() => {
            (options.first().cloned(), Reconciliation::AutoSelected)
        }
        _ => (None, Reconciliation::Cleared),
    }
}

/// One dependent filter of the cascade and the filters its options depend on.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct CascadeEntry {
    pub level: FilterLevel,
    pub depends_on: &'static [FilterLevel],
}

/// The dependent filters, in topological order.
pub const CASCADE: [CascadeEntry; 2] = [
    CascadeEntry {
        level: FilterLevel::Senior,
        depends_on: &[FilterLevel::County],
    },
    CascadeEntry {
        level: FilterLevel::Junior,
        depends_on: &[FilterLevel::County, FilterLevel::Senior],
    },
];

fn current(selection: &Selection, level: FilterLevel) -> Option<&str> {
    match level {
        FilterLevel::County => selection.county.as_deref(),
        FilterLevel::Senior => selection.senior_district.as_deref(),
        FilterLevel::Junior => selection.junior_district.as_deref(),
    }
}

fn assign(state: &mut AppState, level: FilterLevel, value: Option<&str>) {
    match level {
        FilterLevel::County => state.set_county(value),
        FilterLevel::Senior => state.set_senior_district(value),
        FilterLevel::Junior => state.set_junior_district(value),
    }
}

/// Computes the option sets of the filters and keeps the dependent filters of
/// a selection consistent with their parents.
#[derive(Debug, Clone, Copy)]
pub struct FilterResolver<'a> {
    config: &'a FilterConfig,
    features: &'a [PrecinctFeature],
}

impl<'a> FilterResolver<'a> {
    pub fn new(config: &'a FilterConfig, features: &'a [PrecinctFeature]) -> FilterResolver<'a> {
        FilterResolver { config, features }
    }

    /// The options currently offered for `level`.
    pub fn options(&self, level: FilterLevel, selection: &Selection) -> Vec<String> {
        match self.config.mode {
            FilterMode::Unscoped => all_values(level, &self.config.fields, self.features),
            FilterMode::Scoped => {
                let scope = Scope {
                    county: selection.county.as_deref(),
                    senior: selection.senior_district.as_deref(),
                };
                available_values(level, scope, &self.config.fields, self.features)
            }
        }
    }

    /// Re-runs the reconciliation of every filter that depends, directly or
    /// through another dependent filter, on `changed`. Filters are visited in
    /// cascade order so a child always sees the reconciled value of its parent.
    pub fn cascade(
        &self,
        changed: FilterLevel,
        state: &mut AppState,
    ) -> Vec<(FilterLevel, Reconciliation)> {
        let mut dirty: Vec<FilterLevel> = vec![changed];
        let mut outcomes: Vec<(FilterLevel, Reconciliation)> = Vec::new();
        for entry in CASCADE.iter() {
            if !entry.depends_on.iter().any(|d| dirty.contains(d)) {
                continue;
            }
            let selection = state.snapshot();
            let options = self.options(entry.level, &selection);
            let previous = current(&selection, entry.level);
            let (next, outcome) = reconcile(previous, &options, self.config);
            debug!(
                "cascade: {:?}: {} options, {:?} -> {:?} ({:?})",
                entry.level,
                options.len(),
                previous,
                next,
                outcome
            );
            assign(state, entry.level, next.as_deref());
            dirty.push(entry.level);
            outcomes.push((entry.level, outcome));
        }
        info!("cascade from {:?}: {:?}", changed, outcomes);
        outcomes
    }
}
