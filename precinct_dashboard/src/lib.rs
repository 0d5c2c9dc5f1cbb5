mod config;
mod filters;
mod index;
mod kpi;
mod state;
pub mod view;

use log::{debug, info};

use std::collections::BTreeSet;

pub use crate::config::*;
pub use crate::filters::*;
pub use crate::index::*;
pub use crate::kpi::*;
pub use crate::state::*;
use crate::view::*;

/// The filter values a new session starts from, each applied only when the
/// layer offers it at that point of the cascade.
pub const BOOTSTRAP_FILTERS: [(FilterLevel, &str); 3] = [
    (FilterLevel::County, "St. Louis"),
    (FilterLevel::Senior, "3"),
    (FilterLevel::Junior, "3A"),
];

/// A user interaction with the dashboard controls.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SelectionEvent {
    Year(u32),
    Office(String),
    Metric(Metric),
    County(Option<String>),
    SeniorDistrict(Option<String>),
    JuniorDistrict(Option<String>),
    Precinct(Option<String>),
}

/// The loaded data of a dashboard session: the tabular index, the geographic
/// layer and the filter configuration.
///
/// The dashboard owns no selection. Each session keeps its own `AppState` and
/// passes it to `apply` and `render`.
///
/// ```
/// use precinct_dashboard::*;
///
/// let rows = vec![ElectionRow {
///     precinct_id: "p1".to_string(),
///     year: 2024,
///     office: "POTUS".to_string(),
///     party: "DEM".to_string(),
///     votes: 40,
///     registered: 80,
///     ..ElectionRow::default()
/// }];
/// let dashboard = Dashboard::new(&rows, Vec::new(), FilterConfig::default());
/// let kpi = dashboard.kpis_for("p1", 2024, "POTUS");
/// assert_eq!(kpi.turnout_pct, 50.0);
/// assert_eq!(kpi.margin, 100.0);
/// ```
#[derive(Debug, Clone)]
pub struct Dashboard {
    index: TabularIndex,
    features: Vec<PrecinctFeature>,
    config: FilterConfig,
}

impl Dashboard {
    pub fn new(rows: &[ElectionRow], features: Vec<PrecinctFeature>, config: FilterConfig) -> Dashboard {
        let index = TabularIndex::build(rows);
        info!(
            "Dashboard: {} rows, {} features, mode {:?}",
            index.num_rows(),
            features.len(),
            config.mode
        );
        Dashboard {
            index,
            features,
            config,
        }
    }

    pub fn index(&self) -> &TabularIndex {
        &self.index
    }

    pub fn features(&self) -> &[PrecinctFeature] {
        &self.features
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn years(&self) -> &[u32] {
        self.index.years()
    }

    pub fn offices(&self) -> &[String] {
        self.index.offices()
    }

    /// Distinct non-blank counties of the geographic layer, sorted.
    pub fn counties(&self) -> Vec<String> {
        self.features
            .iter()
            .filter_map(|f| f.lookup(&self.config.fields.county))
            .map(|s| s.to_string())
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect()
    }

    pub fn kpis_for(&self, precinct_id: &str, year: u32, office: &str) -> Kpi {
        kpis_for(&self.index, precinct_id, year, office)
    }

    pub fn resolver(&self) -> FilterResolver<'_> {
        FilterResolver::new(&self.config, &self.features)
    }

    /// The precinct identifier of a feature, if any alias carries one.
    pub fn precinct_id<'a>(&self, feature: &'a PrecinctFeature) -> Option<&'a str> {
        feature.lookup(&self.config.fields.precinct_id)
    }

    /// Returns the paint function for a (year, office, metric) triple.
    pub fn color_scale<'a>(
        &'a self,
        year: u32,
        office: &'a str,
        metric: Metric,
    ) -> impl Fn(&str) -> &'static str + 'a {
        move |precinct_id: &str| {
            let v = self.kpis_for(precinct_id, year, office).value(metric);
            numeric_to_color(v, metric)
        }
    }

    /// The fill color of every feature of the layer, in layer order.
    pub fn paint(&self, selection: &Selection) -> Vec<(Option<String>, &'static str)> {
        let year = selection.year.unwrap_or_default();
        let scale = self.color_scale(year, &selection.office, selection.metric);
        self.features
            .iter()
            .map(|f| match self.precinct_id(f) {
                Some(pid) => (Some(pid.to_string()), scale(pid)),
                None => (None, NO_DATA_COLOR),
            })
            .collect()
    }

    /// The first feature whose name contains the query, ignoring case.
    /// Queries shorter than two characters match nothing.
    pub fn find_precinct_by_name(&self, query: &str) -> Option<&PrecinctFeature> {
        if query.chars().count() < 2 {
            return None;
        }
        let q = query.to_lowercase();
        self.features.iter().find(|f| {
            f.property("name")
                .map(|n| n.to_lowercase().contains(&q))
                .unwrap_or(false)
        })
    }

    pub fn visible_precincts(&self, selection: &Selection) -> VisibleSet {
        visible_features(selection, &self.config.fields, &self.features)
    }

    /// The selection a new session starts from: the latest year, the
    /// presidential race when there is one, the margin metric and the
    /// `BOOTSTRAP_FILTERS` the layer offers, with the dependent filters
    /// populated.
    pub fn initial_state(&self) -> AppState {
        let mut state = AppState::new();
        if let Some(y) = self.years().last() {
            state.set_year(*y);
        }
        let offices = self.offices();
        if !offices.iter().any(|o| o == DEFAULT_OFFICE) {
            if let Some(o) = offices.first() {
                state.set_office(o);
            }
        }
        state.set_metric(Metric::Margin);
        let resolver = self.resolver();
        resolver.cascade(FilterLevel::County, &mut state);
        for (level, value) in BOOTSTRAP_FILTERS.iter() {
            let options = match level {
                FilterLevel::County => self.counties(),
                _ => resolver.options(*level, &state.snapshot()),
            };
            if !options.iter().any(|o| o == value) {
                debug!("initial_state: no {:?} option {:?}", level, value);
                continue;
            }
            let v = Some(value.to_string());
            let event = match level {
                FilterLevel::County => SelectionEvent::County(v),
                FilterLevel::Senior => SelectionEvent::SeniorDistrict(v),
                FilterLevel::Junior => SelectionEvent::JuniorDistrict(v),
            };
            self.apply(&mut state, &event);
        }
        debug!("initial_state: {:?}", state.snapshot());
        state
    }

    /// Applies an interaction to the state, then reconciles the filters that
    /// depend on what changed.
    pub fn apply(
        &self,
        state: &mut AppState,
        event: &SelectionEvent,
    ) -> Vec<(FilterLevel, Reconciliation)> {
        debug!("apply: {:?}", event);
        let changed = match event {
            SelectionEvent::Year(y) => {
                state.set_year(*y);
                None
            }
            SelectionEvent::Office(o) => {
                state.set_office(o);
                None
            }
            SelectionEvent::Metric(m) => {
                state.set_metric(*m);
                None
            }
            SelectionEvent::County(c) => {
                state.set_county(c.as_deref());
                Some(FilterLevel::County)
            }
            SelectionEvent::SeniorDistrict(d) => {
                state.set_senior_district(d.as_deref());
                Some(FilterLevel::Senior)
            }
            SelectionEvent::JuniorDistrict(d) => {
                state.set_junior_district(d.as_deref());
                None
            }
            SelectionEvent::Precinct(p) => {
                state.set_selected_precinct(p.as_deref());
                None
            }
        };
        match changed {
            Some(level) => self.resolver().cascade(level, state),
            None => Vec::new(),
        }
    }

    /// Recomputes everything the renderer shows for the current selection.
    pub fn render(&self, state: &AppState) -> DashboardView {
        let selection = state.snapshot();
        let resolver = self.resolver();
        let kpi = match (&selection.selected_precinct, selection.year) {
            (Some(pid), Some(year)) => Some(self.kpis_for(pid, year, &selection.office)),
            _ => None,
        };
        let details = kpi
            .as_ref()
            .map(|k| detail_rows(k, &selection))
            .unwrap_or_default();
        DashboardView {
            county_options: self.counties(),
            senior_options: resolver.options(FilterLevel::Senior, &selection),
            junior_options: resolver.options(FilterLevel::Junior, &selection),
            tiles: KpiTiles::from_kpi(kpi.as_ref()),
            details,
            kpi,
            fragment: url_fragment(&selection),
            visible: self.visible_precincts(&selection),
            selection,
        }
    }
}
