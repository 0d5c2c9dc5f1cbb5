use log::debug;

use crate::config::Metric;

pub const DEFAULT_OFFICE: &str = "POTUS";

/// What the user is currently looking at.
#[derive(PartialEq, Debug, Clone)]
pub struct Selection {
    pub year: Option<u32>,
    pub office: String,
    pub metric: Metric,
    pub county: Option<String>,
    pub senior_district: Option<String>,
    pub junior_district: Option<String>,
    pub selected_precinct: Option<String>,
}

impl Default for Selection {
    fn default() -> Selection {
        Selection {
            year: None,
            office: DEFAULT_OFFICE.to_string(),
            metric: Metric::TurnoutPct,
            county: None,
            senior_district: None,
            junior_district: None,
            selected_precinct: None,
        }
    }
}

/// Empty and blank values both mean "no filter".
fn non_blank(v: Option<&str>) -> Option<String> {
    v.map(|s| s.trim()).filter(|s| !s.is_empty()).map(|s| s.to_string())
}

/// The single mutable selection of a dashboard session.
///
/// The setters accept any value: keeping the dependent filters consistent is
/// the job of the filter resolver, which the caller runs after changing a
/// parent filter. Readers get a copy through `snapshot`.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    selection: Selection,
}

impl AppState {
    pub fn new() -> AppState {
        AppState::default()
    }

    pub fn with_selection(selection: Selection) -> AppState {
        AppState { selection }
    }

    pub fn snapshot(&self) -> Selection {
        self.selection.clone()
    }

    pub fn set_year(&mut self, year: u32) {
        debug!("set_year: {}", year);
        self.selection.year = Some(year);
    }

    pub fn set_office(&mut self, office: &str) {
        debug!("set_office: {:?}", office);
        self.selection.office = office.to_string();
    }

    pub fn set_metric(&mut self, metric: Metric) {
        debug!("set_metric: {}", metric);
        self.selection.metric = metric;
    }

    pub fn set_county(&mut self, county: Option<&str>) {
        debug!("set_county: {:?}", county);
        self.selection.county = non_blank(county);
    }

    pub fn set_senior_district(&mut self, district: Option<&str>) {
        debug!("set_senior_district: {:?}", district);
        self.selection.senior_district = non_blank(district);
    }

    pub fn set_junior_district(&mut self, district: Option<&str>) {
        debug!("set_junior_district: {:?}", district);
        self.selection.junior_district = non_blank(district);
    }

    pub fn set_selected_precinct(&mut self, precinct_id: Option<&str>) {
        debug!("set_selected_precinct: {:?}", precinct_id);
        self.selection.selected_precinct = non_blank(precinct_id);
    }
}
