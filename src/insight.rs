use log::{debug, info, warn};

use precinct_dashboard::view::*;
use precinct_dashboard::*;
use rayon::prelude::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

pub mod config_reader;
pub mod io_common;
pub mod io_csv;
pub mod io_geojson;
pub mod melt;

use crate::insight::config_reader::read_ui_config;
use crate::insight::io_csv::read_election_csv;
use crate::insight::io_geojson::read_geojson;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InsightError {
    #[snafu(display("Error opening file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON from {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing the output"))]
    WritingJson { source: serde_json::Error },
    #[snafu(display("Error opening CSV {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading CSV {path} at line {lineno}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error writing CSV {path}"))]
    CsvWrite { source: csv::Error, path: String },
    #[snafu(display("Error opening Excel file {path}"))]
    OpeningExcel {
        source: calamine::Error,
        path: String,
    },
    #[snafu(display("No usable worksheet in {path}"))]
    EmptyExcel { path: String },
    #[snafu(display("Could not find a sheet with a VTDID column in {path}"))]
    NoResultsSheet { path: String },
    #[snafu(display("Column {column} is missing in {path}"))]
    MissingColumn { column: String, path: String },
    #[snafu(display("Unsupported file type: {path}"))]
    UnsupportedFileType { path: String },
    #[snafu(display("Malformed GeoJSON in {path}: {reason}"))]
    MalformedGeoJson { path: String, reason: String },
    #[snafu(display("Error fetching {url}"))]
    Fetching { source: reqwest::Error, url: String },
    #[snafu(display("Timed out fetching {url}"))]
    FetchTimeout { url: String },
    #[snafu(display("Fetching {url} returned HTTP status {status}"))]
    FetchStatus { url: String, status: u16 },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error + Send + Sync>, Some)))]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

pub type InsightResult<T> = Result<T, InsightError>;

/// Where the data of a dashboard session comes from.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DataSources {
    pub geo: String,
    pub results: Vec<String>,
    pub ui_config: Option<String>,
    pub timeout: Duration,
}

/// Loads the configuration, the geographic layer and all the result files,
/// then builds the dashboard.
///
/// The result files are read in parallel. The index is only built once every
/// file has been read: any failure aborts the whole load.
pub fn load_dashboard(sources: &DataSources) -> InsightResult<Dashboard> {
    if sources.results.is_empty() {
        whatever!("No result files provided");
    }
    let config = read_ui_config(sources.ui_config.as_deref(), sources.timeout);
    debug!("load_dashboard: filter config: {:?}", config);

    let features = read_geojson(&sources.geo, sources.timeout)?;
    info!("Loaded {} precinct features from {}", features.len(), sources.geo);

    let per_file: Vec<Vec<ElectionRow>> = sources
        .results
        .par_iter()
        .map(|src| read_election_csv(src, sources.timeout))
        .collect::<InsightResult<Vec<Vec<ElectionRow>>>>()?;
    let rows: Vec<ElectionRow> = per_file.into_iter().flatten().collect();
    info!("Loaded {} result rows from {} files", rows.len(), sources.results.len());

    Ok(Dashboard::new(&rows, features, config))
}

/// The selection requested on the command line. Explicit options take
/// precedence over the ones carried by a URL fragment.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ViewRequest {
    pub fragment: Option<String>,
    pub year: Option<u32>,
    pub office: Option<String>,
    pub metric: Option<String>,
    pub county: Option<String>,
    pub senior: Option<String>,
    pub junior: Option<String>,
    pub precinct: Option<String>,
    pub search: Option<String>,
}

/// Turns a request into the interactions a user would have made, in the
/// order the controls are laid out.
pub fn request_events(dashboard: &Dashboard, request: &ViewRequest) -> InsightResult<Vec<SelectionEvent>> {
    let from_fragment = request
        .fragment
        .as_deref()
        .map(parse_fragment)
        .unwrap_or_default();

    let mut events: Vec<SelectionEvent> = Vec::new();
    if let Some(y) = request.year.or(from_fragment.year) {
        if !dashboard.years().contains(&y) {
            warn!("Year {} has no results (available: {:?})", y, dashboard.years());
        }
        events.push(SelectionEvent::Year(y));
    }
    if let Some(o) = &request.office {
        if !dashboard.offices().contains(o) {
            warn!("Office {} has no results (available: {:?})", o, dashboard.offices());
        }
        events.push(SelectionEvent::Office(o.clone()));
    }
    let metric = match &request.metric {
        Some(m) => match m.parse::<Metric>() {
            Ok(x) => Some(x),
            Err(e) => whatever!("{}", e),
        },
        None => from_fragment.metric,
    };
    if let Some(m) = metric {
        events.push(SelectionEvent::Metric(m));
    }
    if let Some(c) = request.county.clone().or(from_fragment.county) {
        events.push(SelectionEvent::County(Some(c)));
    }
    if let Some(s) = &request.senior {
        events.push(SelectionEvent::SeniorDistrict(Some(s.clone())));
    }
    if let Some(j) = &request.junior {
        events.push(SelectionEvent::JuniorDistrict(Some(j.clone())));
    }
    if let Some(q) = &request.search {
        match dashboard
            .find_precinct_by_name(q)
            .and_then(|f| dashboard.precinct_id(f))
        {
            Some(pid) => events.push(SelectionEvent::Precinct(Some(pid.to_string()))),
            None => warn!("No precinct name matches {:?}", q),
        }
    }
    if let Some(p) = request.precinct.clone().or(from_fragment.precinct) {
        events.push(SelectionEvent::Precinct(Some(p)));
    }
    Ok(events)
}

fn kpi_to_json(k: &Kpi) -> JSValue {
    json!({
        "precinct_id": k.precinct_id,
        "precinct_name": k.precinct_name,
        "county": k.county,
        "registered": k.registered,
        "turnout_pct": k.turnout_pct,
        "dem": k.dem,
        "gop": k.gop,
        "oth": k.oth,
        "total": k.total,
        "dem_share": k.dem_share,
        "gop_share": k.gop_share,
        "margin": k.margin,
    })
}

/// Assembles the JSON document describing a rendered view.
pub fn view_to_json(dashboard: &Dashboard, view: &DashboardView, with_colors: bool) -> JSValue {
    let sel = &view.selection;
    let details: Vec<JSValue> = view
        .details
        .iter()
        .map(|(label, value)| json!({"label": label, "value": value}))
        .collect();
    let details_js = if details.is_empty() {
        json!(DETAILS_PLACEHOLDER)
    } else {
        json!(details)
    };
    let visible_ids: Vec<String> = view
        .visible
        .features
        .iter()
        .filter_map(|idx| dashboard.features().get(*idx))
        .filter_map(|f| dashboard.precinct_id(f))
        .map(|s| s.to_string())
        .collect();
    let extent = view
        .visible
        .extent
        .map(|b| json!([b.min().x, b.min().y, b.max().x, b.max().y]));

    let mut js = json!({
        "selection": {
            "year": sel.year,
            "office": sel.office,
            "metric": sel.metric.as_str(),
            "county": sel.county,
            "senior_district": sel.senior_district,
            "junior_district": sel.junior_district,
            "precinct": sel.selected_precinct,
        },
        "options": {
            "years": dashboard.years(),
            "offices": dashboard.offices(),
            "counties": view.county_options,
            "senior_districts": view.senior_options,
            "junior_districts": view.junior_options,
        },
        "kpi": view.kpi.as_ref().map(kpi_to_json),
        "details": details_js,
        "tiles": {
            "turnout": view.tiles.turnout,
            "dem": view.tiles.dem,
            "gop": view.tiles.gop,
            "margin": view.tiles.margin,
        },
        "fragment": view.fragment,
        "visible": {
            "count": view.visible.features.len(),
            "precincts": visible_ids,
            "extent": extent,
        },
    });

    if with_colors {
        let colors: JSMap<String, JSValue> = dashboard
            .paint(sel)
            .into_iter()
            .filter_map(|(pid, color)| pid.map(|p| (p, json!(color))))
            .collect();
        js["colors"] = JSValue::Object(colors);
    }
    js
}

pub fn read_reference(path: &str) -> InsightResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    Ok(js)
}

fn write_output(pretty: &str, out: Option<&str>) -> InsightResult<()> {
    match out {
        None | Some("stdout") => {
            println!("{}", pretty);
        }
        Some(path) => {
            if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).context(OpeningFileSnafu {
                    path: parent.display().to_string(),
                })?;
            }
            fs::write(path, pretty).context(OpeningFileSnafu { path })?;
            info!("Wrote view to {}", path);
        }
    }
    Ok(())
}

/// Loads the data, applies the requested selection and prints the view.
///
/// When a reference file is given, the output must match it exactly.
pub fn run_view(
    sources: &DataSources,
    request: &ViewRequest,
    out: Option<&str>,
    reference: Option<&str>,
    with_colors: bool,
) -> InsightResult<()> {
    let dashboard = load_dashboard(sources)?;
    let mut state = dashboard.initial_state();
    for event in request_events(&dashboard, request)? {
        let outcomes = dashboard.apply(&mut state, &event);
        debug!("run_view: {:?} -> {:?}", event, outcomes);
    }
    let view = dashboard.render(&state);
    let result_js = view_to_json(&dashboard, &view, with_colors);
    let pretty_js = serde_json::to_string_pretty(&result_js).context(WritingJsonSnafu {})?;
    write_output(&pretty_js, out)?;

    if let Some(reference_p) = reference {
        let reference_js = read_reference(reference_p)?;
        let pretty_reference =
            serde_json::to_string_pretty(&reference_js).context(WritingJsonSnafu {})?;
        if pretty_reference != pretty_js {
            warn!("Found differences with the reference view");
            print_diff(pretty_reference.as_str(), pretty_js.as_str(), "\n");
            whatever!("Difference detected between the computed view and the reference view")
        }
        info!("View matches reference {}", reference_p);
    }
    Ok(())
}
