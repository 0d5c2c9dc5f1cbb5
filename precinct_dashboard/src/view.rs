//! The values handed to the renderer: colors, detail panel, KPI tiles, the
//! shareable URL fragment and the visible extent.

use std::str::FromStr;

use geo::{coord, BoundingRect, GeometryCollection, Rect};

use crate::config::*;
use crate::filters::{matches, norm};
use crate::state::Selection;

/// Paint for features that cannot be matched to any result.
pub const NO_DATA_COLOR: &str = "#cccccc";

// Diverging scale, blue for DEM leads and red for GOP leads.
const MARGIN_SCALE: [(f64, &str); 6] = [
    (20.0, "#1f78b4"),
    (10.0, "#6baed6"),
    (2.0, "#9ecae1"),
    (-2.0, "#cccccc"),
    (-10.0, "#fcae91"),
    (-20.0, "#fb6a4a"),
];
const MARGIN_FLOOR: &str = "#cb181d";

const SEQUENTIAL_SCALE: [(f64, &str); 6] = [
    (70.0, "#08519c"),
    (60.0, "#2171b5"),
    (50.0, "#4292c6"),
    (40.0, "#6baed6"),
    (30.0, "#9ecae1"),
    (20.0, "#c6dbef"),
];
const SEQUENTIAL_FLOOR: &str = "#deebf7";

/// Maps a metric value to a fill color. Thresholds are exclusive lower bounds.
pub fn numeric_to_color(v: f64, metric: Metric) -> &'static str {
    let (scale, floor) = match metric {
        Metric::Margin => (&MARGIN_SCALE, MARGIN_FLOOR),
        _ => (&SEQUENTIAL_SCALE, SEQUENTIAL_FLOOR),
    };
    scale
        .iter()
        .find(|(threshold, _)| v > *threshold)
        .map(|(_, color)| *color)
        .unwrap_or(floor)
}

// ******** Details panel *********

pub const DETAILS_PLACEHOLDER: &str = "Click a precinct...";
const MISSING_TILE: &str = "--";

/// Office codes use underscores; only the first one is shown as a space.
pub fn office_label(office: &str) -> String {
    office.replacen('_', " ", 1)
}

/// The label/value rows of the details panel.
pub fn detail_rows(kpi: &Kpi, selection: &Selection) -> Vec<(String, String)> {
    let year = selection.year.map(|y| y.to_string()).unwrap_or_default();
    vec![
        ("Precinct", kpi.precinct_name.clone()),
        ("County", kpi.county.clone()),
        ("Year", year),
        ("Office", office_label(&selection.office)),
        ("Registered", kpi.registered.to_string()),
        ("Turnout", format!("{:.1}%", kpi.turnout_pct)),
        ("DEM", format!("{} ({:.1}%)", kpi.dem, kpi.dem_share)),
        ("GOP", format!("{} ({:.1}%)", kpi.gop, kpi.gop_share)),
        ("Margin", format!("{:.1} pts", kpi.margin)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// The four headline numbers.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct KpiTiles {
    pub turnout: String,
    pub dem: String,
    pub gop: String,
    pub margin: String,
}

impl KpiTiles {
    pub fn from_kpi(kpi: Option<&Kpi>) -> KpiTiles {
        match kpi {
            Some(k) => KpiTiles {
                turnout: format!("{:.1}%", k.turnout_pct),
                dem: format!("{:.1}%", k.dem_share),
                gop: format!("{:.1}%", k.gop_share),
                margin: format!("{:.1}", k.margin),
            },
            None => KpiTiles {
                turnout: MISSING_TILE.to_string(),
                dem: MISSING_TILE.to_string(),
                gop: MISSING_TILE.to_string(),
                margin: MISSING_TILE.to_string(),
            },
        }
    }
}

// ******** URL fragment *********

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(b, b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')')
}

/// Percent-encodes everything but the URI component unreserved characters.
pub fn encode_component(s: &str) -> String {
    let mut res = String::with_capacity(s.len());
    for b in s.bytes() {
        if is_unreserved(b) {
            res.push(b as char);
        } else {
            res.push_str(&format!("%{:02X}", b));
        }
    }
    res
}

/// Reverses `encode_component`. Malformed escapes are kept as they are.
pub fn decode_component(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = &bytes[i + 1..i + 3];
            let v = std::str::from_utf8(hex)
                .ok()
                .filter(|h| h.bytes().all(|b| b.is_ascii_hexdigit()))
                .and_then(|h| u8::from_str_radix(h, 16).ok());
            if let Some(v) = v {
                out.push(v);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// `year=…&metric=…&county=…&p=…`, leaving out what is not set.
pub fn url_fragment(selection: &Selection) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(y) = selection.year {
        parts.push(format!("year={}", y));
    }
    parts.push(format!("metric={}", selection.metric));
    if let Some(c) = &selection.county {
        parts.push(format!("county={}", encode_component(c)));
    }
    if let Some(p) = &selection.selected_precinct {
        parts.push(format!("p={}", p));
    }
    parts.join("&")
}

/// The parts of a selection carried by a URL fragment.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct FragmentSelection {
    pub year: Option<u32>,
    pub metric: Option<Metric>,
    pub county: Option<String>,
    pub precinct: Option<String>,
}

/// Reads back a fragment written by `url_fragment`. A leading `#` is allowed,
/// unknown keys and unparseable values are skipped.
pub fn parse_fragment(fragment: &str) -> FragmentSelection {
    let mut res = FragmentSelection::default();
    let body = fragment.strip_prefix('#').unwrap_or(fragment);
    for part in body.split('&').filter(|p| !p.is_empty()) {
        let (key, raw) = part.split_once('=').unwrap_or((part, ""));
        let value = decode_component(raw);
        match key {
            "year" => res.year = value.parse::<u32>().ok(),
            "metric" => res.metric = Metric::from_str(&value).ok(),
            "county" if !value.is_empty() => res.county = Some(value),
            "p" if !value.is_empty() => res.precinct = Some(value),
            _ => {}
        }
    }
    res
}

// ******** Visibility *********

/// The features left on screen by the active filters.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct VisibleSet {
    /// Positions of the visible features in the geographic layer.
    pub features: Vec<usize>,
    /// Union of the visible extents, padded by 5%.
    pub extent: Option<Rect<f64>>,
}

pub const EXTENT_PADDING: f64 = 0.05;

/// Grows a box on every side by `ratio` times its width (resp. height).
pub fn pad_extent(r: &Rect<f64>, ratio: f64) -> Rect<f64> {
    let dx = r.width() * ratio;
    let dy = r.height() * ratio;
    Rect::new(
        coord! { x: r.min().x - dx, y: r.min().y - dy },
        coord! { x: r.max().x + dx, y: r.max().y + dy },
    )
}

/// Features matching every active filter (county, senior and junior district).
pub fn visible_features(
    selection: &Selection,
    fields: &FieldAliases,
    features: &[PrecinctFeature],
) -> VisibleSet {
    let want_county = norm(selection.county.as_deref());
    let want_senior = norm(selection.senior_district.as_deref());
    let want_junior = norm(selection.junior_district.as_deref());

    let mut res = VisibleSet::default();
    let mut boxes: Vec<Rect<f64>> = Vec::new();
    for (idx, f) in features.iter().enumerate() {
        let visible = matches(&want_county, f.lookup(&fields.county))
            && matches(&want_senior, f.lookup(&fields.senior))
            && matches(&want_junior, f.lookup(&fields.junior));
        if !visible {
            continue;
        }
        res.features.push(idx);
        if let Some(b) = f.bbox {
            boxes.push(b);
        }
    }
    res.extent = boxes
        .into_iter()
        .collect::<GeometryCollection<f64>>()
        .bounding_rect()
        .map(|e| pad_extent(&e, EXTENT_PADDING));
    res
}

/// Everything the renderer needs to redraw after a selection change, except
/// the per-precinct colors which come from `Dashboard::color_scale`.
#[derive(PartialEq, Debug, Clone)]
pub struct DashboardView {
    pub selection: Selection,
    pub county_options: Vec<String>,
    pub senior_options: Vec<String>,
    pub junior_options: Vec<String>,
    pub kpi: Option<Kpi>,
    pub details: Vec<(String, String)>,
    pub tiles: KpiTiles,
    pub fragment: String,
    pub visible: VisibleSet,
}
