// Reading the geographic layer of precincts.

use std::collections::BTreeMap;
use std::time::Duration;

use geo::{coord, BoundingRect, Coord, MultiPoint};

use crate::insight::{io_common::fetch_text, *};

fn property_text(v: &JSValue) -> Option<String> {
    match v {
        JSValue::Null => None,
        JSValue::String(s) => Some(s.clone()),
        x => Some(x.to_string()),
    }
}

fn collect_coords(coords: &JSValue, out: &mut Vec<Coord<f64>>) {
    let arr = match coords.as_array() {
        Some(a) => a,
        None => return,
    };
    match (arr.first().and_then(|x| x.as_f64()), arr.get(1).and_then(|y| y.as_f64())) {
        (Some(x), Some(y)) => out.push(coord! { x: x, y: y }),
        _ => {
            for c in arr.iter() {
                collect_coords(c, out);
            }
        }
    }
}

fn geometry_coords(geometry: &JSValue, out: &mut Vec<Coord<f64>>) {
    if let Some(children) = geometry.get("geometries").and_then(|g| g.as_array()) {
        for g in children.iter() {
            geometry_coords(g, out);
        }
    }
    if let Some(coords) = geometry.get("coordinates") {
        collect_coords(coords, out);
    }
}

fn parse_feature(feature: &JSValue) -> PrecinctFeature {
    let properties: BTreeMap<String, String> = feature
        .get("properties")
        .and_then(|p| p.as_object())
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| property_text(v).map(|s| (k.clone(), s)))
                .collect()
        })
        .unwrap_or_default();
    let mut coords: Vec<Coord<f64>> = Vec::new();
    if let Some(g) = feature.get("geometry") {
        geometry_coords(g, &mut coords);
    }
    let bbox = MultiPoint::from(coords).bounding_rect();
    PrecinctFeature { properties, bbox }
}

/// Parses a feature collection into precinct features, in layer order.
pub fn parse_geojson(text: &str, path: &str) -> InsightResult<Vec<PrecinctFeature>> {
    let js: JSValue = serde_json::from_str(text).context(ParsingJsonSnafu { path })?;
    let features = js
        .get("features")
        .and_then(|f| f.as_array())
        .context(MalformedGeoJsonSnafu {
            path,
            reason: "no features array",
        })?;
    let res: Vec<PrecinctFeature> = features.iter().map(parse_feature).collect();
    debug!(
        "parse_geojson: {}: {} features, {} without geometry",
        path,
        res.len(),
        res.iter().filter(|f| f.bbox.is_none()).count()
    );
    Ok(res)
}

pub fn read_geojson(source: &str, timeout: Duration) -> InsightResult<Vec<PrecinctFeature>> {
    let text = fetch_text(source, timeout)?;
    parse_geojson(&text, source)
}
