//! GeoJSON export of the traveled path.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use super::state::{PositionSource, TrackPath};

#[derive(Debug, Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
    geometry: LineString,
    properties: Properties,
}

#[derive(Debug, Serialize)]
struct LineString {
    #[serde(rename = "type")]
    kind: &'static str,
    /// `[lon, lat]` pairs, GeoJSON axis order.
    coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Serialize)]
struct Properties {
    points: usize,
    distance_m: f64,
    source: String,
    exported_at: String,
}

/// Render `path` as a GeoJSON `Feature` with a `LineString` geometry.
pub fn path_to_geojson(
    path: &TrackPath,
    source: PositionSource,
    exported_at: DateTime<Utc>,
) -> Result<String, serde_json::Error> {
    let feature = Feature {
        kind: "Feature",
        geometry: LineString {
            kind: "LineString",
            coordinates: path
                .points()
                .iter()
                .map(|p| [p.longitude(), p.latitude()])
                .collect(),
        },
        properties: Properties {
            points: path.len(),
            distance_m: (path.length_m() * 10.0).round() / 10.0,
            source: source.to_string(),
            exported_at: exported_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        },
    };
    serde_json::to_string_pretty(&feature)
}
