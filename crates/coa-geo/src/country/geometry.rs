//! GeoJSON reading and writing, and the transforms behind geometry views.

use geo::{BoundingRect, Centroid, Coord, MultiPolygon, Point, Polygon, Scale, Translate};
use geojson::{FeatureCollection, GeoJson};
use serde_json::{Map, Value as JsonValue};

use coa_model::{CoaError, Result};

/// A GeoJSON feature reduced to what hierarchies need.
#[derive(Debug, Clone)]
pub struct RawFeature {
    pub id: Option<String>,
    pub properties: Map<String, JsonValue>,
    pub geometry: MultiPolygon<f64>,
}

impl RawFeature {
    /// Property as text; `"id"` falls back to the feature id.
    pub fn text(&self, key: &str) -> Option<String> {
        let value = match self.properties.get(key) {
            Some(JsonValue::String(s)) => Some(s.trim().to_string()),
            Some(JsonValue::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        value
            .filter(|v| !v.is_empty())
            .or_else(|| (key == "id").then(|| self.id.clone()).flatten())
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        match self.properties.get(key)? {
            JsonValue::Number(n) => n.as_f64(),
            JsonValue::String(s) => coa_ingest::parse_number(s, '.'),
            _ => None,
        }
    }
}

/// Parses a feature collection; features without areal geometry are skipped.
pub fn read_features(text: &str, origin: &str) -> Result<Vec<RawFeature>> {
    let geojson: GeoJson = text
        .parse()
        .map_err(|e| CoaError::fetch(origin, format!("invalid GeoJSON: {e}")))?;
    let collection = FeatureCollection::try_from(geojson)
        .map_err(|e| CoaError::fetch(origin, format!("expected a feature collection: {e}")))?;

    let mut features = Vec::with_capacity(collection.features.len());
    let mut skipped = 0usize;
    for feature in collection.features {
        let Some(geometry) = feature.geometry else {
            skipped += 1;
            continue;
        };
        let geometry = match geo::Geometry::<f64>::try_from(geometry) {
            Ok(geo::Geometry::Polygon(polygon)) => MultiPolygon::new(vec![polygon]),
            Ok(geo::Geometry::MultiPolygon(multi)) => multi,
            _ => {
                skipped += 1;
                continue;
            }
        };
        let id = feature.id.map(|id| match id {
            geojson::feature::Id::String(s) => s,
            geojson::feature::Id::Number(n) => n.to_string(),
        });
        features.push(RawFeature {
            id,
            properties: feature.properties.unwrap_or_default(),
            geometry,
        });
    }
    if skipped > 0 {
        tracing::debug!(origin, skipped, "features without polygon geometry skipped");
    }
    Ok(features)
}

/// Serializes a geometry as a GeoJSON geometry object.
pub fn to_geojson_string(geometry: &MultiPolygon<f64>) -> Result<String> {
    let value = geojson::Geometry::new(geojson::Value::from(geometry));
    Ok(serde_json::to_string(&value)?)
}

/// Concatenates the polygons of several geometries.
pub fn combine<'a>(parts: impl IntoIterator<Item = &'a MultiPolygon<f64>>) -> MultiPolygon<f64> {
    let polygons: Vec<Polygon<f64>> = parts
        .into_iter()
        .flat_map(|part| part.0.iter().cloned())
        .collect();
    MultiPolygon::new(polygons)
}

/// Moves `geometry` so its centroid lands on `anchor`, scaling it first.
pub fn relocate(geometry: &MultiPolygon<f64>, anchor: (f64, f64), scale: f64) -> MultiPolygon<f64> {
    let Some(center) = geometry.centroid() else {
        return geometry.clone();
    };
    let scaled = if (scale - 1.0).abs() > f64::EPSILON {
        geometry.scale_around_point(scale, scale, center)
    } else {
        geometry.clone()
    };
    scaled.translate(anchor.0 - center.x(), anchor.1 - center.y())
}

/// Magnifies `geometry` around `center`, then moves `center` onto `anchor`.
pub fn magnify(
    geometry: &MultiPolygon<f64>,
    center: Point<f64>,
    factor: f64,
    anchor: (f64, f64),
) -> MultiPolygon<f64> {
    geometry
        .scale_around_point(factor, factor, center)
        .translate(anchor.0 - center.x(), anchor.1 - center.y())
}

/// Bounding box as (min, max) corners.
pub fn bounds(geometry: &MultiPolygon<f64>) -> Option<(Coord<f64>, Coord<f64>)> {
    geometry.bounding_rect().map(|rect| (rect.min(), rect.max()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn unit_square(x: f64, y: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x, y: y),
            (x: x + 1.0, y: y),
            (x: x + 1.0, y: y + 1.0),
            (x: x, y: y + 1.0),
            (x: x, y: y),
        ]])
    }

    #[test]
    fn relocate_moves_centroid_to_anchor() {
        let moved = relocate(&unit_square(60.0, -20.0), (-5.0, 45.0), 1.0);
        let center = moved.centroid().unwrap();
        assert!((center.x() + 5.0).abs() < 1e-9);
        assert!((center.y() - 45.0).abs() < 1e-9);
    }

    #[test]
    fn magnify_scales_extent() {
        let square = unit_square(0.0, 0.0);
        let center = square.centroid().unwrap();
        let big = magnify(&square, center, 3.0, (10.0, 10.0));
        let (min, max) = bounds(&big).unwrap();
        assert!((max.x - min.x - 3.0).abs() < 1e-9);
        assert!((min.x - 8.5).abs() < 1e-9);
    }

    #[test]
    fn reads_polygon_and_multipolygon_features() {
        let text = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","id":"06","properties":{"name":"California"},
             "geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}},
            {"type":"Feature","properties":{"code":75},
             "geometry":{"type":"MultiPolygon","coordinates":[[[[0,0],[1,0],[1,1],[0,0]]]]}},
            {"type":"Feature","properties":{},"geometry":{"type":"Point","coordinates":[0,0]}}
        ]}"#;
        let features = read_features(text, "inline").unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].text("id").as_deref(), Some("06"));
        assert_eq!(features[1].text("code").as_deref(), Some("75"));
        let json = to_geojson_string(&features[1].geometry).unwrap();
        assert!(json.contains("\"MultiPolygon\""));
    }

    #[test]
    fn invalid_geojson_is_fetch_failure() {
        let err = read_features("{not json", "https://x/geo.json").unwrap_err();
        assert_eq!(err.kind(), coa_model::ErrorKind::SourceFetchFailure);
    }
}
