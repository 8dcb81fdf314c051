//! The canonical geo-tagged record flowing through the ingestion pipeline: a
//! GeoJSON-style Feature with a point geometry and an ordered map of scalar
//! properties. Stations, observations and forecasts all share this shape.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

/// A JSON document as exchanged with the persistence collaborator.
///
/// Property order is preserved end to end (`serde_json` with
/// `preserve_order`), so persisted documents keep the field order the
/// normalizer produced.
pub type Document = Value;

/// Elevation marker used by the upstream station table for entries without a
/// usable position. Such stations never enter the resolver.
pub const INVALID_ELEVATION: f64 = 9999.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    Station,
    Observation,
    Forecast,
}

/// A GeoJSON point, `[longitude, latitude]` with an optional elevation third
/// coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub longitude: f64,
    pub latitude: f64,
    pub elevation: Option<f64>,
}

impl Geometry {
    pub fn new(longitude: f64, latitude: f64, elevation: Option<f64>) -> Self {
        Self {
            longitude,
            latitude,
            elevation,
        }
    }

    /// A geometry is usable when its elevation is not the upstream invalid
    /// marker.
    pub fn is_valid(&self) -> bool {
        self.elevation != Some(INVALID_ELEVATION)
    }

    pub fn to_value(&self) -> Value {
        let mut coordinates = vec![Value::from(self.longitude), Value::from(self.latitude)];
        if let Some(elevation) = self.elevation {
            coordinates.push(Value::from(elevation));
        }
        let mut object = Map::new();
        object.insert("type".to_string(), Value::from("Point"));
        object.insert("coordinates".to_string(), Value::Array(coordinates));
        Value::Object(object)
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        if object.get("type").and_then(Value::as_str) != Some("Point") {
            return None;
        }
        let coordinates = object.get("coordinates")?.as_array()?;
        let longitude = coordinates.first()?.as_f64()?;
        let latitude = coordinates.get(1)?.as_f64()?;
        let elevation = coordinates.get(2).and_then(Value::as_f64);
        Some(Self {
            longitude,
            latitude,
            elevation,
        })
    }
}

/// Canonical in-memory record. Serializes to a GeoJSON Feature document:
/// `{"type": "Feature", "time": ..., "geometry": ..., "properties": {...}}`.
///
/// `time` holds the raw feed timestamp string until the transform engine's
/// date conversion normalizes it; records fresh out of the report normalizer
/// carry their timestamp under `properties` only, the way the feeds do.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub kind: FeatureKind,
    pub time: Option<String>,
    pub geometry: Option<Geometry>,
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(kind: FeatureKind) -> Self {
        Self {
            kind,
            time: None,
            geometry: None,
            properties: Map::new(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn property_str(&self, name: &str) -> Option<&str> {
        self.property(name).and_then(Value::as_str)
    }

    pub fn set_property(&mut self, name: &str, value: impl Into<Value>) {
        self.properties.insert(name.to_string(), value.into());
    }

    /// The prefixed station identifier, when present.
    pub fn icao(&self) -> Option<&str> {
        self.property_str("icao")
    }

    /// The composite record key (`{station}-{time}`), when present.
    pub fn key(&self) -> Option<&str> {
        self.property_str("key")
    }

    /// Parses the named property as a UTC instant.
    pub fn instant_property(&self, name: &str) -> Option<DateTime<Utc>> {
        self.property_str(name).and_then(parse_utc_instant)
    }

    /// A station is usable as a resolver entry only with a valid geometry.
    pub fn is_valid_station(&self) -> bool {
        self.kind == FeatureKind::Station
            && self.geometry.as_ref().is_some_and(Geometry::is_valid)
    }

    pub fn to_document(&self) -> Document {
        let mut object = Map::new();
        object.insert("type".to_string(), Value::from("Feature"));
        if let Some(time) = &self.time {
            object.insert("time".to_string(), Value::from(time.clone()));
        }
        if let Some(geometry) = &self.geometry {
            object.insert("geometry".to_string(), geometry.to_value());
        }
        object.insert(
            "properties".to_string(),
            Value::Object(self.properties.clone()),
        );
        Value::Object(object)
    }

    /// Rebuilds a feature from a persisted document. Missing fields are
    /// tolerated; unknown ones are dropped.
    pub fn from_document(kind: FeatureKind, document: &Document) -> Self {
        let mut feature = Feature::new(kind);
        if let Some(object) = document.as_object() {
            feature.time = object
                .get("time")
                .and_then(Value::as_str)
                .map(str::to_string);
            feature.geometry = object.get("geometry").and_then(Geometry::from_value);
            if let Some(properties) = object.get("properties").and_then(Value::as_object) {
                feature.properties = properties.clone();
            }
        }
        feature
    }
}

/// Parses a feed timestamp into a UTC instant. Accepts RFC 3339, the
/// space-separated variant some caches emit, and bare epoch seconds.
pub fn parse_utc_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kden_station() -> Feature {
        let mut station = Feature::new(FeatureKind::Station);
        station.geometry = Some(Geometry::new(-104.67, 39.86, Some(1650.0)));
        station.set_property("icao", "#KDEN");
        station.set_property("name", "Denver Intl");
        station
    }

    #[test]
    fn station_with_invalid_elevation_is_rejected() {
        let mut station = kden_station();
        assert!(station.is_valid_station());
        station.geometry = Some(Geometry::new(-104.67, 39.86, Some(INVALID_ELEVATION)));
        assert!(!station.is_valid_station());
        station.geometry = None;
        assert!(!station.is_valid_station());
    }

    #[test]
    fn document_round_trip_preserves_fields() {
        let station = kden_station();
        let document = station.to_document();
        assert_eq!(
            document,
            json!({
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [-104.67, 39.86, 1650.0]},
                "properties": {"icao": "#KDEN", "name": "Denver Intl"}
            })
        );
        let restored = Feature::from_document(FeatureKind::Station, &document);
        assert_eq!(restored, station);
    }

    #[test]
    fn property_order_is_preserved() {
        let mut feature = Feature::new(FeatureKind::Observation);
        for name in ["key", "name", "icao", "temperature", "dewpoint"] {
            feature.set_property(name, name);
        }
        let names: Vec<&String> = feature.properties.keys().collect();
        assert_eq!(names, ["key", "name", "icao", "temperature", "dewpoint"]);
    }

    #[test]
    fn parses_feed_timestamps() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_utc_instant("2024-01-01T00:00:00Z"), Some(expected));
        assert_eq!(parse_utc_instant("2024-01-01 00:00:00"), Some(expected));
        assert_eq!(parse_utc_instant("1704067200"), Some(expected));
        assert_eq!(parse_utc_instant("not a time"), None);
    }
}
