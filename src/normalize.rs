//! Turns raw feed rows into canonical features: attaches station geometry,
//! coerces numeric fields, discretizes visibility, and drops rows whose
//! station is unknown or outside the unit's bounding box.

use crate::feeds::decode::{RawStation, ReportRow};
use crate::stations::resolver::StationResolver;
use crate::types::bounding_box::BoundingBox;
use crate::types::data_kind::DataKind;
use crate::types::feature::{Feature, FeatureKind, Geometry, INVALID_ELEVATION};
use log::{debug, info, warn};
use serde_json::Value;

/// Counters from one normalization pass. `valid` features survive; `skipped`
/// rows referenced unknown stations or carried no timestamp;
/// `out_of_bounds` rows resolved fine but fell outside the unit's box.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NormalizeOutcome {
    pub features: Vec<Feature>,
    pub total: usize,
    pub skipped: usize,
    pub out_of_bounds: usize,
}

/// Coerces a feed cell to a finite number. A leading `+` (as in `+6000`) is
/// a formatting artifact and stripped before parsing. Returns `None` for
/// empty or malformed cells; the caller then leaves the field absent.
pub fn coerce_number(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().trim_start_matches('+');
    let value: f64 = cleaned.parse().ok()?;
    value.is_finite().then_some(value)
}

/// Visibility values are discretized by rounding up to the next whole
/// thousand: `6500` becomes `7000`, `6000` stays `6000`.
pub fn discretize_visibility(raw: &str) -> Option<i64> {
    let value = coerce_number(&raw.replace('+', ""))?;
    Some((value / 1000.0).ceil() as i64 * 1000)
}

fn set_number(feature: &mut Feature, name: &str, cell: Option<&String>) {
    if let Some(value) = cell.and_then(|raw| coerce_number(raw)) {
        feature.set_property(name, value);
    }
}

/// Builds report features from raw rows, resolving each station identifier
/// against the resolver table. Unresolvable rows are skipped with a warning
/// carrying the row ordinal, matching the run logs operators grep for.
pub fn report_features(
    kind: DataKind,
    rows: &[ReportRow],
    resolver: &StationResolver,
    station_prefix: &str,
    bbox: &BoundingBox,
) -> NormalizeOutcome {
    let mut outcome = NormalizeOutcome {
        total: rows.len(),
        ..NormalizeOutcome::default()
    };
    for (index, row) in rows.iter().enumerate() {
        let ordinal = index + 1;
        let station_id = row.station_id.as_deref().unwrap_or_default();
        let icao = format!("{}{}", station_prefix, station_id);
        let Some(station) = resolver.resolve(&icao) else {
            warn!("{}th element has invalid icao code: {}", ordinal, icao);
            outcome.skipped += 1;
            continue;
        };
        let Some(time) = row.time.as_deref() else {
            warn!("{}th element has no timestamp, skipping", ordinal);
            outcome.skipped += 1;
            continue;
        };
        // Geometry is copied from the station at resolution time and never
        // re-derived later.
        let geometry = station.geometry.clone();
        if let Some(point) = &geometry {
            if !bbox.contains(point.longitude, point.latitude) {
                debug!("{}th element ({}) is outside the unit bbox", ordinal, icao);
                outcome.out_of_bounds += 1;
                continue;
            }
        }

        let mut feature = Feature::new(kind.feature_kind());
        feature.geometry = geometry;
        feature.set_property("key", format!("{}-{}", station_id, time));
        let name = station
            .property_str("site")
            .or_else(|| station.property_str("name"))
            .unwrap_or(station_id);
        feature.set_property("name", name);
        feature.set_property("icao", icao.clone());
        feature.set_property(kind.time_property(), time);
        set_number(&mut feature, "temperature", row.temperature.as_ref());
        set_number(&mut feature, "dewpoint", row.dewpoint.as_ref());
        set_number(&mut feature, "windDirection", row.wind_direction.as_ref());
        set_number(&mut feature, "windSpeed", row.wind_speed.as_ref());
        set_number(&mut feature, "windGust", row.wind_gust.as_ref());
        if let Some(raw_text) = &row.raw_text {
            feature.set_property("rawOb", raw_text.clone());
        }
        if let Some(visibility) = row.visibility.as_deref().and_then(discretize_visibility) {
            feature.set_property("visibility", visibility);
        }
        if let Some(cover) = &row.cloud_cover {
            feature.set_property("cloudCover", cover.clone());
        }
        outcome.features.push(feature);
    }
    info!(
        "Found {} valid {} over {}",
        outcome.features.len(),
        kind,
        outcome.total
    );
    outcome
}

/// Builds station features from the stations JSON feed. Entries without a
/// position, or flagged with the invalid elevation marker, are dropped.
pub fn station_features(records: Vec<RawStation>, station_prefix: &str) -> Vec<Feature> {
    let mut stations = Vec::new();
    for record in records {
        let (Some(lat), Some(lon)) = (record.lat, record.lon) else {
            continue;
        };
        if record.elev == Some(INVALID_ELEVATION) {
            continue;
        }
        let mut feature = Feature::new(FeatureKind::Station);
        feature.geometry = Some(Geometry::new(lon, lat, record.elev));
        feature.set_property("icao", format!("{}{}", station_prefix, record.icao_id));
        if let Some(site) = &record.site {
            feature.set_property("name", site.clone());
        }
        feature.set_property("icaoId", record.icao_id.clone());
        if let Some(site) = &record.site {
            feature.set_property("site", site.clone());
        }
        for (name, value) in &record.extra {
            feature.properties.insert(name.clone(), value.clone());
        }
        stations.push(feature);
    }
    info!("Found {} stations", stations.len());
    stations
}

/// Convenience for tests and callers that already hold station documents.
pub fn station_features_from_documents(documents: &[Value]) -> Vec<Feature> {
    documents
        .iter()
        .map(|document| Feature::from_document(FeatureKind::Station, document))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::bounding_box::WORLD;

    fn kden_row() -> ReportRow {
        ReportRow {
            raw_text: Some("METAR KDEN 010000Z ...".to_string()),
            station_id: Some("KDEN".to_string()),
            time: Some("2024-01-01T00:00:00Z".to_string()),
            temperature: Some("5".to_string()),
            dewpoint: Some("-2".to_string()),
            wind_direction: Some("270".to_string()),
            wind_speed: Some("10".to_string()),
            wind_gust: None,
            visibility: Some("+10000".to_string()),
            cloud_cover: Some("BKN".to_string()),
        }
    }

    fn kden_resolver() -> StationResolver {
        let mut station = Feature::new(FeatureKind::Station);
        station.geometry = Some(Geometry::new(-104.67, 39.86, Some(1650.0)));
        station.set_property("icao", "#KDEN");
        station.set_property("site", "Denver Intl");
        StationResolver::from_features([station])
    }

    #[test]
    fn numeric_coercion_strips_formatting_artifacts() {
        assert_eq!(coerce_number("5"), Some(5.0));
        assert_eq!(coerce_number("+6000"), Some(6000.0));
        assert_eq!(coerce_number("-2"), Some(-2.0));
        assert_eq!(coerce_number(""), None);
        assert_eq!(coerce_number("BKN"), None);
    }

    #[test]
    fn visibility_rounds_up_to_whole_thousands() {
        assert_eq!(discretize_visibility("6000"), Some(6000));
        assert_eq!(discretize_visibility("+6000"), Some(6000));
        assert_eq!(discretize_visibility("6500"), Some(7000));
        assert_eq!(discretize_visibility(""), None);
    }

    #[test]
    fn resolves_and_normalizes_a_report_row() {
        let outcome = report_features(
            DataKind::Metars,
            &[kden_row()],
            &kden_resolver(),
            "#",
            &WORLD,
        );
        assert_eq!(outcome.total, 1);
        assert_eq!(outcome.skipped, 0);
        let feature = &outcome.features[0];
        assert_eq!(feature.key(), Some("KDEN-2024-01-01T00:00:00Z"));
        assert_eq!(feature.icao(), Some("#KDEN"));
        assert_eq!(feature.property_str("name"), Some("Denver Intl"));
        assert_eq!(feature.property("temperature"), Some(&Value::from(5.0)));
        assert_eq!(feature.property("dewpoint"), Some(&Value::from(-2.0)));
        assert_eq!(feature.property("visibility"), Some(&Value::from(10000)));
        assert_eq!(feature.property_str("cloudCover"), Some("BKN"));
        // Empty gust cell: the field never appears.
        assert_eq!(feature.property("windGust"), None);
        // Geometry copied from the station.
        assert_eq!(
            feature.geometry,
            Some(Geometry::new(-104.67, 39.86, Some(1650.0)))
        );
    }

    #[test]
    fn unknown_station_increments_skip_counter() {
        let mut unknown = kden_row();
        unknown.station_id = Some("KXYZ".to_string());
        let rows = vec![kden_row(), unknown, kden_row()];
        let outcome = report_features(DataKind::Metars, &rows, &kden_resolver(), "#", &WORLD);
        assert_eq!(outcome.total, 3);
        assert_eq!(outcome.features.len(), 2);
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn rows_outside_the_bbox_are_dropped() {
        let europe = BoundingBox::new(-10.0, 35.0, 30.0, 60.0).unwrap();
        let outcome = report_features(DataKind::Metars, &[kden_row()], &kden_resolver(), "#", &europe);
        assert!(outcome.features.is_empty());
        assert_eq!(outcome.out_of_bounds, 1);
        assert_eq!(outcome.skipped, 0);
    }

    #[test]
    fn invalid_stations_are_dropped_from_the_feed() {
        let records = vec![
            RawStation {
                icao_id: "KDEN".to_string(),
                site: Some("Denver Intl".to_string()),
                lat: Some(39.86),
                lon: Some(-104.67),
                elev: Some(1650.0),
                extra: serde_json::Map::new(),
            },
            RawStation {
                icao_id: "XXXX".to_string(),
                site: None,
                lat: Some(0.0),
                lon: Some(0.0),
                elev: Some(INVALID_ELEVATION),
                extra: serde_json::Map::new(),
            },
            RawStation {
                icao_id: "YYYY".to_string(),
                site: None,
                lat: None,
                lon: None,
                elev: None,
                extra: serde_json::Map::new(),
            },
        ];
        let stations = station_features(records, "#");
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].icao(), Some("#KDEN"));
        assert_eq!(stations[0].property_str("icaoId"), Some("KDEN"));
    }
}
