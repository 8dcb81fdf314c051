//! Exact lookup from a prefixed station identifier to its Station feature,
//! plus an R-tree over station positions for bounding-box queries (grid
//! footprint annotation).

use crate::types::bounding_box::BoundingBox;
use crate::types::feature::Feature;
use log::warn;
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use std::collections::HashMap;

/// A station position in the spatial index, `[longitude, latitude]`.
#[derive(Debug, Clone)]
struct StationPoint {
    position: [f64; 2],
}

impl RTreeObject for StationPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for StationPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        dx * dx + dy * dy
    }
}

/// Station lookup table for one ingestion run.
///
/// Built from the persisted station collection (or a fresh stations sync);
/// entries without a usable geometry are excluded up front, so a successful
/// resolution always yields a position to copy onto the report.
#[derive(Debug, Default)]
pub struct StationResolver {
    by_icao: HashMap<String, Feature>,
    rtree: RTree<StationPoint>,
}

impl StationResolver {
    /// Indexes the given station features. Invalid stations (missing
    /// coordinates or the upstream invalid-elevation marker) are dropped
    /// with a warning and never resolvable.
    pub fn from_features(features: impl IntoIterator<Item = Feature>) -> Self {
        let mut by_icao = HashMap::new();
        let mut points = Vec::new();
        for feature in features {
            let Some(icao) = feature.icao().map(str::to_string) else {
                warn!("station entry without icao identifier, dropping");
                continue;
            };
            if !feature.is_valid_station() {
                warn!("station {} has no usable position, dropping", icao);
                continue;
            }
            if let Some(geometry) = &feature.geometry {
                points.push(StationPoint {
                    position: [geometry.longitude, geometry.latitude],
                });
            }
            by_icao.insert(icao, feature);
        }
        Self {
            by_icao,
            rtree: RTree::bulk_load(points),
        }
    }

    /// Exact, case- and prefix-sensitive lookup.
    pub fn resolve(&self, icao: &str) -> Option<&Feature> {
        self.by_icao.get(icao)
    }

    /// Number of indexed stations inside `bbox` (edges inclusive).
    pub fn count_within(&self, bbox: &BoundingBox) -> usize {
        let envelope = AABB::from_corners(
            [bbox.min_lon, bbox.min_lat],
            [bbox.max_lon, bbox.max_lat],
        );
        self.rtree.locate_in_envelope(&envelope).count()
    }

    pub fn len(&self) -> usize {
        self.by_icao.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_icao.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::feature::{FeatureKind, Geometry, INVALID_ELEVATION};

    fn station(icao: &str, longitude: f64, latitude: f64, elevation: f64) -> Feature {
        let mut feature = Feature::new(FeatureKind::Station);
        feature.geometry = Some(Geometry::new(longitude, latitude, Some(elevation)));
        feature.set_property("icao", icao);
        feature
    }

    fn resolver() -> StationResolver {
        StationResolver::from_features([
            station("#KDEN", -104.67, 39.86, 1650.0),
            station("#KSFO", -122.36, 37.62, 3.0),
            station("#EHAM", 4.76, 52.31, -3.0),
        ])
    }

    #[test]
    fn resolves_exact_prefixed_identifiers_only() {
        let resolver = resolver();
        assert!(resolver.resolve("#KDEN").is_some());
        assert!(resolver.resolve("KDEN").is_none());
        assert!(resolver.resolve("#kden").is_none());
        assert!(resolver.resolve("#KXYZ").is_none());
    }

    #[test]
    fn invalid_stations_never_enter_the_table() {
        let resolver = StationResolver::from_features([
            station("#KDEN", -104.67, 39.86, 1650.0),
            station("#KBAD", -100.0, 40.0, INVALID_ELEVATION),
        ]);
        assert_eq!(resolver.len(), 1);
        assert!(resolver.resolve("#KBAD").is_none());
    }

    #[test]
    fn counts_stations_inside_a_bbox() {
        let resolver = resolver();
        let conus = BoundingBox::new(-130.0, 20.0, -60.0, 55.0).unwrap();
        assert_eq!(resolver.count_within(&conus), 2);
        let europe = BoundingBox::new(-10.0, 35.0, 30.0, 60.0).unwrap();
        assert_eq!(resolver.count_within(&europe), 1);
    }
}
