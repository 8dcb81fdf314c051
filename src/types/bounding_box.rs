//! Geographic bounding boxes: the `BBOX` configuration value, the grid used
//! to shard ingestion units, and the footprint FeatureCollection artifact.

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::types::feature::Document;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoundingBoxError {
    #[error("bounding box '{0}' must be 'minLon,minLat,maxLon,maxLat'")]
    Malformed(String),

    #[error("bounding box '{0}' has min >= max")]
    Inverted(String),

    #[error("bounding box '{0}' is outside lon [-180, 180] / lat [-90, 90]")]
    OutOfRange(String),
}

/// `minLon,minLat,maxLon,maxLat` in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

/// Whole-world extent, the default feed request.
pub const WORLD: BoundingBox = BoundingBox {
    min_lon: -180.0,
    min_lat: -90.0,
    max_lon: 180.0,
    max_lat: 90.0,
};

impl BoundingBox {
    pub fn new(
        min_lon: f64,
        min_lat: f64,
        max_lon: f64,
        max_lat: f64,
    ) -> Result<Self, BoundingBoxError> {
        let bbox = Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        };
        if min_lon >= max_lon || min_lat >= max_lat {
            return Err(BoundingBoxError::Inverted(bbox.to_string()));
        }
        if !(-180.0..=180.0).contains(&min_lon)
            || !(-180.0..=180.0).contains(&max_lon)
            || !(-90.0..=90.0).contains(&min_lat)
            || !(-90.0..=90.0).contains(&max_lat)
        {
            return Err(BoundingBoxError::OutOfRange(bbox.to_string()));
        }
        Ok(bbox)
    }

    /// Inclusive containment on all edges; a point on a shared grid-cell
    /// border belongs to every adjacent cell, which is safe because records
    /// are keyed by identity, not by cell.
    pub fn contains(&self, longitude: f64, latitude: f64) -> bool {
        longitude >= self.min_lon
            && longitude <= self.max_lon
            && latitude >= self.min_lat
            && latitude <= self.max_lat
    }

    /// Splits the box into a `cols` x `rows` grid, row-major from the
    /// south-west corner.
    pub fn split(&self, grid: GridSpec) -> Vec<BoundingBox> {
        let width = (self.max_lon - self.min_lon) / grid.cols as f64;
        let height = (self.max_lat - self.min_lat) / grid.rows as f64;
        let mut cells = Vec::with_capacity(grid.cols * grid.rows);
        for row in 0..grid.rows {
            for col in 0..grid.cols {
                cells.push(BoundingBox {
                    min_lon: self.min_lon + col as f64 * width,
                    min_lat: self.min_lat + row as f64 * height,
                    max_lon: self.min_lon + (col + 1) as f64 * width,
                    max_lat: self.min_lat + (row + 1) as f64 * height,
                });
            }
        }
        cells
    }

    /// Value for the feed URL `bbox` query parameter.
    pub fn query_param(&self) -> String {
        self.to_string()
    }

    /// Closed polygon ring around the box, GeoJSON winding.
    pub fn polygon_ring(&self) -> Vec<[f64; 2]> {
        vec![
            [self.min_lon, self.min_lat],
            [self.max_lon, self.min_lat],
            [self.max_lon, self.max_lat],
            [self.min_lon, self.max_lat],
            [self.min_lon, self.min_lat],
        ]
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

impl FromStr for BoundingBox {
    type Err = BoundingBoxError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = raw
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| BoundingBoxError::Malformed(raw.to_string()))?;
        let [min_lon, min_lat, max_lon, max_lat] = parts[..] else {
            return Err(BoundingBoxError::Malformed(raw.to_string()));
        };
        Self::new(min_lon, min_lat, max_lon, max_lat)
    }
}

/// Grid dimensions for sharded ingestion, parsed from `COLSxROWS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSpec {
    pub cols: usize,
    pub rows: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("grid '{0}' must be 'COLSxROWS' with both sides > 0")]
pub struct GridSpecError(String);

impl FromStr for GridSpec {
    type Err = GridSpecError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (cols, rows) = raw
            .split_once(['x', 'X'])
            .ok_or_else(|| GridSpecError(raw.to_string()))?;
        let cols: usize = cols.trim().parse().map_err(|_| GridSpecError(raw.to_string()))?;
        let rows: usize = rows.trim().parse().map_err(|_| GridSpecError(raw.to_string()))?;
        if cols == 0 || rows == 0 {
            return Err(GridSpecError(raw.to_string()));
        }
        Ok(Self { cols, rows })
    }
}

/// Builds the footprint artifact: one polygon Feature per grid cell, tagged
/// with its cell index and the number of known stations it covers.
pub fn footprint_collection(cells: &[(BoundingBox, usize)]) -> Document {
    let features: Vec<Value> = cells
        .iter()
        .enumerate()
        .map(|(index, (bbox, stations))| {
            let ring: Vec<Value> = bbox
                .polygon_ring()
                .into_iter()
                .map(|[lon, lat]| Value::Array(vec![Value::from(lon), Value::from(lat)]))
                .collect();
            let mut geometry = Map::new();
            geometry.insert("type".to_string(), Value::from("Polygon"));
            geometry.insert(
                "coordinates".to_string(),
                Value::Array(vec![Value::Array(ring)]),
            );
            let mut properties = Map::new();
            properties.insert("cell".to_string(), Value::from(index));
            properties.insert("bbox".to_string(), Value::from(bbox.to_string()));
            properties.insert("stations".to_string(), Value::from(*stations));
            let mut feature = Map::new();
            feature.insert("type".to_string(), Value::from("Feature"));
            feature.insert("geometry".to_string(), Value::Object(geometry));
            feature.insert("properties".to_string(), Value::Object(properties));
            Value::Object(feature)
        })
        .collect();
    let mut collection = Map::new();
    collection.insert("type".to_string(), Value::from("FeatureCollection"));
    collection.insert("features".to_string(), Value::Array(features));
    Value::Object(collection)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_default_world_bbox() -> Result<(), BoundingBoxError> {
        let bbox: BoundingBox = "-180,-90,180,90".parse()?;
        assert_eq!(bbox, WORLD);
        assert_eq!(bbox.query_param(), "-180,-90,180,90");
        Ok(())
    }

    #[test]
    fn rejects_malformed_and_inverted_boxes() {
        assert!(matches!(
            "1,2,3".parse::<BoundingBox>(),
            Err(BoundingBoxError::Malformed(_))
        ));
        assert!(matches!(
            "10,0,-10,20".parse::<BoundingBox>(),
            Err(BoundingBoxError::Inverted(_))
        ));
        assert!(matches!(
            "-200,-90,180,90".parse::<BoundingBox>(),
            Err(BoundingBoxError::OutOfRange(_))
        ));
    }

    #[test]
    fn split_tiles_the_extent_exactly() {
        let cells = WORLD.split(GridSpec { cols: 4, rows: 2 });
        assert_eq!(cells.len(), 8);
        assert_eq!(cells[0].min_lon, -180.0);
        assert_eq!(cells[0].max_lon, -90.0);
        assert_eq!(cells[7].max_lon, 180.0);
        assert_eq!(cells[7].max_lat, 90.0);
        // Every point of the parent extent falls in at least one cell.
        assert!(cells.iter().any(|cell| cell.contains(-104.67, 39.86)));
    }

    #[test]
    fn grid_spec_parses_and_validates() {
        assert_eq!("4x2".parse::<GridSpec>(), Ok(GridSpec { cols: 4, rows: 2 }));
        assert_eq!("2X3".parse::<GridSpec>(), Ok(GridSpec { cols: 2, rows: 3 }));
        assert!("0x2".parse::<GridSpec>().is_err());
        assert!("4".parse::<GridSpec>().is_err());
    }

    #[test]
    fn footprint_collection_shape() {
        let cells = vec![(WORLD, 3)];
        let collection = footprint_collection(&cells);
        assert_eq!(collection["type"], "FeatureCollection");
        assert_eq!(collection["features"][0]["properties"]["stations"], 3);
        assert_eq!(
            collection["features"][0]["geometry"]["coordinates"][0][0][0],
            -180.0
        );
    }
}
