//! Decoders for the two feed shapes: the headerless report CSV table and the
//! stations JSON array. Parsing runs on blocking tasks; the output is plain
//! row structs the normalizer consumes.

use crate::feeds::error::FeedError;
use crate::types::data_kind::DataKind;
use polars::prelude::*;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::io::Write;
use tempfile::NamedTempFile;
use tokio::task;

// Positional layout of the report cache CSV.
const COL_RAW_TEXT: usize = 0;
const COL_STATION_ID: usize = 1;
const COL_TIME: usize = 2;
const COL_TEMPERATURE: usize = 5;
const COL_DEWPOINT: usize = 6;
const COL_WIND_DIRECTION: usize = 7;
const COL_WIND_SPEED: usize = 8;
const COL_WIND_GUST: usize = 9;
const COL_VISIBILITY: usize = 10;
const COL_CLOUD_COVER: usize = 22;

/// Columns a report table must carry for every field we read.
pub const MIN_REPORT_COLUMNS: usize = COL_CLOUD_COVER + 1;

/// One raw report row, fields still in feed form. Empty cells are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportRow {
    pub raw_text: Option<String>,
    pub station_id: Option<String>,
    pub time: Option<String>,
    pub temperature: Option<String>,
    pub dewpoint: Option<String>,
    pub wind_direction: Option<String>,
    pub wind_speed: Option<String>,
    pub wind_gust: Option<String>,
    pub visibility: Option<String>,
    pub cloud_cover: Option<String>,
}

/// One entry of the stations JSON feed. Fields beyond the position and the
/// identifiers ride along in `extra` and are carried onto the station record
/// verbatim.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStation {
    #[serde(rename = "icaoId")]
    pub icao_id: String,
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub elev: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn cell(columns: &[Column], col: usize, row: usize) -> Option<String> {
    columns
        .get(col)?
        .str()
        .ok()?
        .get(row)
        .map(str::to_string)
        .filter(|value| !value.is_empty())
}

/// Parses the decompressed report CSV into rows, skipping the first
/// `skip_lines` metadata/header lines. The table is read headerless with an
/// all-string schema; typing happens later, in the normalizer.
pub async fn report_rows(
    bytes: Vec<u8>,
    kind: DataKind,
    skip_lines: usize,
) -> Result<Vec<ReportRow>, FeedError> {
    let label = kind.label().to_string();
    task::spawn_blocking(move || {
        let mut temp_file = NamedTempFile::new().map_err(|e| FeedError::CsvReadIo {
            kind: label.clone(),
            source: e,
        })?;
        temp_file
            .write_all(&bytes)
            .and_then(|_| temp_file.flush())
            .map_err(|e| FeedError::CsvReadIo {
                kind: label.clone(),
                source: e,
            })?;

        let df = CsvReadOptions::default()
            .with_has_header(false)
            .with_skip_rows(skip_lines)
            .with_infer_schema_length(Some(0))
            .try_into_reader_with_file_path(Some(temp_file.path().to_path_buf()))
            .map_err(|e| FeedError::CsvReadPolars {
                kind: label.clone(),
                source: e,
            })?
            .finish()
            .map_err(|e| FeedError::CsvReadPolars {
                kind: label.clone(),
                source: e,
            })?;

        if df.width() < MIN_REPORT_COLUMNS {
            return Err(FeedError::ColumnCount {
                kind: label,
                expected: MIN_REPORT_COLUMNS,
                found: df.width(),
            });
        }

        let columns = df.get_columns();
        let rows = (0..df.height())
            .map(|row| ReportRow {
                raw_text: cell(columns, COL_RAW_TEXT, row),
                station_id: cell(columns, COL_STATION_ID, row),
                time: cell(columns, COL_TIME, row),
                temperature: cell(columns, COL_TEMPERATURE, row),
                dewpoint: cell(columns, COL_DEWPOINT, row),
                wind_direction: cell(columns, COL_WIND_DIRECTION, row),
                wind_speed: cell(columns, COL_WIND_SPEED, row),
                wind_gust: cell(columns, COL_WIND_GUST, row),
                visibility: cell(columns, COL_VISIBILITY, row),
                cloud_cover: cell(columns, COL_CLOUD_COVER, row),
            })
            .collect();
        Ok(rows)
    })
    .await?
}

/// Parses the decompressed stations JSON array.
pub async fn station_records(bytes: Vec<u8>) -> Result<Vec<RawStation>, FeedError> {
    task::spawn_blocking(move || {
        serde_json::from_slice::<Vec<RawStation>>(&bytes).map_err(FeedError::from)
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_csv() -> Vec<u8> {
        let mut lines = vec![
            "No errors".to_string(),
            "No warnings".to_string(),
            "2 ms".to_string(),
            "data source=metars".to_string(),
            "2 results".to_string(),
            "raw_text,station_id,observation_time,latitude,longitude,temp_c,dewpoint_c,wind_dir_degrees,wind_speed_kt,wind_gust_kt,visibility_statute_mi,altim_in_hg,sea_level_pressure_mb,corrected,auto,auto_station,maintenance_indicator_on,no_signal,lightning_sensor_off,freezing_rain_sensor_off,present_weather_sensor_off,wx_string,sky_cover,cloud_base_ft_agl".to_string(),
        ];
        lines.push("METAR KDEN 010000Z,KDEN,2024-01-01T00:00:00Z,39.86,-104.67,5,-2,270,10,,+10000,29.92,,,TRUE,,,,,,,,BKN,7000".to_string());
        lines.push("METAR KSFO 010000Z,KSFO,2024-01-01T00:00:00Z,37.62,-122.36,12,9,,4,18,6500,29.95,,,TRUE,,,,,,,,FEW,250".to_string());
        (lines.join("\n") + "\n").into_bytes()
    }

    #[tokio::test]
    async fn parses_rows_after_skipping_metadata() -> Result<(), FeedError> {
        let rows = report_rows(sample_csv(), DataKind::Metars, 6).await?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].station_id.as_deref(), Some("KDEN"));
        assert_eq!(rows[0].time.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(rows[0].temperature.as_deref(), Some("5"));
        assert_eq!(rows[0].visibility.as_deref(), Some("+10000"));
        assert_eq!(rows[0].cloud_cover.as_deref(), Some("BKN"));
        // Empty gust cell comes through as absent.
        assert_eq!(rows[0].wind_gust, None);
        assert_eq!(rows[1].wind_gust.as_deref(), Some("18"));
        Ok(())
    }

    #[tokio::test]
    async fn narrow_table_is_rejected() {
        let csv = b"a,b,c\n1,2,3\n".to_vec();
        let result = report_rows(csv, DataKind::Metars, 0).await;
        assert!(matches!(result, Err(FeedError::ColumnCount { .. })));
    }

    #[tokio::test]
    async fn parses_station_records_with_extras() -> Result<(), FeedError> {
        let json = br#"[
            {"icaoId": "KDEN", "site": "Denver Intl", "lat": 39.86, "lon": -104.67, "elev": 1650, "state": "CO", "country": "US"},
            {"icaoId": "XXXX", "lat": 0.0, "lon": 0.0, "elev": 9999}
        ]"#
        .to_vec();
        let stations = station_records(json).await?;
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].icao_id, "KDEN");
        assert_eq!(stations[0].extra.get("state"), Some(&Value::from("CO")));
        assert_eq!(stations[1].elev, Some(9999.0));
        Ok(())
    }
}
