//! Retrieves the compressed feed files and hands back decompressed bytes.
//! The gunzipped payload is also persisted to the output directory, so a
//! run leaves the same `metars.csv` / `stations.json` artifacts behind that
//! operators are used to inspecting.

use crate::feeds::error::FeedError;
use crate::types::bounding_box::BoundingBox;
use crate::types::data_kind::DataKind;
use async_compression::tokio::bufread::GzipDecoder;
use futures_util::TryStreamExt;
use log::{info, warn};
use reqwest::Client;
use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::task;
use tokio_util::io::StreamReader;

const STATIONS_FEED_FILE: &str = "stations.cache.json.gz";
const STATIONS_ARTIFACT_FILE: &str = "stations.json";

pub struct FeedClient {
    base_url: String,
    output_dir: PathBuf,
    http: Client,
}

impl FeedClient {
    pub fn new(base_url: &str, output_dir: &Path) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            output_dir: output_dir.to_path_buf(),
            http: Client::new(),
        }
    }

    /// Downloads and decompresses one report feed, bounded to `bbox`.
    /// Endpoints that serve the whole cache ignore the parameter; the
    /// normalizer enforces the box either way.
    pub async fn fetch_reports(
        &self,
        kind: DataKind,
        bbox: &BoundingBox,
    ) -> Result<Vec<u8>, FeedError> {
        let url = format!(
            "{}/{}?bbox={}",
            self.base_url,
            kind.feed_file(),
            bbox.query_param()
        );
        let bytes = self.fetch_gzip(&url).await?;
        self.write_artifact(kind.artifact_file(), bytes.clone())
            .await?;
        Ok(bytes)
    }

    /// Downloads and decompresses the station metadata feed.
    pub async fn fetch_stations(&self) -> Result<Vec<u8>, FeedError> {
        let url = format!("{}/{}", self.base_url, STATIONS_FEED_FILE);
        let bytes = self.fetch_gzip(&url).await?;
        self.write_artifact(STATIONS_ARTIFACT_FILE, bytes.clone())
            .await?;
        Ok(bytes)
    }

    async fn fetch_gzip(&self, url: &str) -> Result<Vec<u8>, FeedError> {
        info!("Downloading feed from {}", url);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| FeedError::NetworkRequest(url.to_string(), e))?;
        let response = match response.error_for_status() {
            Ok(response) => response,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(if let Some(status) = e.status() {
                    FeedError::HttpStatus {
                        url: url.to_string(),
                        status,
                        source: e,
                    }
                } else {
                    FeedError::NetworkRequest(url.to_string(), e)
                });
            }
        };

        let stream = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        let stream_reader = StreamReader::new(stream);
        let mut decoder = BufReader::new(GzipDecoder::new(BufReader::new(stream_reader)));
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).await?;
        info!(
            "Downloaded and decompressed {} bytes from {}",
            decompressed.len(),
            url
        );
        Ok(decompressed)
    }

    /// Atomically writes a decompressed artifact into the output directory.
    async fn write_artifact(&self, name: &str, bytes: Vec<u8>) -> Result<PathBuf, FeedError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| FeedError::ArtifactWrite(self.output_dir.clone(), e))?;
        let target = self.output_dir.join(name);
        let path = target.clone();
        task::spawn_blocking(move || {
            let parent = path.parent().unwrap_or_else(|| Path::new("."));
            let mut temp_file = NamedTempFile::new_in(parent)
                .map_err(|e| FeedError::ArtifactWrite(path.clone(), e))?;
            temp_file
                .write_all(&bytes)
                .map_err(|e| FeedError::ArtifactWrite(path.clone(), e))?;
            temp_file
                .persist(&path)
                .map_err(|e| FeedError::ArtifactWrite(path.clone(), e.error))?;
            Ok::<PathBuf, FeedError>(path)
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::bounding_box::WORLD;

    #[test]
    fn report_url_carries_the_bbox() {
        let client = FeedClient::new(
            "https://aviationweather.gov/data/cache/",
            Path::new("./output"),
        );
        let url = format!(
            "{}/{}?bbox={}",
            client.base_url,
            DataKind::Metars.feed_file(),
            WORLD.query_param()
        );
        assert_eq!(
            url,
            "https://aviationweather.gov/data/cache/metars.cache.csv.gz?bbox=-180,-90,180,90"
        );
    }

    #[tokio::test]
    async fn artifacts_land_in_the_output_dir() -> Result<(), FeedError> {
        let dir = tempfile::tempdir()?;
        let client = FeedClient::new("http://localhost", dir.path());
        let path = client
            .write_artifact("metars.csv", b"raw,rows\n".to_vec())
            .await?;
        assert_eq!(tokio::fs::read(&path).await?, b"raw,rows\n");
        Ok(())
    }
}
