use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("feed download or decompression failed")]
    DownloadIo(#[from] std::io::Error),

    #[error("failed to write feed artifact '{0}'")]
    ArtifactWrite(PathBuf, #[source] std::io::Error),

    #[error("background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("I/O error reading {kind} CSV table")]
    CsvReadIo {
        kind: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing error reading {kind} CSV table")]
    CsvReadPolars {
        kind: String,
        #[source]
        source: PolarsError,
    },

    #[error("{kind} CSV table has {found} columns, expected at least {expected}")]
    ColumnCount {
        kind: String,
        expected: usize,
        found: usize,
    },

    #[error("failed to parse stations JSON")]
    StationsJson(#[from] serde_json::Error),
}
