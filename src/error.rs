use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("malformed measurement: {0}")]
    Measurement(String),

    /// The engine could not be measured. The only error that aborts a run.
    #[error("{driver} collector failed: {message}")]
    Collect { driver: String, message: String },

    #[error("delivery to {recipient} failed: {message}")]
    Delivery { recipient: String, message: String },

    #[error("could not determine {0} directory")]
    NoProjectDir(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
