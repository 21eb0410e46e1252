use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("failed to read target list {path:?}: {source}")]
    ReadInput {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("target list {path:?} is not a JSON array of {{name, url}}: {source}")]
    ParseInput {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not persist results to {primary:?} or {fallback:?}")]
    Persist { primary: PathBuf, fallback: PathBuf },

    #[error("configuration: {0}")]
    Config(#[from] config::ConfigError),
}
