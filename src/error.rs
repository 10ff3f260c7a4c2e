use thiserror::Error;

/// Errors surfaced by data loading, configuration and metric writers.
///
/// Shape mismatches inside the numeric core are bugs, not runtime
/// conditions, and panic instead of landing here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IDX format error: {0}")]
    Idx(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("writer error: {0}")]
    Writer(String),
}

impl Error {
    pub fn idx(msg: impl Into<String>) -> Self {
        Self::Idx(msg.into())
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn writer(msg: impl Into<String>) -> Self {
        Self::Writer(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
