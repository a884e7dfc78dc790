//! Error types for loading datasets and talking to the cache.
//!
//! None of these cross a store's public boundary: the store degrades to an
//! empty collection or default criteria and reports through the diagnostics
//! sink instead.

use thiserror::Error;

/// Failure to produce a collection for a dataset.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("Failed to decode dataset {dataset}: {source}")]
    Decode {
        dataset: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read dataset {dataset}: {source}")]
    Io {
        dataset: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to read a bundled dataset.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("Dataset not found: {0}")]
    NotFound(String),

    #[error("IO error reading dataset: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure talking to the cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend error: {0:#}")]
    Backend(anyhow::Error),

    #[error("Cached {key} is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize {key} for the cache: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl LoadError {
    pub(crate) fn from_bundle(dataset: &str, err: BundleError) -> Self {
        match err {
            BundleError::NotFound(_) => Self::DatasetNotFound(dataset.to_string()),
            BundleError::Io(source) => Self::Io {
                dataset: dataset.to_string(),
                source,
            },
        }
    }
}
