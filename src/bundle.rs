//! Readers for bundled datasets.
//!
//! A dataset is a JSON array of source records named after its domain
//! (`spells`, `feats`, `backgrounds`).

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::BundleError;

/// Raw access to bundled datasets.
pub trait BundleReader: Send + Sync {
    fn read_dataset(&self, name: &str) -> Result<Vec<u8>, BundleError>;
}

/// Datasets compiled into the binary from `data/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedBundle;

const EMBEDDED: &[(&str, &[u8])] = &[
    ("spells", include_bytes!("../data/spells.json")),
    ("feats", include_bytes!("../data/feats.json")),
    ("backgrounds", include_bytes!("../data/backgrounds.json")),
];

impl BundleReader for EmbeddedBundle {
    fn read_dataset(&self, name: &str) -> Result<Vec<u8>, BundleError> {
        EMBEDDED
            .iter()
            .find(|(dataset, _)| *dataset == name)
            .map(|(_, bytes)| bytes.to_vec())
            .ok_or_else(|| BundleError::NotFound(name.to_string()))
    }
}

/// Datasets read from `<root>/<name>.json`.
#[derive(Debug, Clone)]
pub struct DirectoryBundle {
    root: PathBuf,
}

impl DirectoryBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, name: &str) -> Option<PathBuf> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        valid.then(|| self.root.join(format!("{}.json", name)))
    }
}

impl BundleReader for DirectoryBundle {
    fn read_dataset(&self, name: &str) -> Result<Vec<u8>, BundleError> {
        let path = self
            .path_for(name)
            .ok_or_else(|| BundleError::NotFound(name.to_string()))?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BundleError::NotFound(name.to_string()))
            }
            Err(e) => Err(BundleError::Io(e)),
        }
    }
}

/// Datasets held in memory. Useful for tests and for callers that fetch
/// datasets themselves.
#[derive(Debug, Clone, Default)]
pub struct MemoryBundle {
    datasets: HashMap<String, Vec<u8>>,
}

impl MemoryBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.datasets.insert(name.into(), bytes.into());
        self
    }
}

impl BundleReader for MemoryBundle {
    fn read_dataset(&self, name: &str) -> Result<Vec<u8>, BundleError> {
        self.datasets
            .get(name)
            .cloned()
            .ok_or_else(|| BundleError::NotFound(name.to_string()))
    }
}
