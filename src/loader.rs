//! Cache-then-bundle loading of entity collections.
//!
//! [`CollectionLoader::load`] performs exactly one cache read per call. On a
//! hit it returns the cached collection; otherwise it decodes the bundled
//! dataset and writes the result back to the cache (at most one write, best
//! effort). Every call reports one [`LoadEvent`] to the diagnostics sink.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bundle::BundleReader;
use crate::cache::CacheGateway;
use crate::diagnostics::{DiagnosticsSink, LoadEvent, LoadOutcome, TracingSink};
use crate::error::LoadError;
use crate::models::Entity;

/// Where a loaded collection came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Cache,
    Fresh,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Fresh => "fresh",
        }
    }
}

/// A collection together with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<E> {
    pub entities: Vec<E>,
    pub origin: Origin,
}

#[derive(Clone)]
pub struct CollectionLoader {
    cache: CacheGateway,
    bundle: Arc<dyn BundleReader>,
    sink: Arc<dyn DiagnosticsSink>,
}

impl std::fmt::Debug for CollectionLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionLoader")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl CollectionLoader {
    /// Loader reporting to [`TracingSink`].
    pub fn new(cache: CacheGateway, bundle: Arc<dyn BundleReader>) -> Self {
        Self {
            cache,
            bundle,
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn cache(&self) -> &CacheGateway {
        &self.cache
    }

    /// Load `dataset`, preferring the cache.
    pub fn load<E: Entity>(&self, dataset: &str) -> Result<Loaded<E>, LoadError> {
        if let Some(entities) = self.cache.get_collection::<E>(dataset) {
            self.report::<E>(dataset, LoadOutcome::CacheHit, entities.len());
            return Ok(Loaded {
                entities,
                origin: Origin::Cache,
            });
        }

        tracing::debug!(dataset, "Cache miss, decoding bundled dataset");
        self.load_fresh(dataset)
    }

    /// Load `dataset` from the bundle regardless of the cache, replacing any
    /// cached copy.
    pub fn reload<E: Entity>(&self, dataset: &str) -> Result<Loaded<E>, LoadError> {
        self.load_fresh(dataset)
    }

    /// Drop the cached copy of `dataset`.
    pub fn invalidate(&self, dataset: &str) -> bool {
        self.cache.remove_collection(dataset)
    }

    fn load_fresh<E: Entity>(&self, dataset: &str) -> Result<Loaded<E>, LoadError> {
        let entities = match self
            .bundle
            .read_dataset(dataset)
            .map_err(|e| LoadError::from_bundle(dataset, e))
            .and_then(|bytes| decode::<E>(dataset, &bytes))
        {
            Ok(entities) => entities,
            Err(e) => {
                let outcome = match e {
                    LoadError::DatasetNotFound(_) => LoadOutcome::DatasetNotFound,
                    LoadError::Decode { .. } | LoadError::Io { .. } => LoadOutcome::DecodeFailure,
                };
                tracing::error!(dataset, error = %e, "Failed to load bundled dataset");
                self.report::<E>(dataset, outcome, 0);
                return Err(e);
            }
        };

        self.cache.set_collection(dataset, &entities);
        self.report::<E>(dataset, LoadOutcome::FreshLoad, entities.len());
        Ok(Loaded {
            entities,
            origin: Origin::Fresh,
        })
    }

    fn report<E: Entity>(&self, dataset: &str, outcome: LoadOutcome, count: usize) {
        self.sink.report(&LoadEvent {
            domain: E::DOMAIN,
            dataset: dataset.to_string(),
            outcome,
            count,
        });
    }
}

/// Decode a bundled dataset: a JSON array of source records.
pub fn decode<E: Entity>(dataset: &str, bytes: &[u8]) -> Result<Vec<E>, LoadError> {
    let raw: Vec<E::Raw> = serde_json::from_slice(bytes).map_err(|source| LoadError::Decode {
        dataset: dataset.to_string(),
        source,
    })?;
    Ok(raw.into_iter().map(E::from_raw).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Feat;

    #[test]
    fn test_decode_rejects_non_array_payloads() {
        assert!(matches!(
            decode::<Feat>("feats", br#"{"name": "Alert"}"#),
            Err(LoadError::Decode { .. })
        ));
    }

    #[test]
    fn test_decode_keeps_source_order() {
        let feats = decode::<Feat>(
            "feats",
            br#"[{"name": "Tough", "desc": ""}, {"name": "Alert", "desc": ""}]"#,
        )
        .unwrap();
        let names: Vec<&str> = feats.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Tough", "Alert"]);
    }
}
