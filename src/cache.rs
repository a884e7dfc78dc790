//! Cache gateway for loaded collections and criteria snapshots.
//!
//! [`CacheBackend`] is the storage seam: it stores opaque JSON payloads keyed
//! by dataset name (collections) or domain name (criteria). [`CacheGateway`]
//! layers typed access on top and applies the cache policy:
//!
//! - reads that fail, or payloads that no longer decode, are treated as misses;
//! - writes are best effort: failures are logged and swallowed.
//!
//! Backends: [`crate::db::Database`] (SQLite) and [`MemoryCache`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::filter::FilterCriteria;
use crate::models::{Domain, Entity};

/// Storage for cached payloads. Implementations must be safe to share across
/// threads; callers never hold a lock across a call.
pub trait CacheBackend: Send + Sync {
    fn read_collection(&self, dataset: &str) -> Result<Option<String>>;

    fn write_collection(&self, dataset: &str, payload: &str, count: usize) -> Result<()>;

    /// Returns whether a collection was removed.
    fn remove_collection(&self, dataset: &str) -> Result<bool>;

    fn read_criteria(&self, domain: &str) -> Result<Option<String>>;

    fn write_criteria(&self, domain: &str, payload: &str) -> Result<()>;

    fn entries(&self) -> Result<Vec<CacheEntry>>;

    fn clear(&self) -> Result<()>;
}

/// What kind of payload a cache entry holds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Collection,
    Criteria,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Collection => "collection",
            Self::Criteria => "criteria",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "collection" => Some(Self::Collection),
            "criteria" => Some(Self::Criteria),
            _ => None,
        }
    }
}

/// Summary of one cached payload, for status listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub kind: EntryKind,
    pub key: String,
    /// Number of entities, for collections.
    pub count: Option<usize>,
    pub bytes: usize,
    pub stored_at: DateTime<Utc>,
}

// ============================================================
// In-memory backend
// ============================================================

#[derive(Debug, Default)]
struct MemoryState {
    collections: HashMap<String, (String, usize, DateTime<Utc>)>,
    criteria: HashMap<String, (String, DateTime<Utc>)>,
}

/// Process-local cache backend. Counts reads and writes so callers can check
/// how often the cache was consulted.
#[derive(Debug, Default)]
pub struct MemoryCache {
    state: Mutex<MemoryState>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `read_*` calls served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `write_*` calls attempted so far, including failed ones.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn state(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| anyhow::anyhow!("memory cache lock poisoned"))
    }

    fn begin_write(&self) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("memory cache is read-only");
        }
        Ok(())
    }
}

impl CacheBackend for MemoryCache {
    fn read_collection(&self, dataset: &str) -> Result<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .state()?
            .collections
            .get(dataset)
            .map(|(payload, _, _)| payload.clone()))
    }

    fn write_collection(&self, dataset: &str, payload: &str, count: usize) -> Result<()> {
        self.begin_write()?;
        self.state()?
            .collections
            .insert(dataset.to_string(), (payload.to_string(), count, Utc::now()));
        Ok(())
    }

    fn remove_collection(&self, dataset: &str) -> Result<bool> {
        Ok(self.state()?.collections.remove(dataset).is_some())
    }

    fn read_criteria(&self, domain: &str) -> Result<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .state()?
            .criteria
            .get(domain)
            .map(|(payload, _)| payload.clone()))
    }

    fn write_criteria(&self, domain: &str, payload: &str) -> Result<()> {
        self.begin_write()?;
        self.state()?
            .criteria
            .insert(domain.to_string(), (payload.to_string(), Utc::now()));
        Ok(())
    }

    fn entries(&self) -> Result<Vec<CacheEntry>> {
        let state = self.state()?;
        let mut entries: Vec<CacheEntry> = state
            .collections
            .iter()
            .map(|(key, (payload, count, stored_at))| CacheEntry {
                kind: EntryKind::Collection,
                key: key.clone(),
                count: Some(*count),
                bytes: payload.len(),
                stored_at: *stored_at,
            })
            .chain(state.criteria.iter().map(|(key, (payload, stored_at))| CacheEntry {
                kind: EntryKind::Criteria,
                key: key.clone(),
                count: None,
                bytes: payload.len(),
                stored_at: *stored_at,
            }))
            .collect();
        entries.sort_by(|a, b| (a.kind.as_str(), &a.key).cmp(&(b.kind.as_str(), &b.key)));
        Ok(entries)
    }

    fn clear(&self) -> Result<()> {
        let mut state = self.state()?;
        state.collections.clear();
        state.criteria.clear();
        Ok(())
    }
}

// ============================================================
// Typed gateway
// ============================================================

/// Typed, best-effort access to a [`CacheBackend`]. Cheap to clone.
#[derive(Clone)]
pub struct CacheGateway {
    backend: Arc<dyn CacheBackend>,
}

impl std::fmt::Debug for CacheGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheGateway").finish_non_exhaustive()
    }
}

impl CacheGateway {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Gateway over a fresh [`MemoryCache`].
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryCache::new()))
    }

    pub fn try_get_collection<E: Entity>(
        &self,
        dataset: &str,
    ) -> Result<Option<Vec<E>>, CacheError> {
        let Some(payload) = self
            .backend
            .read_collection(dataset)
            .map_err(CacheError::Backend)?
        else {
            return Ok(None);
        };
        serde_json::from_str(&payload)
            .map(Some)
            .map_err(|source| CacheError::Corrupt {
                key: dataset.to_string(),
                source,
            })
    }

    /// Cached collection for `dataset`. Backend failures and corrupt payloads
    /// are reported as absent.
    pub fn get_collection<E: Entity>(&self, dataset: &str) -> Option<Vec<E>> {
        match self.try_get_collection(dataset) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(dataset, error = %e, "Ignoring unusable cached collection");
                None
            }
        }
    }

    pub fn try_set_collection<E: Entity>(
        &self,
        dataset: &str,
        entities: &[E],
    ) -> Result<(), CacheError> {
        let payload = serde_json::to_string(entities).map_err(|source| CacheError::Serialize {
            key: dataset.to_string(),
            source,
        })?;
        self.backend
            .write_collection(dataset, &payload, entities.len())
            .map_err(CacheError::Backend)
    }

    /// Store a collection. Failures are logged and swallowed.
    pub fn set_collection<E: Entity>(&self, dataset: &str, entities: &[E]) {
        if let Err(e) = self.try_set_collection(dataset, entities) {
            tracing::warn!(dataset, error = %e, "Failed to cache collection");
        }
    }

    pub fn try_get_criteria<C: FilterCriteria>(
        &self,
        domain: Domain,
    ) -> Result<Option<C>, CacheError> {
        let Some(payload) = self
            .backend
            .read_criteria(domain.as_str())
            .map_err(CacheError::Backend)?
        else {
            return Ok(None);
        };
        serde_json::from_str(&payload)
            .map(Some)
            .map_err(|source| CacheError::Corrupt {
                key: format!("{} criteria", domain),
                source,
            })
    }

    /// Cached criteria for `domain`. Backend failures and corrupt payloads are
    /// reported as absent.
    pub fn get_criteria<C: FilterCriteria>(&self, domain: Domain) -> Option<C> {
        match self.try_get_criteria(domain) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(%domain, error = %e, "Ignoring unusable cached criteria");
                None
            }
        }
    }

    pub fn try_set_criteria<C: FilterCriteria>(
        &self,
        domain: Domain,
        criteria: &C,
    ) -> Result<(), CacheError> {
        let payload = serde_json::to_string(criteria).map_err(|source| CacheError::Serialize {
            key: format!("{} criteria", domain),
            source,
        })?;
        self.backend
            .write_criteria(domain.as_str(), &payload)
            .map_err(CacheError::Backend)
    }

    /// Store a criteria snapshot. Failures are logged and swallowed.
    pub fn set_criteria<C: FilterCriteria>(&self, domain: Domain, criteria: &C) {
        if let Err(e) = self.try_set_criteria(domain, criteria) {
            tracing::warn!(%domain, error = %e, "Failed to cache criteria");
        }
    }

    /// Drop a cached collection so the next load decodes the bundle again.
    pub fn remove_collection(&self, dataset: &str) -> bool {
        match self.backend.remove_collection(dataset) {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(dataset, error = %e, "Failed to remove cached collection");
                false
            }
        }
    }

    pub fn entries(&self) -> Result<Vec<CacheEntry>, CacheError> {
        self.backend.entries().map_err(CacheError::Backend)
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        self.backend.clear().map_err(CacheError::Backend)
    }
}
