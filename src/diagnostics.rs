//! Diagnostics for dataset loads.
//!
//! Reports never influence control flow; they exist so that a missing or
//! malformed dataset is visible during development instead of silently
//! producing an empty list.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::models::Domain;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoadOutcome {
    CacheHit,
    FreshLoad,
    DecodeFailure,
    DatasetNotFound,
}

impl LoadOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CacheHit => "cache_hit",
            Self::FreshLoad => "fresh_load",
            Self::DecodeFailure => "decode_failure",
            Self::DatasetNotFound => "dataset_not_found",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::DecodeFailure | Self::DatasetNotFound)
    }
}

/// One dataset load, as seen by the loader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadEvent {
    pub domain: Domain,
    pub dataset: String,
    pub outcome: LoadOutcome,
    /// Number of entities produced; `0` for failures.
    pub count: usize,
}

pub trait DiagnosticsSink: Send + Sync {
    fn report(&self, event: &LoadEvent);
}

/// Sink that writes load events to the tracing subscriber. Failures are
/// logged at `error` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn report(&self, event: &LoadEvent) {
        if event.outcome.is_failure() {
            tracing::error!(
                domain = %event.domain,
                dataset = %event.dataset,
                outcome = event.outcome.as_str(),
                "Dataset load failed"
            );
        } else {
            tracing::info!(
                domain = %event.domain,
                dataset = %event.dataset,
                outcome = event.outcome.as_str(),
                count = event.count,
                "Dataset loaded"
            );
        }
    }
}

/// Sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<LoadEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LoadEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn outcomes(&self) -> Vec<LoadOutcome> {
        self.events().into_iter().map(|e| e.outcome).collect()
    }
}

impl DiagnosticsSink for RecordingSink {
    fn report(&self, event: &LoadEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
