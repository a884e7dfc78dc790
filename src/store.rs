//! Filtered-collection store.
//!
//! A [`FilteredStore`] owns one domain's collection, its filter criteria and
//! the derived filtered view. It is driven from a single owner: every mutation
//! takes `&mut self`, updates the criteria synchronously and dispatches a
//! recompute.
//!
//! # Recompute pipeline
//!
//! Each dispatch bumps a monotonic version and evaluates the filter over an
//! immutable snapshot (`Arc` of the collection plus a clone of the criteria).
//! Large collections are evaluated on the blocking pool and the result comes
//! back over a channel; the owner installs it in [`FilteredStore::pump`] or
//! [`FilteredStore::settle`] only if its version is still the current one.
//! Superseded results run to completion and are dropped on arrival.
//!
//! ```text
//! mutation ──► version += 1 ──► snapshot ──► worker: filter + sort
//!                                                 │
//! owner: pump/settle ◄── (version, view) ◄────────┘
//!        install iff version == current, then persist criteria
//! ```
//!
//! # Lifecycle
//!
//! `Uninitialized → Loading → Ready`. Criteria hydration from the cache
//! happens at construction and is tracked separately in [`Hydration`]. A failed
//! load still ends in `Ready`, with an empty collection.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::cache::CacheGateway;
use crate::config::DEFAULT_OFFLOAD_THRESHOLD;
use crate::error::LoadError;
use crate::filter::{self, FilterCriteria};
use crate::loader::{CollectionLoader, Loaded, Origin};
use crate::models::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Loading,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hydration {
    DefaultCriteria,
    HydratedCriteria,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Collections at least this large are filtered on the blocking pool.
    /// `0` offloads every recompute.
    pub offload_threshold: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            offload_threshold: DEFAULT_OFFLOAD_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum LoadMode {
    Cached,
    Fresh,
}

enum Update<E: Entity> {
    Loaded {
        ticket: u64,
        result: Result<Loaded<E>, LoadError>,
    },
    Recomputed {
        version: u64,
        criteria: E::Criteria,
        view: Vec<E>,
    },
}

pub struct FilteredStore<E: Entity> {
    cache: CacheGateway,
    options: StoreOptions,
    phase: Phase,
    hydration: Hydration,
    collection: Arc<Vec<E>>,
    origin: Option<Origin>,
    facets: E::Facets,
    criteria: E::Criteria,
    view: Vec<E>,
    version: u64,
    installed_version: u64,
    load_ticket: u64,
    tx: mpsc::UnboundedSender<Update<E>>,
    rx: mpsc::UnboundedReceiver<Update<E>>,
}

pub type SpellStore = FilteredStore<Spell>;
pub type FeatStore = FilteredStore<Feat>;
pub type BackgroundStore = FilteredStore<Background>;

impl<E: Entity> FilteredStore<E> {
    /// Create a store and hydrate its criteria from the cache. A cached
    /// snapshot replaces the defaults and triggers one recompute.
    pub fn new(cache: CacheGateway, options: StoreOptions) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut store = Self {
            cache,
            options,
            phase: Phase::Uninitialized,
            hydration: Hydration::DefaultCriteria,
            collection: Arc::new(Vec::new()),
            origin: None,
            facets: E::Facets::default(),
            criteria: E::Criteria::default(),
            view: Vec::new(),
            version: 0,
            installed_version: 0,
            load_ticket: 0,
            tx,
            rx,
        };

        if let Some(criteria) = store.cache.get_criteria::<E::Criteria>(E::DOMAIN) {
            tracing::debug!(domain = %E::DOMAIN, "Hydrated filter criteria from cache");
            store.criteria = criteria;
            store.hydration = Hydration::HydratedCriteria;
            store.recompute();
        }

        store
    }

    // ============================================================
    // Loading
    // ============================================================

    /// Start loading the domain's dataset (cache first). Returns immediately
    /// when a tokio runtime is available; the result is installed by
    /// [`Self::pump`] or [`Self::settle`].
    pub fn begin_load(&mut self, loader: &CollectionLoader) {
        self.start_load(loader, LoadMode::Cached);
    }

    /// Start reloading from the bundle, bypassing and replacing the cached copy.
    pub fn begin_reload(&mut self, loader: &CollectionLoader) {
        self.start_load(loader, LoadMode::Fresh);
    }

    /// Load and wait until the store is ready with a current view.
    pub async fn load(&mut self, loader: &CollectionLoader) {
        self.begin_load(loader);
        self.settle().await;
    }

    pub async fn reload(&mut self, loader: &CollectionLoader) {
        self.begin_reload(loader);
        self.settle().await;
    }

    fn start_load(&mut self, loader: &CollectionLoader, mode: LoadMode) {
        self.load_ticket += 1;
        let ticket = self.load_ticket;
        self.phase = Phase::Loading;

        let loader = loader.clone();
        let dataset = E::DOMAIN.dataset();
        let run = move || match mode {
            LoadMode::Cached => loader.load::<E>(dataset),
            LoadMode::Fresh => loader.reload::<E>(dataset),
        };

        match Handle::try_current() {
            Ok(handle) => {
                let tx = self.tx.clone();
                handle.spawn_blocking(move || {
                    let result = run();
                    let _ = tx.send(Update::Loaded { ticket, result });
                });
            }
            Err(_) => {
                let result = run();
                self.apply(Update::Loaded { ticket, result });
            }
        }
    }

    // ============================================================
    // Criteria mutations
    // ============================================================

    pub fn update_search_text(&mut self, text: impl Into<String>) {
        self.criteria.set_search_text(text.into());
        self.recompute();
    }

    /// Apply an arbitrary change to the criteria and recompute.
    pub fn update_criteria(&mut self, mutate: impl FnOnce(&mut E::Criteria)) {
        mutate(&mut self.criteria);
        self.recompute();
    }

    /// Reset the criteria to defaults and recompute.
    pub fn clear(&mut self) {
        self.criteria.clear();
        self.recompute();
    }

    // ============================================================
    // Recompute pipeline
    // ============================================================

    fn recompute(&mut self) {
        self.version += 1;
        let version = self.version;
        let collection = Arc::clone(&self.collection);
        let criteria = self.criteria.clone();

        let worker = if collection.len() >= self.options.offload_threshold {
            Handle::try_current().ok()
        } else {
            None
        };

        match worker {
            Some(handle) => {
                let tx = self.tx.clone();
                handle.spawn_blocking(move || {
                    let view = filter::apply(&collection, &criteria);
                    let _ = tx.send(Update::Recomputed {
                        version,
                        criteria,
                        view,
                    });
                });
            }
            None => {
                let view = filter::apply(&collection, &criteria);
                self.apply(Update::Recomputed {
                    version,
                    criteria,
                    view,
                });
            }
        }
    }

    fn apply(&mut self, update: Update<E>) {
        match update {
            Update::Loaded { ticket, result } => {
                if ticket != self.load_ticket {
                    tracing::debug!(domain = %E::DOMAIN, ticket, "Discarding superseded load");
                    return;
                }
                match result {
                    Ok(loaded) => {
                        tracing::debug!(
                            domain = %E::DOMAIN,
                            origin = loaded.origin.as_str(),
                            count = loaded.entities.len(),
                            "Installing collection"
                        );
                        self.origin = Some(loaded.origin);
                        self.collection = Arc::new(loaded.entities);
                    }
                    Err(e) => {
                        tracing::warn!(
                            domain = %E::DOMAIN,
                            error = %e,
                            "Continuing with an empty collection"
                        );
                        self.origin = None;
                        self.collection = Arc::new(Vec::new());
                    }
                }
                self.facets = E::facets(&self.collection);
                self.phase = Phase::Ready;
                self.recompute();
            }
            Update::Recomputed {
                version,
                criteria,
                view,
            } => {
                if version != self.version {
                    tracing::trace!(
                        domain = %E::DOMAIN,
                        version,
                        current = self.version,
                        "Discarding stale recompute"
                    );
                    return;
                }
                self.view = view;
                self.installed_version = version;
                self.cache.set_criteria(E::DOMAIN, &criteria);
            }
        }
    }

    /// Install every result that has already arrived. Never blocks.
    /// Returns the number of updates processed, stale ones included.
    pub fn pump(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(update) = self.rx.try_recv() {
            self.apply(update);
            processed += 1;
        }
        processed
    }

    /// True when no load is in flight and the current version is installed.
    pub fn is_settled(&self) -> bool {
        self.phase != Phase::Loading && self.installed_version == self.version
    }

    /// Wait until [`Self::is_settled`].
    pub async fn settle(&mut self) {
        while !self.is_settled() {
            match self.rx.recv().await {
                Some(update) => self.apply(update),
                None => break,
            }
        }
    }

    // ============================================================
    // Accessors
    // ============================================================

    /// The filtered view installed by the most recent current recompute,
    /// sorted by name.
    pub fn filtered(&self) -> &[E] {
        &self.view
    }

    pub fn collection(&self) -> &[E] {
        &self.collection
    }

    pub fn criteria(&self) -> &E::Criteria {
        &self.criteria
    }

    /// Distinct categorical values across the whole collection.
    pub fn facets(&self) -> &E::Facets {
        &self.facets
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn hydration(&self) -> Hydration {
        self.hydration
    }

    /// Origin of the current collection; `None` before a successful load.
    pub fn origin(&self) -> Option<Origin> {
        self.origin
    }

    pub fn is_filtering(&self) -> bool {
        self.criteria.is_active()
    }

    /// Version of the most recent dispatch.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Version of the installed view.
    pub fn installed_version(&self) -> u64 {
        self.installed_version
    }
}

impl FilteredStore<Spell> {
    pub fn toggle_level(&mut self, level: i32) {
        self.update_criteria(|c| c.toggle_level(level));
    }

    pub fn toggle_school(&mut self, school: SpellSchool) {
        self.update_criteria(|c| c.toggle_school(school));
    }

    pub fn toggle_class(&mut self, class: impl Into<String>) {
        let class = class.into();
        self.update_criteria(|c| c.toggle_class(class));
    }

    pub fn toggle_ritual_only(&mut self) {
        self.update_criteria(SpellCriteria::toggle_ritual_only);
    }

    pub fn toggle_concentration_only(&mut self) {
        self.update_criteria(SpellCriteria::toggle_concentration_only);
    }
}

impl FilteredStore<Feat> {
    pub fn toggle_category(&mut self, category: impl Into<String>) {
        let category = category.into();
        self.update_criteria(|c| c.toggle_category(category));
    }

    pub fn toggle_repeatable_only(&mut self) {
        self.update_criteria(FeatCriteria::toggle_repeatable_only);
    }
}

impl FilteredStore<Background> {
    pub fn toggle_skill(&mut self, skill: impl Into<String>) {
        let skill = skill.into();
        self.update_criteria(|c| c.toggle_skill(skill));
    }

    pub fn toggle_source(&mut self, source: impl Into<String>) {
        let source = source.into();
        self.update_criteria(|c| c.toggle_source(source));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::MemoryBundle;

    const FEATS: &str = r#"[
        {"name": "Tough", "desc": "Hit point maximum increases."},
        {"name": "Alert", "desc": "Always on the lookout."}
    ]"#;

    fn inline_store() -> (FeatStore, CollectionLoader, CacheGateway) {
        let cache = CacheGateway::memory();
        let loader = CollectionLoader::new(
            cache.clone(),
            Arc::new(MemoryBundle::new().with_dataset("feats", FEATS)),
        );
        let store = FeatStore::new(
            cache.clone(),
            StoreOptions {
                offload_threshold: usize::MAX,
            },
        );
        (store, loader, cache)
    }

    #[test]
    fn test_without_runtime_everything_runs_inline() {
        let (mut store, loader, _) = inline_store();
        assert_eq!(store.phase(), Phase::Uninitialized);

        store.begin_load(&loader);
        assert_eq!(store.phase(), Phase::Ready);
        assert!(store.is_settled());

        let names: Vec<&str> = store.filtered().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Alert", "Tough"]);
    }

    #[test]
    fn test_stale_recompute_is_discarded() {
        let (mut store, loader, cache) = inline_store();
        store.begin_load(&loader);
        store.update_search_text("tough");
        let current = store.version();

        let _ = store.tx.send(Update::Recomputed {
            version: current - 1,
            criteria: FeatCriteria::default(),
            view: Vec::new(),
        });
        assert_eq!(store.pump(), 1);

        assert_eq!(store.installed_version(), current);
        assert_eq!(store.filtered().len(), 1);
        assert_eq!(store.filtered()[0].name, "Tough");

        let persisted: Option<FeatCriteria> = cache.get_criteria(Domain::Feats);
        assert_eq!(persisted.map(|c| c.search_text), Some("tough".to_string()));
    }

    #[test]
    fn test_superseded_load_is_discarded() {
        let (mut store, loader, _) = inline_store();
        store.begin_load(&loader);
        let ticket = store.load_ticket;

        let _ = store.tx.send(Update::Loaded {
            ticket: ticket - 1,
            result: Ok(Loaded {
                entities: Vec::new(),
                origin: Origin::Cache,
            }),
        });
        store.pump();

        assert_eq!(store.collection().len(), 2);
        assert_eq!(store.origin(), Some(Origin::Fresh));
    }

    #[test]
    fn test_offloaded_load_settles_on_a_runtime() {
        let cache = CacheGateway::memory();
        let loader = CollectionLoader::new(
            cache.clone(),
            Arc::new(MemoryBundle::new().with_dataset("feats", FEATS)),
        );
        let mut store = FeatStore::new(cache, StoreOptions { offload_threshold: 0 });

        tokio_test::block_on(async {
            store.begin_load(&loader);
            assert_eq!(store.phase(), Phase::Loading);
            store.update_search_text("alert");
            store.settle().await;
        });

        assert_eq!(store.phase(), Phase::Ready);
        assert_eq!(store.installed_version(), store.version());
        assert_eq!(store.filtered().len(), 1);
        assert_eq!(store.filtered()[0].name, "Alert");
    }

    #[test]
    fn test_facets_follow_the_collection_not_the_criteria() {
        let (mut store, loader, _) = inline_store();
        store.begin_load(&loader);
        let facets = store.facets().clone();
        assert_eq!(facets.categories, vec!["General"]);

        store.toggle_category("Origin");
        assert!(store.filtered().is_empty());
        assert_eq!(store.facets(), &facets);
    }
}
