//! Grimoire: cached, filterable reference data for tabletop companion apps.
//!
//! Datasets (spells, feats, backgrounds) are loaded once through a
//! [`loader::CollectionLoader`], which prefers the cache and falls back to the
//! bundled JSON. Each domain is then served by a [`store::FilteredStore`]
//! holding the collection, the user's filter criteria and the sorted,
//! filtered view.

pub mod bundle;
pub mod cache;
pub mod config;
pub mod db;
pub mod diagnostics;
pub mod error;
pub mod filter;
pub mod loader;
pub mod models;
pub mod store;
