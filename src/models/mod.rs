//! Domain models for Grimoire.
//!
//! # Core Concepts
//!
//! ## Entities
//!
//! - [`Spell`]: A castable spell with level, school and the classes that can learn it.
//! - [`Feat`]: A character feat, grouped by category.
//! - [`Background`]: A character background with the skills it grants.
//!
//! Entities are decoded once from a bundled dataset (or the cache) and never
//! mutated afterwards. Each one carries a fresh [`uuid::Uuid`] assigned at
//! construction; the id is not part of equality.
//!
//! ## Filter Criteria
//!
//! Each domain has a criteria value ([`SpellCriteria`], [`FeatCriteria`],
//! [`BackgroundCriteria`]) holding the user's search text, selection sets and
//! toggles. Criteria are serializable so they survive restarts through the cache.

mod background;
mod decode;
mod domain;
mod feat;
mod spell;

pub use background::*;
pub use domain::*;
pub use feat::*;
pub use spell::*;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::filter::FilterCriteria;

/// A record of reference data that can be loaded, cached and filtered.
///
/// Implementors describe how a source record is normalized ([`Entity::from_raw`]),
/// which fields free-text search looks at, how the non-text criteria apply and
/// which facets the collection exposes.
pub trait Entity:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Shape of one record in the bundled source.
    type Raw: DeserializeOwned;
    /// Filter state for this domain.
    type Criteria: FilterCriteria;
    /// Distinct categorical values across a collection.
    type Facets: Clone + fmt::Debug + Default + PartialEq + Send + Sync + 'static;

    const DOMAIN: Domain;

    fn from_raw(raw: Self::Raw) -> Self;

    fn name(&self) -> &str;

    /// Fields that free-text search matches against. The name comes first.
    fn search_fields(&self) -> Vec<&str>;

    /// Selection sets and toggles of `criteria`, excluding the search text.
    fn matches_selection(&self, criteria: &Self::Criteria) -> bool;

    fn facets(entities: &[Self]) -> Self::Facets;
}
