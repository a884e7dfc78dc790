//! Filter predicate and ordering shared by every domain.
//!
//! The filtered view of a collection is a pure function of the collection and
//! the criteria: [`apply`] keeps every entity for which [`matches`] holds and
//! sorts the survivors by name. Constraints are conjunctive across dimensions
//! and disjunctive within one; an empty selection or an unset toggle imposes no
//! constraint.

use std::collections::BTreeSet;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::models::Entity;

/// Search and filter state for one domain.
pub trait FilterCriteria:
    Clone + fmt::Debug + Default + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    fn search_text(&self) -> &str;

    fn set_search_text(&mut self, text: String);

    /// True when any field differs from its default.
    fn is_active(&self) -> bool {
        *self != Self::default()
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Insert `value` if absent, remove it if present.
pub fn toggle<T: Ord>(set: &mut BTreeSet<T>, value: T) {
    if !set.remove(&value) {
        set.insert(value);
    }
}

/// Fold text for case- and diacritics-insensitive comparison.
pub fn fold(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Fold search text into a needle. Whitespace is kept and matched literally.
pub fn needle(search_text: &str) -> String {
    fold(search_text)
}

/// True when the needle is empty or is a substring of any folded field.
pub fn text_matches(needle: &str, fields: &[&str]) -> bool {
    needle.is_empty() || fields.iter().any(|field| fold(field).contains(needle))
}

/// A scalar field passes when nothing is selected or its value is selected.
pub fn selected<T: Ord>(selection: &BTreeSet<T>, value: &T) -> bool {
    selection.is_empty() || selection.contains(value)
}

/// A list field passes when nothing is selected or any of its values is selected.
pub fn intersects<T, Q>(selection: &BTreeSet<T>, values: &[Q]) -> bool
where
    T: Ord + std::borrow::Borrow<Q>,
    Q: Ord,
{
    selection.is_empty() || values.iter().any(|value| selection.contains(value))
}

/// A toggle passes when it is off or the entity's flag is set.
pub fn flag(toggle: bool, value: bool) -> bool {
    !toggle || value
}

/// Evaluate the full predicate for one entity.
pub fn matches<E: Entity>(entity: &E, criteria: &E::Criteria) -> bool {
    matches_needle(entity, criteria, &needle(criteria.search_text()))
}

fn matches_needle<E: Entity>(entity: &E, criteria: &E::Criteria, needle: &str) -> bool {
    text_matches(needle, &entity.search_fields()) && entity.matches_selection(criteria)
}

/// Filter `entities` by `criteria` and sort the result by name.
pub fn apply<E: Entity>(entities: &[E], criteria: &E::Criteria) -> Vec<E> {
    let needle = needle(criteria.search_text());
    let mut view: Vec<E> = entities
        .iter()
        .filter(|entity| matches_needle(*entity, criteria, &needle))
        .cloned()
        .collect();
    sort_by_name(&mut view);
    view
}

/// Ordering key for names: folded name first, raw name as tie-break.
pub fn name_key(name: &str) -> (String, String) {
    (fold(name), name.to_string())
}

/// Stable sort by name; entities with equal names keep their relative order.
pub fn sort_by_name<E: Entity>(entities: &mut [E]) {
    entities.sort_by_cached_key(|entity| name_key(entity.name()));
}

/// Distinct values in ascending order.
pub fn distinct_sorted<T, I>(values: I) -> Vec<T>
where
    T: Ord,
    I: IntoIterator<Item = T>,
{
    values.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_strips_case_and_diacritics() {
        assert_eq!(fold("Fireball"), "fireball");
        assert_eq!(fold("Tásha's Hideous Laughter"), "tasha's hideous laughter");
        assert_eq!(fold("ÉLAN"), "elan");
    }

    #[test]
    fn test_needle_keeps_whitespace() {
        assert_eq!(needle(" Light "), " light ");
        assert!(!text_matches(&needle("ball "), &["Fireball"]));
        assert!(text_matches(&needle("ball"), &["Fireball"]));
        assert!(!text_matches(&needle("   "), &["Fireball", "A bright streak"]));
    }

    #[test]
    fn test_text_matches_any_field() {
        assert!(text_matches("", &[]));
        assert!(text_matches("fire", &["Fireball", "A bright streak"]));
        assert!(text_matches("streak", &["Fireball", "A bright streak"]));
        assert!(text_matches("tasha", &["Tásha's Hideous Laughter"]));
        assert!(!text_matches("ice", &["Fireball", "A bright streak"]));
    }

    #[test]
    fn test_toggle_inserts_then_removes() {
        let mut set = BTreeSet::new();
        toggle(&mut set, 3);
        assert!(set.contains(&3));
        toggle(&mut set, 3);
        assert!(set.is_empty());
    }

    #[test]
    fn test_selection_helpers() {
        let empty: BTreeSet<i32> = BTreeSet::new();
        assert!(selected(&empty, &5));

        let levels: BTreeSet<i32> = [1, 3].into_iter().collect();
        assert!(selected(&levels, &3));
        assert!(!selected(&levels, &2));

        let classes: BTreeSet<String> = ["Wizard".to_string()].into_iter().collect();
        assert!(intersects(&classes, &["Bard".to_string(), "Wizard".to_string()]));
        assert!(!intersects(&classes, &["Bard".to_string()]));
        assert!(!intersects::<String, String>(&classes, &[]));
        assert!(intersects::<String, String>(&BTreeSet::new(), &[]));
    }

    #[test]
    fn test_flag_only_constrains_when_on() {
        assert!(flag(false, false));
        assert!(flag(false, true));
        assert!(flag(true, true));
        assert!(!flag(true, false));
    }

    #[test]
    fn test_distinct_sorted() {
        assert_eq!(distinct_sorted(vec![3, 1, 3, 2]), vec![1, 2, 3]);
    }
}
