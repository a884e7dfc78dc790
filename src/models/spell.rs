use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::decode;
use super::domain::Domain;
use super::Entity;
use crate::filter::{self, FilterCriteria};

/// A castable spell.
///
/// Decoded from the bundled `spells` dataset, where the level is stored as a
/// string, the classes and components as comma-separated strings and the
/// ritual/concentration flags as `"yes"`/`"no"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spell {
    #[serde(skip, default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// Effect when cast with a higher-level slot.
    pub higher_level: Option<String>,
    pub range: String,
    /// Component codes, e.g. `["V", "S", "M"]`.
    pub components: Vec<String>,
    pub material: Option<String>,
    pub ritual: bool,
    pub duration: String,
    pub concentration: bool,
    pub casting_time: String,
    /// Spell level; `0` for cantrips (and for unparsable source values).
    pub level: i32,
    pub school: SpellSchool,
    pub classes: Vec<String>,
}

impl PartialEq for Spell {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.higher_level == other.higher_level
            && self.range == other.range
            && self.components == other.components
            && self.material == other.material
            && self.ritual == other.ritual
            && self.duration == other.duration
            && self.concentration == other.concentration
            && self.casting_time == other.casting_time
            && self.level == other.level
            && self.school == other.school
            && self.classes == other.classes
    }
}

/// The eight schools of magic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SpellSchool {
    Abjuration,
    Conjuration,
    Divination,
    Enchantment,
    Evocation,
    Illusion,
    Necromancy,
    Transmutation,
}

impl SpellSchool {
    pub const ALL: [SpellSchool; 8] = [
        Self::Abjuration,
        Self::Conjuration,
        Self::Divination,
        Self::Enchantment,
        Self::Evocation,
        Self::Illusion,
        Self::Necromancy,
        Self::Transmutation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Abjuration => "abjuration",
            Self::Conjuration => "conjuration",
            Self::Divination => "divination",
            Self::Enchantment => "enchantment",
            Self::Evocation => "evocation",
            Self::Illusion => "illusion",
            Self::Necromancy => "necromancy",
            Self::Transmutation => "transmutation",
        }
    }

    /// Case-insensitive parse.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abjuration" => Some(Self::Abjuration),
            "conjuration" => Some(Self::Conjuration),
            "divination" => Some(Self::Divination),
            "enchantment" => Some(Self::Enchantment),
            "evocation" => Some(Self::Evocation),
            "illusion" => Some(Self::Illusion),
            "necromancy" => Some(Self::Necromancy),
            "transmutation" => Some(Self::Transmutation),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Abjuration => "Abjuration",
            Self::Conjuration => "Conjuration",
            Self::Divination => "Divination",
            Self::Enchantment => "Enchantment",
            Self::Evocation => "Evocation",
            Self::Illusion => "Illusion",
            Self::Necromancy => "Necromancy",
            Self::Transmutation => "Transmutation",
        }
    }
}

fn school_label<'de, D>(deserializer: D) -> Result<SpellSchool, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    SpellSchool::from_str(&s)
        .ok_or_else(|| serde::de::Error::custom(format!("unknown spell school: {}", s)))
}

/// A spell record as it appears in the bundled dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSpell {
    name: String,
    desc: String,
    #[serde(default, deserialize_with = "decode::optional_text")]
    higher_level: Option<String>,
    #[serde(default)]
    range: String,
    #[serde(default, deserialize_with = "decode::list")]
    components: Vec<String>,
    #[serde(default, deserialize_with = "decode::optional_text")]
    material: Option<String>,
    #[serde(default, deserialize_with = "decode::flag")]
    ritual: bool,
    #[serde(default)]
    duration: String,
    #[serde(default, deserialize_with = "decode::flag")]
    concentration: bool,
    #[serde(default)]
    casting_time: String,
    #[serde(deserialize_with = "decode::int")]
    level: i32,
    #[serde(deserialize_with = "school_label")]
    school: SpellSchool,
    #[serde(default, rename = "class", deserialize_with = "decode::list")]
    classes: Vec<String>,
}

/// Facets of a spell collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpellFacets {
    pub levels: Vec<i32>,
    pub schools: Vec<SpellSchool>,
    pub classes: Vec<String>,
}

/// Search and filter state for spells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpellCriteria {
    pub search_text: String,
    pub selected_levels: BTreeSet<i32>,
    pub selected_schools: BTreeSet<SpellSchool>,
    pub selected_classes: BTreeSet<String>,
    pub ritual_only: bool,
    pub concentration_only: bool,
}

impl SpellCriteria {
    pub fn toggle_level(&mut self, level: i32) {
        filter::toggle(&mut self.selected_levels, level);
    }

    pub fn toggle_school(&mut self, school: SpellSchool) {
        filter::toggle(&mut self.selected_schools, school);
    }

    pub fn toggle_class(&mut self, class: impl Into<String>) {
        filter::toggle(&mut self.selected_classes, class.into());
    }

    pub fn toggle_ritual_only(&mut self) {
        self.ritual_only = !self.ritual_only;
    }

    pub fn toggle_concentration_only(&mut self) {
        self.concentration_only = !self.concentration_only;
    }
}

impl FilterCriteria for SpellCriteria {
    fn search_text(&self) -> &str {
        &self.search_text
    }

    fn set_search_text(&mut self, text: String) {
        self.search_text = text;
    }
}

impl Entity for Spell {
    type Raw = RawSpell;
    type Criteria = SpellCriteria;
    type Facets = SpellFacets;

    const DOMAIN: Domain = Domain::Spells;

    fn from_raw(raw: RawSpell) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: raw.name,
            description: raw.desc,
            higher_level: raw.higher_level,
            range: raw.range,
            components: raw.components,
            material: raw.material,
            ritual: raw.ritual,
            duration: raw.duration,
            concentration: raw.concentration,
            casting_time: raw.casting_time,
            level: raw.level,
            school: raw.school,
            classes: raw.classes,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str(), self.description.as_str()];
        if let Some(higher) = &self.higher_level {
            fields.push(higher);
        }
        fields.extend(self.classes.iter().map(String::as_str));
        fields
    }

    fn matches_selection(&self, criteria: &SpellCriteria) -> bool {
        filter::selected(&criteria.selected_levels, &self.level)
            && filter::selected(&criteria.selected_schools, &self.school)
            && filter::intersects(&criteria.selected_classes, &self.classes)
            && filter::flag(criteria.ritual_only, self.ritual)
            && filter::flag(criteria.concentration_only, self.concentration)
    }

    fn facets(spells: &[Self]) -> SpellFacets {
        SpellFacets {
            levels: filter::distinct_sorted(spells.iter().map(|s| s.level)),
            schools: filter::distinct_sorted(spells.iter().map(|s| s.school)),
            classes: filter::distinct_sorted(spells.iter().flat_map(|s| s.classes.iter().cloned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(json: &str) -> Spell {
        Spell::from_raw(serde_json::from_str(json).unwrap())
    }

    const FIREBALL: &str = r#"{
        "name": "Fireball",
        "desc": "A bright streak flashes from your pointing finger.",
        "higher_level": "",
        "range": "150 feet",
        "components": "V, S, M",
        "material": "A tiny ball of bat guano and sulfur.",
        "ritual": "no",
        "duration": "Instantaneous",
        "concentration": "no",
        "casting_time": "1 action",
        "level": "3",
        "school": "Evocation",
        "class": "Sorcerer, Wizard"
    }"#;

    #[test]
    fn test_decodes_denormalized_fields() {
        let spell = decode(FIREBALL);
        assert_eq!(spell.level, 3);
        assert_eq!(spell.school, SpellSchool::Evocation);
        assert_eq!(spell.classes, vec!["Sorcerer", "Wizard"]);
        assert_eq!(spell.components, vec!["V", "S", "M"]);
        assert_eq!(spell.higher_level, None);
        assert!(!spell.ritual);
    }

    #[test]
    fn test_unparsable_level_defaults_to_zero() {
        let spell = decode(
            r#"{"name": "Odd", "desc": "", "level": "Cantrip", "school": "illusion"}"#,
        );
        assert_eq!(spell.level, 0);
        assert_eq!(spell.school, SpellSchool::Illusion);
    }

    #[test]
    fn test_unknown_school_is_a_decode_error() {
        let result: Result<RawSpell, _> = serde_json::from_str(
            r#"{"name": "Odd", "desc": "", "level": 1, "school": "Chronomancy"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_equality_ignores_identity() {
        let a = decode(FIREBALL);
        let b = decode(FIREBALL);
        assert_ne!(a.id, b.id);
        assert_eq!(a, b);
    }

    #[test]
    fn test_cache_form_round_trips() {
        let spell = decode(FIREBALL);
        let json = serde_json::to_string(&spell).unwrap();
        let back: Spell = serde_json::from_str(&json).unwrap();
        assert_eq!(spell, back);
    }

    #[test]
    fn test_matches_selection_combines_dimensions() {
        let spell = decode(FIREBALL);

        let mut criteria = SpellCriteria::default();
        assert!(spell.matches_selection(&criteria));

        criteria.toggle_level(3);
        criteria.toggle_class("Wizard");
        assert!(spell.matches_selection(&criteria));

        criteria.toggle_school(SpellSchool::Abjuration);
        assert!(!spell.matches_selection(&criteria));

        criteria.toggle_school(SpellSchool::Evocation);
        assert!(spell.matches_selection(&criteria));

        criteria.toggle_ritual_only();
        assert!(!spell.matches_selection(&criteria));
    }

    #[test]
    fn test_school_parse_is_case_insensitive() {
        for school in SpellSchool::ALL {
            assert_eq!(SpellSchool::from_str(school.label()), Some(school));
            assert_eq!(SpellSchool::from_str(school.as_str()), Some(school));
        }
        assert_eq!(SpellSchool::from_str("chronomancy"), None);
    }
}
