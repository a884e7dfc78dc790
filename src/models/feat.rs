use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::decode;
use super::domain::Domain;
use super::Entity;
use crate::filter::{self, FilterCriteria};

/// A character feat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feat {
    #[serde(skip, default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub prerequisite: Option<String>,
    /// Grouping such as `General`, `Origin` or `Fighting Style`.
    pub category: String,
    /// Whether the feat can be taken more than once.
    pub repeatable: bool,
    pub benefits: Vec<String>,
}

impl PartialEq for Feat {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.prerequisite == other.prerequisite
            && self.category == other.category
            && self.repeatable == other.repeatable
            && self.benefits == other.benefits
    }
}

fn default_category() -> String {
    "General".to_string()
}

/// A feat record as it appears in the bundled dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFeat {
    name: String,
    desc: String,
    #[serde(default, deserialize_with = "decode::optional_text")]
    prerequisite: Option<String>,
    #[serde(default = "default_category")]
    category: String,
    #[serde(default, deserialize_with = "decode::flag")]
    repeatable: bool,
    #[serde(default)]
    benefits: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatFacets {
    pub categories: Vec<String>,
}

/// Search and filter state for feats.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatCriteria {
    pub search_text: String,
    pub selected_categories: BTreeSet<String>,
    pub repeatable_only: bool,
}

impl FeatCriteria {
    pub fn toggle_category(&mut self, category: impl Into<String>) {
        filter::toggle(&mut self.selected_categories, category.into());
    }

    pub fn toggle_repeatable_only(&mut self) {
        self.repeatable_only = !self.repeatable_only;
    }
}

impl FilterCriteria for FeatCriteria {
    fn search_text(&self) -> &str {
        &self.search_text
    }

    fn set_search_text(&mut self, text: String) {
        self.search_text = text;
    }
}

impl Entity for Feat {
    type Raw = RawFeat;
    type Criteria = FeatCriteria;
    type Facets = FeatFacets;

    const DOMAIN: Domain = Domain::Feats;

    fn from_raw(raw: RawFeat) -> Self {
        let category = match raw.category.trim() {
            "" => default_category(),
            trimmed => trimmed.to_string(),
        };
        Self {
            id: Uuid::new_v4(),
            name: raw.name,
            description: raw.desc,
            prerequisite: raw.prerequisite,
            category,
            repeatable: raw.repeatable,
            benefits: raw
                .benefits
                .into_iter()
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty())
                .collect(),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str(), self.description.as_str()];
        if let Some(prerequisite) = &self.prerequisite {
            fields.push(prerequisite);
        }
        fields.extend(self.benefits.iter().map(String::as_str));
        fields
    }

    fn matches_selection(&self, criteria: &FeatCriteria) -> bool {
        filter::selected(&criteria.selected_categories, &self.category)
            && filter::flag(criteria.repeatable_only, self.repeatable)
    }

    fn facets(feats: &[Self]) -> FeatFacets {
        FeatFacets {
            categories: filter::distinct_sorted(feats.iter().map(|f| f.category.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(json: &str) -> Feat {
        Feat::from_raw(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_missing_optional_fields_take_defaults() {
        let feat = decode(r#"{"name": "Alert", "desc": "Always on the lookout."}"#);
        assert_eq!(feat.category, "General");
        assert_eq!(feat.prerequisite, None);
        assert!(!feat.repeatable);
        assert!(feat.benefits.is_empty());
    }

    #[test]
    fn test_missing_description_is_a_decode_error() {
        let result: Result<RawFeat, _> = serde_json::from_str(r#"{"name": "Alert"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_prerequisite_and_benefits_are_searchable() {
        let feat = decode(
            r#"{"name": "Grappler", "desc": "Close quarters.", "prerequisite": "Strength 13",
                "benefits": ["Advantage on attacks against a creature you grapple", " "]}"#,
        );
        assert_eq!(feat.benefits.len(), 1);
        let fields = feat.search_fields();
        assert!(fields.contains(&"Strength 13"));
        assert_eq!(fields[0], "Grappler");
    }

    #[test]
    fn test_matches_selection() {
        let feat = decode(
            r#"{"name": "Elemental Adept", "desc": "", "category": "General",
                "repeatable": "yes"}"#,
        );
        let mut criteria = FeatCriteria::default();
        criteria.toggle_repeatable_only();
        assert!(feat.matches_selection(&criteria));
        criteria.toggle_category("Origin");
        assert!(!feat.matches_selection(&criteria));
        criteria.toggle_category("General");
        assert!(feat.matches_selection(&criteria));
    }
}
