use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::decode;
use super::domain::Domain;
use super::Entity;
use crate::filter::{self, FilterCriteria};

/// A character background.
///
/// Skill and tool proficiencies arrive as comma-separated strings in the
/// bundled dataset and are split into lists on decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Background {
    #[serde(skip, default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub skill_proficiencies: Vec<String>,
    pub tool_proficiencies: Vec<String>,
    pub languages: Option<String>,
    pub equipment: Option<String>,
    /// Name of the background feature.
    pub feature: Option<String>,
    pub feature_description: Option<String>,
    /// Source book.
    pub source: String,
}

impl PartialEq for Background {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.skill_proficiencies == other.skill_proficiencies
            && self.tool_proficiencies == other.tool_proficiencies
            && self.languages == other.languages
            && self.equipment == other.equipment
            && self.feature == other.feature
            && self.feature_description == other.feature_description
            && self.source == other.source
    }
}

fn default_source() -> String {
    "SRD".to_string()
}

/// A background record as it appears in the bundled dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBackground {
    name: String,
    desc: String,
    #[serde(default, deserialize_with = "decode::list")]
    skill_proficiencies: Vec<String>,
    #[serde(default, deserialize_with = "decode::list")]
    tool_proficiencies: Vec<String>,
    #[serde(default, deserialize_with = "decode::optional_text")]
    languages: Option<String>,
    #[serde(default, deserialize_with = "decode::optional_text")]
    equipment: Option<String>,
    #[serde(default, deserialize_with = "decode::optional_text")]
    feature: Option<String>,
    #[serde(default, deserialize_with = "decode::optional_text")]
    feature_desc: Option<String>,
    #[serde(default, deserialize_with = "decode::optional_text")]
    source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackgroundFacets {
    pub skills: Vec<String>,
    pub sources: Vec<String>,
}

/// Search and filter state for backgrounds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundCriteria {
    pub search_text: String,
    pub selected_skills: BTreeSet<String>,
    pub selected_sources: BTreeSet<String>,
}

impl BackgroundCriteria {
    pub fn toggle_skill(&mut self, skill: impl Into<String>) {
        filter::toggle(&mut self.selected_skills, skill.into());
    }

    pub fn toggle_source(&mut self, source: impl Into<String>) {
        filter::toggle(&mut self.selected_sources, source.into());
    }
}

impl FilterCriteria for BackgroundCriteria {
    fn search_text(&self) -> &str {
        &self.search_text
    }

    fn set_search_text(&mut self, text: String) {
        self.search_text = text;
    }
}

impl Entity for Background {
    type Raw = RawBackground;
    type Criteria = BackgroundCriteria;
    type Facets = BackgroundFacets;

    const DOMAIN: Domain = Domain::Backgrounds;

    fn from_raw(raw: RawBackground) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: raw.name,
            description: raw.desc,
            skill_proficiencies: raw.skill_proficiencies,
            tool_proficiencies: raw.tool_proficiencies,
            languages: raw.languages,
            equipment: raw.equipment,
            feature: raw.feature,
            feature_description: raw.feature_desc,
            source: raw.source.unwrap_or_else(default_source),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str(), self.description.as_str()];
        fields.extend(self.feature.as_deref());
        fields.extend(self.feature_description.as_deref());
        fields.extend(self.skill_proficiencies.iter().map(String::as_str));
        fields
    }

    fn matches_selection(&self, criteria: &BackgroundCriteria) -> bool {
        filter::intersects(&criteria.selected_skills, &self.skill_proficiencies)
            && filter::selected(&criteria.selected_sources, &self.source)
    }

    fn facets(backgrounds: &[Self]) -> BackgroundFacets {
        BackgroundFacets {
            skills: filter::distinct_sorted(
                backgrounds
                    .iter()
                    .flat_map(|b| b.skill_proficiencies.iter().cloned()),
            ),
            sources: filter::distinct_sorted(backgrounds.iter().map(|b| b.source.clone())),
        }
    }
}
