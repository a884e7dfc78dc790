use serde::{Deserialize, Serialize};

/// A reference-data domain. Each domain has one bundled dataset and one
/// cached criteria snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Spells,
    Feats,
    Backgrounds,
}

impl Domain {
    pub const ALL: [Domain; 3] = [Domain::Spells, Domain::Feats, Domain::Backgrounds];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spells => "spells",
            Self::Feats => "feats",
            Self::Backgrounds => "backgrounds",
        }
    }

    /// Name of the bundled dataset backing this domain.
    pub fn dataset(&self) -> &'static str {
        self.as_str()
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
