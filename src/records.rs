//! Per-game records produced by the phases: substitutions, flags, teams.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::catalog::HallucinationType;

/// A team's chosen hallucination for one citation. At most one per
/// `(game, team, citation_id)`; a later write replaces the earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubstitutionRecord {
    pub citation_id: String,
    /// Raw stored type name; an unknown name resolves to nothing at render time.
    pub hallucination_type: String,
    pub option_id: String,
}

impl SubstitutionRecord {
    pub fn new(citation_id: &str, kind: HallucinationType, option_id: &str) -> Self {
        Self {
            citation_id: citation_id.to_string(),
            hallucination_type: kind.as_str().to_string(),
            option_id: option_id.to_string(),
        }
    }

    pub fn kind(&self) -> Option<HallucinationType> {
        self.hallucination_type.parse().ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Legit,
    Fake,
    /// Implied when a team never flagged a citation. Never stored.
    Skip,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Legit => "legit",
            Verdict::Fake => "fake",
            Verdict::Skip => "skip",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legit" => Ok(Verdict::Legit),
            "fake" => Ok(Verdict::Fake),
            "skip" => Ok(Verdict::Skip),
            other => Err(format!("unknown verdict: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagRecord {
    pub citation_id: String,
    pub verdict: Verdict,
}

impl FlagRecord {
    pub fn new(citation_id: &str, verdict: Verdict) -> Self {
        Self {
            citation_id: citation_id.to_string(),
            verdict,
        }
    }
}

/// Team roster entry. `fabrication_team` is the team whose substitutions this
/// team verifies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub team_id: String,
    pub team_name: String,
    #[serde(default)]
    pub fabrication_team: Option<String>,
}

impl Team {
    pub fn new(team_id: &str, team_name: &str) -> Self {
        Self {
            team_id: team_id.to_string(),
            team_name: team_name.to_string(),
            fabrication_team: None,
        }
    }
}
