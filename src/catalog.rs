//! Substitution catalog: the menu of hallucinations each citation may receive.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HallucinationType {
    FabricatedCase,
    WrongCitation,
    Mischaracterization,
    Misquotation,
}

impl HallucinationType {
    /// Fixed cycling order used by the balanced selector.
    pub const ALL: [HallucinationType; 4] = [
        HallucinationType::FabricatedCase,
        HallucinationType::WrongCitation,
        HallucinationType::Mischaracterization,
        HallucinationType::Misquotation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HallucinationType::FabricatedCase => "fabricated_case",
            HallucinationType::WrongCitation => "wrong_citation",
            HallucinationType::Mischaracterization => "mischaracterization",
            HallucinationType::Misquotation => "misquotation",
        }
    }

    /// Abbreviation used in option ids (`cite_07_wc_2`).
    pub fn abbrev(&self) -> &'static str {
        match self {
            HallucinationType::FabricatedCase => "fab",
            HallucinationType::WrongCitation => "wc",
            HallucinationType::Mischaracterization => "mc",
            HallucinationType::Misquotation => "mq",
        }
    }
}

impl fmt::Display for HallucinationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HallucinationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HallucinationType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown hallucination type: {}", s))
    }
}

/// What an option does to the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Substitution {
    /// Swap the citation's own displayed reference text.
    ReferenceReplacement { replacement_citation: String },
    /// Swap a quoted passage wherever it first appears in the document.
    PassageReplacement {
        original_text: String,
        replacement_text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogOption {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(flatten)]
    pub kind: Substitution,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "RawCatalogEntry")]
pub struct CatalogEntry {
    pub original_display: String,
    pub options: BTreeMap<HallucinationType, Vec<CatalogOption>>,
    /// Option groups keyed by a type name outside [`HallucinationType::ALL`].
    /// Dropped on load; kept so the validator can report them.
    #[serde(skip_serializing)]
    pub unknown_types: Vec<String>,
}

#[derive(Deserialize)]
struct RawCatalogEntry {
    #[serde(default)]
    original_display: String,
    #[serde(default)]
    options: BTreeMap<String, Vec<CatalogOption>>,
}

impl From<RawCatalogEntry> for CatalogEntry {
    fn from(raw: RawCatalogEntry) -> Self {
        let mut options = BTreeMap::new();
        let mut unknown_types = Vec::new();
        for (name, opts) in raw.options {
            match name.parse::<HallucinationType>() {
                Ok(kind) => {
                    options.insert(kind, opts);
                }
                Err(_) => unknown_types.push(name),
            }
        }
        CatalogEntry {
            original_display: raw.original_display,
            options,
            unknown_types,
        }
    }
}

/// citation_id → entry, as stored in `hallucinations/<brief_id>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    pub entries: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    pub fn get(&self, citation_id: &str) -> Option<&CatalogEntry> {
        self.entries.get(citation_id)
    }

    pub fn options(&self, citation_id: &str, kind: HallucinationType) -> &[CatalogOption] {
        self.entries
            .get(citation_id)
            .and_then(|e| e.options.get(&kind))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Resolve a stored `(citation, type, option)` triple. Any unknown part
    /// yields `None`.
    pub fn resolve(&self, citation_id: &str, type_name: &str, option_id: &str) -> Option<&CatalogOption> {
        let kind = type_name.parse::<HallucinationType>().ok()?;
        self.options(citation_id, kind)
            .iter()
            .find(|o| o.id == option_id)
    }

    /// Option label for display in score details; empty when unresolved.
    pub fn option_label(&self, citation_id: &str, type_name: &str, option_id: &str) -> String {
        self.resolve(citation_id, type_name, option_id)
            .map(|o| o.label.clone())
            .unwrap_or_default()
    }

    /// Every `(citation, option)` pair of the given type, in citation order.
    pub fn triples_of(&self, kind: HallucinationType) -> Vec<(&str, &CatalogOption)> {
        self.entries
            .iter()
            .flat_map(|(cid, entry)| {
                entry
                    .options
                    .get(&kind)
                    .into_iter()
                    .flatten()
                    .map(move |opt| (cid.as_str(), opt))
            })
            .collect()
    }
}
