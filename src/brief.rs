//! Brief document model: paragraphs with located citation spans.
//!
//! A span is valid when `text[start..end] == display_text`, counting offsets in
//! characters (see [`crate::offsets`]).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::offsets;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationSpan {
    pub citation_id: String,
    pub start: usize,
    pub end: usize,
    pub display_text: String,
    /// Short-form back-reference ("Ashcroft, supra") to an earlier primary citation.
    #[serde(default, skip_serializing_if = "is_false")]
    pub supra: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    pub id: String,
    #[serde(default)]
    pub section: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub text: String,
    #[serde(default)]
    pub citations: Vec<CitationSpan>,
}

impl Paragraph {
    /// Text currently under the span's offsets.
    pub fn span_text(&self, span: &CitationSpan) -> Option<&str> {
        offsets::slice_chars(&self.text, span.start, span.end)
    }

    pub fn span_is_valid(&self, span: &CitationSpan) -> bool {
        self.span_text(span) == Some(span.display_text.as_str())
    }

    pub fn spans_valid(&self) -> bool {
        self.citations.iter().all(|c| self.span_is_valid(c))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub brief_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub case_name: String,
    #[serde(default)]
    pub court: String,
    #[serde(default)]
    pub docket: String,
    pub paragraphs: Vec<Paragraph>,
}

/// Listing entry for brief discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefSummary {
    pub brief_id: String,
    pub title: String,
    pub case_name: String,
}

impl Document {
    /// Every citation id with a span anywhere in the document.
    pub fn citation_ids(&self) -> BTreeSet<String> {
        self.spans().map(|(_, c)| c.citation_id.clone()).collect()
    }

    /// All spans paired with their paragraph, in document order.
    pub fn spans(&self) -> impl Iterator<Item = (&Paragraph, &CitationSpan)> {
        self.paragraphs
            .iter()
            .flat_map(|p| p.citations.iter().map(move |c| (p, c)))
    }

    /// citation_id → paragraph ids holding a primary (non-supra) occurrence.
    pub fn primary_occurrences(&self) -> BTreeMap<String, Vec<String>> {
        self.occurrences(|c| !c.supra)
    }

    /// citation_id → paragraph ids holding a supra occurrence.
    pub fn supra_occurrences(&self) -> BTreeMap<String, Vec<String>> {
        self.occurrences(|c| c.supra)
    }

    /// citation_id → paragraph ids holding any occurrence.
    pub fn all_occurrences(&self) -> BTreeMap<String, Vec<String>> {
        self.occurrences(|_| true)
    }

    fn occurrences(&self, keep: impl Fn(&CitationSpan) -> bool) -> BTreeMap<String, Vec<String>> {
        let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (para, cite) in self.spans() {
            if keep(cite) {
                out.entry(cite.citation_id.clone())
                    .or_default()
                    .push(para.id.clone());
            }
        }
        out
    }

    pub fn spans_valid(&self) -> bool {
        self.paragraphs.iter().all(Paragraph::spans_valid)
    }

    pub fn summary(&self) -> BriefSummary {
        BriefSummary {
            brief_id: self.brief_id.clone(),
            title: if self.title.is_empty() {
                self.brief_id.clone()
            } else {
                self.title.clone()
            },
            case_name: self.case_name.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn span(text: &str, cid: &str, display: &str) -> CitationSpan {
        let start = offsets::find_char(text, display).expect("display text present");
        CitationSpan {
            citation_id: cid.to_string(),
            start,
            end: start + offsets::char_len(display),
            display_text: display.to_string(),
            supra: false,
        }
    }

    pub fn para(id: &str, text: &str, cites: &[(&str, &str)]) -> Paragraph {
        Paragraph {
            id: id.to_string(),
            section: "III.A".to_string(),
            kind: "body".to_string(),
            text: text.to_string(),
            citations: cites.iter().map(|(cid, d)| span(text, cid, d)).collect(),
        }
    }

    pub fn document(paragraphs: Vec<Paragraph>) -> Document {
        Document {
            brief_id: "brief_test".to_string(),
            title: "Brief in Support of Motion to Dismiss".to_string(),
            case_name: "Doe v. Acme Ins. Co.".to_string(),
            court: "E.D. Pa.".to_string(),
            docket: "2:26-cv-00001".to_string(),
            paragraphs,
        }
    }
}
