//! Applies a team's substitutions to a private copy of a brief.
//!
//! Two passes:
//! - **Pass A** swaps the displayed reference text of each substituted
//!   citation's primary (non-supra) spans, right to left within a paragraph.
//! - **Pass B** swaps quoted passages, at their first match in document
//!   order, once per substitution.
//!
//! Span offsets are maintained by position: an edit of `[start, end)` shifts
//! every span at or after `end` by the length delta and leaves earlier spans
//! alone. A span that wholly contains an edit is resized in place. Only a
//! span partly overlapping an edited region is relocated by text search. Either way `text[start..end] == display_text` holds afterwards.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::brief::{Document, Paragraph};
use crate::catalog::{Catalog, CatalogOption, HallucinationType, Substitution};
use crate::logging::{debug, obj, v_num, v_str, warn, Domain, ProfileScope};
use crate::offsets;
use crate::records::SubstitutionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    UnknownCitation,
    UnknownType,
    UnknownOption,
    /// Reference replacement for a citation with no primary span to swap.
    NoPrimarySpan,
    /// Passage replacement whose original text appears in no paragraph.
    PassageNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedSubstitution {
    pub citation_id: String,
    pub option_id: String,
    pub reason: SkipReason,
}

/// What a render actually did. Skips are informational, never errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderReport {
    /// Citation ids whose substitution changed the text.
    pub applied: Vec<String>,
    pub skipped: Vec<SkippedSubstitution>,
}

/// Render `document` with `substitutions` applied. The input is never touched.
pub fn render(document: &Document, catalog: &Catalog, substitutions: &[SubstitutionRecord]) -> Document {
    render_with_report(document, catalog, substitutions).0
}

pub fn render_with_report(
    document: &Document,
    catalog: &Catalog,
    substitutions: &[SubstitutionRecord],
) -> (Document, RenderReport) {
    let _scope = ProfileScope::with_context(
        "render",
        &[
            ("brief_id", v_str(&document.brief_id)),
            ("substitutions", v_num(substitutions.len() as f64)),
        ],
    );
    let mut out = document.clone();
    let mut report = RenderReport::default();
    if substitutions.is_empty() {
        return (out, report);
    }

    let chosen = resolve_all(catalog, substitutions, &mut report);

    let reference: HashMap<&str, &str> = chosen
        .iter()
        .filter_map(|(cid, opt)| match &opt.kind {
            Substitution::ReferenceReplacement { replacement_citation } => {
                Some((*cid, replacement_citation.as_str()))
            }
            Substitution::PassageReplacement { .. } => None,
        })
        .collect();

    // Pass A
    let mut swapped: BTreeSet<String> = BTreeSet::new();
    for para in out.paragraphs.iter_mut() {
        if para.citations.is_empty() {
            continue;
        }
        let mut order: Vec<usize> = (0..para.citations.len()).collect();
        order.sort_by(|a, b| para.citations[*b].start.cmp(&para.citations[*a].start));

        for idx in order {
            let span = &para.citations[idx];
            if span.supra {
                continue;
            }
            let Some(replacement) = reference.get(span.citation_id.as_str()) else {
                continue;
            };
            let (start, end) = (span.start, span.end);
            swapped.insert(span.citation_id.clone());
            splice_paragraph(para, start, end, replacement, Some(idx));
        }
    }

    for (cid, opt) in &chosen {
        match &opt.kind {
            Substitution::ReferenceReplacement { .. } => {
                if swapped.contains(*cid) {
                    report.applied.push(cid.to_string());
                } else {
                    report.skipped.push(skipped(cid, &opt.id, SkipReason::NoPrimarySpan));
                }
            }
            // Pass B
            Substitution::PassageReplacement {
                original_text,
                replacement_text,
            } => {
                if apply_passage(&mut out.paragraphs, original_text, replacement_text) {
                    report.applied.push(cid.to_string());
                } else {
                    warn(
                        Domain::Render,
                        "passage_not_found",
                        obj(&[
                            ("brief_id", v_str(&document.brief_id)),
                            ("citation_id", v_str(cid)),
                            ("option_id", v_str(&opt.id)),
                            ("msg", v_str("original text matched no paragraph; substitution has no effect")),
                        ]),
                    );
                    report.skipped.push(skipped(cid, &opt.id, SkipReason::PassageNotFound));
                }
            }
        }
    }

    debug(
        Domain::Render,
        "rendered",
        obj(&[
            ("brief_id", v_str(&document.brief_id)),
            ("applied", v_num(report.applied.len() as f64)),
            ("skipped", v_num(report.skipped.len() as f64)),
        ]),
    );
    (out, report)
}

fn skipped(citation_id: &str, option_id: &str, reason: SkipReason) -> SkippedSubstitution {
    SkippedSubstitution {
        citation_id: citation_id.to_string(),
        option_id: option_id.to_string(),
        reason,
    }
}

/// Resolve records against the catalog. A later record for the same citation
/// replaces the earlier choice but keeps its position.
fn resolve_all<'c, 's>(
    catalog: &'c Catalog,
    substitutions: &'s [SubstitutionRecord],
    report: &mut RenderReport,
) -> Vec<(&'s str, &'c CatalogOption)> {
    let mut chosen: Vec<(&str, &CatalogOption)> = Vec::new();
    let mut slot: HashMap<&str, usize> = HashMap::new();

    for sub in substitutions {
        let reason = if catalog.get(&sub.citation_id).is_none() {
            Some(SkipReason::UnknownCitation)
        } else if sub.hallucination_type.parse::<HallucinationType>().is_err() {
            Some(SkipReason::UnknownType)
        } else {
            None
        };
        let resolved = match reason {
            Some(_) => None,
            None => catalog.resolve(&sub.citation_id, &sub.hallucination_type, &sub.option_id),
        };
        let Some(option) = resolved else {
            report.skipped.push(skipped(
                &sub.citation_id,
                &sub.option_id,
                reason.unwrap_or(SkipReason::UnknownOption),
            ));
            continue;
        };
        match slot.get(sub.citation_id.as_str()) {
            Some(&i) => chosen[i].1 = option,
            None => {
                slot.insert(sub.citation_id.as_str(), chosen.len());
                chosen.push((sub.citation_id.as_str(), option));
            }
        }
    }
    chosen
}

/// Replace the first occurrence of `original` across paragraphs, in order.
fn apply_passage(paragraphs: &mut [Paragraph], original: &str, replacement: &str) -> bool {
    if original.is_empty() {
        return false;
    }
    for para in paragraphs.iter_mut() {
        if let Some(start) = offsets::find_char(&para.text, original) {
            let end = start + offsets::char_len(original);
            splice_paragraph(para, start, end, replacement, None);
            return true;
        }
    }
    false
}

/// Replace chars `[start, end)` of the paragraph text and repair every span.
/// `target`, when given, is the span being replaced; it ends up covering the
/// replacement exactly.
fn splice_paragraph(
    para: &mut Paragraph,
    start: usize,
    end: usize,
    replacement: &str,
    target: Option<usize>,
) {
    let new_len = offsets::char_len(replacement);
    para.text = offsets::splice_chars(&para.text, start, end, replacement);

    let mut contained = Vec::new();
    let mut overlapping = Vec::new();
    for (i, span) in para.citations.iter_mut().enumerate() {
        if Some(i) == target {
            span.start = start;
            span.end = start + new_len;
            span.display_text = replacement.to_string();
        } else if span.start >= end {
            span.start = span.start - end + start + new_len;
            span.end = span.end - end + start + new_len;
        } else if span.start <= start && end <= span.end {
            // edit lies wholly inside the span: it grows or shrinks in place
            span.end = span.end - end + start + new_len;
            contained.push(i);
        } else if span.end > start {
            overlapping.push(i);
        }
    }
    for i in contained {
        let span = &mut para.citations[i];
        if let Some(now) = offsets::slice_chars(&para.text, span.start, span.end) {
            span.display_text = now.to_string();
        }
    }
    for i in overlapping {
        relocate(para, i);
    }
}

/// Fallback for a span whose text was touched by an edit: find its display
/// text anew, or adopt whatever text now sits under its clamped range.
fn relocate(para: &mut Paragraph, idx: usize) {
    let text_len = offsets::char_len(&para.text);
    let span = &mut para.citations[idx];
    if let Some(found) = offsets::find_char(&para.text, &span.display_text) {
        span.start = found;
        span.end = found + offsets::char_len(&span.display_text);
        return;
    }
    span.start = span.start.min(text_len);
    span.end = span.end.clamp(span.start, text_len);
    let now = offsets::slice_chars(&para.text, span.start, span.end)
        .unwrap_or_default()
        .to_string();
    warn(
        Domain::Render,
        "span_resynced",
        obj(&[
            ("citation_id", v_str(&span.citation_id)),
            ("paragraph", v_str(&para.id)),
            ("was", v_str(&span.display_text)),
            ("now", v_str(&now)),
        ]),
    );
    span.display_text = now;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brief::fixtures::{document, para};
    use crate::catalog::fixtures::{passage, reference, with_option};
    use crate::catalog::HallucinationType::*;

    fn sub(cid: &str, kind: HallucinationType, oid: &str) -> SubstitutionRecord {
        SubstitutionRecord::new(cid, kind, oid)
    }

    fn two_cite_doc() -> Document {
        document(vec![
            para(
                "p1",
                "The court must \u{201c}construe the complaint\u{201d} liberally. McTernan v. City of York, 564 F.3d 636, 646 (3d. Cir. 2009) (citations omitted). See also Twombly, 550 U.S. 544.",
                &[
                    ("cite_01", "McTernan v. City of York, 564 F.3d 636, 646 (3d. Cir. 2009)"),
                    ("cite_02", "Twombly, 550 U.S. 544"),
                ],
            ),
            para("p2", "ARGUMENT", &[]),
        ])
    }

    #[test]
    fn test_empty_substitutions_round_trip() {
        let doc = two_cite_doc();
        let (out, report) = render_with_report(&doc, &Catalog::default(), &[]);
        assert_eq!(out, doc);
        assert_eq!(report, RenderReport::default());
    }

    #[test]
    fn test_reference_replacement_keeps_offsets_valid() {
        let doc = two_cite_doc();
        let mut catalog = Catalog::default();
        with_option(&mut catalog, "cite_01", FabricatedCase, reference("cite_01_fab_1", "X v. Y, 1 F.3d 1 (2020)"));

        let out = render(&doc, &catalog, &[sub("cite_01", FabricatedCase, "cite_01_fab_1")]);
        let p = &out.paragraphs[0];
        assert_eq!(p.citations[0].display_text, "X v. Y, 1 F.3d 1 (2020)");
        assert!(p.text.contains("liberally. X v. Y, 1 F.3d 1 (2020) (citations omitted)"));
        assert!(out.spans_valid());
        // original untouched
        assert!(doc.paragraphs[0].text.contains("McTernan"));
    }

    #[test]
    fn test_multiple_replacements_in_one_paragraph() {
        let doc = two_cite_doc();
        let mut catalog = Catalog::default();
        with_option(&mut catalog, "cite_01", WrongCitation, reference("cite_01_wc_1", "McTernan, 1 F.3d 2"));
        with_option(
            &mut catalog,
            "cite_02",
            FabricatedCase,
            reference("cite_02_fab_1", "Twombly v. Bell Atlantic Telecommunications Holdings, 999 U.S. 1"),
        );
        let out = render(
            &doc,
            &catalog,
            &[
                sub("cite_01", WrongCitation, "cite_01_wc_1"),
                sub("cite_02", FabricatedCase, "cite_02_fab_1"),
            ],
        );
        assert!(out.spans_valid());
        assert_eq!(out.paragraphs[0].citations[1].display_text, "Twombly v. Bell Atlantic Telecommunications Holdings, 999 U.S. 1");
    }

    #[test]
    fn test_supra_span_is_not_replaced_but_stays_valid() {
        let mut p = para(
            "p1",
            "Ashcroft v. Iqbal, 556 U.S. 662 (2009); Ashcroft, supra, at 678.",
            &[("cite_02", "Ashcroft v. Iqbal, 556 U.S. 662 (2009)"), ("cite_02", "Ashcroft, supra")],
        );
        p.citations[1].supra = true;
        let doc = document(vec![p]);
        let mut catalog = Catalog::default();
        with_option(&mut catalog, "cite_02", FabricatedCase, reference("cite_02_fab_1", "Ashcroft v. Iqbalz, 1 U.S. 1"));

        let out = render(&doc, &catalog, &[sub("cite_02", FabricatedCase, "cite_02_fab_1")]);
        let cites = &out.paragraphs[0].citations;
        assert_eq!(cites[0].display_text, "Ashcroft v. Iqbalz, 1 U.S. 1");
        assert_eq!(cites[1].display_text, "Ashcroft, supra");
        assert!(out.spans_valid());
    }

    #[test]
    fn test_supra_only_citation_reports_no_primary_span() {
        let mut p = para("p1", "As held in Ashcroft, supra, dismissal is proper.", &[("cite_02", "Ashcroft, supra")]);
        p.citations[0].supra = true;
        let doc = document(vec![p]);
        let mut catalog = Catalog::default();
        with_option(&mut catalog, "cite_02", FabricatedCase, reference("cite_02_fab_1", "Nope v. Nope"));

        let (out, report) = render_with_report(&doc, &catalog, &[sub("cite_02", FabricatedCase, "cite_02_fab_1")]);
        assert_eq!(out, doc);
        assert_eq!(report.skipped[0].reason, SkipReason::NoPrimarySpan);
    }

    #[test]
    fn test_repeated_display_text_keeps_distinct_positions() {
        let text = "Id. at 5; Smith, 1 U.S. 1. Then Id. again; Jones, 2 U.S. 2.";
        let mut p = para("p1", text, &[("cite_01", "Smith, 1 U.S. 1"), ("cite_02", "Jones, 2 U.S. 2")]);
        // two spans sharing the display text "Id."
        p.citations.push(crate::brief::CitationSpan {
            citation_id: "cite_03".to_string(),
            start: 0,
            end: 3,
            display_text: "Id.".to_string(),
            supra: false,
        });
        p.citations.push(crate::brief::CitationSpan {
            citation_id: "cite_04".to_string(),
            start: 32,
            end: 35,
            display_text: "Id.".to_string(),
            supra: false,
        });
        let doc = document(vec![p]);
        assert!(doc.spans_valid());

        let mut catalog = Catalog::default();
        with_option(&mut catalog, "cite_01", WrongCitation, reference("cite_01_wc_1", "Smith, 100 U.S. 100"));
        let out = render(&doc, &catalog, &[sub("cite_01", WrongCitation, "cite_01_wc_1")]);
        let cites = &out.paragraphs[0].citations;
        assert!(out.spans_valid());
        assert_eq!(cites[2].start, 0);
        assert_eq!(cites[3].start, 36);
    }

    #[test]
    fn test_passage_replacement_first_match_only() {
        let claim = "Plaintiff alleges that she sustained injuries in a collision.";
        let doc = document(vec![
            para("p1", "STATEMENT OF FACTS", &[]),
            para(
                "p2",
                "Plaintiff alleges that she sustained injuries in a collision. Rosario v. Liberty, 1 F. Supp. 3d 1.",
                &[("cite_05", "Rosario v. Liberty, 1 F. Supp. 3d 1")],
            ),
            para("p3", claim, &[]),
        ]);
        let mut catalog = Catalog::default();
        with_option(
            &mut catalog,
            "cite_05",
            Mischaracterization,
            passage(
                "cite_05_mc_1",
                "alleges that she sustained injuries",
                "concedes that she sustained no injuries",
            ),
        );

        let (out, report) = render_with_report(&doc, &catalog, &[sub("cite_05", Mischaracterization, "cite_05_mc_1")]);
        assert_eq!(report.applied, vec!["cite_05".to_string()]);
        assert_eq!(out.paragraphs[0], doc.paragraphs[0]);
        assert!(out.paragraphs[1].text.starts_with("Plaintiff concedes that she sustained no injuries"));
        assert_eq!(out.paragraphs[2], doc.paragraphs[2]);
        assert!(out.spans_valid());
        assert_eq!(out.paragraphs[1].citations[0].display_text, "Rosario v. Liberty, 1 F. Supp. 3d 1");
    }

    #[test]
    fn test_passage_not_found_is_silent() {
        let doc = two_cite_doc();
        let mut catalog = Catalog::default();
        with_option(&mut catalog, "cite_02", Misquotation, passage("cite_02_mq_1", "no such words", "other words"));
        let (out, report) = render_with_report(&doc, &catalog, &[sub("cite_02", Misquotation, "cite_02_mq_1")]);
        assert_eq!(out, doc);
        assert!(report.applied.is_empty());
        assert_eq!(report.skipped[0].reason, SkipReason::PassageNotFound);
    }

    #[test]
    fn test_passage_with_curly_quotes_shifts_following_spans() {
        let doc = two_cite_doc();
        let mut catalog = Catalog::default();
        with_option(
            &mut catalog,
            "cite_01",
            Misquotation,
            passage("cite_01_mq_1", "\u{201c}construe the complaint\u{201d}", "\u{201c}read the complaint skeptically\u{201d}"),
        );
        let out = render(&doc, &catalog, &[sub("cite_01", Misquotation, "cite_01_mq_1")]);
        assert!(out.paragraphs[0].text.contains("read the complaint skeptically"));
        assert!(out.spans_valid());
        let shift = doc.paragraphs[0].citations[0].start;
        assert_eq!(out.paragraphs[0].citations[0].start, shift + 8);
    }

    #[test]
    fn test_unresolvable_substitutions_are_skipped() {
        let doc = two_cite_doc();
        let mut catalog = Catalog::default();
        with_option(&mut catalog, "cite_01", FabricatedCase, reference("cite_01_fab_1", "X v. Y"));
        let subs = vec![
            SubstitutionRecord {
                citation_id: "cite_01".to_string(),
                hallucination_type: "invented".to_string(),
                option_id: "cite_01_fab_1".to_string(),
            },
            sub("cite_01", FabricatedCase, "cite_01_fab_7"),
            sub("cite_42", FabricatedCase, "cite_42_fab_1"),
        ];
        let (out, report) = render_with_report(&doc, &catalog, &subs);
        assert_eq!(out, doc);
        let reasons: Vec<SkipReason> = report.skipped.iter().map(|s| s.reason).collect();
        assert_eq!(
            reasons,
            vec![SkipReason::UnknownType, SkipReason::UnknownOption, SkipReason::UnknownCitation]
        );
    }

    #[test]
    fn test_later_record_for_same_citation_wins() {
        let doc = two_cite_doc();
        let mut catalog = Catalog::default();
        with_option(&mut catalog, "cite_02", FabricatedCase, reference("cite_02_fab_1", "First v. Choice"));
        with_option(&mut catalog, "cite_02", WrongCitation, reference("cite_02_wc_1", "Twombly, 550 U.S. 999"));
        let out = render(
            &doc,
            &catalog,
            &[
                sub("cite_02", FabricatedCase, "cite_02_fab_1"),
                sub("cite_02", WrongCitation, "cite_02_wc_1"),
            ],
        );
        assert_eq!(out.paragraphs[0].citations[1].display_text, "Twombly, 550 U.S. 999");
        assert!(!out.paragraphs[0].text.contains("First v. Choice"));
    }

    #[test]
    fn test_passage_inside_span_keeps_span_start() {
        let doc = document(vec![para(
            "p1",
            "See Smith v. Jones, 1 U.S. 1 (1990).",
            &[("cite_01", "Smith v. Jones, 1 U.S. 1 (1990)")],
        )]);
        let mut catalog = Catalog::default();
        with_option(&mut catalog, "cite_01", Misquotation, passage("cite_01_mq_1", "Jones, 1 U.S.", "Jones, 7 U.S."));
        let out = render(&doc, &catalog, &[sub("cite_01", Misquotation, "cite_01_mq_1")]);
        assert!(out.spans_valid());
        assert_eq!(out.paragraphs[0].citations[0].display_text, "Smith v. Jones, 7 U.S. 1 (1990)");
    }

    #[test]
    fn test_passage_inside_span_changing_length() {
        let doc = document(vec![para(
            "p1",
            "See Smith v. Jones, 1 U.S. 1 (1990). Accord Doe v. Roe, 2 U.S. 2.",
            &[("cite_01", "Smith v. Jones, 1 U.S. 1 (1990)"), ("cite_02", "Doe v. Roe, 2 U.S. 2")],
        )]);
        let mut catalog = Catalog::default();
        with_option(&mut catalog, "cite_01", Misquotation, passage("cite_01_mq_1", "Jones, 1 U.S.", "Jones, 100 U.S."));
        with_option(&mut catalog, "cite_02", Misquotation, passage("cite_02_mq_1", "Roe, 2 U.S. 2", "Roe"));

        let out = render(&doc, &catalog, &[sub("cite_01", Misquotation, "cite_01_mq_1")]);
        assert_eq!(out.paragraphs[0].text, "See Smith v. Jones, 100 U.S. 1 (1990). Accord Doe v. Roe, 2 U.S. 2.");
        assert_eq!(out.paragraphs[0].citations[0].display_text, "Smith v. Jones, 100 U.S. 1 (1990)");
        assert_eq!(out.paragraphs[0].citations[0].start, 4);
        assert_eq!(out.paragraphs[0].citations[1].display_text, "Doe v. Roe, 2 U.S. 2");
        assert!(out.spans_valid());

        let out = render(&doc, &catalog, &[sub("cite_02", Misquotation, "cite_02_mq_1")]);
        assert_eq!(out.paragraphs[0].citations[1].display_text, "Doe v. Roe");
        assert_eq!(out.paragraphs[0].citations[0].display_text, "Smith v. Jones, 1 U.S. 1 (1990)");
        assert!(out.spans_valid());
    }

    #[test]
    fn test_passage_straddling_span_edge_is_resynced() {
        let doc = document(vec![para(
            "p1",
            "Held in Smith v. Jones, 1 U.S. 1 (1990).",
            &[("cite_01", "Smith v. Jones, 1 U.S. 1 (1990)")],
        )]);
        let mut catalog = Catalog::default();
        with_option(&mut catalog, "cite_01", Misquotation, passage("cite_01_mq_1", "in Smith", "in Smyth"));
        let out = render(&doc, &catalog, &[sub("cite_01", Misquotation, "cite_01_mq_1")]);
        assert!(out.spans_valid());
        assert_eq!(out.paragraphs[0].citations[0].display_text, "Smyth v. Jones, 1 U.S. 1 (1990)");
    }
}
