//! Offline consistency checks for a brief and its catalog.
//!
//! Runs before data ships; the runtime core trusts its input. Errors fail
//! the check, warnings do not.

use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::sync::OnceLock;

use crate::brief::Document;
use crate::catalog::{Catalog, Substitution};
use crate::logging::{info, obj, v_num, v_str, Domain, ProfileScope};
use crate::offsets;

const RED: &str = "\x1b[91m";
const YELLOW: &str = "\x1b[93m";
const GREEN: &str = "\x1b[92m";
const CYAN: &str = "\x1b[96m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    CitationOffsets,
    SupraReferences,
    TargetReachability,
    CrossReferences,
    OptionNaming,
}

impl Section {
    pub const ALL: [Section; 5] = [
        Section::CitationOffsets,
        Section::SupraReferences,
        Section::TargetReachability,
        Section::CrossReferences,
        Section::OptionNaming,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Section::CitationOffsets => "Citation offset checks",
            Section::SupraReferences => "Supra reference detection",
            Section::TargetReachability => "Hallucination target reachability",
            Section::CrossReferences => "Cross-reference checks",
            Section::OptionNaming => "Option ID naming convention",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Warn,
    Error,
}

impl Severity {
    fn tag(&self, color: bool) -> String {
        let (c, label) = match self {
            Severity::Ok => (GREEN, "OK"),
            Severity::Warn => (YELLOW, "WARN"),
            Severity::Error => (RED, "ERROR"),
        };
        paint(color, c, label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub section: Section,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub brief_id: String,
    pub findings: Vec<Finding>,
    pub citations_validated: usize,
}

impl ValidationReport {
    fn push(&mut self, section: Section, severity: Severity, message: String) {
        self.findings.push(Finding {
            section,
            severity,
            message,
        });
    }

    fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    pub fn errors(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warnings(&self) -> usize {
        self.count(Severity::Warn)
    }

    pub fn passed(&self) -> bool {
        self.errors() == 0
    }

    pub fn in_section(&self, section: Section) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.section == section)
    }

    /// Human report grouped by section, ANSI-colored when `color` is set.
    pub fn render(&self, color: bool) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\n{}\n", paint(color, CYAN, &format!("=== Validating {} ===", self.brief_id)));
        for (i, section) in Section::ALL.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let _ = writeln!(out, "{}", paint(color, CYAN, &format!("--- {} ---", section.title())));
            let mut any = false;
            for f in self.in_section(*section) {
                any = true;
                let _ = writeln!(out, "  {}: {}", f.severity.tag(color), f.message);
            }
            if !any {
                let _ = writeln!(out, "  (nothing to check)");
            }
        }

        let errors = self.errors();
        let _ = writeln!(out, "\n{}", paint(color, CYAN, "=== Summary ==="));
        let _ = writeln!(
            out,
            "  {}, {}, {}",
            paint(color, if errors == 0 { GREEN } else { RED }, &format!("{} error(s)", errors)),
            paint(color, YELLOW, &format!("{} warning(s)", self.warnings())),
            paint(color, GREEN, &format!("{} citations validated", self.citations_validated)),
        );
        if self.passed() {
            let _ = writeln!(out, "\n  {}: All checks passed.", paint(color, GREEN, "PASSED"));
        } else {
            let _ = writeln!(out, "\n  {}: Fix errors above before using this data.", paint(color, RED, "FAILED"));
        }
        out
    }
}

fn paint(color: bool, code: &str, text: &str) -> String {
    if color {
        format!("{}{}{}", code, text, RESET)
    } else {
        text.to_string()
    }
}

/// `Name, supra` or `Name v. Other ..., supra.`
fn supra_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([A-Z][\w\-'.]+(?:\s+v\.?\s+[A-Z][\w\-'.]+(?:\s+[\w&.]+)*)?),\s*supra\.?")
            .unwrap_or_else(|e| panic!("supra pattern: {}", e))
    })
}

fn option_id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^cite_\d+_(fab|wc|mc|mq)_\d+$").unwrap_or_else(|e| panic!("option id pattern: {}", e))
    })
}

fn preview(text: &str) -> String {
    text.chars().take(80).collect()
}

pub fn validate(document: &Document, catalog: &Catalog) -> ValidationReport {
    let _scope = ProfileScope::new("validate");
    let mut report = ValidationReport {
        brief_id: document.brief_id.clone(),
        ..Default::default()
    };
    let primaries = document.primary_occurrences();
    let all = document.all_occurrences();

    check_offsets(document, &mut report);
    check_supra(document, &primaries, &mut report);

    // target reachability
    for (cid, entry) in &catalog.entries {
        for opts in entry.options.values() {
            for opt in opts {
                match &opt.kind {
                    Substitution::PassageReplacement { original_text, .. } => {
                        let found = if original_text.is_empty() {
                            None
                        } else {
                            document.paragraphs.iter().find(|p| p.text.contains(original_text.as_str()))
                        };
                        match found {
                            None => report.push(
                                Section::TargetReachability,
                                Severity::Error,
                                format!(
                                    "{}: original_text not found in ANY paragraph\n         text: {:?}...",
                                    opt.id,
                                    preview(original_text)
                                ),
                            ),
                            Some(para) => {
                                let cite_paras: BTreeSet<&str> = all
                                    .get(cid)
                                    .map(|ps| ps.iter().map(String::as_str).collect())
                                    .unwrap_or_default();
                                let msg = if cite_paras.contains(para.id.as_str()) {
                                    format!("{}: original_text found in citation's paragraph ({})", opt.id, para.id)
                                } else {
                                    format!(
                                        "{}: original_text found in {} (cross-paragraph; citation is in {})",
                                        opt.id,
                                        para.id,
                                        cite_paras.into_iter().collect::<Vec<_>>().join(", ")
                                    )
                                };
                                report.push(Section::TargetReachability, Severity::Ok, msg);
                            }
                        }
                    }
                    Substitution::ReferenceReplacement { .. } => match primaries.get(cid) {
                        None => report.push(
                            Section::TargetReachability,
                            Severity::Error,
                            format!(
                                "{}: replacement_citation but {} has no primary (non-supra) citation entry",
                                opt.id, cid
                            ),
                        ),
                        Some(paras) => report.push(
                            Section::TargetReachability,
                            Severity::Ok,
                            format!(
                                "{}: replacement_citation target exists (primary in {})",
                                opt.id,
                                paras.first().map(String::as_str).unwrap_or("?")
                            ),
                        ),
                    },
                }
            }
        }
    }

    // cross references
    for cid in catalog.entries.keys() {
        match all.get(cid) {
            None => report.push(
                Section::CrossReferences,
                Severity::Error,
                format!("hallucination {} has no citation entry in the brief", cid),
            ),
            Some(paras) => report.push(
                Section::CrossReferences,
                Severity::Ok,
                format!("{} exists in brief ({} occurrence(s))", cid, paras.len()),
            ),
        }
    }
    for cid in primaries.keys() {
        if !catalog.entries.contains_key(cid) {
            report.push(
                Section::CrossReferences,
                Severity::Warn,
                format!("{} is in brief but has no hallucination options", cid),
            );
        }
    }

    check_option_ids(catalog, &mut report);

    info(
        Domain::Validate,
        "validated",
        obj(&[
            ("brief_id", v_str(&report.brief_id)),
            ("errors", v_num(report.errors() as f64)),
            ("warnings", v_num(report.warnings() as f64)),
            ("citations", v_num(report.citations_validated as f64)),
        ]),
    );
    report
}

fn check_offsets(document: &Document, report: &mut ValidationReport) {
    for (para, span) in document.spans() {
        report.citations_validated += 1;
        match para.span_text(span) {
            Some(actual) if actual == span.display_text => {
                let tag = if span.supra { " (supra)" } else { "" };
                report.push(
                    Section::CitationOffsets,
                    Severity::Ok,
                    format!("[{}] {}{}: offsets correct", para.id, span.citation_id, tag),
                );
            }
            actual => report.push(
                Section::CitationOffsets,
                Severity::Error,
                format!(
                    "[{}] {}: offset mismatch\n         expected: {:?}\n         actual:   {:?}",
                    para.id,
                    span.citation_id,
                    span.display_text,
                    actual.unwrap_or("<out of range>")
                ),
            ),
        }
    }
}

fn check_supra(
    document: &Document,
    primaries: &BTreeMap<String, Vec<String>>,
    report: &mut ValidationReport,
) {
    for para in &document.paragraphs {
        for m in supra_pattern().find_iter(&para.text) {
            let at = offsets::byte_to_char(&para.text, m.start());
            let covering = para
                .citations
                .iter()
                .find(|c| c.supra && c.start <= at && at < c.end);
            match covering {
                None => report.push(
                    Section::SupraReferences,
                    Severity::Warn,
                    format!("[{}] supra reference in text but no citation entry: {:?}", para.id, m.as_str()),
                ),
                Some(c) if !primaries.contains_key(&c.citation_id) => report.push(
                    Section::SupraReferences,
                    Severity::Error,
                    format!("[{}] supra {} has no primary citation anywhere in brief", para.id, c.citation_id),
                ),
                Some(c) => report.push(
                    Section::SupraReferences,
                    Severity::Ok,
                    format!("[{}] supra detected and captured: {:?} -> {}", para.id, m.as_str(), c.citation_id),
                ),
            }
        }
    }
}

fn check_option_ids(catalog: &Catalog, report: &mut ValidationReport) {
    for (cid, entry) in &catalog.entries {
        for name in &entry.unknown_types {
            report.push(
                Section::OptionNaming,
                Severity::Warn,
                format!("{}: unknown hallucination type '{}' (options ignored)", cid, name),
            );
        }
        let number = cid.strip_prefix("cite_").unwrap_or(cid);
        for (kind, opts) in &entry.options {
            for opt in opts {
                let msg = if !option_id_pattern().is_match(&opt.id) {
                    format!("{}: does not match naming convention cite_NN_<type>_N", opt.id)
                } else if !opt.id.contains(&format!("_{}_", kind.abbrev())) {
                    format!("{}: type abbrev mismatch (expected '{}' for {})", opt.id, kind.abbrev(), kind)
                } else if !opt.id.starts_with(&format!("cite_{}_", number)) {
                    format!("{}: citation number mismatch (under {})", opt.id, cid)
                } else {
                    continue;
                };
                report.push(Section::OptionNaming, Severity::Warn, msg);
            }
        }
    }
    report.push(Section::OptionNaming, Severity::Ok, "naming convention check complete".to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brief::fixtures::{document, para, span};
    use crate::catalog::fixtures::{passage, reference, with_option};
    use crate::catalog::HallucinationType::*;

    fn clean() -> (Document, Catalog) {
        let mut doc = document(vec![
            para("p1", "See Smith v. Jones, 1 U.S. 1 (1990), holding that bail is required.", &[("cite_01", "Smith v. Jones, 1 U.S. 1 (1990)")]),
            para("p2", "As in Smith, supra, the court agreed.", &[]),
        ]);
        let mut supra = span("As in Smith, supra, the court agreed.", "cite_01", "Smith, supra");
        supra.supra = true;
        doc.paragraphs[1].citations.push(supra);

        let mut catalog = Catalog::default();
        with_option(&mut catalog, "cite_01", FabricatedCase, reference("cite_01_fab_1", "X v. Y, 1 F.3d 1 (2020)"));
        with_option(&mut catalog, "cite_01", Misquotation, passage("cite_01_mq_1", "bail is required", "bail is optional"));
        (doc, catalog)
    }

    #[test]
    fn test_clean_brief_passes() {
        let (doc, catalog) = clean();
        let report = validate(&doc, &catalog);
        assert_eq!(report.errors(), 0, "{:?}", report.findings);
        assert_eq!(report.warnings(), 0, "{:?}", report.findings);
        assert_eq!(report.citations_validated, 2);
        assert!(report.passed());
    }

    #[test]
    fn test_offset_mismatch_is_error() {
        let (mut doc, catalog) = clean();
        doc.paragraphs[0].citations[0].start += 1;
        let report = validate(&doc, &catalog);
        assert_eq!(report.in_section(Section::CitationOffsets).filter(|f| f.severity == Severity::Error).count(), 1);
        assert!(!report.passed());
    }

    #[test]
    fn test_uncovered_supra_warns() {
        let (mut doc, catalog) = clean();
        doc.paragraphs[1].citations.clear();
        let report = validate(&doc, &catalog);
        assert_eq!(report.warnings(), 1);
        assert!(report.passed());
    }

    #[test]
    fn test_orphan_supra_is_error() {
        let (mut doc, mut catalog) = clean();
        doc.paragraphs[1].citations[0].citation_id = "cite_09".to_string();
        catalog.entries.remove("cite_09");
        let report = validate(&doc, &catalog);
        assert!(report
            .in_section(Section::SupraReferences)
            .any(|f| f.severity == Severity::Error && f.message.contains("cite_09")));
    }

    #[test]
    fn test_unreachable_targets() {
        let (doc, mut catalog) = clean();
        with_option(&mut catalog, "cite_01", Misquotation, passage("cite_01_mq_2", "not in the brief", "x"));
        with_option(&mut catalog, "cite_02", FabricatedCase, reference("cite_02_fab_1", "A v. B"));
        let report = validate(&doc, &catalog);
        let errors: Vec<&Finding> = report.findings.iter().filter(|f| f.severity == Severity::Error).collect();
        // missing passage, reference without primary, catalog entry without span
        assert_eq!(errors.len(), 3, "{:?}", errors);
    }

    #[test]
    fn test_primary_without_catalog_warns() {
        let (doc, mut catalog) = clean();
        catalog.entries.clear();
        let report = validate(&doc, &catalog);
        assert!(report.passed());
        assert!(report
            .in_section(Section::CrossReferences)
            .any(|f| f.severity == Severity::Warn && f.message.starts_with("cite_01")));
    }

    #[test]
    fn test_option_naming() {
        let (doc, mut catalog) = clean();
        with_option(&mut catalog, "cite_01", WrongCitation, reference("cite_01_fab_9", "A v. B"));
        with_option(&mut catalog, "cite_01", WrongCitation, reference("cite_02_wc_1", "A v. B"));
        with_option(&mut catalog, "cite_01", WrongCitation, reference("wrong-name", "A v. B"));
        let report = validate(&doc, &catalog);
        let warns: Vec<&str> = report
            .in_section(Section::OptionNaming)
            .filter(|f| f.severity == Severity::Warn)
            .map(|f| f.message.as_str())
            .collect();
        assert_eq!(warns.len(), 3);
        assert!(warns[0].contains("type abbrev mismatch"));
        assert!(warns[1].contains("citation number mismatch"));
        assert!(warns[2].contains("naming convention"));
    }

    #[test]
    fn test_unknown_type_group_warns() {
        let (doc, mut catalog) = clean();
        if let Some(entry) = catalog.entries.get_mut("cite_01") {
            entry.unknown_types.push("invented_quote".to_string());
        }
        let report = validate(&doc, &catalog);
        assert!(report.passed());
        assert!(report
            .in_section(Section::OptionNaming)
            .any(|f| f.severity == Severity::Warn && f.message.contains("unknown hallucination type 'invented_quote'")));
    }

    #[test]
    fn test_render_plain_summary() {
        let (doc, catalog) = clean();
        let text = validate(&doc, &catalog).render(false);
        assert!(text.contains("=== Validating brief_test ==="));
        assert!(text.contains("--- Supra reference detection ---"));
        assert!(text.contains("0 error(s), 0 warning(s), 2 citations validated"));
        assert!(text.contains("PASSED"));
        assert!(!text.contains('\x1b'));
    }
}
