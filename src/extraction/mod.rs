// src/extraction/mod.rs
//! Heuristic term extraction from structured clinical notes.

pub mod dictionaries;
pub mod rules;

use std::collections::{BTreeMap, BTreeSet};

use crate::models::core::{normalize_text, ClinicalNote, ExtractedTerm, NoteSection};
use dictionaries::{COMMON_CONDITIONS, PLAN_DEFAULT_TERMS, PROCEDURE_KEYWORDS, PROCEDURE_PHRASES};
use rules::{
    ExtractionRule, PhraseDictionaryRule, RegexCaptureRule, SentenceHeuristicRule,
    SuffixPatternRule,
};

pub const DIAGNOSTIC_SECTIONS: [NoteSection; 4] = [
    NoteSection::ChiefComplaint,
    NoteSection::HistoryPresentIllness,
    NoteSection::Assessment,
    NoteSection::PastMedicalHistory,
];

pub const PROCEDURE_SECTIONS: [NoteSection; 4] = [
    NoteSection::Plan,
    NoteSection::PhysicalExam,
    NoteSection::Assessment,
    NoteSection::HistoryPresentIllness,
];

/// Shortest term (in characters) the extractor emits is one longer than this.
const MIN_TERM_CHARS: usize = 2;

/// Ordered rule lists for diagnostic and procedure terms. Stateless and
/// deterministic: the same note always yields the same term sets.
pub struct TermExtractor {
    diagnostic_rules: Vec<Box<dyn ExtractionRule>>,
    procedure_rules: Vec<Box<dyn ExtractionRule>>,
    plan_defaults: Vec<String>,
}

impl Default for TermExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TermExtractor {
    pub fn new() -> Self {
        Self {
            diagnostic_rules: vec![
                Box::new(SuffixPatternRule::diagnostic()),
                Box::new(PhraseDictionaryRule::new("common_conditions", COMMON_CONDITIONS)),
                Box::new(SentenceHeuristicRule::diagnostic()),
            ],
            procedure_rules: vec![
                Box::new(PhraseDictionaryRule::new("procedure_keywords", PROCEDURE_KEYWORDS)),
                Box::new(PhraseDictionaryRule::new("procedure_phrases", PROCEDURE_PHRASES)),
                Box::new(RegexCaptureRule::procedure()),
            ],
            plan_defaults: PLAN_DEFAULT_TERMS.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Extractor with no rules; add them with `with_*_rule`.
    pub fn empty() -> Self {
        Self {
            diagnostic_rules: Vec::new(),
            procedure_rules: Vec::new(),
            plan_defaults: Vec::new(),
        }
    }

    pub fn with_diagnostic_rule(mut self, rule: Box<dyn ExtractionRule>) -> Self {
        self.diagnostic_rules.push(rule);
        self
    }

    pub fn with_procedure_rule(mut self, rule: Box<dyn ExtractionRule>) -> Self {
        self.procedure_rules.push(rule);
        self
    }

    pub fn with_plan_defaults(mut self, defaults: &[&str]) -> Self {
        self.plan_defaults = defaults.iter().map(|t| normalize_text(t)).collect();
        self
    }

    pub fn extract_diagnostic_terms(&self, note: &ClinicalNote) -> BTreeSet<String> {
        self.extract_diagnostic(note).into_iter().map(|t| t.text).collect()
    }

    pub fn extract_procedure_terms(&self, note: &ClinicalNote) -> BTreeSet<String> {
        self.extract_procedure(note).into_iter().map(|t| t.text).collect()
    }

    /// Diagnostic terms with the first section each was found in, sorted by
    /// term.
    pub fn extract_diagnostic(&self, note: &ClinicalNote) -> Vec<ExtractedTerm> {
        let mut found = BTreeMap::new();
        for section in DIAGNOSTIC_SECTIONS {
            if let Some(text) = note.text(section) {
                apply_rules(&self.diagnostic_rules, section, text, &mut found);
            }
        }
        into_terms(found)
    }

    pub fn extract_procedure(&self, note: &ClinicalNote) -> Vec<ExtractedTerm> {
        let mut found = BTreeMap::new();
        for section in PROCEDURE_SECTIONS {
            if let Some(text) = note.text(section) {
                apply_rules(&self.procedure_rules, section, text, &mut found);
            }
        }
        if note.text(NoteSection::Plan).is_some() {
            for term in &self.plan_defaults {
                found.entry(term.clone()).or_insert(NoteSection::Plan);
            }
        }
        into_terms(found)
    }
}

fn apply_rules(
    rules: &[Box<dyn ExtractionRule>],
    section: NoteSection,
    text: &str,
    found: &mut BTreeMap<String, NoteSection>,
) {
    let text = normalize_text(text);
    let mut raw = Vec::new();
    for rule in rules {
        rule.extract(&text, &mut raw);
    }
    for candidate in raw {
        let term = normalize_text(&candidate);
        if term.chars().count() > MIN_TERM_CHARS {
            found.entry(term).or_insert(section);
        }
    }
}

fn into_terms(found: BTreeMap<String, NoteSection>) -> Vec<ExtractedTerm> {
    found
        .into_iter()
        .map(|(text, section)| ExtractedTerm::new(text, section))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hypertension_note() -> ClinicalNote {
        ClinicalNote::new()
            .with_section(
                NoteSection::ChiefComplaint,
                "Patient reports hypertension and headache",
            )
            .with_section(NoteSection::Assessment, "Hypertension, poorly controlled")
    }

    #[test]
    fn test_diagnostic_terms_from_conditions() {
        let extractor = TermExtractor::new();
        let terms = extractor.extract_diagnostic_terms(&hypertension_note());
        assert!(terms.contains("hypertension"));
        assert!(terms.contains("headache"));

        let tagged = extractor.extract_diagnostic(&hypertension_note());
        let hypertension = tagged.iter().find(|t| t.text == "hypertension").unwrap();
        assert_eq!(hypertension.section, NoteSection::ChiefComplaint);
    }

    #[test]
    fn test_plan_terms_include_defaults_and_ekg() {
        let note = ClinicalNote::new()
            .with_section(NoteSection::Plan, "Follow up in 2 weeks, will order EKG");
        let terms = TermExtractor::new().extract_procedure_terms(&note);
        for expected in [
            "office visit",
            "evaluation and management",
            "follow-up visit",
            "ekg",
            "follow up",
        ] {
            assert!(terms.contains(expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_absent_sections_contribute_nothing() {
        let mut note = ClinicalNote::new();
        for (i, section) in NoteSection::ALL.iter().enumerate() {
            let marker = if i % 2 == 0 { "Not documented" } else { "NOT MENTIONED" };
            note.insert(*section, marker);
        }
        let extractor = TermExtractor::new();
        assert!(extractor.extract_diagnostic_terms(&note).is_empty());
        // No plan defaults either: the plan section is absent.
        assert!(extractor.extract_procedure_terms(&note).is_empty());
    }

    #[test]
    fn test_sections_outside_scope_are_ignored() {
        let note = ClinicalNote::new()
            .with_section(NoteSection::Medications, "lisinopril for hypertension")
            .with_section(NoteSection::FamilyHistory, "father had bronchitis");
        let extractor = TermExtractor::new();
        assert!(extractor.extract_diagnostic_terms(&note).is_empty());
        assert!(extractor.extract_procedure_terms(&note).is_empty());
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let note = hypertension_note()
            .with_section(
                NoteSection::HistoryPresentIllness,
                "Chest pain with exertion. Mild gastritis.",
            )
            .with_section(NoteSection::Plan, "Order lipid panel and ECG");
        let extractor = TermExtractor::new();
        let first = (
            extractor.extract_diagnostic_terms(&note),
            extractor.extract_procedure_terms(&note),
        );
        for _ in 0..3 {
            assert_eq!(
                first,
                (
                    extractor.extract_diagnostic_terms(&note),
                    extractor.extract_procedure_terms(&note)
                )
            );
        }
        assert!(first.0.contains("gastritis"));
        assert!(first.0.contains("chest pain with exertion"));
    }

    #[test]
    fn test_custom_rules_plug_in() {
        let extractor = TermExtractor::empty()
            .with_diagnostic_rule(Box::new(SuffixPatternRule::new(&["oma"]).unwrap()));
        let note =
            ClinicalNote::new().with_section(NoteSection::PastMedicalHistory, "Resected melanoma");
        let terms = extractor.extract_diagnostic_terms(&note);
        assert_eq!(terms.into_iter().collect::<Vec<_>>(), vec!["melanoma".to_string()]);
    }
}
