// src/vocabulary/focus.rs
//! Common-code selection used when only a focused subset of each vocabulary
//! is kept in memory.

use std::collections::HashSet;

use super::source::VocabularyRow;
use crate::models::core::VocabularyType;

const DIAGNOSIS_FOCUS: &[&str] = &[
    "hypertension",
    "diabetes",
    "chest pain",
    "depression",
    "anxiety",
    "back pain",
    "headache",
    "upper respiratory",
    "pneumonia",
    "bronchitis",
    "gastroesophageal reflux",
    "arthritis",
    "asthma",
    "copd",
    "heart failure",
    "atrial fibrillation",
    "migraine",
    "obesity",
    "hyperlipidemia",
];

const PROCEDURE_FOCUS: &[&str] = &[
    "office visit",
    "evaluation and management",
    "consultation",
    "examination",
    "preventive",
    "immunization",
    "injection",
    "blood pressure",
    "diabetes",
    "follow-up",
    "counseling",
];

const CONCEPT_FOCUS: &[&str] = &[
    "hypertension",
    "diabetes",
    "pain",
    "examination",
    "blood pressure",
    "medication",
    "treatment",
    "diagnosis",
    "assessment",
    "disorder",
];

/// Office and preventive evaluation-and-management codes that are kept in
/// the procedure table whatever the focus patterns select.
pub const ESSENTIAL_PROCEDURE_CODES: &[&str] =
    &["99213", "99214", "99215", "99212", "99211", "99395", "99396"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusPatterns {
    diagnosis: Vec<String>,
    procedure: Vec<String>,
    concept: Vec<String>,
    essential_procedure_codes: Vec<String>,
}

impl FocusPatterns {
    /// Curated primary-care phrases plus the essential E&M codes.
    pub fn common() -> Self {
        let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            diagnosis: owned(DIAGNOSIS_FOCUS),
            procedure: owned(PROCEDURE_FOCUS),
            concept: owned(CONCEPT_FOCUS),
            essential_procedure_codes: owned(ESSENTIAL_PROCEDURE_CODES),
        }
    }

    pub fn new(
        diagnosis: Vec<String>,
        procedure: Vec<String>,
        concept: Vec<String>,
        essential_procedure_codes: Vec<String>,
    ) -> Self {
        let lower = |v: Vec<String>| v.into_iter().map(|p| p.to_lowercase()).collect();
        Self {
            diagnosis: lower(diagnosis),
            procedure: lower(procedure),
            concept: lower(concept),
            essential_procedure_codes,
        }
    }

    pub fn patterns(&self, vocabulary: VocabularyType) -> &[String] {
        match vocabulary {
            VocabularyType::Diagnosis => &self.diagnosis,
            VocabularyType::Procedure => &self.procedure,
            VocabularyType::Concept => &self.concept,
        }
    }

    pub fn essential_codes(&self, vocabulary: VocabularyType) -> &[String] {
        match vocabulary {
            VocabularyType::Procedure => &self.essential_procedure_codes,
            _ => &[],
        }
    }

    fn matches(&self, vocabulary: VocabularyType, row: &VocabularyRow) -> bool {
        let description = row.description.to_lowercase();
        let alternate = row.alternate.as_deref().map(str::to_lowercase);
        self.patterns(vocabulary).iter().any(|pattern| {
            description.contains(pattern.as_str())
                || alternate
                    .as_deref()
                    .map_or(false, |alt| alt.contains(pattern.as_str()))
        })
    }
}

/// Orders rows deterministically (code, then id).
pub fn sort_rows(rows: &mut [VocabularyRow]) {
    rows.sort_by(|a, b| a.code.cmp(&b.code).then(a.id.cmp(&b.id)));
}

/// Restricts `rows` to the focused subset of one vocabulary.
///
/// Essential codes come first and are never dropped. Pattern matches fill up
/// to `limit`; when fewer than `min_size` rows were selected the remainder is
/// topped up in code order (still bounded by `limit`). The result keeps code
/// order.
pub fn select_focused(
    vocabulary: VocabularyType,
    mut rows: Vec<VocabularyRow>,
    focus: &FocusPatterns,
    limit: Option<usize>,
    min_size: usize,
) -> Vec<VocabularyRow> {
    sort_rows(&mut rows);
    let limit = limit.unwrap_or(usize::MAX);
    let essential: HashSet<&str> = focus
        .essential_codes(vocabulary)
        .iter()
        .map(String::as_str)
        .collect();

    let mut keep = vec![false; rows.len()];
    let mut selected = 0usize;

    for (i, row) in rows.iter().enumerate() {
        if essential.contains(row.code.as_str()) {
            keep[i] = true;
            selected += 1;
        }
    }
    for (i, row) in rows.iter().enumerate() {
        if selected >= limit {
            break;
        }
        if !keep[i] && focus.matches(vocabulary, row) {
            keep[i] = true;
            selected += 1;
        }
    }
    let floor = min_size.min(limit);
    for flag in keep.iter_mut() {
        if selected >= floor {
            break;
        }
        if !*flag {
            *flag = true;
            selected += 1;
        }
    }

    rows.into_iter()
        .zip(keep)
        .filter_map(|(row, kept)| kept.then_some(row))
        .collect()
}

/// Without focus patterns: the first `limit` rows in code order.
pub fn select_first(mut rows: Vec<VocabularyRow>, limit: Option<usize>) -> Vec<VocabularyRow> {
    sort_rows(&mut rows);
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn procedure_rows() -> Vec<VocabularyRow> {
        vec![
            VocabularyRow::new(1, "99213", "Office or other outpatient visit, established patient"),
            VocabularyRow::new(2, "10060", "Incision and drainage of abscess"),
            VocabularyRow::new(3, "93000", "Electrocardiogram, routine ECG with interpretation"),
            VocabularyRow::new(4, "90471", "Immunization administration"),
            VocabularyRow::new(5, "20610", "Arthrocentesis, major joint"),
            VocabularyRow::new(6, "99395", "Periodic comprehensive preventive medicine"),
        ]
    }

    #[test]
    fn test_essential_codes_always_kept() {
        let focus = FocusPatterns::common();
        let selected =
            select_focused(VocabularyType::Procedure, procedure_rows(), &focus, Some(1), 0);
        let codes: Vec<&str> = selected.iter().map(|r| r.code.as_str()).collect();
        // Both essential codes survive even though the limit is 1.
        assert_eq!(codes, vec!["99213", "99395"]);
    }

    #[test]
    fn test_pattern_selection_and_top_up() {
        let focus = FocusPatterns::common();
        let selected =
            select_focused(VocabularyType::Procedure, procedure_rows(), &focus, None, 0);
        let codes: Vec<&str> = selected.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["90471", "99213", "99395"]);

        let topped = select_focused(VocabularyType::Procedure, procedure_rows(), &focus, None, 5);
        let codes: Vec<&str> = topped.iter().map(|r| r.code.as_str()).collect();
        // Top-up draws the lowest unselected codes first.
        assert_eq!(codes, vec!["10060", "20610", "90471", "99213", "99395"]);
    }

    #[test]
    fn test_concept_alternate_text_matches() {
        let focus = FocusPatterns::common();
        let rows = vec![
            VocabularyRow::new(1, "38341003", "Hypertensive disorder, systemic arterial (disorder)")
                .with_alternate("Hypertension"),
            VocabularyRow::new(2, "1000001", "Unrelated finding (finding)"),
        ];
        let selected = select_focused(VocabularyType::Concept, rows, &focus, None, 0);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].code, "38341003");
    }

    #[test]
    fn test_select_first_is_code_ordered() {
        let rows = select_first(procedure_rows(), Some(2));
        let codes: Vec<&str> = rows.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["10060", "20610"]);
    }
}
