// src/models/core.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CodingError;

/// Section values the note extractor writes when a section was not covered
/// in the encounter. Compared case-insensitively.
pub const ABSENT_SECTION_MARKERS: [&str; 2] = ["not documented", "not mentioned"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VocabularyType {
    Diagnosis,
    Procedure,
    Concept,
}

impl VocabularyType {
    pub const ALL: [VocabularyType; 3] = [
        VocabularyType::Diagnosis,
        VocabularyType::Procedure,
        VocabularyType::Concept,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VocabularyType::Diagnosis => "diagnosis",
            VocabularyType::Procedure => "procedure",
            VocabularyType::Concept => "concept",
        }
    }

    /// Name of the reference system backing this vocabulary.
    pub fn system_name(&self) -> &'static str {
        match self {
            VocabularyType::Diagnosis => "ICD",
            VocabularyType::Procedure => "CPT",
            VocabularyType::Concept => "SNOMED",
        }
    }

    /// Provenance tag written on matches and assignments.
    pub fn provenance_tag(&self) -> &'static str {
        match self {
            VocabularyType::Diagnosis => "diagnosis",
            VocabularyType::Procedure => "procedure",
            VocabularyType::Concept => "clinical_concept",
        }
    }
}

impl fmt::Display for VocabularyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VocabularyType {
    type Err = CodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "diagnosis" | "icd" | "icd10" | "icd-10" => Ok(VocabularyType::Diagnosis),
            "procedure" | "cpt" => Ok(VocabularyType::Procedure),
            "concept" | "snomed" | "snomed-ct" | "clinical_concept" => Ok(VocabularyType::Concept),
            other => Err(CodingError::Parse {
                field: "vocabulary type",
                value: other.to_string(),
            }),
        }
    }
}

/// Internal identifier of a reference entry, stable for the lifetime of a
/// loaded store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub i64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One reference code. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub internal_id: EntryId,
    pub code: String,
    /// Lower-cased, whitespace-collapsed description used for matching.
    pub primary_text: String,
    pub display_text: String,
    /// Second matchable description (the SNOMED preferred term), normalized
    /// like `primary_text`.
    pub alternate_text: Option<String>,
    pub category: Option<String>,
    pub section: Option<String>,
}

impl VocabularyEntry {
    /// Every normalized text this entry can be matched on.
    pub fn match_texts(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_text.as_str()).chain(self.alternate_text.as_deref())
    }
}

pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteSection {
    ChiefComplaint,
    HistoryPresentIllness,
    PastMedicalHistory,
    Medications,
    Allergies,
    SocialHistory,
    FamilyHistory,
    VitalSigns,
    PhysicalExam,
    Assessment,
    Plan,
}

impl NoteSection {
    pub const ALL: [NoteSection; 11] = [
        NoteSection::ChiefComplaint,
        NoteSection::HistoryPresentIllness,
        NoteSection::PastMedicalHistory,
        NoteSection::Medications,
        NoteSection::Allergies,
        NoteSection::SocialHistory,
        NoteSection::FamilyHistory,
        NoteSection::VitalSigns,
        NoteSection::PhysicalExam,
        NoteSection::Assessment,
        NoteSection::Plan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NoteSection::ChiefComplaint => "chief_complaint",
            NoteSection::HistoryPresentIllness => "history_present_illness",
            NoteSection::PastMedicalHistory => "past_medical_history",
            NoteSection::Medications => "medications",
            NoteSection::Allergies => "allergies",
            NoteSection::SocialHistory => "social_history",
            NoteSection::FamilyHistory => "family_history",
            NoteSection::VitalSigns => "vital_signs",
            NoteSection::PhysicalExam => "physical_exam",
            NoteSection::Assessment => "assessment",
            NoteSection::Plan => "plan",
        }
    }
}

impl fmt::Display for NoteSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteSection {
    type Err = CodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        NoteSection::ALL
            .iter()
            .copied()
            .find(|section| section.as_str() == wanted)
            .ok_or(CodingError::Parse {
                field: "note section",
                value: s.to_string(),
            })
    }
}

pub fn is_absent_marker(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty()
        || ABSENT_SECTION_MARKERS
            .iter()
            .any(|marker| trimmed.eq_ignore_ascii_case(marker))
}

/// A structured clinical note: section name to free text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "HashMap<String, Option<String>>",
    into = "BTreeMap<String, String>"
)]
pub struct ClinicalNote {
    sections: BTreeMap<NoteSection, String>,
}

impl ClinicalNote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_section(mut self, section: NoteSection, text: impl Into<String>) -> Self {
        self.sections.insert(section, text.into());
        self
    }

    pub fn insert(&mut self, section: NoteSection, text: impl Into<String>) {
        self.sections.insert(section, text.into());
    }

    /// Raw section value, absent markers included.
    pub fn raw(&self, section: NoteSection) -> Option<&str> {
        self.sections.get(&section).map(String::as_str)
    }

    /// Section text when it carries content; blank values and absent markers
    /// read as `None`.
    pub fn text(&self, section: NoteSection) -> Option<&str> {
        self.raw(section).filter(|text| !is_absent_marker(text))
    }

    pub fn is_empty(&self) -> bool {
        NoteSection::ALL.iter().all(|s| self.text(*s).is_none())
    }
}

impl From<HashMap<String, Option<String>>> for ClinicalNote {
    fn from(raw: HashMap<String, Option<String>>) -> Self {
        let mut note = ClinicalNote::new();
        for (key, value) in raw {
            match (key.parse::<NoteSection>(), value) {
                (Ok(section), Some(text)) => note.insert(section, text),
                (Ok(_), None) => {}
                (Err(_), _) => log::debug!("Ignoring unknown note section '{}'", key),
            }
        }
        note
    }
}

impl From<ClinicalNote> for BTreeMap<String, String> {
    fn from(note: ClinicalNote) -> Self {
        note.sections
            .into_iter()
            .map(|(section, text)| (section.as_str().to_string(), text))
            .collect()
    }
}

/// A candidate term and the note section it was first found in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtractedTerm {
    pub text: String,
    pub section: NoteSection,
}

impl ExtractedTerm {
    pub fn new(text: impl Into<String>, section: NoteSection) -> Self {
        Self {
            text: text.into(),
            section,
        }
    }
}

/// An admitted match between an extracted term and a reference entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeMatch {
    pub vocabulary_type: VocabularyType,
    pub internal_id: EntryId,
    pub code: String,
    pub display_text: String,
    /// In [0, 1].
    pub confidence: f64,
    pub matched_text: String,
    /// Provenance tag ("diagnosis", "procedure", "clinical_concept").
    pub section: String,
    pub source_section: Option<NoteSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteCodes {
    pub diagnosis: Vec<CodeMatch>,
    pub procedure: Vec<CodeMatch>,
    pub concept: Vec<CodeMatch>,
}

impl NoteCodes {
    pub fn get(&self, vocabulary: VocabularyType) -> &[CodeMatch] {
        match vocabulary {
            VocabularyType::Diagnosis => &self.diagnosis,
            VocabularyType::Procedure => &self.procedure,
            VocabularyType::Concept => &self.concept,
        }
    }

    pub fn set(&mut self, vocabulary: VocabularyType, matches: Vec<CodeMatch>) {
        match vocabulary {
            VocabularyType::Diagnosis => self.diagnosis = matches,
            VocabularyType::Procedure => self.procedure = matches,
            VocabularyType::Concept => self.concept = matches,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CodeMatch> {
        self.diagnosis
            .iter()
            .chain(self.procedure.iter())
            .chain(self.concept.iter())
    }

    pub fn total(&self) -> usize {
        self.diagnosis.len() + self.procedure.len() + self.concept.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignedBy {
    Automatic,
    Manual,
}

impl AssignedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignedBy::Automatic => "auto",
            AssignedBy::Manual => "manual",
        }
    }
}

impl FromStr for AssignedBy {
    type Err = CodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" | "automatic" => Ok(AssignedBy::Automatic),
            "manual" => Ok(AssignedBy::Manual),
            other => Err(CodingError::Parse {
                field: "assigned_by",
                value: other.to_string(),
            }),
        }
    }
}

/// Persisted form of a `CodeMatch`, owned by a clinical note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeAssignment {
    pub id: Uuid,
    pub note_id: String,
    pub vocabulary_type: VocabularyType,
    pub internal_id: EntryId,
    pub code: String,
    pub confidence: f64,
    pub matched_text: String,
    pub section: String,
    pub assigned_by: AssignedBy,
    pub created_at: DateTime<Utc>,
}

impl CodeAssignment {
    pub fn automatic(note_id: &str, code_match: &CodeMatch, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            note_id: note_id.to_string(),
            vocabulary_type: code_match.vocabulary_type,
            internal_id: code_match.internal_id,
            code: code_match.code.clone(),
            confidence: code_match.confidence,
            matched_text: code_match.matched_text.clone(),
            section: code_match.section.clone(),
            assigned_by: AssignedBy::Automatic,
            created_at,
        }
    }
}

/// Which vocabularies an ad hoc search covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    All,
    Only(VocabularyType),
}

impl SearchScope {
    pub fn includes(&self, vocabulary: VocabularyType) -> bool {
        match self {
            SearchScope::All => true,
            SearchScope::Only(only) => *only == vocabulary,
        }
    }
}

impl FromStr for SearchScope {
    type Err = CodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(SearchScope::All);
        }
        s.parse::<VocabularyType>().map(SearchScope::Only)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub vocabulary_type: VocabularyType,
    pub internal_id: EntryId,
    pub code: String,
    pub display_text: String,
    pub alternate_text: Option<String>,
    /// Partial-ratio score, 0-100.
    pub score: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_markers_are_case_insensitive() {
        assert!(is_absent_marker("Not Documented"));
        assert!(is_absent_marker("  not mentioned "));
        assert!(is_absent_marker(""));
        assert!(!is_absent_marker("not documented until today"));
    }

    #[test]
    fn test_note_deserializes_known_sections_only() {
        let json = r#"{
            "chief_complaint": "Chest pain",
            "plan": null,
            "transcript_id": "abc",
            "assessment": "NOT MENTIONED"
        }"#;
        let note: ClinicalNote = serde_json::from_str(json).unwrap();
        assert_eq!(note.text(NoteSection::ChiefComplaint), Some("Chest pain"));
        assert_eq!(note.raw(NoteSection::Plan), None);
        assert_eq!(note.raw(NoteSection::Assessment), Some("NOT MENTIONED"));
        assert_eq!(note.text(NoteSection::Assessment), None);
    }

    #[test]
    fn test_note_serializes_as_section_map() {
        let note = ClinicalNote::new().with_section(NoteSection::Plan, "Follow up");
        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["plan"], "Follow up");
    }

    #[test]
    fn test_vocabulary_type_aliases() {
        assert_eq!("icd".parse::<VocabularyType>().unwrap(), VocabularyType::Diagnosis);
        assert_eq!("CPT".parse::<VocabularyType>().unwrap(), VocabularyType::Procedure);
        assert_eq!("snomed".parse::<VocabularyType>().unwrap(), VocabularyType::Concept);
        assert!("loinc".parse::<VocabularyType>().is_err());
        assert_eq!("all".parse::<SearchScope>().unwrap(), SearchScope::All);
    }

    #[test]
    fn test_concept_entry_matches_both_texts() {
        let entry = VocabularyEntry {
            internal_id: EntryId(7),
            code: "38341003".to_string(),
            primary_text: "hypertensive disorder, systemic arterial (disorder)".to_string(),
            display_text: "Hypertensive disorder".to_string(),
            alternate_text: Some("hypertensive disorder".to_string()),
            category: Some("disorder".to_string()),
            section: None,
        };
        let texts: Vec<&str> = entry.match_texts().collect();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[1], "hypertensive disorder");
    }
}
