// src/models/stats_models.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::core::VocabularyType;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VocabularyTableStats {
    pub entries: usize,
    /// Distinct category values (ICD category, CPT category, SNOMED semantic tag).
    pub categories: Vec<String>,
    /// Distinct section values (ICD chapter, CPT section).
    pub sections: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VocabularyStats {
    pub generation: u64,
    pub tables: BTreeMap<VocabularyType, VocabularyTableStats>,
}

impl VocabularyStats {
    pub fn total_entries(&self) -> usize {
        self.tables.values().map(|t| t.entries).sum()
    }
}

/// Per-vocabulary numbers from one `code_note` call.
#[derive(Debug, Clone, Default)]
pub struct VocabularyMatchStats {
    pub terms_offered: usize,
    pub terms_admitted: usize,
    pub candidates_scored: usize,
    pub matches: usize,
    pub cache_hits: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CodingRunStats {
    pub note_id: String,
    pub diagnostic_terms: usize,
    pub procedure_terms: usize,
    pub per_vocabulary: BTreeMap<VocabularyType, VocabularyMatchStats>,
    pub assignments_stored: Option<usize>,
    pub duration: Duration,
}

impl CodingRunStats {
    pub fn total_matches(&self) -> usize {
        self.per_vocabulary.values().map(|s| s.matches).sum()
    }
}
