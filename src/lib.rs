// src/lib.rs
//! Medical code matching: extracts candidate clinical terms from structured
//! notes, scores them against ICD-10, CPT and SNOMED-CT reference vocabularies
//! and persists the confident matches as automatic code assignments.

pub mod error;
pub mod extraction;
pub mod matching;
pub mod models;
pub mod persistence;
pub mod utils;
pub mod vocabulary;

pub use error::CodingError;
pub use extraction::TermExtractor;
pub use matching::engine::{CodeMatchingEngine, CodingReport, PersistenceOutcome};
pub use matching::policy::{MatchingPolicy, PolicyConfig, PolicySet, PolicyVariant};
pub use matching::similarity::{SimilarityScorer, SimilarityStrategy};
pub use models::core::{
    AssignedBy, ClinicalNote, CodeAssignment, CodeMatch, EntryId, ExtractedTerm, NoteCodes,
    NoteSection, SearchHit, SearchScope, VocabularyEntry, VocabularyType,
};
pub use vocabulary::store::{LoadOptions, VocabularyStore};
