// src/vocabulary/source.rs
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::CodingError;
use crate::models::core::VocabularyType;

/// One raw reference row as delivered by a source, before normalization.
///
/// Column mapping per vocabulary:
/// - diagnosis: `code`, `description`, `category`, `section` (chapter)
/// - procedure: `code`, `description`, `category`, `section`
/// - concept: `code` (concept id), `description` (fully specified name),
///   `alternate` (preferred term), `category` (semantic tag)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VocabularyRow {
    #[serde(default)]
    pub id: Option<i64>,
    pub code: String,
    pub description: String,
    #[serde(default)]
    pub alternate: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
}

impl VocabularyRow {
    pub fn new(id: i64, code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            code: code.into(),
            description: description.into(),
            alternate: None,
            category: None,
            section: None,
        }
    }

    pub fn with_alternate(mut self, alternate: impl Into<String>) -> Self {
        self.alternate = Some(alternate.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }
}

/// Bulk read access to the reference vocabularies. Only used at load time.
#[async_trait]
pub trait VocabularySource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, vocabulary: VocabularyType) -> Result<Vec<VocabularyRow>, CodingError>;
}

/// Fixture source holding rows in memory. A vocabulary that was never set
/// fails to load.
#[derive(Debug, Clone, Default)]
pub struct InMemoryVocabularySource {
    tables: HashMap<VocabularyType, Vec<VocabularyRow>>,
}

impl InMemoryVocabularySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, vocabulary: VocabularyType, rows: Vec<VocabularyRow>) -> Self {
        self.tables.insert(vocabulary, rows);
        self
    }
}

#[async_trait]
impl VocabularySource for InMemoryVocabularySource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch(&self, vocabulary: VocabularyType) -> Result<Vec<VocabularyRow>, CodingError> {
        self.tables
            .get(&vocabulary)
            .cloned()
            .ok_or_else(|| CodingError::vocabulary_load(vocabulary, "no rows registered"))
    }
}
