// src/vocabulary/file.rs
use async_trait::async_trait;
use log::warn;
use std::path::{Path, PathBuf};

use super::source::{VocabularyRow, VocabularySource};
use crate::error::CodingError;
use crate::models::core::VocabularyType;

/// JSON-lines bulk files, one `VocabularyRow` object per line:
/// `icd10.jsonl`, `cpt.jsonl` and `snomed.jsonl` inside one directory.
#[derive(Debug, Clone)]
pub struct JsonlVocabularySource {
    dir: PathBuf,
}

impl JsonlVocabularySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn file_name(vocabulary: VocabularyType) -> &'static str {
        match vocabulary {
            VocabularyType::Diagnosis => "icd10.jsonl",
            VocabularyType::Procedure => "cpt.jsonl",
            VocabularyType::Concept => "snomed.jsonl",
        }
    }

    pub fn path_for(&self, vocabulary: VocabularyType) -> PathBuf {
        self.dir.join(Self::file_name(vocabulary))
    }
}

/// Parses JSON lines, skipping blank lines and logging malformed ones.
fn parse_rows(path: &Path, content: &str) -> Vec<VocabularyRow> {
    let mut rows = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<VocabularyRow>(line) {
            Ok(row) => rows.push(row),
            Err(e) => warn!("{}:{}: skipping malformed row: {}", path.display(), line_no + 1, e),
        }
    }
    rows
}

#[async_trait]
impl VocabularySource for JsonlVocabularySource {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn fetch(&self, vocabulary: VocabularyType) -> Result<Vec<VocabularyRow>, CodingError> {
        let path = self.path_for(vocabulary);
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            CodingError::vocabulary_load(vocabulary, format!("{}: {}", path.display(), e))
        })?;
        Ok(parse_rows(&path, &content))
    }
}
