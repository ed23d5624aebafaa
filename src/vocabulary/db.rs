// src/vocabulary/db.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;

use super::source::{VocabularyRow, VocabularySource};
use crate::error::CodingError;
use crate::models::core::VocabularyType;
use crate::utils::db_connect::PgPool;

/// Reads the `icd_codes`, `cpt_codes` and `snomed_codes` reference tables.
pub struct PgVocabularySource {
    pool: PgPool,
}

impl PgVocabularySource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn query_for(vocabulary: VocabularyType) -> &'static str {
        match vocabulary {
            VocabularyType::Diagnosis => {
                "SELECT id::bigint AS id, code, description,
                        NULL::text AS alternate, category, chapter AS section
                 FROM public.icd_codes
                 ORDER BY code, id"
            }
            VocabularyType::Procedure => {
                "SELECT id::bigint AS id, code, description,
                        NULL::text AS alternate, category, section
                 FROM public.cpt_codes
                 ORDER BY code, id"
            }
            VocabularyType::Concept => {
                "SELECT id::bigint AS id, concept_id AS code, fsn AS description,
                        pt AS alternate, semantic_tag AS category, NULL::text AS section
                 FROM public.snomed_codes
                 ORDER BY concept_id, id"
            }
        }
    }

    async fn fetch_rows(&self, vocabulary: VocabularyType) -> Result<Vec<VocabularyRow>> {
        let conn = self
            .pool
            .get()
            .await
            .with_context(|| format!("Failed to get DB connection for {} load", vocabulary))?;
        let rows = conn
            .query(Self::query_for(vocabulary), &[])
            .await
            .with_context(|| {
                format!("Failed to query {} reference table", vocabulary.system_name())
            })?;

        debug!("Fetched {} {} rows", rows.len(), vocabulary.system_name());
        Ok(rows
            .iter()
            .map(|row| VocabularyRow {
                id: row.get::<_, Option<i64>>("id"),
                code: row.get::<_, Option<String>>("code").unwrap_or_default(),
                description: row.get::<_, Option<String>>("description").unwrap_or_default(),
                alternate: row.get("alternate"),
                category: row.get("category"),
                section: row.get("section"),
            })
            .collect())
    }
}

#[async_trait]
impl VocabularySource for PgVocabularySource {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn fetch(&self, vocabulary: VocabularyType) -> Result<Vec<VocabularyRow>, CodingError> {
        self.fetch_rows(vocabulary)
            .await
            .map_err(|e| CodingError::vocabulary_load(vocabulary, format!("{:#}", e)))
    }
}
