// src/persistence/db.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeZone, Utc};
use log::{debug, error, info};
use std::collections::HashMap;
use tokio_postgres::types::ToSql;
use uuid::Uuid;

use super::{AssignmentStore, NoteProvider};
use crate::error::CodingError;
use crate::models::core::{
    AssignedBy, ClinicalNote, CodeAssignment, CodeMatch, EntryId, NoteSection, VocabularyType,
};
use crate::utils::db_connect::PgPool;

/// Writes `medical_code_assignments`; one foreign-key column per vocabulary.
pub struct PgAssignmentStore {
    pool: PgPool,
}

impl PgAssignmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn replace(&self, note_id: &str, matches: &[CodeMatch]) -> Result<usize> {
        let mut conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for assignment replace")?;
        let transaction = conn
            .transaction()
            .await
            .context("Failed to start assignment replace transaction")?;

        // Serializes concurrent runs for the same note until commit.
        transaction
            .execute("SELECT pg_advisory_xact_lock(hashtext($1))", &[&note_id])
            .await
            .context("Failed to take per-note advisory lock")?;

        let deleted = transaction
            .execute(
                "DELETE FROM public.medical_code_assignments
                 WHERE medical_note_id = $1 AND assigned_by = 'auto'",
                &[&note_id],
            )
            .await
            .context("Failed to delete previous automatic assignments")?;
        debug!("Removed {} automatic assignments for note {}", deleted, note_id);

        if matches.is_empty() {
            transaction
                .commit()
                .await
                .context("Failed to commit assignment replace transaction")?;
            return Ok(0);
        }

        let created_at = Utc::now().naive_utc();
        let mut values_clause_parts = Vec::with_capacity(matches.len());
        let mut params: Vec<Box<dyn ToSql + Sync + Send>> = Vec::with_capacity(matches.len() * 9);
        let mut param_idx = 1;

        for m in matches {
            let (icd, cpt, snomed) = match m.vocabulary_type {
                VocabularyType::Diagnosis => (Some(m.internal_id.0), None, None),
                VocabularyType::Procedure => (None, Some(m.internal_id.0), None),
                VocabularyType::Concept => (None, None, Some(m.internal_id.0)),
            };
            values_clause_parts.push(format!(
                concat!(
                    "(${}, ${}, CAST(${} AS bigint), CAST(${} AS bigint), ",
                    "CAST(${} AS bigint), ${}, 'auto', ${}, ${}, ${})"
                ),
                param_idx,
                param_idx + 1,
                param_idx + 2,
                param_idx + 3,
                param_idx + 4,
                param_idx + 5,
                param_idx + 6,
                param_idx + 7,
                param_idx + 8
            ));
            params.push(Box::new(Uuid::new_v4().to_string()));
            params.push(Box::new(note_id.to_string()));
            params.push(Box::new(icd));
            params.push(Box::new(cpt));
            params.push(Box::new(snomed));
            params.push(Box::new(m.confidence));
            params.push(Box::new(m.section.clone()));
            params.push(Box::new(m.matched_text.clone()));
            params.push(Box::new(created_at));
            param_idx += 9;
        }

        let insert_sql = format!(
            "INSERT INTO public.medical_code_assignments (
                id, medical_note_id, icd_code_id, cpt_code_id, snomed_code_id,
                confidence_score, assigned_by, section, matched_text, created_at
             ) VALUES {}",
            values_clause_parts.join(", ")
        );
        let params_slice: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        let inserted = transaction
            .execute(insert_sql.as_str(), params_slice.as_slice())
            .await
            .map_err(|e| {
                error!("Assignment insert SQL error for note {}: {}", note_id, e);
                e
            })
            .context("Failed to insert automatic assignments")?;

        transaction
            .commit()
            .await
            .context("Failed to commit assignment replace transaction")?;
        Ok(inserted as usize)
    }

    async fn list(&self, note_id: &str) -> Result<Vec<CodeAssignment>> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for assignment listing")?;
        let rows = conn
            .query(
                "SELECT a.id, a.medical_note_id,
                        a.icd_code_id::bigint AS icd_code_id,
                        a.cpt_code_id::bigint AS cpt_code_id,
                        a.snomed_code_id::bigint AS snomed_code_id,
                        COALESCE(i.code, c.code, s.concept_id) AS code,
                        a.confidence_score, a.assigned_by, a.section, a.matched_text,
                        a.created_at::timestamp AS created_at
                 FROM public.medical_code_assignments a
                 LEFT JOIN public.icd_codes i ON i.id = a.icd_code_id
                 LEFT JOIN public.cpt_codes c ON c.id = a.cpt_code_id
                 LEFT JOIN public.snomed_codes s ON s.id = a.snomed_code_id
                 WHERE a.medical_note_id = $1
                 ORDER BY a.created_at, a.id",
                &[&note_id],
            )
            .await
            .context("Failed to query assignments")?;

        let mut assignments = Vec::with_capacity(rows.len());
        for row in rows {
            let id_str: String = row.get("id");
            let (vocabulary_type, internal_id) = match (
                row.get::<_, Option<i64>>("icd_code_id"),
                row.get::<_, Option<i64>>("cpt_code_id"),
                row.get::<_, Option<i64>>("snomed_code_id"),
            ) {
                (Some(id), _, _) => (VocabularyType::Diagnosis, id),
                (None, Some(id), _) => (VocabularyType::Procedure, id),
                (None, None, Some(id)) => (VocabularyType::Concept, id),
                (None, None, None) => {
                    debug!("Assignment {} references no code, skipping", id_str);
                    continue;
                }
            };
            let assigned_by = row
                .get::<_, Option<String>>("assigned_by")
                .as_deref()
                .unwrap_or("auto")
                .parse::<AssignedBy>()
                .unwrap_or(AssignedBy::Manual);
            let created_at = row
                .get::<_, Option<NaiveDateTime>>("created_at")
                .map(|naive| Utc.from_utc_datetime(&naive))
                .unwrap_or_else(Utc::now);

            assignments.push(CodeAssignment {
                id: Uuid::parse_str(&id_str)
                    .with_context(|| format!("Assignment id '{}' is not a UUID", id_str))?,
                note_id: row.get("medical_note_id"),
                vocabulary_type,
                internal_id: EntryId(internal_id),
                code: row.get::<_, Option<String>>("code").unwrap_or_default(),
                confidence: row.get::<_, Option<f64>>("confidence_score").unwrap_or(0.0),
                matched_text: row.get::<_, Option<String>>("matched_text").unwrap_or_default(),
                section: row.get::<_, Option<String>>("section").unwrap_or_default(),
                assigned_by,
                created_at,
            });
        }
        Ok(assignments)
    }
}

#[async_trait]
impl AssignmentStore for PgAssignmentStore {
    async fn replace_assignments(
        &self,
        note_id: &str,
        matches: &[CodeMatch],
    ) -> Result<usize, CodingError> {
        self.replace(note_id, matches)
            .await
            .map_err(CodingError::persistence)
    }

    async fn list_assignments(&self, note_id: &str) -> Result<Vec<CodeAssignment>, CodingError> {
        self.list(note_id).await.map_err(CodingError::persistence)
    }

    async fn delete_assignment(&self, id: Uuid) -> Result<bool, CodingError> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for assignment delete")
            .map_err(CodingError::persistence)?;
        let deleted = conn
            .execute(
                "DELETE FROM public.medical_code_assignments WHERE id = $1",
                &[&id.to_string()],
            )
            .await
            .context("Failed to delete assignment")
            .map_err(CodingError::persistence)?;
        if deleted > 0 {
            info!("Deleted code assignment {}", id);
        }
        Ok(deleted > 0)
    }
}

/// Reads structured notes from `medical_notes`.
pub struct PgNoteProvider {
    pool: PgPool,
}

impl PgNoteProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn select_sections() -> String {
        NoteSection::ALL
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    async fn pending(&self, limit: usize) -> Result<Vec<String>> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for pending notes")?;
        let rows = conn
            .query(
                "SELECT n.id
                 FROM public.medical_notes n
                 WHERE NOT EXISTS (
                     SELECT 1 FROM public.medical_code_assignments a
                     WHERE a.medical_note_id = n.id AND a.assigned_by = 'auto'
                 )
                 ORDER BY n.created_at, n.id
                 LIMIT $1",
                &[&(limit as i64)],
            )
            .await
            .context("Failed to query pending notes")?;
        Ok(rows.iter().map(|row| row.get::<_, String>("id")).collect())
    }
}

#[async_trait]
impl NoteProvider for PgNoteProvider {
    async fn fetch_note(&self, note_id: &str) -> Result<ClinicalNote, CodingError> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for note fetch")
            .map_err(CodingError::persistence)?;
        let query = format!(
            "SELECT {} FROM public.medical_notes WHERE id = $1",
            Self::select_sections()
        );
        let row = conn
            .query_opt(query.as_str(), &[&note_id])
            .await
            .context("Failed to query medical note")
            .map_err(CodingError::persistence)?
            .ok_or_else(|| CodingError::NoteNotFound(note_id.to_string()))?;

        let raw: HashMap<String, Option<String>> = NoteSection::ALL
            .iter()
            .map(|section| {
                (
                    section.as_str().to_string(),
                    row.get::<_, Option<String>>(section.as_str()),
                )
            })
            .collect();
        Ok(ClinicalNote::from(raw))
    }

    async fn pending_note_ids(&self, limit: usize) -> Result<Vec<String>, CodingError> {
        self.pending(limit).await.map_err(CodingError::persistence)
    }
}
