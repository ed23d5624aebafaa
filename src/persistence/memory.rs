// src/persistence/memory.rs
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::AssignmentStore;
use crate::error::CodingError;
use crate::models::core::{AssignedBy, CodeAssignment, CodeMatch};

/// Process-local store. A single mutex serializes every write, which covers
/// the per-note ordering requirement.
#[derive(Debug, Default)]
pub struct InMemoryAssignmentStore {
    by_note: Mutex<HashMap<String, Vec<CodeAssignment>>>,
}

impl InMemoryAssignmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an assignment as-is, e.g. a manual one.
    pub async fn record(&self, assignment: CodeAssignment) {
        self.by_note
            .lock()
            .await
            .entry(assignment.note_id.clone())
            .or_default()
            .push(assignment);
    }
}

#[async_trait]
impl AssignmentStore for InMemoryAssignmentStore {
    async fn replace_assignments(
        &self,
        note_id: &str,
        matches: &[CodeMatch],
    ) -> Result<usize, CodingError> {
        let created_at = Utc::now();
        let mut by_note = self.by_note.lock().await;
        let assignments = by_note.entry(note_id.to_string()).or_default();
        assignments.retain(|a| a.assigned_by != AssignedBy::Automatic);
        assignments.extend(
            matches
                .iter()
                .map(|m| CodeAssignment::automatic(note_id, m, created_at)),
        );
        Ok(matches.len())
    }

    async fn list_assignments(&self, note_id: &str) -> Result<Vec<CodeAssignment>, CodingError> {
        Ok(self
            .by_note
            .lock()
            .await
            .get(note_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_assignment(&self, id: Uuid) -> Result<bool, CodingError> {
        let mut by_note = self.by_note.lock().await;
        for assignments in by_note.values_mut() {
            let before = assignments.len();
            assignments.retain(|a| a.id != id);
            if assignments.len() != before {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::core::{EntryId, VocabularyType};

    fn code_match(code: &str) -> CodeMatch {
        CodeMatch {
            vocabulary_type: VocabularyType::Diagnosis,
            internal_id: EntryId(1),
            code: code.to_string(),
            display_text: code.to_string(),
            confidence: 0.9,
            matched_text: "hypertension".to_string(),
            section: "diagnosis".to_string(),
            source_section: None,
        }
    }

    #[tokio::test]
    async fn test_replace_overwrites_automatic_and_keeps_manual() {
        let store = InMemoryAssignmentStore::new();
        let mut manual = CodeAssignment::automatic("note-1", &code_match("Z00.00"), Utc::now());
        manual.assigned_by = AssignedBy::Manual;
        store.record(manual.clone()).await;

        store
            .replace_assignments("note-1", &[code_match("I10"), code_match("R51.9")])
            .await
            .unwrap();
        store
            .replace_assignments("note-1", &[code_match("I10")])
            .await
            .unwrap();

        let assignments = store.list_assignments("note-1").await.unwrap();
        let mut codes: Vec<&str> = assignments.iter().map(|a| a.code.as_str()).collect();
        codes.sort_unstable();
        assert_eq!(codes, vec!["I10", "Z00.00"]);
        assert!(assignments.iter().any(|a| a.id == manual.id));
    }

    #[tokio::test]
    async fn test_delete_assignment() {
        let store = InMemoryAssignmentStore::new();
        store
            .replace_assignments("note-2", &[code_match("I10")])
            .await
            .unwrap();
        let id = store.list_assignments("note-2").await.unwrap()[0].id;

        assert!(store.delete_assignment(id).await.unwrap());
        assert!(!store.delete_assignment(id).await.unwrap());
        assert!(store.list_assignments("note-2").await.unwrap().is_empty());
    }
}
