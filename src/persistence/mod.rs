// src/persistence/mod.rs
//! Storage collaborators: the assignment store written after each coding
//! run and the provider notes are read from.

pub mod db;
pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::CodingError;
use crate::models::core::{ClinicalNote, CodeAssignment, CodeMatch};

pub use db::{PgAssignmentStore, PgNoteProvider};
pub use memory::InMemoryAssignmentStore;

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Atomically replaces every automatic assignment of `note_id` with
    /// `matches`. Manual assignments are left untouched. Calls for the same
    /// note are serialized. Returns the number of rows written.
    async fn replace_assignments(
        &self,
        note_id: &str,
        matches: &[CodeMatch],
    ) -> Result<usize, CodingError>;

    async fn list_assignments(&self, note_id: &str) -> Result<Vec<CodeAssignment>, CodingError>;

    /// `false` when no assignment had that id.
    async fn delete_assignment(&self, id: Uuid) -> Result<bool, CodingError>;
}

#[async_trait]
pub trait NoteProvider: Send + Sync {
    async fn fetch_note(&self, note_id: &str) -> Result<ClinicalNote, CodingError>;

    /// Notes without any automatic assignment yet, oldest first.
    async fn pending_note_ids(&self, limit: usize) -> Result<Vec<String>, CodingError>;
}
