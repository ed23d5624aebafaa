// src/error.rs
use thiserror::Error;

use crate::models::core::VocabularyType;

/// Failure kinds surfaced by the coding engine and its collaborators.
///
/// Only `Configuration` is ever returned from engine construction; the other
/// variants are reported per vocabulary or per persistence attempt and never
/// abort a coding run.
#[derive(Debug, Error)]
pub enum CodingError {
    #[error("failed to load {vocabulary} vocabulary: {reason}")]
    VocabularyLoad {
        vocabulary: VocabularyType,
        reason: String,
    },

    #[error("invalid matching configuration: {0}")]
    Configuration(String),

    #[error("assignment store failure: {0}")]
    Persistence(String),

    #[error("clinical note {0} not found")]
    NoteNotFound(String),

    #[error("unrecognised value '{value}' for {field}")]
    Parse { field: &'static str, value: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CodingError {
    pub fn vocabulary_load(vocabulary: VocabularyType, reason: impl std::fmt::Display) -> Self {
        CodingError::VocabularyLoad {
            vocabulary,
            reason: reason.to_string(),
        }
    }

    /// Flattens an `anyhow` chain (with its contexts) into a persistence error.
    pub fn persistence(err: anyhow::Error) -> Self {
        CodingError::Persistence(format!("{:#}", err))
    }
}
