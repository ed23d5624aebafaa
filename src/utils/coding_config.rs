// src/utils/coding_config.rs
//! Environment-driven settings for the coding engine and its vocabulary
//! source.

use log::info;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::CodingError;
use crate::matching::policy::PolicyVariant;
use crate::utils::env::env_or;
use crate::vocabulary::focus::FocusPatterns;
use crate::vocabulary::store::LoadOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VocabularySourceKind {
    Postgres,
    File,
}

impl FromStr for VocabularySourceKind {
    type Err = CodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "db" => Ok(VocabularySourceKind::Postgres),
            "file" | "files" | "jsonl" => Ok(VocabularySourceKind::File),
            other => Err(CodingError::Parse {
                field: "VOCABULARY_SOURCE",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CodingConfig {
    pub confidence_threshold: f64,
    pub procedure_threshold: f64,
    pub concept_threshold: f64,
    pub max_codes_per_type: usize,
    pub policy_variant: PolicyVariant,
    pub enable_fuzzy: bool,
    pub vocabulary_source: VocabularySourceKind,
    pub vocabulary_dir: PathBuf,
    pub common_only: bool,
    /// Total entry budget, split evenly across the three vocabularies.
    pub max_entries: usize,
    pub min_focus_size: usize,
    /// 0 disables the term-match cache.
    pub cache_size: usize,
}

impl Default for CodingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.75,
            procedure_threshold: 0.70,
            concept_threshold: 0.75,
            max_codes_per_type: 5,
            policy_variant: PolicyVariant::Strict,
            enable_fuzzy: true,
            vocabulary_source: VocabularySourceKind::Postgres,
            vocabulary_dir: PathBuf::from("vocabulary"),
            common_only: true,
            max_entries: 10_000,
            min_focus_size: 1_000,
            cache_size: 5_000,
        }
    }
}

impl CodingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            confidence_threshold: env_or(
                "MEDICAL_CODING_CONFIDENCE_THRESHOLD",
                defaults.confidence_threshold,
            ),
            procedure_threshold: env_or(
                "MEDICAL_CODING_PROCEDURE_THRESHOLD",
                defaults.procedure_threshold,
            ),
            concept_threshold: env_or(
                "MEDICAL_CODING_CONCEPT_THRESHOLD",
                defaults.concept_threshold,
            ),
            max_codes_per_type: env_or(
                "MEDICAL_CODING_MAX_CODES_PER_TYPE",
                defaults.max_codes_per_type,
            ),
            policy_variant: env_or("MEDICAL_CODING_POLICY_VARIANT", defaults.policy_variant),
            enable_fuzzy: env_or("MEDICAL_CODING_ENABLE_FUZZY", defaults.enable_fuzzy),
            vocabulary_source: env_or("VOCABULARY_SOURCE", defaults.vocabulary_source),
            vocabulary_dir: std::env::var("VOCABULARY_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.vocabulary_dir),
            common_only: env_or("VOCABULARY_COMMON_ONLY", defaults.common_only),
            max_entries: env_or("VOCABULARY_MAX_ENTRIES", defaults.max_entries),
            min_focus_size: env_or("VOCABULARY_MIN_FOCUS_SIZE", defaults.min_focus_size),
            cache_size: env_or("TERM_MATCH_CACHE_SIZE", defaults.cache_size),
        }
    }

    /// Options for `VocabularyStore::load`. Without `common_only` the whole
    /// source is loaded.
    pub fn load_options(&self) -> LoadOptions {
        if !self.common_only {
            return LoadOptions::full();
        }
        LoadOptions {
            max_entries_per_vocabulary: Some((self.max_entries / 3).max(1)),
            focus_patterns: Some(FocusPatterns::common()),
            min_focus_size: self.min_focus_size,
        }
    }

    pub fn log_config(&self) {
        info!("🩺 Medical coding configuration:");
        info!(
            "   Policy variant: {:?} (fuzzy matching {})",
            self.policy_variant,
            if self.enable_fuzzy { "enabled" } else { "DISABLED" }
        );
        info!(
            "   Thresholds: diagnosis={:.2}, procedure={:.2}, concept={:.2}",
            self.confidence_threshold, self.procedure_threshold, self.concept_threshold
        );
        info!("   Max codes per vocabulary: {}", self.max_codes_per_type);
        match self.vocabulary_source {
            VocabularySourceKind::Postgres => info!("   Vocabulary source: postgres"),
            VocabularySourceKind::File => info!(
                "   Vocabulary source: files in {}",
                self.vocabulary_dir.display()
            ),
        }
        if self.common_only {
            info!(
                "   Common codes only: up to {} entries ({} per vocabulary), focus floor {}",
                self.max_entries,
                self.max_entries / 3,
                self.min_focus_size
            );
        } else {
            info!("   Loading complete vocabularies");
        }
        if self.cache_size > 0 {
            info!("   Term match cache: {} entries", self.cache_size);
        } else {
            info!("   Term match cache: disabled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_parsing() {
        assert_eq!(
            "Postgres".parse::<VocabularySourceKind>().unwrap(),
            VocabularySourceKind::Postgres
        );
        assert_eq!(
            "jsonl".parse::<VocabularySourceKind>().unwrap(),
            VocabularySourceKind::File
        );
        assert!("s3".parse::<VocabularySourceKind>().is_err());
    }

    #[test]
    fn test_load_options_split_budget() {
        let config = CodingConfig {
            max_entries: 9_000,
            min_focus_size: 500,
            ..CodingConfig::default()
        };
        let options = config.load_options();
        assert_eq!(options.max_entries_per_vocabulary, Some(3_000));
        assert_eq!(options.min_focus_size, 500);
        assert!(options.focus_patterns.is_some());

        let full = CodingConfig {
            common_only: false,
            ..CodingConfig::default()
        }
        .load_options();
        assert_eq!(full.max_entries_per_vocabulary, None);
        assert!(full.focus_patterns.is_none());
    }
}
