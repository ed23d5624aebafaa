// src/utils/logging.rs - Logging helpers for the per-vocabulary matching passes
use log::{debug, error, info, warn};
use std::time::Instant;

use crate::models::core::VocabularyType;
use crate::models::stats_models::{CodingRunStats, VocabularyStats};

#[derive(Clone)]
pub struct CodingLogger {
    system_name: &'static str,
    emoji: &'static str,
    start_time: Instant,
}

impl CodingLogger {
    pub fn new(vocabulary: VocabularyType) -> Self {
        let emoji = match vocabulary {
            VocabularyType::Diagnosis => "🩺",
            VocabularyType::Procedure => "💉",
            VocabularyType::Concept => "🧬",
        };
        Self {
            system_name: vocabulary.system_name(),
            emoji,
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self, note_id: &str, term_count: usize) {
        debug!(
            "[{}] {} 🚀 Matching {} candidate terms for note {}",
            self.system_name, self.emoji, term_count, note_id
        );
    }

    pub fn log_term_filtering(&self, offered: usize, admitted: usize) {
        if offered == 0 {
            debug!(
                "[{}] {} ✨ No candidate terms offered",
                self.system_name, self.emoji
            );
            return;
        }
        debug!(
            "[{}] {} 🎯 Term filtering: {} offered → {} admitted",
            self.system_name, self.emoji, offered, admitted
        );
    }

    pub fn log_empty_vocabulary(&self) {
        warn!(
            "[{}] {} ⚠️  Vocabulary table is empty, skipping",
            self.system_name, self.emoji
        );
    }

    pub fn log_completion(&self, matches: usize, candidates_scored: usize, cache_hits: usize) {
        info!(
            "[{}] {} ✅ {} codes admitted ({} candidates scored, {} cached terms) in {:.2?}",
            self.system_name,
            self.emoji,
            matches,
            candidates_scored,
            cache_hits,
            self.start_time.elapsed()
        );
    }

    pub fn log_error(&self, message: &str) {
        error!("[{}] {} ❌ {}", self.system_name, self.emoji, message);
    }

    pub fn log_debug(&self, message: &str) {
        debug!("[{}] {} {}", self.system_name, self.emoji, message);
    }
}

pub fn log_vocabulary_loaded(stats: &VocabularyStats) {
    info!("📚 ===== VOCABULARY STORE READY (generation {}) =====", stats.generation);
    for (vocabulary, table) in &stats.tables {
        info!(
            "   • {} {}: {} entries, {} categories",
            vocabulary.system_name(),
            vocabulary,
            table.entries,
            table.categories.len()
        );
    }
    info!("   • Total entries: {}", stats.total_entries());
}

pub fn log_coding_summary(stats: &CodingRunStats) {
    info!(
        "📋 Note {}: {} diagnostic terms, {} procedure terms → {} codes in {:.2?}",
        stats.note_id,
        stats.diagnostic_terms,
        stats.procedure_terms,
        stats.total_matches(),
        stats.duration
    );
    match stats.assignments_stored {
        Some(stored) => info!(
            "💾 Note {}: {} automatic assignments stored",
            stats.note_id, stored
        ),
        None => warn!("⚠️  Note {}: assignments were not stored", stats.note_id),
    }
}
