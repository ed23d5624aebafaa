// src/matching/engine.rs
use futures::future::join_all;
use log::{debug, error, info};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use super::cache::{CacheGeneration, TermMatchCache};
use super::policy::PolicySet;
use super::similarity::partial_ratio;
use crate::error::CodingError;
use crate::extraction::TermExtractor;
use crate::models::core::{
    normalize_text, ClinicalNote, CodeMatch, ExtractedTerm, NoteCodes, SearchHit, SearchScope,
    VocabularyEntry, VocabularyType,
};
use crate::models::stats_models::{CodingRunStats, VocabularyMatchStats, VocabularyStats};
use crate::persistence::AssignmentStore;
use crate::utils::logging::{log_coding_summary, log_vocabulary_loaded, CodingLogger};
use crate::vocabulary::source::VocabularySource;
use crate::vocabulary::store::{LoadOptions, VocabularyStore};

/// Partial-ratio floor for interactive vocabulary search. Independent of the
/// note-coding thresholds.
pub const SEARCH_MIN_SCORE: u8 = 60;

#[derive(Debug)]
pub enum PersistenceOutcome {
    /// Number of automatic assignments written.
    Stored(usize),
    Failed(CodingError),
}

#[derive(Debug)]
pub struct CodingReport {
    pub note_id: String,
    pub codes: NoteCodes,
    pub stats: CodingRunStats,
    pub persistence: PersistenceOutcome,
}

impl CodingReport {
    pub fn is_persisted(&self) -> bool {
        matches!(self.persistence, PersistenceOutcome::Stored(_))
    }
}

/// Extraction, scoring and admission across the three vocabularies, plus the
/// write-back of automatic assignments.
///
/// The vocabulary store and the policy set are held as `Arc` snapshots behind
/// locks that are only taken long enough to clone the `Arc`; `reload` and
/// `reconfigure` swap them without disturbing calls already in flight.
/// Each policy set carries a generation that feeds the term-match cache key.
pub struct CodeMatchingEngine {
    store: RwLock<Arc<VocabularyStore>>,
    policies: RwLock<(Arc<PolicySet>, u64)>,
    extractor: TermExtractor,
    assignments: Arc<dyn AssignmentStore>,
    cache: Option<Arc<TermMatchCache>>,
}

impl CodeMatchingEngine {
    pub fn new(
        store: Arc<VocabularyStore>,
        policies: PolicySet,
        assignments: Arc<dyn AssignmentStore>,
    ) -> Self {
        Self {
            store: RwLock::new(store),
            policies: RwLock::new((Arc::new(policies), 0)),
            extractor: TermExtractor::new(),
            assignments,
            cache: None,
        }
    }

    pub fn with_extractor(mut self, extractor: TermExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// LRU cache of per-term candidates; 0 disables it.
    pub fn with_cache_size(mut self, capacity: usize) -> Self {
        self.cache = TermMatchCache::new(capacity).map(Arc::new);
        self
    }

    pub async fn store(&self) -> Arc<VocabularyStore> {
        Arc::clone(&*self.store.read().await)
    }

    pub async fn policies(&self) -> Arc<PolicySet> {
        self.policy_snapshot().await.0
    }

    /// Bumped by every `reconfigure`.
    pub async fn policy_generation(&self) -> u64 {
        self.policies.read().await.1
    }

    async fn policy_snapshot(&self) -> (Arc<PolicySet>, u64) {
        let guard = self.policies.read().await;
        (Arc::clone(&guard.0), guard.1)
    }

    pub fn assignments(&self) -> &Arc<dyn AssignmentStore> {
        &self.assignments
    }

    pub fn cache(&self) -> Option<&TermMatchCache> {
        self.cache.as_deref()
    }

    /// Codes a note and replaces its automatic assignments. Never fails:
    /// storage problems are reported in `persistence` and the matches are
    /// returned regardless.
    pub async fn code_note(&self, note: &ClinicalNote, note_id: &str) -> CodingReport {
        let start = Instant::now();
        let (codes, mut stats) = self.match_note(note, note_id).await;

        let all_matches: Vec<CodeMatch> = codes.iter().cloned().collect();
        let persistence = match self
            .assignments
            .replace_assignments(note_id, &all_matches)
            .await
        {
            Ok(stored) => {
                stats.assignments_stored = Some(stored);
                PersistenceOutcome::Stored(stored)
            }
            Err(e) => {
                error!("Failed to store code assignments for note {}: {}", note_id, e);
                PersistenceOutcome::Failed(e)
            }
        };
        stats.duration = start.elapsed();
        log_coding_summary(&stats);

        CodingReport {
            note_id: note_id.to_string(),
            codes,
            stats,
            persistence,
        }
    }

    /// Extraction and matching only, nothing is written.
    pub async fn match_note(
        &self,
        note: &ClinicalNote,
        note_id: &str,
    ) -> (NoteCodes, CodingRunStats) {
        let start = Instant::now();
        let store = self.store().await;
        let (policies, policy_generation) = self.policy_snapshot().await;
        let generation = CacheGeneration::new(store.generation(), policy_generation);

        let diagnostic = self.extractor.extract_diagnostic(note);
        let procedure = self.extractor.extract_procedure(note);
        debug!(
            "Note {}: diagnostic terms {:?}, procedure terms {:?}",
            note_id,
            diagnostic.iter().map(|t| t.text.as_str()).collect::<Vec<_>>(),
            procedure.iter().map(|t| t.text.as_str()).collect::<Vec<_>>()
        );
        let concept = union_terms(&diagnostic, &procedure);

        let mut stats = CodingRunStats {
            note_id: note_id.to_string(),
            diagnostic_terms: diagnostic.len(),
            procedure_terms: procedure.len(),
            ..CodingRunStats::default()
        };

        let jobs = [
            (VocabularyType::Diagnosis, diagnostic),
            (VocabularyType::Procedure, procedure),
            (VocabularyType::Concept, concept),
        ];
        let handles = jobs.into_iter().map(|(vocabulary, terms)| {
            let store = Arc::clone(&store);
            let policies = Arc::clone(&policies);
            let cache = self.cache.clone();
            let note_id = note_id.to_string();
            let handle = tokio::task::spawn_blocking(move || {
                let cache = cache.as_deref().map(|c| (c, generation));
                match_vocabulary(vocabulary, &terms, &store, &policies, cache, &note_id)
            });
            async move { (vocabulary, handle.await) }
        });

        let mut codes = NoteCodes::default();
        for (vocabulary, result) in join_all(handles).await {
            match result {
                Ok((matches, vocabulary_stats)) => {
                    stats.per_vocabulary.insert(vocabulary, vocabulary_stats);
                    codes.set(vocabulary, matches);
                }
                Err(e) => {
                    CodingLogger::new(vocabulary)
                        .log_error(&format!("Matching task failed, returning no codes: {}", e));
                    stats
                        .per_vocabulary
                        .insert(vocabulary, VocabularyMatchStats::default());
                }
            }
        }
        stats.duration = start.elapsed();
        (codes, stats)
    }

    /// Ad hoc lookup: partial ratio only, scores of at least
    /// `SEARCH_MIN_SCORE`, best first, at most `limit` hits.
    pub async fn search_vocabulary(
        &self,
        query: &str,
        scope: SearchScope,
        limit: usize,
    ) -> Vec<SearchHit> {
        let query = normalize_text(query);
        if query.is_empty() || limit == 0 {
            return Vec::new();
        }
        let store = self.store().await;
        let handle =
            tokio::task::spawn_blocking(move || search_store(&store, &query, scope, limit));
        match handle.await {
            Ok(hits) => hits,
            Err(e) => {
                error!("Vocabulary search task failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Builds a new store from `source` and swaps it in.
    pub async fn reload(
        &self,
        source: &dyn VocabularySource,
        options: &LoadOptions,
    ) -> VocabularyStats {
        let fresh = VocabularyStore::load(source, options).await;
        let stats = fresh.stats();
        self.replace_store(Arc::new(fresh)).await;
        log_vocabulary_loaded(&stats);
        stats
    }

    pub async fn replace_store(&self, store: Arc<VocabularyStore>) {
        let generation = store.generation();
        *self.store.write().await = store;
        if let Some(cache) = &self.cache {
            cache.clear();
        }
        info!("Vocabulary store swapped to generation {}", generation);
    }

    pub async fn reconfigure(&self, policies: PolicySet) {
        let generation = {
            let mut guard = self.policies.write().await;
            guard.0 = Arc::new(policies);
            guard.1 += 1;
            guard.1
        };
        if let Some(cache) = &self.cache {
            cache.clear();
        }
        info!("Matching policies reconfigured (generation {})", generation);
    }
}

/// Concept matching draws on both term pools; a term found in both keeps its
/// diagnostic section.
fn union_terms(
    diagnostic: &[ExtractedTerm],
    procedure: &[ExtractedTerm],
) -> Vec<ExtractedTerm> {
    let mut merged = BTreeMap::new();
    for term in diagnostic.iter().chain(procedure.iter()) {
        merged.entry(term.text.clone()).or_insert(term.section);
    }
    merged
        .into_iter()
        .map(|(text, section)| ExtractedTerm::new(text, section))
        .collect()
}

fn match_vocabulary(
    vocabulary: VocabularyType,
    terms: &[ExtractedTerm],
    store: &VocabularyStore,
    policies: &PolicySet,
    cache: Option<(&TermMatchCache, CacheGeneration)>,
    note_id: &str,
) -> (Vec<CodeMatch>, VocabularyMatchStats) {
    let logger = CodingLogger::new(vocabulary);
    logger.log_start(note_id, terms.len());

    let entries: Vec<&VocabularyEntry> = store.lookup(vocabulary).collect();
    if entries.is_empty() {
        logger.log_empty_vocabulary();
        return (
            Vec::new(),
            VocabularyMatchStats {
                terms_offered: terms.len(),
                ..VocabularyMatchStats::default()
            },
        );
    }

    let policy = policies.get(vocabulary);
    let (matches, stats) = policy.run(terms, &entries, cache);
    logger.log_term_filtering(stats.terms_offered, stats.terms_admitted);
    for m in &matches {
        logger.log_debug(&format!(
            "'{}' → {} {} ({:.2})",
            m.matched_text, m.code, m.display_text, m.confidence
        ));
    }
    logger.log_completion(stats.matches, stats.candidates_scored, stats.cache_hits);
    (matches, stats)
}

fn search_store(
    store: &VocabularyStore,
    query: &str,
    scope: SearchScope,
    limit: usize,
) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = VocabularyType::ALL
        .iter()
        .filter(|&&vocabulary| scope.includes(vocabulary))
        .flat_map(|&vocabulary| {
            store.lookup(vocabulary).filter_map(move |entry| {
                let score = entry
                    .match_texts()
                    .map(|text| partial_ratio(query, text))
                    .max()
                    .unwrap_or(0);
                (score >= SEARCH_MIN_SCORE).then(|| SearchHit {
                    vocabulary_type: vocabulary,
                    internal_id: entry.internal_id,
                    code: entry.code.clone(),
                    display_text: entry.display_text.clone(),
                    alternate_text: entry.alternate_text.clone(),
                    score,
                })
            })
        })
        .collect();

    hits.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.vocabulary_type.cmp(&b.vocabulary_type))
            .then_with(|| a.code.cmp(&b.code))
    });
    hits.truncate(limit);
    hits
}
