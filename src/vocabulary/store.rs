// src/vocabulary/store.rs
use futures::future::join_all;
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::focus::{select_first, select_focused, FocusPatterns};
use super::source::{VocabularyRow, VocabularySource};
use crate::models::core::{normalize_text, EntryId, VocabularyEntry, VocabularyType};
use crate::models::stats_models::{VocabularyStats, VocabularyTableStats};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub max_entries_per_vocabulary: Option<usize>,
    pub focus_patterns: Option<FocusPatterns>,
    /// Floor the focused subset is topped up to.
    pub min_focus_size: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::full()
    }
}

impl LoadOptions {
    pub fn full() -> Self {
        Self {
            max_entries_per_vocabulary: None,
            focus_patterns: None,
            min_focus_size: 0,
        }
    }

    pub fn common_only(max_entries_per_vocabulary: usize, min_focus_size: usize) -> Self {
        Self {
            max_entries_per_vocabulary: Some(max_entries_per_vocabulary),
            focus_patterns: Some(FocusPatterns::common()),
            min_focus_size,
        }
    }

    fn select(&self, vocabulary: VocabularyType, rows: Vec<VocabularyRow>) -> Vec<VocabularyRow> {
        match &self.focus_patterns {
            Some(focus) => select_focused(
                vocabulary,
                rows,
                focus,
                self.max_entries_per_vocabulary,
                self.min_focus_size,
            ),
            None => select_first(rows, self.max_entries_per_vocabulary),
        }
    }
}

#[derive(Debug, Default)]
struct VocabularyTable {
    entries: BTreeMap<EntryId, VocabularyEntry>,
    by_code: HashMap<String, EntryId>,
}

/// Ids for rows that arrive without one: above the highest explicit id, or
/// the lowest free positive id once that would overflow.
struct SyntheticIds {
    next: i64,
    taken: HashSet<i64>,
}

impl SyntheticIds {
    fn new(rows: &[VocabularyRow]) -> Self {
        let taken: HashSet<i64> = rows.iter().filter_map(|r| r.id).collect();
        let next = taken
            .iter()
            .max()
            .and_then(|max| max.checked_add(1))
            .unwrap_or(1)
            .max(1);
        Self { next, taken }
    }

    /// `None` once the positive id space is exhausted.
    fn next(&mut self) -> Option<i64> {
        while self.taken.contains(&self.next) {
            self.next = self.next.checked_add(1)?;
        }
        let id = self.next;
        self.taken.insert(id);
        Some(id)
    }
}

impl VocabularyTable {
    fn build(vocabulary: VocabularyType, rows: Vec<VocabularyRow>) -> Self {
        let mut table = VocabularyTable::default();
        let mut synthetic = SyntheticIds::new(&rows);
        let mut seen_ids: HashSet<i64> = HashSet::new();
        let mut skipped = 0usize;

        for row in rows {
            let code = row.code.trim().to_string();
            let description = row.description.trim();
            if code.is_empty() || description.is_empty() {
                skipped += 1;
                continue;
            }
            let id = match row.id.or_else(|| synthetic.next()) {
                Some(id) => id,
                None => {
                    skipped += 1;
                    continue;
                }
            };
            if !seen_ids.insert(id) {
                debug!("Duplicate {} id {} for code {}, skipping", vocabulary, id, code);
                skipped += 1;
                continue;
            }

            let alternate = row
                .alternate
                .as_deref()
                .map(str::trim)
                .filter(|alt| !alt.is_empty());
            let display_text = match (vocabulary, alternate) {
                (VocabularyType::Concept, Some(preferred)) => preferred.to_string(),
                _ => description.to_string(),
            };
            let entry = VocabularyEntry {
                internal_id: EntryId(id),
                code: code.clone(),
                primary_text: normalize_text(description),
                display_text,
                alternate_text: alternate.map(normalize_text),
                category: row.category.filter(|c| !c.trim().is_empty()),
                section: row.section.filter(|s| !s.trim().is_empty()),
            };
            table.by_code.entry(code).or_insert(EntryId(id));
            table.entries.insert(EntryId(id), entry);
        }

        if skipped > 0 {
            warn!(
                "Skipped {} malformed {} rows (empty code/description or duplicate id)",
                skipped, vocabulary
            );
        }
        table
    }

    fn stats(&self) -> VocabularyTableStats {
        let categories: BTreeSet<&str> = self
            .entries
            .values()
            .filter_map(|e| e.category.as_deref())
            .collect();
        let sections: BTreeSet<&str> = self
            .entries
            .values()
            .filter_map(|e| e.section.as_deref())
            .collect();
        VocabularyTableStats {
            entries: self.entries.len(),
            categories: categories.into_iter().map(String::from).collect(),
            sections: sections.into_iter().map(String::from).collect(),
        }
    }
}

/// Immutable, in-memory reference vocabularies. Built once, shared behind an
/// `Arc`, and replaced wholesale on reload.
#[derive(Debug)]
pub struct VocabularyStore {
    tables: HashMap<VocabularyType, VocabularyTable>,
    generation: u64,
}

impl VocabularyStore {
    /// Loads all three vocabularies. A vocabulary whose fetch fails is logged
    /// and left empty; the others still load.
    pub async fn load(source: &dyn VocabularySource, options: &LoadOptions) -> Self {
        let start = Instant::now();
        info!("Loading reference vocabularies from {} source...", source.name());

        let fetched = join_all(VocabularyType::ALL.iter().map(|&vocabulary| async move {
            (vocabulary, source.fetch(vocabulary).await)
        }))
        .await;

        let mut tables = Vec::with_capacity(fetched.len());
        for (vocabulary, result) in fetched {
            match result {
                Ok(rows) => {
                    let fetched_count = rows.len();
                    let selected = options.select(vocabulary, rows);
                    info!(
                        "Loaded {} {} rows, kept {}",
                        fetched_count,
                        vocabulary.system_name(),
                        selected.len()
                    );
                    tables.push((vocabulary, selected));
                }
                Err(e) => {
                    error!(
                        "{} vocabulary unavailable, continuing with an empty table: {}",
                        vocabulary.system_name(),
                        e
                    );
                    tables.push((vocabulary, Vec::new()));
                }
            }
        }

        let store = Self::from_rows(tables);
        info!(
            "Vocabulary store generation {} built in {:.2?}",
            store.generation,
            start.elapsed()
        );
        store
    }

    /// Builds a store directly from rows, without any focus selection.
    /// Vocabularies not given are empty.
    pub fn from_rows(rows: impl IntoIterator<Item = (VocabularyType, Vec<VocabularyRow>)>) -> Self {
        let mut tables: HashMap<VocabularyType, VocabularyTable> = VocabularyType::ALL
            .iter()
            .map(|&v| (v, VocabularyTable::default()))
            .collect();
        for (vocabulary, rows) in rows {
            tables.insert(vocabulary, VocabularyTable::build(vocabulary, rows));
        }
        Self {
            tables,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn empty() -> Self {
        Self::from_rows(std::iter::empty())
    }

    /// Entries of one vocabulary in internal-id order.
    pub fn lookup(
        &self,
        vocabulary: VocabularyType,
    ) -> impl Iterator<Item = &VocabularyEntry> + '_ {
        self.tables
            .get(&vocabulary)
            .into_iter()
            .flat_map(|table| table.entries.values())
    }

    pub fn size(&self, vocabulary: VocabularyType) -> usize {
        self.tables.get(&vocabulary).map_or(0, |t| t.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        VocabularyType::ALL.iter().all(|&v| self.size(v) == 0)
    }

    pub fn get(&self, vocabulary: VocabularyType, id: EntryId) -> Option<&VocabularyEntry> {
        self.tables.get(&vocabulary)?.entries.get(&id)
    }

    pub fn find_code(&self, vocabulary: VocabularyType, code: &str) -> Option<&VocabularyEntry> {
        let table = self.tables.get(&vocabulary)?;
        let id = table.by_code.get(code.trim())?;
        table.entries.get(id)
    }

    /// Unique per built store, increasing across reloads.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stats(&self) -> VocabularyStats {
        VocabularyStats {
            generation: self.generation,
            tables: VocabularyType::ALL
                .iter()
                .map(|&v| {
                    let stats = self.tables.get(&v).map(VocabularyTable::stats).unwrap_or_default();
                    (v, stats)
                })
                .collect(),
        }
    }
}
