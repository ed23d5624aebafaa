// src/matching/policy.rs
//! Per-vocabulary admission rules: which terms are worth scoring, which
//! scores are good enough, and how many codes a note may receive.

use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::cache::{CacheGeneration, TermMatchCache};
use super::similarity::{SimilarityScorer, SimilarityStrategy};
use crate::error::CodingError;
use crate::extraction::dictionaries::{
    contains_any, has_diagnostic_suffix, COMMON_CONDITIONS, CONCEPT_STOPLIST, DIAGNOSIS_STOPLIST,
    MEDICAL_INDICATORS, PROCEDURE_STOPLIST, RECOGNIZED_CONDITIONS, SPECIFIC_PROCEDURES,
    VALID_PROCEDURE_TERMS, VISIT_FALLBACK_MARKERS, VISIT_FALLBACK_TERM,
};
use crate::models::core::{CodeMatch, EntryId, ExtractedTerm, VocabularyEntry, VocabularyType};
use crate::models::stats_models::VocabularyMatchStats;
use crate::utils::coding_config::CodingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyVariant {
    /// Best match per term, higher thresholds, whole-word gate for diagnoses.
    Strict,
    /// Two matches per term and a lower diagnosis threshold.
    Permissive,
}

impl fmt::Display for PolicyVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyVariant::Strict => f.write_str("strict"),
            PolicyVariant::Permissive => f.write_str("permissive"),
        }
    }
}

impl FromStr for PolicyVariant {
    type Err = CodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(PolicyVariant::Strict),
            "permissive" | "loose" => Ok(PolicyVariant::Permissive),
            other => Err(CodingError::Parse {
                field: "policy variant",
                value: other.to_string(),
            }),
        }
    }
}

/// Per-term score floor, as a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionRule {
    /// Threshold adjusted by term length: -10 from 15 characters, -5 from
    /// 10 characters, +5 below that.
    Dynamic,
    Fixed(u8),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConfig {
    pub vocabulary_type: VocabularyType,
    /// Hard floor on the final confidence, in [0, 1].
    pub confidence_threshold: f64,
    pub max_results: usize,
    pub min_term_length: usize,
    pub top_n_per_term: usize,
    pub admission: AdmissionRule,
    /// Every significant term word must occur as a whole word in the
    /// reference text before it is scored.
    pub require_word_overlap: bool,
    pub stoplist: Vec<String>,
    pub strategies: Vec<SimilarityStrategy>,
    pub enable_fuzzy: bool,
}

impl PolicyConfig {
    pub fn strict(vocabulary_type: VocabularyType) -> Self {
        let stoplist = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        match vocabulary_type {
            VocabularyType::Diagnosis => Self {
                vocabulary_type,
                confidence_threshold: 0.75,
                max_results: 5,
                min_term_length: 5,
                top_n_per_term: 1,
                admission: AdmissionRule::Dynamic,
                require_word_overlap: true,
                stoplist: stoplist(DIAGNOSIS_STOPLIST),
                strategies: SimilarityStrategy::CANONICAL.to_vec(),
                enable_fuzzy: true,
            },
            VocabularyType::Procedure => Self {
                vocabulary_type,
                confidence_threshold: 0.70,
                max_results: 5,
                min_term_length: 3,
                top_n_per_term: 1,
                admission: AdmissionRule::Fixed(70),
                require_word_overlap: false,
                stoplist: stoplist(PROCEDURE_STOPLIST),
                strategies: SimilarityStrategy::CANONICAL.to_vec(),
                enable_fuzzy: true,
            },
            VocabularyType::Concept => Self {
                vocabulary_type,
                confidence_threshold: 0.75,
                max_results: 5,
                min_term_length: 4,
                top_n_per_term: 2,
                admission: AdmissionRule::Fixed(75),
                require_word_overlap: false,
                stoplist: stoplist(CONCEPT_STOPLIST),
                strategies: vec![SimilarityStrategy::TokenSort, SimilarityStrategy::Ratio],
                enable_fuzzy: true,
            },
        }
    }

    pub fn permissive(vocabulary_type: VocabularyType) -> Self {
        let strict = Self::strict(vocabulary_type);
        match vocabulary_type {
            VocabularyType::Diagnosis => Self {
                confidence_threshold: 0.65,
                min_term_length: 4,
                top_n_per_term: 2,
                require_word_overlap: false,
                ..strict
            },
            VocabularyType::Procedure => Self {
                top_n_per_term: 2,
                ..strict
            },
            VocabularyType::Concept => strict,
        }
    }

    pub fn for_variant(variant: PolicyVariant, vocabulary_type: VocabularyType) -> Self {
        match variant {
            PolicyVariant::Strict => Self::strict(vocabulary_type),
            PolicyVariant::Permissive => Self::permissive(vocabulary_type),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        if let AdmissionRule::Fixed(_) = self.admission {
            self.admission = AdmissionRule::Fixed(threshold_percent(threshold));
        }
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_fuzzy(mut self, enable_fuzzy: bool) -> Self {
        self.enable_fuzzy = enable_fuzzy;
        self
    }

    fn validate(&self) -> Result<(), CodingError> {
        let name = self.vocabulary_type;
        if !self.confidence_threshold.is_finite()
            || !(0.0..=1.0).contains(&self.confidence_threshold)
        {
            return Err(CodingError::Configuration(format!(
                "{} confidence threshold {} is outside [0, 1]",
                name, self.confidence_threshold
            )));
        }
        if self.max_results == 0 {
            return Err(CodingError::Configuration(format!(
                "{} max results must be at least 1",
                name
            )));
        }
        if self.top_n_per_term == 0 {
            return Err(CodingError::Configuration(format!(
                "{} per-term cap must be at least 1",
                name
            )));
        }
        if let AdmissionRule::Fixed(floor) = self.admission {
            if floor > 100 {
                return Err(CodingError::Configuration(format!(
                    "{} score floor {} exceeds 100",
                    name, floor
                )));
            }
        }
        if self.strategies.is_empty() {
            return Err(CodingError::Configuration(format!(
                "{} policy needs at least one similarity strategy",
                name
            )));
        }
        Ok(())
    }
}

fn threshold_percent(threshold: f64) -> u8 {
    (threshold.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// One scored reference entry for a single term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermCandidate {
    pub internal_id: EntryId,
    pub code: String,
    pub display_text: String,
    /// 0-100.
    pub score: u8,
}

/// Best score first; ties by code, then internal id.
fn rank(a: &TermCandidate, b: &TermCandidate) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.code.cmp(&b.code))
        .then_with(|| a.internal_id.cmp(&b.internal_id))
}

#[derive(Debug, Clone)]
pub struct MatchingPolicy {
    config: PolicyConfig,
    scorer: SimilarityScorer,
    stoplist: HashSet<String>,
}

impl MatchingPolicy {
    pub fn new(config: PolicyConfig) -> Result<Self, CodingError> {
        config.validate()?;
        let scorer = SimilarityScorer::new(config.strategies.iter().copied());
        let stoplist = config.stoplist.iter().map(|s| s.to_lowercase()).collect();
        Ok(Self {
            config,
            scorer,
            stoplist,
        })
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn vocabulary_type(&self) -> VocabularyType {
        self.config.vocabulary_type
    }

    /// Score a term must reach to be kept for it, as a percentage.
    pub fn term_floor(&self, term: &str) -> u8 {
        match self.config.admission {
            AdmissionRule::Fixed(floor) => floor,
            AdmissionRule::Dynamic => {
                let base = i32::from(threshold_percent(self.config.confidence_threshold));
                let len = term.chars().count();
                let adjusted = if len >= 15 {
                    base - 10
                } else if len >= 10 {
                    base - 5
                } else {
                    base + 5
                };
                adjusted.clamp(0, 100) as u8
            }
        }
    }

    /// Length, stoplist and domain-relevance filter for a single term.
    pub fn admits_term(&self, term: &str) -> bool {
        if term.chars().count() < self.config.min_term_length {
            return false;
        }
        if self.stoplist.contains(term) {
            return false;
        }
        match self.config.vocabulary_type {
            VocabularyType::Diagnosis => {
                has_diagnostic_suffix(term)
                    || COMMON_CONDITIONS.contains(&term)
                    || RECOGNIZED_CONDITIONS.contains(&term)
            }
            VocabularyType::Procedure => {
                contains_any(term, VALID_PROCEDURE_TERMS) || contains_any(term, SPECIFIC_PROCEDURES)
            }
            VocabularyType::Concept => {
                contains_any(term, MEDICAL_INDICATORS)
                    || (term.chars().count() >= 6 && term.chars().any(char::is_alphabetic))
            }
        }
    }

    /// Terms that survive filtering. When no procedure term survives but a
    /// raw term mentions a visit, the generic office-visit term stands in.
    pub fn admitted_terms(&self, terms: &[ExtractedTerm]) -> Vec<ExtractedTerm> {
        let mut admitted: Vec<ExtractedTerm> = terms
            .iter()
            .filter(|t| self.admits_term(&t.text))
            .cloned()
            .collect();

        if admitted.is_empty() && self.config.vocabulary_type == VocabularyType::Procedure {
            if let Some(source) = terms
                .iter()
                .find(|t| contains_any(&t.text, VISIT_FALLBACK_MARKERS))
            {
                debug!(
                    "No procedure term survived filtering; '{}' implies an office visit",
                    source.text
                );
                admitted.push(ExtractedTerm::new(VISIT_FALLBACK_TERM, source.section));
            }
        }
        admitted
    }

    /// Top candidates for one term, best first.
    pub fn score_term(&self, term: &str, entries: &[&VocabularyEntry]) -> Vec<TermCandidate> {
        let floor = self.term_floor(term);
        let term_words: Vec<&str> = term.split_whitespace().collect();

        let mut candidates: Vec<TermCandidate> = entries
            .iter()
            .filter_map(|entry| {
                if self.config.require_word_overlap
                    && !entry.match_texts().any(|text| has_word_overlap(&term_words, text))
                {
                    return None;
                }
                let score = entry
                    .match_texts()
                    .map(|text| self.scorer.score_percent(term, text))
                    .max()
                    .unwrap_or(0);
                (score > 0 && score >= floor).then(|| TermCandidate {
                    internal_id: entry.internal_id,
                    code: entry.code.clone(),
                    display_text: entry.display_text.clone(),
                    score,
                })
            })
            .collect();

        candidates.sort_by(rank);
        candidates.truncate(self.config.top_n_per_term);
        candidates
    }

    /// Global dedup by code over all per-term candidates, hard confidence
    /// floor, result cap.
    pub fn finalize(
        &self,
        scored: Vec<(ExtractedTerm, Arc<Vec<TermCandidate>>)>,
    ) -> Vec<CodeMatch> {
        let mut pool: Vec<(&ExtractedTerm, &TermCandidate)> = scored
            .iter()
            .flat_map(|(term, candidates)| candidates.iter().map(move |c| (term, c)))
            .collect();
        pool.sort_by(|(ta, a), (tb, b)| rank(a, b).then_with(|| ta.text.cmp(&tb.text)));

        let floor = self.config.confidence_threshold * 100.0;
        let mut seen: HashSet<&str> = HashSet::new();
        let mut matches = Vec::new();
        for (term, candidate) in pool {
            if matches.len() >= self.config.max_results {
                break;
            }
            if f64::from(candidate.score) + 1e-9 < floor {
                continue;
            }
            if !seen.insert(candidate.code.as_str()) {
                continue;
            }
            matches.push(CodeMatch {
                vocabulary_type: self.config.vocabulary_type,
                internal_id: candidate.internal_id,
                code: candidate.code.clone(),
                display_text: candidate.display_text.clone(),
                confidence: f64::from(candidate.score) / 100.0,
                matched_text: term.text.clone(),
                section: self.config.vocabulary_type.provenance_tag().to_string(),
                source_section: Some(term.section),
            });
        }
        matches
    }

    /// Full pass for one vocabulary, reusing cached per-term candidates when
    /// a cache is given. `generation` must name the store the entries came
    /// from and the policy set this policy belongs to.
    pub fn run(
        &self,
        terms: &[ExtractedTerm],
        entries: &[&VocabularyEntry],
        cache: Option<(&TermMatchCache, CacheGeneration)>,
    ) -> (Vec<CodeMatch>, VocabularyMatchStats) {
        let mut stats = VocabularyMatchStats {
            terms_offered: terms.len(),
            ..VocabularyMatchStats::default()
        };
        if !self.config.enable_fuzzy || entries.is_empty() || terms.is_empty() {
            return (Vec::new(), stats);
        }

        let admitted = self.admitted_terms(terms);
        stats.terms_admitted = admitted.len();

        let mut scored = Vec::with_capacity(admitted.len());
        for term in admitted {
            let cached = cache.and_then(|(cache, generation)| {
                cache.get(generation, self.config.vocabulary_type, &term.text)
            });
            let candidates = match cached {
                Some(candidates) => {
                    stats.cache_hits += 1;
                    candidates
                }
                None => {
                    stats.candidates_scored += entries.len();
                    let candidates = Arc::new(self.score_term(&term.text, entries));
                    if let Some((cache, generation)) = cache {
                        cache.put(
                            generation,
                            self.config.vocabulary_type,
                            &term.text,
                            Arc::clone(&candidates),
                        );
                    }
                    candidates
                }
            };
            scored.push((term, candidates));
        }

        let matches = self.finalize(scored);
        stats.matches = matches.len();
        (matches, stats)
    }

    /// Matches `terms` against `entries` without caching.
    pub fn match_terms(
        &self,
        terms: &[ExtractedTerm],
        entries: &[&VocabularyEntry],
    ) -> Vec<CodeMatch> {
        self.run(terms, entries, None).0
    }
}

/// Single-word terms need a whole-word hit; longer terms need every word
/// over two characters.
fn has_word_overlap(term_words: &[&str], reference: &str) -> bool {
    let reference_words: HashSet<&str> = reference
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|w| !w.is_empty())
        .collect();
    match term_words {
        [] => false,
        [single] => reference_words.contains(single),
        words => words
            .iter()
            .filter(|w| w.chars().count() > 2)
            .all(|w| reference_words.contains(w)),
    }
}

/// The three per-vocabulary policies in use at one time.
#[derive(Debug, Clone)]
pub struct PolicySet {
    diagnosis: MatchingPolicy,
    procedure: MatchingPolicy,
    concept: MatchingPolicy,
}

impl PolicySet {
    pub fn new(
        diagnosis: MatchingPolicy,
        procedure: MatchingPolicy,
        concept: MatchingPolicy,
    ) -> Result<Self, CodingError> {
        for (expected, policy) in [
            (VocabularyType::Diagnosis, &diagnosis),
            (VocabularyType::Procedure, &procedure),
            (VocabularyType::Concept, &concept),
        ] {
            if policy.vocabulary_type() != expected {
                return Err(CodingError::Configuration(format!(
                    "{} policy supplied for the {} slot",
                    policy.vocabulary_type(),
                    expected
                )));
            }
        }
        Ok(Self {
            diagnosis,
            procedure,
            concept,
        })
    }

    pub fn variant(variant: PolicyVariant) -> Result<Self, CodingError> {
        Self::new(
            MatchingPolicy::new(PolicyConfig::for_variant(variant, VocabularyType::Diagnosis))?,
            MatchingPolicy::new(PolicyConfig::for_variant(variant, VocabularyType::Procedure))?,
            MatchingPolicy::new(PolicyConfig::for_variant(variant, VocabularyType::Concept))?,
        )
    }

    pub fn strict() -> Result<Self, CodingError> {
        Self::variant(PolicyVariant::Strict)
    }

    /// Applies configured thresholds, caps and the fuzzy switch on top of
    /// the chosen variant. The permissive variant keeps its diagnosis
    /// threshold 0.10 below the configured one.
    pub fn from_config(config: &CodingConfig) -> Result<Self, CodingError> {
        let diagnosis_threshold = match config.policy_variant {
            PolicyVariant::Strict => config.confidence_threshold,
            PolicyVariant::Permissive => (config.confidence_threshold - 0.10).max(0.0),
        };
        let build = |vocabulary: VocabularyType, threshold: f64| {
            MatchingPolicy::new(
                PolicyConfig::for_variant(config.policy_variant, vocabulary)
                    .with_threshold(threshold)
                    .with_max_results(config.max_codes_per_type)
                    .with_fuzzy(config.enable_fuzzy),
            )
        };
        Self::new(
            build(VocabularyType::Diagnosis, diagnosis_threshold)?,
            build(VocabularyType::Procedure, config.procedure_threshold)?,
            build(VocabularyType::Concept, config.concept_threshold)?,
        )
    }

    pub fn get(&self, vocabulary: VocabularyType) -> &MatchingPolicy {
        match vocabulary {
            VocabularyType::Diagnosis => &self.diagnosis,
            VocabularyType::Procedure => &self.procedure,
            VocabularyType::Concept => &self.concept,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::core::NoteSection;
    use crate::vocabulary::source::VocabularyRow;
    use crate::vocabulary::store::VocabularyStore;

    fn terms(texts: &[&str]) -> Vec<ExtractedTerm> {
        texts
            .iter()
            .map(|t| ExtractedTerm::new(*t, NoteSection::Assessment))
            .collect()
    }

    fn diagnosis_store() -> VocabularyStore {
        VocabularyStore::from_rows([(
            VocabularyType::Diagnosis,
            vec![
                VocabularyRow::new(1, "I10", "Essential (primary) hypertension"),
                VocabularyRow::new(2, "I15.9", "Secondary hypertension, unspecified"),
                VocabularyRow::new(3, "R51.9", "Headache, unspecified"),
                VocabularyRow::new(4, "J20.9", "Acute bronchitis, unspecified"),
                VocabularyRow::new(5, "E11.9", "Type 2 diabetes mellitus without complications"),
            ],
        )])
    }

    fn strict(vocabulary: VocabularyType) -> MatchingPolicy {
        MatchingPolicy::new(PolicyConfig::strict(vocabulary)).unwrap()
    }

    #[test]
    fn test_invalid_configuration_fails_fast() {
        let negative = PolicyConfig::strict(VocabularyType::Diagnosis).with_threshold(-0.1);
        assert!(matches!(MatchingPolicy::new(negative), Err(CodingError::Configuration(_))));

        let zero_cap = PolicyConfig::strict(VocabularyType::Procedure).with_max_results(0);
        assert!(matches!(MatchingPolicy::new(zero_cap), Err(CodingError::Configuration(_))));

        let mut no_strategies = PolicyConfig::strict(VocabularyType::Concept);
        no_strategies.strategies.clear();
        assert!(MatchingPolicy::new(no_strategies).is_err());

        let swapped = PolicySet::new(
            strict(VocabularyType::Procedure),
            strict(VocabularyType::Procedure),
            strict(VocabularyType::Concept),
        );
        assert!(swapped.is_err());
    }

    #[test]
    fn test_dynamic_floor_by_term_length() {
        let policy = strict(VocabularyType::Diagnosis);
        assert_eq!(policy.term_floor("asthma"), 80);
        assert_eq!(policy.term_floor("hypertension"), 70);
        assert_eq!(policy.term_floor("congestive heart failure"), 65);
        assert_eq!(strict(VocabularyType::Procedure).term_floor("ekg"), 70);
    }

    #[test]
    fn test_min_length_boundary() {
        // Diagnosis minimum is five characters.
        let policy = strict(VocabularyType::Diagnosis);
        assert!(policy.admits_term("fever"));
        assert!(!policy.admits_term("copd"));

        let mut config = PolicyConfig::strict(VocabularyType::Diagnosis);
        config.min_term_length = 6;
        let policy = MatchingPolicy::new(config).unwrap();
        assert!(policy.admits_term("asthma"));
        assert!(!policy.admits_term("fever"));

        // Concept minimum is four characters.
        let concept = strict(VocabularyType::Concept);
        assert!(concept.admits_term("drug"));
        assert!(!concept.admits_term("ekg"));
        assert!(concept.admits_term("ekgs heart"));
        assert!(concept.admits_term("hypertension"));
    }

    #[test]
    fn test_stoplist_and_relevance() {
        let policy = strict(VocabularyType::Diagnosis);
        assert!(!policy.admits_term("condition"));
        assert!(!policy.admits_term("follow up in clinic"));
        assert!(policy.admits_term("acute bronchitis"));
        assert!(policy.admits_term("type 2 diabetes"));

        let procedure = strict(VocabularyType::Procedure);
        assert!(!procedure.admits_term("visit"));
        assert!(procedure.admits_term("ekg"));
        assert!(procedure.admits_term("office visit"));
        assert!(!procedure.admits_term("follow up"));

        let concept = strict(VocabularyType::Concept);
        assert!(!concept.admits_term("disorder"));
    }

    #[test]
    fn test_procedure_fallback_injects_office_visit() {
        let policy = strict(VocabularyType::Procedure);
        let admitted = policy.admitted_terms(&terms(&["follow up", "exam"]));
        assert_eq!(admitted, vec![ExtractedTerm::new("office visit", NoteSection::Assessment)]);

        assert!(policy.admitted_terms(&terms(&["monitoring"])).is_empty());
        // No fallback for other vocabularies.
        assert!(strict(VocabularyType::Diagnosis)
            .admitted_terms(&terms(&["follow up"]))
            .is_empty());
    }

    #[test]
    fn test_word_overlap_gate() {
        assert!(has_word_overlap(&["hypertension"], "essential (primary) hypertension"));
        assert!(!has_word_overlap(&["tension"], "essential (primary) hypertension"));
        assert!(has_word_overlap(
            &["type", "2", "diabetes"],
            "type 2 diabetes mellitus without complications"
        ));
        assert!(!has_word_overlap(&["heart", "failure"], "heart disease"));
    }

    #[test]
    fn test_hypertension_matches_with_full_confidence() {
        let store = diagnosis_store();
        let entries: Vec<_> = store.lookup(VocabularyType::Diagnosis).collect();
        let policy = strict(VocabularyType::Diagnosis);
        let matches = policy.match_terms(&terms(&["hypertension", "headache"]), &entries);

        let hypertension = matches.iter().find(|m| m.matched_text == "hypertension").unwrap();
        // Both hypertension codes score 100; the lower code wins the tie.
        assert_eq!(hypertension.code, "I10");
        assert_eq!(hypertension.confidence, 1.0);
        assert_eq!(hypertension.section, "diagnosis");
        assert!(matches.iter().any(|m| m.code == "R51.9"));
        assert!(matches.iter().all(|m| m.code != "I15.9"));
    }

    #[test]
    fn test_identical_scores_yield_single_lowest_code() {
        let store = VocabularyStore::from_rows([(
            VocabularyType::Procedure,
            vec![
                VocabularyRow::new(20, "93010", "Electrocardiogram ekg"),
                VocabularyRow::new(10, "93000", "Electrocardiogram ekg"),
            ],
        )]);
        let entries: Vec<_> = store.lookup(VocabularyType::Procedure).collect();
        let mut config = PolicyConfig::strict(VocabularyType::Procedure);
        config.top_n_per_term = 2;
        let policy = MatchingPolicy::new(config).unwrap();

        let matches = policy.match_terms(&terms(&["ekg", "electrocardiogram"]), &entries);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].code, "93000");
        assert_eq!(matches[1].code, "93010");

        let strict_matches =
            strict(VocabularyType::Procedure).match_terms(&terms(&["ekg"]), &entries);
        assert_eq!(strict_matches.len(), 1);
        assert_eq!(strict_matches[0].code, "93000");
    }

    #[test]
    fn test_final_floor_is_a_hard_cut() {
        let store = diagnosis_store();
        let entries: Vec<_> = store.lookup(VocabularyType::Diagnosis).collect();
        let mut config = PolicyConfig::strict(VocabularyType::Diagnosis);
        config.admission = AdmissionRule::Fixed(1);
        config.require_word_overlap = false;
        config.top_n_per_term = 5;
        let policy = MatchingPolicy::new(config).unwrap();

        let candidates = policy.score_term("hypertension", &entries);
        assert!(candidates.iter().any(|c| c.score < 75));
        let matches = policy.match_terms(&terms(&["hypertension"]), &entries);
        assert!(!matches.is_empty());
        assert!(matches.len() < candidates.len());
        assert!(matches.iter().all(|m| m.confidence >= 0.75));
    }

    #[test]
    fn test_results_are_capped_and_deduplicated() {
        let rows: Vec<VocabularyRow> = (0..12)
            .map(|i| VocabularyRow::new(i, format!("C{:02}", i), "Acute bronchitis"))
            .collect();
        let store = VocabularyStore::from_rows([(VocabularyType::Concept, rows)]);
        let entries: Vec<_> = store.lookup(VocabularyType::Concept).collect();
        let mut config = PolicyConfig::strict(VocabularyType::Concept).with_max_results(3);
        config.top_n_per_term = 12;
        let policy = MatchingPolicy::new(config).unwrap();

        let matches = policy.match_terms(
            &terms(&["acute bronchitis", "bronchitis acute", "chronic bronchitis", "bronchitis"]),
            &entries,
        );
        assert_eq!(matches.len(), 3);
        let codes: HashSet<_> = matches.iter().map(|m| m.code.as_str()).collect();
        assert_eq!(codes.len(), matches.len());
        assert!(matches.iter().all(|m| (0.75..=1.0).contains(&m.confidence)));
    }

    #[test]
    fn test_fuzzy_disabled_and_empty_vocabulary() {
        let store = diagnosis_store();
        let entries: Vec<_> = store.lookup(VocabularyType::Diagnosis).collect();
        let disabled = MatchingPolicy::new(
            PolicyConfig::strict(VocabularyType::Diagnosis).with_fuzzy(false),
        )
        .unwrap();
        assert!(disabled.match_terms(&terms(&["hypertension"]), &entries).is_empty());
        assert!(strict(VocabularyType::Diagnosis)
            .match_terms(&terms(&["hypertension"]), &[])
            .is_empty());
    }

    #[test]
    fn test_cache_reuses_term_candidates() {
        let store = diagnosis_store();
        let entries: Vec<_> = store.lookup(VocabularyType::Diagnosis).collect();
        let policy = strict(VocabularyType::Diagnosis);
        let cache = TermMatchCache::new(16).unwrap();
        let generation = CacheGeneration::new(7, 0);
        let hypertension = terms(&["hypertension"]);

        let (first, stats) = policy.run(&hypertension, &entries, Some((&cache, generation)));
        assert_eq!(stats.cache_hits, 0);
        assert_eq!(stats.candidates_scored, entries.len());
        let (second, stats) = policy.run(&hypertension, &entries, Some((&cache, generation)));
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.candidates_scored, 0);
        assert_eq!(first, second);

        let next_policy = CacheGeneration::new(7, 1);
        let (_, stats) = policy.run(&hypertension, &entries, Some((&cache, next_policy)));
        assert_eq!(stats.cache_hits, 0);
    }

    #[test]
    fn test_permissive_variant_knobs() {
        let permissive = PolicyConfig::permissive(VocabularyType::Diagnosis);
        assert_eq!(permissive.top_n_per_term, 2);
        assert!(!permissive.require_word_overlap);
        let strict_threshold = PolicyConfig::strict(VocabularyType::Diagnosis).confidence_threshold;
        assert!(permissive.confidence_threshold < strict_threshold);
        assert_eq!("Permissive".parse::<PolicyVariant>().unwrap(), PolicyVariant::Permissive);
        assert!("lenient".parse::<PolicyVariant>().is_err());

        let config = CodingConfig {
            policy_variant: PolicyVariant::Permissive,
            max_codes_per_type: 3,
            ..CodingConfig::default()
        };
        let set = PolicySet::from_config(&config).unwrap();
        let diagnosis = set.get(VocabularyType::Diagnosis).config();
        assert!((diagnosis.confidence_threshold - 0.65).abs() < 1e-9);
        assert_eq!(diagnosis.max_results, 3);
        assert_eq!(
            set.get(VocabularyType::Procedure).config().admission,
            AdmissionRule::Fixed(70)
        );
    }
}
