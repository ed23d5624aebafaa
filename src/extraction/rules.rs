// src/extraction/rules.rs
use once_cell::sync::Lazy;
use regex::Regex;

use super::dictionaries::{
    DIAGNOSTIC_SUFFIXES, PROCEDURE_PATTERNS, SENTENCE_KEYWORDS,
};
use crate::error::CodingError;

/// One lexical strategy for pulling candidate terms out of section text.
///
/// Rules receive lower-cased, whitespace-collapsed text and push raw
/// candidates; the extractor normalizes and deduplicates them.
pub trait ExtractionRule: Send + Sync {
    fn name(&self) -> &str;

    fn extract(&self, text: &str, out: &mut Vec<String>);
}

static DIAGNOSTIC_SUFFIX_REGEX: Lazy<Regex> = Lazy::new(|| {
    build_suffix_regex(DIAGNOSTIC_SUFFIXES).expect("diagnostic suffix pattern is valid")
});

static PROCEDURE_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    PROCEDURE_PATTERNS
        .iter()
        .map(|p| Regex::new(p).expect("procedure pattern is valid"))
        .collect()
});

fn build_suffix_regex(suffixes: &[&str]) -> Result<Regex, regex::Error> {
    let alternatives: Vec<String> = suffixes.iter().map(|s| regex::escape(s)).collect();
    Regex::new(&format!(r"\b[a-z]+(?:{})\b", alternatives.join("|")))
}

/// Whole words ending in one of the configured suffixes.
pub struct SuffixPatternRule {
    regex: Regex,
}

impl SuffixPatternRule {
    pub fn new(suffixes: &[&str]) -> Result<Self, CodingError> {
        let regex = build_suffix_regex(suffixes)
            .map_err(|e| CodingError::Configuration(format!("suffix pattern: {}", e)))?;
        Ok(Self { regex })
    }

    /// Disease-naming morphology (-itis, -osis, -opathy, ...).
    pub fn diagnostic() -> Self {
        Self {
            regex: DIAGNOSTIC_SUFFIX_REGEX.clone(),
        }
    }
}

impl ExtractionRule for SuffixPatternRule {
    fn name(&self) -> &str {
        "suffix_pattern"
    }

    fn extract(&self, text: &str, out: &mut Vec<String>) {
        out.extend(self.regex.find_iter(text).map(|m| m.as_str().to_string()));
    }
}

/// Every dictionary phrase found as a substring contributes itself.
pub struct PhraseDictionaryRule {
    name: &'static str,
    phrases: Vec<String>,
}

impl PhraseDictionaryRule {
    pub fn new(name: &'static str, phrases: &[&str]) -> Self {
        Self {
            name,
            phrases: phrases.iter().map(|p| p.to_lowercase()).collect(),
        }
    }
}

impl ExtractionRule for PhraseDictionaryRule {
    fn name(&self) -> &str {
        self.name
    }

    fn extract(&self, text: &str, out: &mut Vec<String>) {
        out.extend(
            self.phrases
                .iter()
                .filter(|phrase| text.contains(phrase.as_str()))
                .cloned(),
        );
    }
}

/// Short sentences mentioning a keyword are taken whole.
pub struct SentenceHeuristicRule {
    keywords: Vec<String>,
    min_words: usize,
    max_words: usize,
}

impl SentenceHeuristicRule {
    pub fn new(keywords: &[&str], min_words: usize, max_words: usize) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            min_words,
            max_words,
        }
    }

    pub fn diagnostic() -> Self {
        Self::new(SENTENCE_KEYWORDS, 2, 5)
    }
}

impl ExtractionRule for SentenceHeuristicRule {
    fn name(&self) -> &str {
        "sentence_heuristic"
    }

    fn extract(&self, text: &str, out: &mut Vec<String>) {
        for sentence in text.split(|c| matches!(c, '.' | '!' | '?')) {
            let sentence = sentence.trim();
            let words = sentence.split_whitespace().count();
            if words < self.min_words || words > self.max_words {
                continue;
            }
            if self.keywords.iter().any(|k| sentence.contains(k.as_str())) {
                out.push(sentence.to_string());
            }
        }
    }
}

/// Regex spans: capture group 1 when the pattern has one, else the whole
/// match. Spans of `min_len` characters or fewer are dropped.
pub struct RegexCaptureRule {
    regexes: Vec<Regex>,
    min_len: usize,
}

impl RegexCaptureRule {
    pub fn new(patterns: &[&str], min_len: usize) -> Result<Self, CodingError> {
        let regexes = patterns
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| CodingError::Configuration(format!("pattern '{}': {}", p, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { regexes, min_len })
    }

    /// Ordering and planning verbs, follow-up and evaluation language.
    pub fn procedure() -> Self {
        Self {
            regexes: PROCEDURE_REGEXES.clone(),
            min_len: 3,
        }
    }
}

impl ExtractionRule for RegexCaptureRule {
    fn name(&self) -> &str {
        "regex_capture"
    }

    fn extract(&self, text: &str, out: &mut Vec<String>) {
        for regex in &self.regexes {
            for caps in regex.captures_iter(text) {
                let span = caps.get(1).or_else(|| caps.get(0));
                if let Some(span) = span {
                    let span = span.as_str().trim();
                    if span.chars().count() > self.min_len {
                        out.push(span.to_string());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(rule: &dyn ExtractionRule, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        rule.extract(text, &mut out);
        out
    }

    #[test]
    fn test_suffix_rule_matches_whole_words() {
        let rule = SuffixPatternRule::diagnostic();
        let terms = run(&rule, "acute bronchitis with myalgia and anemia; itis alone");
        assert_eq!(terms, vec!["bronchitis", "myalgia", "anemia"]);
    }

    #[test]
    fn test_custom_suffix_rule() {
        let rule = SuffixPatternRule::new(&["oma"]).unwrap();
        assert_eq!(run(&rule, "history of melanoma"), vec!["melanoma"]);
    }

    #[test]
    fn test_dictionary_rule_substring() {
        let rule = PhraseDictionaryRule::new("conditions", &["chest pain", "fever"]);
        assert_eq!(run(&rule, "intermittent chest pain, no fever"), vec!["chest pain", "fever"]);
        assert!(run(&rule, "no complaints").is_empty());
    }

    #[test]
    fn test_sentence_rule_word_window() {
        let rule = SentenceHeuristicRule::diagnostic();
        let terms = run(
            &rule,
            "low back pain. patient has a long history of a chronic pain disorder! pain",
        );
        // The second sentence is too long, the third too short.
        assert_eq!(terms, vec!["low back pain"]);
    }

    #[test]
    fn test_regex_rule_prefers_capture_group() {
        let rule = RegexCaptureRule::procedure();
        let terms = run(&rule, "will order chest x-ray. follow up in 2 weeks");
        assert!(terms.contains(&"chest x-ray".to_string()));
        assert!(terms.contains(&"follow up".to_string()));
        // "ekg" is only three characters and is dropped.
        assert!(!run(&rule, "ekg").contains(&"ekg".to_string()));
    }

    #[test]
    fn test_invalid_pattern_is_configuration_error() {
        assert!(matches!(
            RegexCaptureRule::new(&["(unclosed"], 3),
            Err(CodingError::Configuration(_))
        ));
    }
}
