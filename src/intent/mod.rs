//! Intent detection for incoming questions.
//!
//! A query is routed to the motivational coaching prompt when any pattern of
//! the motivation lexicon matches its lower-cased text. Patterns are regular
//! expressions and are expected to carry `\b` word boundaries so that a
//! lexicon word buried inside a longer token does not trigger.

use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};

use crate::core::errors::ConfigError;

/// Built-in lexicon, used when `intent.motivation_patterns` is not configured.
pub const DEFAULT_MOTIVATION_PATTERNS: [&str; 11] = [
    r"\bmotivasi\b",
    r"\binspirasi\b",
    r"\bsemangat\b",
    r"\bdown\b",
    r"\bcapek\b",
    r"\bburnout\b",
    r"\bditolak\b",
    r"\breject\b",
    r"\btarget\b",
    r"\bclosing\b",
    r"\bstuck\b",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Standard,
    Motivational,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Standard => "standard",
            Intent::Motivational => "motivational",
        }
    }
}

/// Stateless classifier over a fixed pattern set.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    patterns: RegexSet,
}

impl IntentClassifier {
    pub fn new<I, S>(patterns: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = patterns
            .into_iter()
            .map(|p| p.as_ref().to_string())
            .collect();

        // Compile one by one first so the error names the offending pattern.
        for pattern in &patterns {
            Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
        }

        let patterns = RegexSet::new(&patterns).map_err(|e| ConfigError::InvalidPattern {
            pattern: patterns.join(" | "),
            reason: e.to_string(),
        })?;

        Ok(Self { patterns })
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn classify(&self, query: &str) -> Intent {
        let lowered = query.to_lowercase();
        if self.patterns.is_match(&lowered) {
            Intent::Motivational
        } else {
            Intent::Standard
        }
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        let patterns = RegexSet::new(DEFAULT_MOTIVATION_PATTERNS)
            .expect("built-in motivation patterns are valid regular expressions");
        Self { patterns }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motivational_vocabulary_is_detected() {
        let classifier = IntentClassifier::default();

        assert_eq!(
            classifier.classify("saya capek ditolak terus"),
            Intent::Motivational
        );
        assert_eq!(
            classifier.classify("saya down karena target belum capai"),
            Intent::Motivational
        );
        assert_eq!(classifier.classify("Butuh MOTIVASI dong"), Intent::Motivational);
        assert_eq!(classifier.classify("lagi burnout."), Intent::Motivational);
        assert_eq!(classifier.classify("stuck di closing"), Intent::Motivational);
    }

    #[test]
    fn product_questions_are_standard() {
        let classifier = IntentClassifier::default();

        assert_eq!(
            classifier.classify("apa syarat kartu kredit Mandiri?"),
            Intent::Standard
        );
        assert_eq!(
            classifier.classify("Apa manfaat tabungan Mandiri?"),
            Intent::Standard
        );
    }

    #[test]
    fn empty_query_is_standard() {
        let classifier = IntentClassifier::default();
        assert_eq!(classifier.classify(""), Intent::Standard);
        assert_eq!(classifier.classify("   "), Intent::Standard);
    }

    #[test]
    fn lexicon_words_inside_longer_tokens_do_not_match() {
        let classifier = IntentClassifier::default();

        assert_eq!(classifier.classify("motivasinya apa ya"), Intent::Standard);
        assert_eq!(classifier.classify("download formulir"), Intent::Standard);
        assert_eq!(classifier.classify("targeting nasabah"), Intent::Standard);
        assert_eq!(classifier.classify("rejected"), Intent::Standard);
    }

    #[test]
    fn punctuation_counts_as_a_boundary() {
        let classifier = IntentClassifier::default();
        assert_eq!(classifier.classify("(motivasi)"), Intent::Motivational);
        assert_eq!(classifier.classify("target, tolong"), Intent::Motivational);
    }

    #[test]
    fn classification_is_repeatable() {
        let classifier = IntentClassifier::default();
        for query in ["saya capek", "syarat KPR", ""] {
            assert_eq!(classifier.classify(query), classifier.classify(query));
        }
    }

    #[test]
    fn custom_lexicon_replaces_defaults() {
        let classifier = IntentClassifier::new([r"\blelah\b"]).expect("valid pattern");

        assert_eq!(classifier.pattern_count(), 1);
        assert_eq!(classifier.classify("saya lelah"), Intent::Motivational);
        assert_eq!(classifier.classify("saya capek"), Intent::Standard);
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = IntentClassifier::new([r"\bok\b", r"(unclosed"]).unwrap_err();
        match err {
            ConfigError::InvalidPattern { pattern, .. } => assert_eq!(pattern, "(unclosed"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn default_matches_configured_defaults() {
        let configured =
            IntentClassifier::new(DEFAULT_MOTIVATION_PATTERNS).expect("defaults compile");
        assert_eq!(
            configured.pattern_count(),
            IntentClassifier::default().pattern_count()
        );
    }
}
