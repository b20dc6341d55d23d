//! Rule-based signal extraction
//!
//! Each vocabulary check is an independent, case-insensitive substring test.
//! Two exceptions keep the checks from contradicting each other:
//! - short refusal tokens ("no") only count as whole words, so "now" is not
//!   a refusal
//! - an interest term that only appears inside a refusal phrase
//!   ("not interested") does not count as interest

use once_cell::sync::Lazy;
use regex::Regex;
use voice_dialer_config::VocabularyConfig;
use voice_dialer_core::{Motivation, Result, Signals, TextSignalExtractor, Timeline};

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}']+").unwrap());

fn normalize(text: &str) -> String {
    text.to_lowercase().replace('\u{2019}', "'")
}

fn terms(list: &[String]) -> Vec<String> {
    list.iter()
        .map(|t| normalize(t.trim()))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Byte ranges of every occurrence of `term` in `text`
fn spans<'a>(text: &'a str, term: &'a str) -> impl Iterator<Item = (usize, usize)> + 'a {
    text.match_indices(term)
        .map(|(start, found)| (start, start + found.len()))
}

/// Keyword extractor driven by configured vocabularies
#[derive(Debug, Clone)]
pub struct KeywordSignalExtractor {
    interest: Vec<String>,
    hedging: Vec<String>,
    immediacy: Vec<String>,
    deferral: Vec<String>,
    refusal: Vec<String>,
    whole_word_max_len: usize,
}

impl KeywordSignalExtractor {
    pub fn new(vocabulary: &VocabularyConfig) -> Self {
        Self {
            interest: terms(&vocabulary.interest),
            hedging: terms(&vocabulary.hedging),
            immediacy: terms(&vocabulary.immediacy),
            deferral: terms(&vocabulary.deferral),
            refusal: terms(&vocabulary.refusal),
            whole_word_max_len: vocabulary.whole_word_max_len,
        }
    }

    fn contains_any(text: &str, terms: &[String]) -> bool {
        terms.iter().any(|term| text.contains(term.as_str()))
    }

    /// Interest terms outside every refusal phrase that contains them
    fn has_interest(&self, text: &str) -> bool {
        let refused: Vec<(usize, usize)> = self
            .refusal
            .iter()
            .filter(|phrase| self.interest.iter().any(|term| phrase.contains(term.as_str())))
            .flat_map(|phrase| spans(text, phrase))
            .collect();

        self.interest.iter().any(|term| {
            spans(text, term).any(|(start, end)| {
                !refused
                    .iter()
                    .any(|&(r_start, r_end)| r_start <= start && end <= r_end)
            })
        })
    }

    fn has_refusal(&self, text: &str) -> bool {
        let words: Vec<&str> = WORD.find_iter(text).map(|m| m.as_str()).collect();
        self.refusal.iter().any(|term| {
            if term.chars().count() <= self.whole_word_max_len {
                words.contains(&term.as_str())
            } else {
                text.contains(term.as_str())
            }
        })
    }
}

impl Default for KeywordSignalExtractor {
    fn default() -> Self {
        Self::new(&VocabularyConfig::default())
    }
}

impl TextSignalExtractor for KeywordSignalExtractor {
    fn extract(&self, text: &str) -> Result<Signals> {
        let text = normalize(text);

        let motivation = if self.has_interest(&text) {
            Motivation::High
        } else if Self::contains_any(&text, &self.hedging) {
            Motivation::Medium
        } else {
            Motivation::Low
        };

        let timeline = if Self::contains_any(&text, &self.immediacy) {
            Timeline::Now
        } else if Self::contains_any(&text, &self.deferral) {
            Timeline::Later
        } else {
            Timeline::Unknown
        };

        Ok(Signals {
            motivation,
            timeline,
            objection: self.has_refusal(&text),
        })
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str) -> Signals {
        KeywordSignalExtractor::default().extract(text).unwrap()
    }

    #[test]
    fn test_interested_seller_now() {
        let signals = extract("I'm interested and want to sell now");
        assert_eq!(signals.motivation, Motivation::High);
        assert_eq!(signals.timeline, Timeline::Now);
        assert!(!signals.objection);
    }

    #[test]
    fn test_hedging() {
        let signals = extract("maybe later");
        assert_eq!(signals.motivation, Motivation::Medium);
        assert_eq!(signals.timeline, Timeline::Later);
        assert!(!signals.objection);
    }

    #[test]
    fn test_refusal() {
        let signals = extract("no, not interested, I'm busy");
        assert_eq!(signals.motivation, Motivation::Low);
        assert_eq!(signals.timeline, Timeline::Unknown);
        assert!(signals.objection);
    }

    #[test]
    fn test_case_insensitive_and_phrases() {
        let signals = extract("MOTIVATED to close THIS WEEK");
        assert_eq!(signals.motivation, Motivation::High);
        assert_eq!(signals.timeline, Timeline::Now);

        let signals = extract("Next month works");
        assert_eq!(signals.timeline, Timeline::Later);
    }

    #[test]
    fn test_terms_match_inside_words() {
        let signals = extract("we're selling now");
        assert_eq!(signals.motivation, Motivation::High);
        assert_eq!(signals.timeline, Timeline::Now);

        assert_eq!(extract("I'm a seller").motivation, Motivation::High);
    }

    #[test]
    fn test_short_refusal_needs_whole_word() {
        assert!(!extract("I know nowhere else").objection);
        assert!(!extract("sell now").objection);
        assert!(extract("No.").objection);
    }

    #[test]
    fn test_timeline_terms_are_not_negated() {
        let signals = extract("not now, maybe later");
        assert_eq!(signals.timeline, Timeline::Now);
        assert_eq!(signals.motivation, Motivation::Medium);
        assert!(!signals.objection);
    }

    #[test]
    fn test_leading_no_keeps_interest() {
        let signals = extract("no problem, I'm interested");
        assert_eq!(signals.motivation, Motivation::High);
        assert!(signals.objection);

        let signals = extract("no problem I'm interested in selling now");
        assert_eq!(signals.motivation, Motivation::High);
        assert_eq!(signals.timeline, Timeline::Now);

        assert_eq!(extract("no i am interested").motivation, Motivation::High);
    }

    #[test]
    fn test_interest_outside_refusal_phrase_counts() {
        let signals = extract("not interested in waiting, I want to sell");
        assert_eq!(signals.motivation, Motivation::High);
        assert!(signals.objection);
    }

    #[test]
    fn test_empty_and_unknown_text() {
        assert_eq!(extract(""), Signals::default());
        assert_eq!(extract("   ...   "), Signals::default());
        assert_eq!(extract("the weather is lovely"), Signals::default());
    }

    #[test]
    fn test_custom_vocabulary() {
        let vocabulary = VocabularyConfig {
            interest: vec!["ready to move".to_string()],
            ..Default::default()
        };
        let extractor = KeywordSignalExtractor::new(&vocabulary);
        let signals = extractor.extract("We are Ready to Move").unwrap();
        assert_eq!(signals.motivation, Motivation::High);
        assert_eq!(
            extractor.extract("I'm interested").unwrap().motivation,
            Motivation::Low
        );
    }
}
