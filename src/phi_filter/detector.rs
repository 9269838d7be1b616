// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Core PHI detection: detector trait, suppression rules and the regex detector

use std::sync::Arc;

use super::config::{PhiTag, RedactionConfig, Wordlists};
use super::error::Result;
use super::patterns::{compile_patterns, CompiledPatterns, ContextPatterns, RELATIVE_DAY_WORDS};
use super::span::{merge_spans, CharOffsets, Span};

/// A source of typed spans over one text buffer.
///
/// Implementations return merged spans (see [`merge_spans`]) so that an
/// invalid span is reported as an error instead of reaching the redactor.
pub trait SpanDetector: Send + Sync {
    fn detect(&self, text: &str) -> Result<Vec<Span>>;

    /// Name of this detector (for logging/debugging)
    fn name(&self) -> &str;
}

/// Characters trimmed before a match is compared against the wordlists
const TRIM_CHARS: &[char] = &[' ', '.', ',', ':', ';', '"', '\'', '(', ')', '[', ']', '{', '}'];

/// Rules deciding whether a raw match is discarded.
///
/// Shared by every detector so regex and NER spans are judged the same way.
pub struct SuppressionRules {
    wordlists: Arc<Wordlists>,
    context: ContextPatterns,
    min_id_length: usize,
}

impl SuppressionRules {
    pub fn new(wordlists: Arc<Wordlists>, config: &RedactionConfig) -> Result<Self> {
        Ok(Self {
            wordlists,
            context: ContextPatterns::compile()?,
            min_id_length: config.min_id_length,
        })
    }

    /// True when a match tagged `tag` must be dropped.
    ///
    /// `context` is the text surrounding the match (the match included).
    pub fn should_skip(&self, tag: PhiTag, match_text: &str, context: &str) -> bool {
        let lower = match_text.to_lowercase();
        let stripped = lower.trim_matches(TRIM_CHARS);
        if stripped.is_empty() {
            return true;
        }
        if self.wordlists.contains(stripped) {
            return true;
        }

        match tag {
            PhiTag::Date => self.skip_date(lower.trim(), context),
            PhiTag::Id | PhiTag::MedicalRecord => !self.looks_like_identifier(match_text),
            _ => false,
        }
    }

    /// Relative phrases and scheduling context are dropped. The scheduling
    /// check runs before the clinical one, so a date near both is dropped.
    fn skip_date(&self, lower: &str, context: &str) -> bool {
        if self.is_relative_phrase(lower) {
            return true;
        }
        let ctx = context.to_lowercase();
        if self.context.scheduling.is_match(&ctx) {
            return true;
        }
        if self.context.clinical.is_match(&ctx) {
            return false;
        }
        false
    }

    fn is_relative_phrase(&self, lower: &str) -> bool {
        self.context.relative_span.is_match(lower) || RELATIVE_DAY_WORDS.contains(&lower)
    }

    /// Relative phrase as NER models tend to emit them ("a week", "two months")
    pub fn is_spelled_relative_phrase(&self, lower: &str) -> bool {
        self.context.spelled_relative_span.is_match(lower) || self.is_relative_phrase(lower)
    }

    fn looks_like_identifier(&self, match_text: &str) -> bool {
        let has_digit = match_text.chars().any(|c| c.is_ascii_digit());
        let has_alpha = match_text.chars().any(|c| c.is_ascii_alphabetic());
        let core_len = match_text
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_')
            .count();
        has_digit && has_alpha && core_len >= self.min_id_length
    }
}

/// Count ASCII digits in a match
pub fn digit_count(text: &str) -> usize {
    text.chars().filter(|c| c.is_ascii_digit()).count()
}

/// Byte offset just past the character starting at `byte`
fn next_char(text: &str, byte: usize) -> Option<usize> {
    text[byte..].chars().next().map(|c| byte + c.len_utf8())
}

/// Detector driven by the fixed regex rule table
pub struct RegexDetector {
    patterns: CompiledPatterns,
    rules: Arc<SuppressionRules>,
    context_window: usize,
    min_phone_digits: usize,
    log_detections: bool,
}

impl RegexDetector {
    pub fn new(config: &RedactionConfig, rules: Arc<SuppressionRules>) -> Result<Self> {
        Ok(Self {
            patterns: compile_patterns(config)?,
            rules,
            context_window: config.context_window,
            min_phone_digits: config.min_phone_digits,
            log_detections: config.log_detections,
        })
    }

    /// Raw accepted spans, before merging
    fn collect_spans(&self, text: &str) -> Vec<Span> {
        let offsets = CharOffsets::new(text);
        let mut spans = Vec::new();

        // Only rules present in the set can produce matches
        for idx in self.patterns.regex_set.matches(text).iter() {
            let rule = &self.patterns.rules[idx];

            let mut at = 0;
            while let Some(mat) = rule.regex.find_at(text, at) {
                let Some(step) = next_char(text, mat.start()) else {
                    break;
                };
                if !rule.guard.admits(text, mat.start(), mat.end()) {
                    at = if rule.guard.rescans_rejected() {
                        step
                    } else {
                        mat.end().max(step)
                    };
                    continue;
                }
                at = mat.end().max(step);

                let value = mat.as_str();
                if rule.tag == PhiTag::Phone && digit_count(value) < self.min_phone_digits {
                    continue;
                }

                let start = offsets.char_at(mat.start());
                let end = offsets.char_at(mat.end());
                let context = offsets.window(text, start, end, self.context_window);

                if self.rules.should_skip(rule.tag, value, context) {
                    if self.log_detections {
                        tracing::debug!(tag = %rule.tag, start, end, rule = rule.description, "suppressed match");
                    }
                    continue;
                }
                if self.log_detections {
                    tracing::debug!(tag = %rule.tag, start, end, rule = rule.description, "accepted match");
                }
                spans.push(Span::new(rule.tag, start, end, value));
            }
        }

        spans
    }
}

impl SpanDetector for RegexDetector {
    fn detect(&self, text: &str) -> Result<Vec<Span>> {
        merge_spans(text, self.collect_spans(text))
    }

    fn name(&self) -> &str {
        "regex"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector_with(wordlists: Wordlists) -> RegexDetector {
        let config = RedactionConfig::default();
        let rules = SuppressionRules::new(Arc::new(wordlists), &config).unwrap();
        RegexDetector::new(&config, Arc::new(rules)).unwrap()
    }

    fn detector() -> RegexDetector {
        detector_with(Wordlists::default())
    }

    fn tags_of(spans: &[Span]) -> Vec<Vec<PhiTag>> {
        spans.iter().map(|s| s.tags().to_vec()).collect()
    }

    #[test]
    fn test_detect_ssn() {
        let spans = detector().detect("My SSN is 123-45-6789").unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "123-45-6789");
        assert_eq!((spans[0].start, spans[0].end), (10, 21));
        assert_eq!(spans[0].canonical_tag(), Some(PhiTag::Ssn));
    }

    #[test]
    fn test_detect_email() {
        let spans = detector().detect("Contact: john.doe@example.com").unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "john.doe@example.com");
        assert_eq!(spans[0].canonical_tag(), Some(PhiTag::Email));
    }

    #[test]
    fn test_short_phone_discarded() {
        // 6 digits: below the phone threshold
        let spans = detector().detect("room 555-010 please").unwrap();
        assert!(spans.is_empty());
    }

    #[test]
    fn test_id_requires_letter_and_digit() {
        assert!(detector().detect("the patient reported").unwrap().is_empty());
        let spans = detector().detect("ID AB12003").unwrap();
        assert_eq!(tags_of(&spans), vec![vec![PhiTag::Id]]);
    }

    #[test]
    fn test_id_after_rejected_host_fragment() {
        let text = "see file.ab12cd-XY99812 now";
        let spans = detector().detect(text).unwrap();
        assert_eq!(tags_of(&spans), vec![vec![PhiTag::Id]]);
        assert!(spans[0].text.ends_with("XY99812"));
    }

    #[test]
    fn test_phone_formats() {
        for text in [
            "Call me at 5550101",
            "ring +44 20 7946 0958",
            "tel 02 9374 4000",
            "phone 555 123 45 67",
        ] {
            let spans = detector().detect(text).unwrap();
            assert_eq!(tags_of(&spans), vec![vec![PhiTag::Phone]], "{}", text);
        }
    }

    #[test]
    fn test_dates_and_addresses_not_read_as_phones() {
        let spans = detector().detect("logged from 192.168.1.100 today").unwrap();
        assert_eq!(tags_of(&spans), vec![vec![PhiTag::Ip]]);
        let spans = detector().detect("Diagnosed 12-05-2024 after surgery").unwrap();
        assert_eq!(tags_of(&spans), vec![vec![PhiTag::Date]]);
    }

    #[test]
    fn test_medical_record_merges_with_id() {
        let spans = detector().detect("chart MRN123456 updated").unwrap();
        assert_eq!(spans.len(), 1);
        assert!(spans[0].tags().contains(&PhiTag::MedicalRecord));
        assert_eq!(spans[0].canonical_tag(), Some(PhiTag::MedicalRecord));
    }

    #[test]
    fn test_whitelist_suppresses_any_tag() {
        let wl = Wordlists::from_terms(["ab12003", "555-0101"], Vec::<&str>::new());
        let spans = detector_with(wl).detect("ID AB12003, call 555-0101").unwrap();
        assert!(spans.is_empty());
    }

    #[test]
    fn test_stopword_suppresses_match() {
        let wl = Wordlists::from_terms(Vec::<&str>::new(), ["covid19"]);
        assert!(detector_with(wl).detect("tested for covid19").unwrap().is_empty());
    }

    #[test]
    fn test_scheduling_date_discarded() {
        let spans = detector().detect("Your appointment is on 2021-05-01").unwrap();
        assert!(spans.is_empty());
    }

    #[test]
    fn test_clinical_date_retained() {
        let spans = detector().detect("Diagnosed 2021-05-01 after admission").unwrap();
        assert_eq!(tags_of(&spans), vec![vec![PhiTag::Date]]);
    }

    #[test]
    fn test_scheduling_wins_over_clinical_context() {
        let spans = detector()
            .detect("surgery visit booked for 2021-05-01")
            .unwrap();
        assert!(spans.is_empty());
    }

    #[test]
    fn test_context_window_is_bounded() {
        let filler = "x".repeat(60);
        let text = format!("appointment {} 2021-05-01", filler);
        let spans = detector().detect(&text).unwrap();
        assert_eq!(tags_of(&spans), vec![vec![PhiTag::Date]]);
    }

    #[test]
    fn test_offsets_are_characters() {
        let spans = detector().detect("Grüße: 123-45-6789").unwrap();
        assert_eq!((spans[0].start, spans[0].end), (7, 18));
    }

    #[test]
    fn test_suppression_rules_directly() {
        let config = RedactionConfig::default();
        let rules = SuppressionRules::new(Arc::new(Wordlists::default()), &config).unwrap();
        assert!(rules.should_skip(PhiTag::Date, "2 weeks", "in 2 weeks"));
        assert!(rules.should_skip(PhiTag::Date, "Tomorrow", "see you tomorrow"));
        assert!(rules.should_skip(PhiTag::Name, " (). ", ""));
        assert!(!rules.should_skip(PhiTag::Email, "a@b.io", "mail a@b.io"));
        assert!(rules.should_skip(PhiTag::Id, "abc12", "abc12"));
        assert!(!rules.should_skip(PhiTag::Id, "abc123", "abc123"));
        assert!(rules.is_spelled_relative_phrase("a week"));
    }
}
