// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Regex pattern compilation for PHI detection
// Uses RegexSet to skip rules that cannot match before running find_iter

use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};

use super::config::{PhiTag, RedactionConfig};
use super::error::{RedactError, Result};

/// Extra acceptance check applied around a raw regex match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchGuard {
    None,
    /// Not preceded by `@` or `.`, not followed by `@`. Keeps the generic ID
    /// rule off the pieces of e-mail addresses and host names.
    StandaloneToken,
    /// Rejects digit runs that are exactly a calendar date or an IPv4 address
    NotDateOrIp,
}

impl MatchGuard {
    /// `start`/`end` are byte offsets of the match in `text`.
    pub fn admits(&self, text: &str, start: usize, end: usize) -> bool {
        match self {
            MatchGuard::None => true,
            MatchGuard::StandaloneToken => {
                let before = text[..start].chars().next_back();
                let after = text[end..].chars().next();
                !matches!(before, Some('@') | Some('.')) && after != Some('@')
            }
            MatchGuard::NotDateOrIp => {
                let value = &text[start..end];
                !is_date_shape(value) && !is_ipv4_shape(value)
            }
        }
    }

    /// Whether a rejected match is searched again from its second character.
    ///
    /// A token rejected for its neighbours may still contain a later word
    /// boundary that starts an acceptable match ("file.ab12cd-XY99812").
    /// Date and address shapes are rejected whole.
    pub fn rescans_rejected(&self) -> bool {
        matches!(self, MatchGuard::StandaloneToken)
    }
}

fn all_digits(part: &str, lengths: std::ops::RangeInclusive<usize>) -> bool {
    lengths.contains(&part.len()) && part.bytes().all(|b| b.is_ascii_digit())
}

/// `yyyy-mm-dd` or `d[/.-]m[/.-]yy(yy)`
fn is_date_shape(value: &str) -> bool {
    let iso: Vec<&str> = value.split('-').collect();
    if let [y, m, d] = iso.as_slice() {
        if all_digits(y, 4..=4) && all_digits(m, 2..=2) && all_digits(d, 2..=2) {
            return true;
        }
    }
    let parts: Vec<&str> = value.split(['/', '.', '-']).collect();
    matches!(
        parts.as_slice(),
        [d, m, y] if all_digits(d, 1..=2) && all_digits(m, 1..=2) && all_digits(y, 2..=4)
    )
}

/// Four dot-separated groups of one to three digits
fn is_ipv4_shape(value: &str) -> bool {
    let parts: Vec<&str> = value.split('.').collect();
    parts.len() == 4 && parts.iter().all(|p| all_digits(p, 1..=3))
}

/// Compiled rule with metadata
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub tag: PhiTag,
    pub regex: Regex,
    pub guard: MatchGuard,
    pub description: &'static str,
}

/// All compiled rules, in table order, with a RegexSet pre-filter
pub struct CompiledPatterns {
    pub regex_set: RegexSet,
    pub rules: Vec<CompiledRule>,
}

/// Pattern definitions (pattern, description, guard)
type PatternDef = (&'static str, &'static str, MatchGuard);

static EMAIL_PATTERNS: Lazy<Vec<PatternDef>> = Lazy::new(|| {
    vec![(
        r"[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9.-]+",
        "Email address",
        MatchGuard::None,
    )]
});

static SSN_PATTERNS: Lazy<Vec<PatternDef>> = Lazy::new(|| {
    vec![(
        r"\b\d{3}-\d{2}-\d{4}\b",
        "US Social Security Number",
        MatchGuard::None,
    )]
});

// Any run of digits, spaces, dots, dashes and parentheses. Digit counts are
// enforced after matching (min_phone_digits).
static PHONE_PATTERNS: Lazy<Vec<PatternDef>> = Lazy::new(|| {
    vec![(
        r"\+?\(?\b\d[\d\s().-]{5,18}\d\b",
        "Phone number",
        MatchGuard::NotDateOrIp,
    )]
});

static IP_ADDRESS_PATTERNS: Lazy<Vec<PatternDef>> = Lazy::new(|| {
    vec![(
        r"\b(?:\d{1,3}\.){3}\d{1,3}\b",
        "IPv4 address",
        MatchGuard::None,
    )]
});

static URL_PATTERNS: Lazy<Vec<PatternDef>> =
    Lazy::new(|| vec![(r"(?i)https?://\S+", "HTTP(S) URL", MatchGuard::None)]);

static MEDICAL_RECORD_PATTERNS: Lazy<Vec<PatternDef>> = Lazy::new(|| {
    vec![(
        r"(?i)\b(?:MRN|MedicalRecord)[-\s]?\d+\b",
        "Medical record number",
        MatchGuard::None,
    )]
});

// Letter/digit mix and minimum length are enforced by suppression
static ID_PATTERNS: Lazy<Vec<PatternDef>> = Lazy::new(|| {
    vec![(
        r"\b[A-Za-z0-9-]{6,}\b",
        "Generic alphanumeric identifier",
        MatchGuard::StandaloneToken,
    )]
});

static DATE_PATTERNS: Lazy<Vec<PatternDef>> = Lazy::new(|| {
    vec![(
        r"(?i)\b(?:\d{4}-\d{2}-\d{2}|\d{1,2}[/.-]\d{1,2}[/.-]\d{2,4}|\d{1,2}\s(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec))\b",
        "Calendar date",
        MatchGuard::None,
    )]
});

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| RedactError::Pattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Compile the rule table based on configuration
pub fn compile_patterns(config: &RedactionConfig) -> Result<CompiledPatterns> {
    let mut pattern_strings = Vec::new();
    let mut rules = Vec::new();

    macro_rules! add_patterns {
        ($enabled:expr, $tag:expr, $pattern_list:expr) => {
            if $enabled {
                for (pattern, description, guard) in $pattern_list.iter() {
                    pattern_strings.push(*pattern);
                    rules.push(CompiledRule {
                        tag: $tag,
                        regex: compile(pattern)?,
                        guard: *guard,
                        description: *description,
                    });
                }
            }
        };
    }

    // Table order matters only for logging; spans are re-sorted before merging
    add_patterns!(config.detect_email, PhiTag::Email, &*EMAIL_PATTERNS);
    add_patterns!(config.detect_ssn, PhiTag::Ssn, &*SSN_PATTERNS);
    add_patterns!(config.detect_phone, PhiTag::Phone, &*PHONE_PATTERNS);
    add_patterns!(config.detect_ip_address, PhiTag::Ip, &*IP_ADDRESS_PATTERNS);
    add_patterns!(config.detect_url, PhiTag::Url, &*URL_PATTERNS);
    add_patterns!(
        config.detect_medical_record,
        PhiTag::MedicalRecord,
        &*MEDICAL_RECORD_PATTERNS
    );
    add_patterns!(config.detect_id, PhiTag::Id, &*ID_PATTERNS);
    add_patterns!(config.detect_date, PhiTag::Date, &*DATE_PATTERNS);

    // Handle empty pattern set gracefully (all detectors disabled)
    let regex_set = if pattern_strings.is_empty() {
        RegexSet::empty()
    } else {
        RegexSet::new(&pattern_strings).map_err(|e| RedactError::Pattern {
            pattern: "<regex set>".to_string(),
            reason: e.to_string(),
        })?
    };

    Ok(CompiledPatterns { regex_set, rules })
}

/// Vocabulary used to judge DATE matches and their surroundings
pub struct ContextPatterns {
    /// "3 days", "2 weeks"
    pub relative_span: Regex,
    /// Relative spans as written out by NER models ("a week", "two months")
    pub spelled_relative_span: Regex,
    pub scheduling: Regex,
    pub clinical: Regex,
}

/// Relative-time phrases never treated as dates
pub const RELATIVE_DAY_WORDS: [&str; 5] =
    ["yesterday", "today", "tomorrow", "last week", "next month"];

impl ContextPatterns {
    pub fn compile() -> Result<Self> {
        Ok(Self {
            relative_span: compile(r"^\d+\s*(?:day|days|week|weeks|month|months|year|years)\b")?,
            spelled_relative_span: compile(
                r"^(?:\d+|a|one|two|three|four|five|six|seven|eight|nine|ten)\s+(?:day|days|week|weeks|month|months|year|years)\b",
            )?,
            scheduling: compile(
                r"\b(?:appointment|schedule|book|booking|visit|meeting|checkup|follow[- ]?up)\b",
            )?,
            clinical: compile(
                r"\b(?:birth|dob|born|admit|admitted|discharge|hospital|surgery|diagnos\w*)\b",
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches_for(tag: PhiTag, text: &str) -> Vec<String> {
        let compiled = compile_patterns(&RedactionConfig::default()).unwrap();
        compiled
            .rules
            .iter()
            .filter(|r| r.tag == tag)
            .flat_map(|r| {
                r.regex
                    .find_iter(text)
                    .filter(|m| r.guard.admits(text, m.start(), m.end()))
                    .map(|m| m.as_str().to_string())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn test_compile_patterns() {
        let compiled = compile_patterns(&RedactionConfig::default()).unwrap();
        assert!(!compiled.rules.is_empty());
        assert_eq!(compiled.regex_set.len(), compiled.rules.len());
    }

    #[test]
    fn test_all_detectors_disabled() {
        let config = RedactionConfig {
            detect_email: false,
            detect_ssn: false,
            detect_phone: false,
            detect_ip_address: false,
            detect_url: false,
            detect_medical_record: false,
            detect_id: false,
            detect_date: false,
            ..Default::default()
        };
        let compiled = compile_patterns(&config).unwrap();
        assert!(compiled.rules.is_empty());
        assert!(!compiled.regex_set.is_match("123-45-6789"));
    }

    #[test]
    fn test_ssn_pattern() {
        assert_eq!(matches_for(PhiTag::Ssn, "My SSN is 123-45-6789"), vec!["123-45-6789"]);
    }

    #[test]
    fn test_phone_patterns() {
        assert_eq!(matches_for(PhiTag::Phone, "Call me at 555-0101 or"), vec!["555-0101"]);
        assert!(matches_for(PhiTag::Phone, "Call (555) 0103 now")
            .contains(&"(555) 0103".to_string()));
        assert!(matches_for(PhiTag::Phone, "dial +15551234567")
            .contains(&"+15551234567".to_string()));
        assert_eq!(matches_for(PhiTag::Phone, "Call me at 5550101"), vec!["5550101"]);
        assert_eq!(
            matches_for(PhiTag::Phone, "ring +44 20 7946 0958 today"),
            vec!["+44 20 7946 0958"]
        );
        assert_eq!(matches_for(PhiTag::Phone, "tel 02 9374 4000"), vec!["02 9374 4000"]);
        assert_eq!(
            matches_for(PhiTag::Phone, "phone 555 123 45 67"),
            vec!["555 123 45 67"]
        );
    }

    #[test]
    fn test_phone_skips_dates_and_addresses() {
        assert!(matches_for(PhiTag::Phone, "on 2021-05-01").is_empty());
        assert!(matches_for(PhiTag::Phone, "on 12-05-2024 and 3.4.22").is_empty());
        assert!(matches_for(PhiTag::Phone, "from 192.168.100.200").is_empty());
    }

    #[test]
    fn test_shape_helpers() {
        assert!(is_date_shape("2021-05-01"));
        assert!(is_date_shape("1.12.1999"));
        assert!(!is_date_shape("555-0101"));
        assert!(!is_date_shape("555 123 45 67"));
        assert!(is_ipv4_shape("10.0.0.1"));
        assert!(!is_ipv4_shape("10.0.0.1.5"));
    }

    #[test]
    fn test_id_guard_skips_email_parts() {
        let ids = matches_for(PhiTag::Id, "ping abc123def@host9x.org then AB12003");
        assert_eq!(ids, vec!["AB12003"]);
    }

    #[test]
    fn test_date_pattern() {
        let dates = matches_for(PhiTag::Date, "seen 2021-05-01, 3/4/22 and 12 Mar");
        assert_eq!(dates, vec!["2021-05-01", "3/4/22", "12 Mar"]);
    }

    #[test]
    fn test_context_patterns() {
        let ctx = ContextPatterns::compile().unwrap();
        assert!(ctx.relative_span.is_match("2 weeks"));
        assert!(ctx.spelled_relative_span.is_match("two months ago"));
        assert!(ctx.scheduling.is_match("book a follow up"));
        assert!(ctx.clinical.is_match("diagnosed in"));
        assert!(!ctx.scheduling.is_match("bookkeeping"));
    }
}
