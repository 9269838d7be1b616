// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Text normalization for the clean-text field

use std::sync::Arc;

use regex::Regex;
use unicode_categories::UnicodeCategories;
use unicode_normalization::UnicodeNormalization;

use super::config::{RedactionConfig, Wordlists};
use super::error::{RedactError, Result};

/// Short codes that are never spell-corrected
pub const RESERVED_TOKENS: [&str; 3] = ["ssn", "id", "dob"];

/// External spell-correction collaborator.
///
/// Returns `None` when it has no better suggestion.
pub trait SpellCorrector: Send + Sync {
    fn correct(&self, token: &str) -> Option<String>;
}

/// Unicode-normalizes and tidies free text.
///
/// Redaction placeholders (`[REDACTED_EMAIL]`, ...) are left intact.
pub struct Normalizer {
    wordlists: Arc<Wordlists>,
    corrector: Option<Arc<dyn SpellCorrector>>,
    max_len: usize,
    punct_attach: Regex,
    placeholder: Regex,
}

impl Normalizer {
    pub fn new(wordlists: Arc<Wordlists>, config: &RedactionConfig) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| RedactError::Pattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
        };
        Ok(Self {
            wordlists,
            corrector: None,
            max_len: config.max_text_len,
            punct_attach: compile(r"\s+([:;,.!?])")?,
            placeholder: compile(r"\[REDACTED(?:_[A-Z]+)?\]")?,
        })
    }

    pub fn with_corrector(mut self, corrector: Arc<dyn SpellCorrector>) -> Self {
        self.corrector = Some(corrector);
        self
    }

    /// Normalize `text`. Never fails; output is capped at `max_text_len`
    /// characters.
    pub fn normalize(&self, text: &str) -> String {
        let printable: String = text.nfc().filter(|c| is_printable(*c)).collect();
        let collapsed = collapse_whitespace(&printable);
        let attached = self.punct_attach.replace_all(&collapsed, "$1");
        let bracketed = self.space_brackets(&attached);
        let numeric = strip_thousands_separators(&bracketed);

        let corrected = numeric
            .split_whitespace()
            .map(|token| self.correct_token(token))
            .collect::<Vec<_>>()
            .join(" ");

        truncate_chars(corrected, self.max_len)
    }

    /// Normalize an arbitrary JSON value. Null and non-scalar values coerce
    /// to an empty string.
    pub fn normalize_value(&self, value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::String(s) => self.normalize(s),
            serde_json::Value::Number(n) => self.normalize(&n.to_string()),
            serde_json::Value::Bool(b) => self.normalize(&b.to_string()),
            _ => String::new(),
        }
    }

    /// Space after `{[<`, before `}]>`, skipping placeholders
    fn space_brackets(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + 8);
        let mut last = 0;
        for m in self.placeholder.find_iter(text) {
            push_spaced_brackets(&mut out, &text[last..m.start()]);
            out.push_str(m.as_str());
            last = m.end();
        }
        push_spaced_brackets(&mut out, &text[last..]);
        out
    }

    fn correct_token(&self, token: &str) -> String {
        if self.is_protected(token) {
            return token.to_string();
        }
        self.corrector
            .as_ref()
            .and_then(|c| c.correct(token))
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| token.to_string())
    }

    /// Tokens that must pass through unchanged
    fn is_protected(&self, token: &str) -> bool {
        if token.chars().all(|c| c.is_ascii_punctuation() || c.is_punctuation()) {
            return true;
        }
        if token.chars().any(|c| c.is_ascii_digit()) {
            return true;
        }
        let lower = token.to_lowercase();
        self.wordlists.is_whitelisted(&lower)
            || RESERVED_TOKENS.contains(&lower.as_str())
            || self.placeholder.is_match(token)
    }
}

fn is_printable(c: char) -> bool {
    if c.is_whitespace() {
        return true;
    }
    !(c.is_control() || c.is_other_format() || c.is_other_private_use())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn push_spaced_brackets(out: &mut String, segment: &str) {
    for c in segment.chars() {
        match c {
            '{' | '[' | '<' => {
                out.push(c);
                out.push(' ');
            }
            '}' | ']' | '>' => {
                out.push(' ');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Drop a comma sitting between a digit and exactly three trailing digits
/// ("1,234" -> "1234").
fn strip_thousands_separators(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == ',' && is_thousands_comma(&chars, i) {
            continue;
        }
        out.push(c);
    }
    out
}

fn is_thousands_comma(chars: &[char], i: usize) -> bool {
    if i == 0 || !chars[i - 1].is_ascii_digit() {
        return false;
    }
    let group = &chars[i + 1..chars.len().min(i + 4)];
    group.len() == 3
        && group.iter().all(|c| c.is_ascii_digit())
        && chars.get(i + 4).map_or(true, |c| !is_word_char(*c))
}

fn truncate_chars(text: String, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte, _)) => text[..byte].to_string(),
        None => text,
    }
}
