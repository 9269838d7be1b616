// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Configuration types for the PHI redaction engine

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{RedactError, Result};

/// PHI tags that can be detected.
///
/// Variants are declared in wire-name order so the derived `Ord` sorts flag
/// sets the same way as their string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhiTag {
    Address,
    Date,
    Email,
    Gpe,
    Id,
    Ip,
    MedicalRecord,
    Name,
    Org,
    Other,
    Phone,
    Ssn,
    Url,
}

impl PhiTag {
    /// Wire name of the tag (`"MEDICAL_RECORD"`, `"EMAIL"`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            PhiTag::Address => "ADDRESS",
            PhiTag::Date => "DATE",
            PhiTag::Email => "EMAIL",
            PhiTag::Gpe => "GPE",
            PhiTag::Id => "ID",
            PhiTag::Ip => "IP",
            PhiTag::MedicalRecord => "MEDICAL_RECORD",
            PhiTag::Name => "NAME",
            PhiTag::Org => "ORG",
            PhiTag::Other => "OTHER",
            PhiTag::Phone => "PHONE",
            PhiTag::Ssn => "SSN",
            PhiTag::Url => "URL",
        }
    }

    /// Placeholder substituted for a span whose canonical tag is `self`.
    ///
    /// Medical record numbers share the generic ID placeholder. Reserved tags
    /// without a dedicated detector fall back to `[REDACTED]`.
    pub fn placeholder(&self) -> &'static str {
        match self {
            PhiTag::Email => "[REDACTED_EMAIL]",
            PhiTag::Phone => "[REDACTED_PHONE]",
            PhiTag::Ssn => "[REDACTED_SSN]",
            PhiTag::Ip => "[REDACTED_IP]",
            PhiTag::Url => "[REDACTED_URL]",
            PhiTag::MedicalRecord | PhiTag::Id => "[REDACTED_ID]",
            PhiTag::Date => "[REDACTED_DATE]",
            PhiTag::Name => "[REDACTED_NAME]",
            PhiTag::Gpe => "[REDACTED_LOCATION]",
            PhiTag::Org => "[REDACTED_ORG]",
            PhiTag::Address | PhiTag::Other => GENERIC_PLACEHOLDER,
        }
    }
}

/// Placeholder used when no canonical tag could be chosen
pub const GENERIC_PLACEHOLDER: &str = "[REDACTED]";

impl fmt::Display for PhiTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhiTag {
    type Err = RedactError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ADDRESS" => Ok(PhiTag::Address),
            "DATE" => Ok(PhiTag::Date),
            "EMAIL" => Ok(PhiTag::Email),
            "GPE" => Ok(PhiTag::Gpe),
            "ID" => Ok(PhiTag::Id),
            "IP" => Ok(PhiTag::Ip),
            "MEDICAL_RECORD" => Ok(PhiTag::MedicalRecord),
            "NAME" => Ok(PhiTag::Name),
            "ORG" => Ok(PhiTag::Org),
            "OTHER" => Ok(PhiTag::Other),
            "PHONE" => Ok(PhiTag::Phone),
            "SSN" => Ok(PhiTag::Ssn),
            "URL" => Ok(PhiTag::Url),
            other => Err(RedactError::Config {
                reason: format!("unknown PHI tag '{}'", other),
            }),
        }
    }
}

/// Configuration for the redaction engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    // Detection flags
    pub detect_email: bool,
    pub detect_ssn: bool,
    pub detect_phone: bool,
    pub detect_ip_address: bool,
    pub detect_url: bool,
    pub detect_medical_record: bool,
    pub detect_id: bool,
    pub detect_date: bool,

    // Suppression thresholds
    /// Characters of context examined on each side of a DATE match
    pub context_window: usize,
    pub min_phone_digits: usize,
    pub min_id_length: usize,

    /// Cap applied to normalized text, in characters
    pub max_text_len: usize,

    // Resources
    pub whitelist_path: Option<PathBuf>,
    pub stopwords_path: Option<PathBuf>,

    // Behavior configuration
    pub log_detections: bool,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            detect_email: true,
            detect_ssn: true,
            detect_phone: true,
            detect_ip_address: true,
            detect_url: true,
            detect_medical_record: true,
            detect_id: true,
            detect_date: true,

            context_window: 40,
            min_phone_digits: 7,
            min_id_length: 6,

            max_text_len: 4000,

            whitelist_path: None,
            stopwords_path: None,

            log_detections: false,
        }
    }
}

impl RedactionConfig {
    /// Parse a JSON configuration object. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| RedactError::Config {
            reason: e.to_string(),
        })
    }

    /// Load the whitelist and stopword files named by this config.
    pub fn load_wordlists(&self) -> Wordlists {
        Wordlists::load(self.whitelist_path.as_deref(), self.stopwords_path.as_deref())
    }
}

#[cfg(feature = "python")]
mod py {
    use pyo3::prelude::*;
    use pyo3::types::PyDict;

    use super::RedactionConfig;

    impl RedactionConfig {
        /// Extract configuration from Python dict
        pub fn from_py_dict(dict: &Bound<'_, PyDict>) -> PyResult<Self> {
            let mut config = Self::default();

            macro_rules! extract_field {
                ($field:ident) => {
                    if let Some(value) = dict.get_item(stringify!($field))? {
                        config.$field = value.extract()?;
                    }
                };
            }

            extract_field!(detect_email);
            extract_field!(detect_ssn);
            extract_field!(detect_phone);
            extract_field!(detect_ip_address);
            extract_field!(detect_url);
            extract_field!(detect_medical_record);
            extract_field!(detect_id);
            extract_field!(detect_date);
            extract_field!(context_window);
            extract_field!(min_phone_digits);
            extract_field!(min_id_length);
            extract_field!(max_text_len);
            extract_field!(log_detections);

            if let Some(value) = dict.get_item("whitelist_path")? {
                let path: Option<String> = value.extract()?;
                config.whitelist_path = path.map(Into::into);
            }
            if let Some(value) = dict.get_item("stopwords_path")? {
                let path: Option<String> = value.extract()?;
                config.stopwords_path = path.map(Into::into);
            }

            Ok(config)
        }
    }
}

/// Read-only term sets consulted before a match is accepted.
///
/// Both sets hold lowercase terms. They are loaded once and shared between
/// detectors and the normalizer.
#[derive(Debug, Clone, Default)]
pub struct Wordlists {
    pub whitelist: HashSet<String>,
    pub stopwords: HashSet<String>,
}

impl Wordlists {
    /// Build from in-memory terms.
    pub fn from_terms<W, S>(whitelist: W, stopwords: S) -> Self
    where
        W: IntoIterator,
        W::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        Self {
            whitelist: collect_terms(whitelist),
            stopwords: collect_terms(stopwords),
        }
    }

    /// Load both sets from newline-delimited files.
    ///
    /// A missing or unreadable file degrades to an empty set.
    pub fn load(whitelist: Option<&Path>, stopwords: Option<&Path>) -> Self {
        Self {
            whitelist: whitelist.map(load_wordset).unwrap_or_default(),
            stopwords: stopwords.map(load_wordset).unwrap_or_default(),
        }
    }

    /// True when `term` (already lowercased) is whitelisted or a stopword.
    pub fn contains(&self, term: &str) -> bool {
        self.whitelist.contains(term) || self.stopwords.contains(term)
    }

    pub fn is_whitelisted(&self, term: &str) -> bool {
        self.whitelist.contains(term)
    }
}

fn collect_terms<I>(terms: I) -> HashSet<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    terms
        .into_iter()
        .filter_map(|t| parse_term_line(t.as_ref()))
        .collect()
}

fn parse_term_line(line: &str) -> Option<String> {
    let term = line.trim();
    if term.is_empty() || term.starts_with('#') {
        None
    } else {
        Some(term.to_lowercase())
    }
}

fn load_wordset(path: &Path) -> HashSet<String> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let set: HashSet<String> = contents.lines().filter_map(parse_term_line).collect();
            tracing::debug!(path = %path.display(), terms = set.len(), "loaded wordlist");
            set
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "wordlist unavailable, continuing with an empty set"
            );
            HashSet::new()
        }
    }
}
