// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Redaction pipeline: detectors -> merger -> type resolver -> placeholders

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;

use super::config::{PhiTag, RedactionConfig, Wordlists};
use super::detector::{RegexDetector, SpanDetector, SuppressionRules};
use super::error::Result;
use super::masking::mask_spans;
use super::ner::{EntityRecognizer, NerDetector};
use super::normalize::{Normalizer, SpellCorrector};
use super::record::Entity;
use super::span::{merge_spans, Span};

/// Outcome of redacting one text buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redaction {
    /// Canonical tags actually applied, sorted and de-duplicated
    pub flags: Vec<PhiTag>,
    pub text: String,
}

/// Detects and redacts PHI in free text.
///
/// Holds only read-only state once built, so one instance can serve
/// concurrent callers.
///
/// # Example
/// ```
/// use phi_redact::phi_filter::PhiRedactor;
///
/// let redactor = PhiRedactor::with_defaults().unwrap();
/// let result = redactor.redact("My SSN is 123-45-6789").unwrap();
/// assert_eq!(result.text, "My SSN is [REDACTED_SSN]");
/// ```
pub struct PhiRedactor {
    config: RedactionConfig,
    detectors: Vec<Box<dyn SpanDetector>>,
    normalizer: Normalizer,
}

impl PhiRedactor {
    /// Build a redactor from explicit resources.
    ///
    /// `recognizer` is the optional NER model; without it detection is
    /// regex-only.
    pub fn new(
        config: RedactionConfig,
        wordlists: Arc<Wordlists>,
        recognizer: Option<Arc<dyn EntityRecognizer>>,
    ) -> Result<Self> {
        let rules = Arc::new(SuppressionRules::new(Arc::clone(&wordlists), &config)?);
        let regex = RegexDetector::new(&config, Arc::clone(&rules))?;
        let ner = NerDetector::new(recognizer, rules, &config);
        let normalizer = Normalizer::new(wordlists, &config)?;

        Ok(Self {
            config,
            detectors: vec![Box::new(regex), Box::new(ner)],
            normalizer,
        })
    }

    /// Default configuration, empty wordlists, no NER model
    pub fn with_defaults() -> Result<Self> {
        Self::new(RedactionConfig::default(), Arc::new(Wordlists::default()), None)
    }

    /// Build from a config, loading the wordlist files it names.
    pub fn from_config(
        config: RedactionConfig,
        recognizer: Option<Arc<dyn EntityRecognizer>>,
    ) -> Result<Self> {
        let wordlists = Arc::new(config.load_wordlists());
        Self::new(config, wordlists, recognizer)
    }

    /// Attach a spell-correction collaborator to the normalizer.
    pub fn with_corrector(mut self, corrector: Arc<dyn SpellCorrector>) -> Self {
        self.normalizer = self.normalizer.with_corrector(corrector);
        self
    }

    pub fn config(&self) -> &RedactionConfig {
        &self.config
    }

    /// Merged spans from every detector, start-ordered and non-overlapping
    pub fn detect(&self, text: &str) -> Result<Vec<Span>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let mut spans = Vec::new();
        for detector in &self.detectors {
            let found = detector.detect(text)?;
            if self.config.log_detections {
                tracing::debug!(detector = detector.name(), spans = found.len(), "detector finished");
            }
            spans.extend(found);
        }
        merge_spans(text, spans)
    }

    /// Detect and replace PHI in `text`.
    pub fn redact(&self, text: &str) -> Result<Redaction> {
        if text.is_empty() {
            return Ok(Redaction {
                flags: Vec::new(),
                text: String::new(),
            });
        }
        let spans = self.detect(text)?;
        let (flags, masked) = mask_spans(text, &spans)?;
        if !flags.is_empty() {
            tracing::info!(
                spans = spans.len(),
                flags = ?flags.iter().map(PhiTag::as_str).collect::<Vec<_>>(),
                "redacted text"
            );
        }
        Ok(Redaction {
            flags,
            text: masked.into_owned(),
        })
    }

    /// Redact every non-empty entity value.
    ///
    /// Returns the rewritten entities and the sorted set of tags found in
    /// them. Entities whose values hold no PHI are returned unchanged.
    pub fn redact_entities(&self, entities: &[Entity]) -> Result<(Vec<Entity>, Vec<PhiTag>)> {
        let mut added = BTreeSet::new();
        let mut out = Vec::with_capacity(entities.len());
        for entity in entities {
            if entity.value.is_empty() {
                out.push(entity.clone());
                continue;
            }
            let redaction = self.redact(&entity.value)?;
            if redaction.flags.is_empty() {
                out.push(entity.clone());
            } else {
                added.extend(redaction.flags);
                out.push(Entity {
                    value: redaction.text,
                    ..entity.clone()
                });
            }
        }
        Ok((out, added.into_iter().collect()))
    }

    /// Normalize text for the clean-text field
    pub fn normalize(&self, text: &str) -> String {
        self.normalizer.normalize(text)
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }
}
