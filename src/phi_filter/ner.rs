// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Adapter between a statistical entity recognizer and the span pipeline

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::config::{PhiTag, RedactionConfig};
use super::detector::{digit_count, SpanDetector, SuppressionRules};
use super::error::Result;
use super::span::{check_bounds, merge_spans, CharOffsets, Span};

/// An entity as reported by the model, with its native label.
///
/// `start`/`end` are character offsets into the recognized text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NerEntity {
    pub label: String,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// A named-entity model.
///
/// Loaded once per process by the host and shared read-only; whether it runs
/// in-process or remotely is up to the implementation.
pub trait EntityRecognizer: Send + Sync {
    fn recognize(&self, text: &str) -> Vec<NerEntity>;
}

impl<F> EntityRecognizer for F
where
    F: Fn(&str) -> Vec<NerEntity> + Send + Sync,
{
    fn recognize(&self, text: &str) -> Vec<NerEntity> {
        self(text)
    }
}

/// Map a native model label onto a PHI tag. Other labels are ignored.
pub fn map_label(label: &str) -> Option<PhiTag> {
    match label {
        "PERSON" => Some(PhiTag::Name),
        "GPE" | "LOC" | "FAC" => Some(PhiTag::Gpe),
        "ORG" => Some(PhiTag::Org),
        "DATE" => Some(PhiTag::Date),
        _ => None,
    }
}

/// Short all-caps token without vowels ("HR", "BP", "CBC")
fn is_acronym_noise(text: &str) -> bool {
    let token = text.trim();
    let count = token.chars().count();
    (1..=4).contains(&count)
        && token.chars().all(|c| c.is_ascii_uppercase())
        && !token.chars().any(|c| "AEIOU".contains(c))
}

/// Span detector backed by an optional [`EntityRecognizer`].
///
/// Without a recognizer it reports nothing, so detection falls back to the
/// regex rules alone.
pub struct NerDetector {
    recognizer: Option<Arc<dyn EntityRecognizer>>,
    rules: Arc<SuppressionRules>,
    context_window: usize,
}

impl NerDetector {
    pub fn new(
        recognizer: Option<Arc<dyn EntityRecognizer>>,
        rules: Arc<SuppressionRules>,
        config: &RedactionConfig,
    ) -> Self {
        if recognizer.is_none() {
            tracing::warn!("no entity recognizer configured, NER detection disabled");
        }
        Self {
            recognizer,
            rules,
            context_window: config.context_window,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.recognizer.is_some()
    }

    /// Apply label mapping and NER-specific corrections to one entity.
    ///
    /// Returns `None` when the entity is dropped.
    fn classify(&self, entity: &NerEntity) -> Option<PhiTag> {
        let mut tag = map_label(&entity.label)?;
        if is_acronym_noise(&entity.text) {
            return None;
        }

        if tag == PhiTag::Date {
            let lower = entity.text.trim().to_lowercase();
            if self.rules.is_spelled_relative_phrase(&lower) {
                return None;
            }
            let digits = digit_count(&entity.text);
            let has_alpha = entity.text.chars().any(|c| c.is_alphabetic());
            if digits > 0 && !has_alpha {
                if digits < 5 {
                    return None;
                }
                // Models sometimes read long digit runs as dates
                if digits >= 7 {
                    tag = PhiTag::Phone;
                }
            }
        }
        Some(tag)
    }
}

impl SpanDetector for NerDetector {
    fn detect(&self, text: &str) -> Result<Vec<Span>> {
        let Some(recognizer) = &self.recognizer else {
            return Ok(Vec::new());
        };

        let offsets = CharOffsets::new(text);
        let mut spans = Vec::new();
        for entity in recognizer.recognize(text) {
            // Checked before any filtering so a dropped entity cannot hide bad offsets
            check_bounds(entity.start, entity.end, offsets.len())?;
            let Some(tag) = self.classify(&entity) else {
                continue;
            };
            let context = offsets.window(text, entity.start, entity.end, self.context_window);
            if self.rules.should_skip(tag, &entity.text, context) {
                continue;
            }
            spans.push(Span::new(tag, entity.start, entity.end, entity.text));
        }

        merge_spans(text, spans)
    }

    fn name(&self) -> &str {
        "ner"
    }
}
