// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// PHI Filter - detection, span merging and redaction
//
// Pipeline per message:
// - Regex and NER detectors produce typed spans
// - Overlapping spans merge into one ordered list with aggregated tags
// - One canonical tag per span picks the placeholder
// - The normalizer tidies the redacted text for the clean-text field

pub mod config;
pub mod detector;
pub mod error;
pub mod masking;
pub mod ner;
pub mod normalize;
pub mod patterns;
pub mod record;
pub mod redactor;
pub mod span;

#[cfg(feature = "python")]
pub mod python;

pub use config::{PhiTag, RedactionConfig, Wordlists};
pub use error::{RedactError, Result};
pub use ner::{EntityRecognizer, NerEntity};
pub use normalize::SpellCorrector;
pub use record::{AuditEvent, Entity, MessageMetadata, MessageRecord};
pub use redactor::{PhiRedactor, Redaction};
pub use span::Span;

#[cfg(feature = "python")]
pub use python::PhiRedactorRust;
