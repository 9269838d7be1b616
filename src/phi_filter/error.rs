// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Error types for the PHI redaction engine

use thiserror::Error;

/// Errors raised by the redaction engine.
///
/// Malformed text is never an error; these cover construction failures and
/// detectors that emit structurally invalid spans.
#[derive(Debug, Error)]
pub enum RedactError {
    #[error("invalid span [{start}, {end}) for text of {len} characters")]
    InvalidSpan { start: usize, end: usize, len: usize },

    #[error("span starting at {start} overlaps a span ending at {previous_end}")]
    OverlappingSpans { previous_end: usize, start: usize },

    #[error("failed to compile pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("invalid config: {reason}")]
    Config { reason: String },
}

pub type Result<T> = std::result::Result<T, RedactError>;
