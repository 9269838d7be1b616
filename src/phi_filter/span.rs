// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Spans, overlap merging and canonical type selection

use std::cmp::Reverse;

use serde::Serialize;

use super::config::PhiTag;
use super::error::{RedactError, Result};

/// A half-open character interval of a text buffer carrying one or more tags.
///
/// Offsets count characters, not bytes. A span coming straight out of a
/// detector carries one tag; merged spans carry every tag that covered them,
/// in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Span {
    tags: Vec<PhiTag>,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl Span {
    pub fn new(tag: PhiTag, start: usize, end: usize, text: impl Into<String>) -> Self {
        Self {
            tags: vec![tag],
            start,
            end,
            text: text.into(),
        }
    }

    /// Tags accumulated for this span. Never empty.
    pub fn tags(&self) -> &[PhiTag] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Canonical tag used to pick this span's placeholder
    pub fn canonical_tag(&self) -> Option<PhiTag> {
        resolve_type(&self.tags)
    }

    fn check_bounds(&self, text_len: usize) -> Result<()> {
        check_bounds(self.start, self.end, text_len)
    }
}

/// Reject `[start, end)` unless `start < end <= text_len`.
pub fn check_bounds(start: usize, end: usize, text_len: usize) -> Result<()> {
    if start < end && end <= text_len {
        Ok(())
    } else {
        Err(RedactError::InvalidSpan {
            start,
            end,
            len: text_len,
        })
    }
}

/// Fixed priority used to pick one tag per span. Structured identifiers win
/// over model-derived labels covering the same text.
pub const TYPE_PRIORITY: [PhiTag; 11] = [
    PhiTag::Email,
    PhiTag::Ssn,
    PhiTag::Phone,
    PhiTag::MedicalRecord,
    PhiTag::Id,
    PhiTag::Date,
    PhiTag::Ip,
    PhiTag::Url,
    PhiTag::Name,
    PhiTag::Gpe,
    PhiTag::Org,
];

/// Select the canonical tag of a merged span.
///
/// Returns the highest-priority tag present, or the first tag when none of
/// the prioritized tags is present. `None` only for an empty slice.
pub fn resolve_type(tags: &[PhiTag]) -> Option<PhiTag> {
    TYPE_PRIORITY
        .iter()
        .find(|t| tags.contains(t))
        .copied()
        .or_else(|| tags.first().copied())
}

/// Sort spans by start, longest first on ties.
pub fn sort_spans(spans: &mut [Span]) {
    spans.sort_by_key(|s| (s.start, Reverse(s.len())));
}

/// Merge overlapping spans into a non-overlapping, start-ordered list.
///
/// Spans touching at a boundary (`next.start == open.end`) are merged too.
/// Every input span is checked against `text` first; an out-of-range or empty
/// span is a detector bug and is rejected.
pub fn merge_spans(text: &str, mut spans: Vec<Span>) -> Result<Vec<Span>> {
    let offsets = CharOffsets::new(text);
    for span in &spans {
        span.check_bounds(offsets.len())?;
    }
    sort_spans(&mut spans);

    let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(open) if span.start <= open.end => {
                if span.end > open.end {
                    open.end = span.end;
                    open.text = offsets.slice(text, open.start, open.end).to_string();
                }
                for tag in span.tags {
                    if !open.tags.contains(&tag) {
                        open.tags.push(tag);
                    }
                }
            }
            _ => merged.push(span),
        }
    }

    Ok(merged)
}

/// Check that `spans` is ordered, non-overlapping and inside `text`.
pub fn validate_merged(text: &str, spans: &[Span]) -> Result<()> {
    let len = text.chars().count();
    let mut previous_end = 0;
    for (i, span) in spans.iter().enumerate() {
        span.check_bounds(len)?;
        if i > 0 && span.start < previous_end {
            return Err(RedactError::OverlappingSpans {
                previous_end,
                start: span.start,
            });
        }
        previous_end = span.end;
    }
    Ok(())
}

/// Byte offset of every character boundary in a string.
///
/// Regex matches report byte offsets; spans are expressed in characters.
pub struct CharOffsets {
    bounds: Vec<usize>,
}

impl CharOffsets {
    pub fn new(text: &str) -> Self {
        let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        bounds.push(text.len());
        Self { bounds }
    }

    /// Number of characters
    pub fn len(&self) -> usize {
        self.bounds.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Character index of a byte offset that lies on a char boundary
    pub fn char_at(&self, byte: usize) -> usize {
        match self.bounds.binary_search(&byte) {
            Ok(i) | Err(i) => i,
        }
    }

    /// Byte offset of a character index, clamped to the end of the text
    pub fn byte_at(&self, ch: usize) -> usize {
        self.bounds[ch.min(self.len())]
    }

    /// Slice by character range, clamped to the text.
    pub fn slice<'a>(&self, text: &'a str, start: usize, end: usize) -> &'a str {
        let lo = self.byte_at(start);
        let hi = self.byte_at(end).max(lo);
        &text[lo..hi]
    }

    /// Up to `radius` characters on each side of `[start, end)`, plus the span.
    pub fn window<'a>(&self, text: &'a str, start: usize, end: usize, radius: usize) -> &'a str {
        self.slice(text, start.saturating_sub(radius), end.saturating_add(radius))
    }
}
