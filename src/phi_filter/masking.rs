// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Placeholder substitution for merged spans

use std::borrow::Cow;
use std::collections::BTreeSet;

use super::config::{PhiTag, GENERIC_PLACEHOLDER};
use super::error::Result;
use super::span::{validate_merged, CharOffsets, Span};

/// Replace each merged span with its placeholder.
///
/// # Arguments
/// * `text` - Original text the spans were detected in
/// * `spans` - Ordered, non-overlapping spans (see `merge_spans`)
///
/// # Returns
/// The sorted set of canonical tags applied and the rewritten text. When
/// `spans` is empty the text is returned untouched.
pub fn mask_spans<'a>(text: &'a str, spans: &[Span]) -> Result<(Vec<PhiTag>, Cow<'a, str>)> {
    if spans.is_empty() {
        // Zero-copy when nothing needs masking
        return Ok((Vec::new(), Cow::Borrowed(text)));
    }
    validate_merged(text, spans)?;

    let offsets = CharOffsets::new(text);
    let mut flags = BTreeSet::new();
    let mut out = String::with_capacity(text.len() + spans.len() * 16);
    let mut last = 0;

    for span in spans {
        let start = offsets.byte_at(span.start);
        let end = offsets.byte_at(span.end);
        out.push_str(&text[last..start]);

        let chosen = span.canonical_tag();
        let placeholder = chosen.map_or(GENERIC_PLACEHOLDER, |t| t.placeholder());

        // Keep placeholders from fusing with neighbouring words
        if out.chars().next_back().is_some_and(is_word_like) {
            out.push(' ');
        }
        out.push_str(placeholder);
        if text[end..].chars().next().is_some_and(is_word_like) {
            out.push(' ');
        }

        if let Some(tag) = chosen {
            flags.insert(tag);
        }
        last = end;
    }
    out.push_str(&text[last..]);

    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
    Ok((flags.into_iter().collect(), Cow::Owned(collapsed)))
}

fn is_word_like(c: char) -> bool {
    !c.is_whitespace() && c.is_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phi_filter::error::RedactError;
    use crate::phi_filter::span::merge_spans;

    fn span_of(text: &str, needle: &str, tag: PhiTag) -> Span {
        let byte = text.find(needle).unwrap();
        let start = text[..byte].chars().count();
        Span::new(tag, start, start + needle.chars().count(), needle)
    }

    #[test]
    fn test_mask_empty_spans_is_zero_copy() {
        let text = "No  PHI here";
        let (flags, masked) = mask_spans(text, &[]).unwrap();
        assert!(flags.is_empty());
        assert!(matches!(masked, Cow::Borrowed(_)));
        assert_eq!(masked, text);
    }

    #[test]
    fn test_mask_replaces_and_sorts_flags() {
        let text = "Call 555-0101 or mail a@b.io";
        let spans = vec![
            span_of(text, "555-0101", PhiTag::Phone),
            span_of(text, "a@b.io", PhiTag::Email),
        ];
        let (flags, masked) = mask_spans(text, &spans).unwrap();
        assert_eq!(flags, vec![PhiTag::Email, PhiTag::Phone]);
        assert_eq!(masked, "Call [REDACTED_PHONE] or mail [REDACTED_EMAIL]");
    }

    #[test]
    fn test_mask_inserts_separating_spaces() {
        let text = "contactjohnsmith today";
        let spans = vec![span_of(text, "john", PhiTag::Name)];
        let (_, masked) = mask_spans(text, &spans).unwrap();
        assert_eq!(masked, "contact [REDACTED_NAME] smith today");
    }

    #[test]
    fn test_mask_no_space_next_to_punctuation() {
        let text = "(John), hi";
        let spans = vec![span_of(text, "John", PhiTag::Name)];
        let (_, masked) = mask_spans(text, &spans).unwrap();
        assert_eq!(masked, "([REDACTED_NAME]), hi");
    }

    #[test]
    fn test_mask_uses_canonical_tag() {
        let text = "reach john@example.com now";
        let spans = merge_spans(
            text,
            vec![
                span_of(text, "john", PhiTag::Name),
                span_of(text, "john@example.com", PhiTag::Email),
            ],
        )
        .unwrap();
        let (flags, masked) = mask_spans(text, &spans).unwrap();
        assert_eq!(flags, vec![PhiTag::Email]);
        assert_eq!(masked, "reach [REDACTED_EMAIL] now");
    }

    #[test]
    fn test_mask_multibyte_offsets() {
        let text = "Zoë Müller wohnt in Köln";
        let spans = vec![
            span_of(text, "Zoë Müller", PhiTag::Name),
            span_of(text, "Köln", PhiTag::Gpe),
        ];
        let (flags, masked) = mask_spans(text, &spans).unwrap();
        assert_eq!(flags, vec![PhiTag::Gpe, PhiTag::Name]);
        assert_eq!(masked, "[REDACTED_NAME] wohnt in [REDACTED_LOCATION]");
    }

    #[test]
    fn test_mask_rejects_overlapping_spans() {
        let text = "abcdefgh";
        let spans = vec![
            Span::new(PhiTag::Name, 0, 4, "abcd"),
            Span::new(PhiTag::Org, 2, 6, "cdef"),
        ];
        assert!(matches!(
            mask_spans(text, &spans),
            Err(RedactError::OverlappingSpans { .. })
        ));
    }
}
