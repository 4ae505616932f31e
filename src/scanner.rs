//! Discovery and in-place decryption of ciphertext embedded in free text.
//!
//! Encrypted payloads produced by [`encrypt_to_base64`](crate::encrypt_to_base64)
//! share a fixed four-character prefix, so they can be spotted inside any
//! text without parsing it. The scanner finds those spans and replaces the
//! ones the caller's keys can open, leaving everything else untouched.

use std::collections::HashMap;

use crate::engine::{self, Decrypted};
use crate::material::PrivateMaterial;

/// Leading characters of every base64-encoded envelope this crate produces.
///
/// The first packet of an envelope is a version 3 session-key packet for a
/// Curve25519 key, so the binary form always begins with the same three
/// bytes and the base64 form with the same four characters.
pub const ENVELOPE_MARKER: &str = "wV4D";

/// Characters that terminate a ciphertext span.
///
/// All are ASCII, so cutting a span at one of them can never split a
/// multi-byte character.
const SPAN_DELIMITERS: [char; 5] = ['"', '<', '>', '\n', ' '];

/// Byte range of one ciphertext span within a scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherSpan {
    /// Byte offset of the first marker character.
    pub start: usize,
    /// Byte offset one past the last span character.
    pub end: usize,
}

impl CipherSpan {
    /// The span's text, marker included.
    pub fn body<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

/// Result of a scan-and-substitute pass over a text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    /// The text with every decryptable span replaced.
    pub text: String,
    /// How many spans were replaced, counting repeats separately.
    pub decrypted_count: usize,
}

/// Find every ciphertext span in a text.
///
/// A span starts at an occurrence of [`ENVELOPE_MARKER`] and runs to the
/// next delimiter character or the end of the text. Spans never overlap:
/// a marker inside an already-found span is part of that span, not the
/// start of a new one.
///
/// # Example
///
/// ```
/// use spotcrypt::find_ciphertext_spans;
///
/// let text = "before wV4Dabc123 after";
/// let spans = find_ciphertext_spans(text);
/// assert_eq!(spans.len(), 1);
/// assert_eq!(spans[0].body(text), "wV4Dabc123");
/// ```
pub fn find_ciphertext_spans(text: &str) -> Vec<CipherSpan> {
    let mut spans = Vec::new();
    let mut offset = 0;

    while let Some(found) = text[offset..].find(ENVELOPE_MARKER) {
        let start = offset + found;
        let rest = &text[start..];
        let len = rest.find(&SPAN_DELIMITERS[..]).unwrap_or(rest.len());
        spans.push(CipherSpan {
            start,
            end: start + len,
        });
        // The marker itself contains no delimiter, so this always advances.
        offset = start + len;
    }

    spans
}

/// Replace every decryptable ciphertext span in a text.
///
/// Each distinct span body is decrypted at most once, however often it
/// repeats; every occurrence of a decryptable body is replaced and counted.
/// A span none of the keys can open is left in place byte for byte.
///
/// A replaced span reads `{plaintext} decrypted with {label} private key`,
/// naming the key that opened it.
///
/// # Arguments
/// * `text` - The text to scan
/// * `keys` - Private keys to try against each span
pub fn decrypt_and_substitute(text: &str, keys: &[&PrivateMaterial]) -> ScanOutcome {
    let spans = find_ciphertext_spans(text);
    if spans.is_empty() {
        return ScanOutcome {
            text: text.to_string(),
            decrypted_count: 0,
        };
    }

    log::debug!("found {} ciphertext span(s)", spans.len());

    // First pass: resolve each distinct body once.
    let mut resolved: HashMap<&str, Option<Decrypted>> = HashMap::new();
    for span in &spans {
        let body = span.body(text);
        resolved
            .entry(body)
            .or_insert_with(|| engine::decrypt_base64(body, keys).ok());
    }

    // Second pass: reassemble the text in span order.
    let mut result = String::with_capacity(text.len());
    let mut cursor = 0;
    let mut decrypted_count = 0;

    for span in &spans {
        result.push_str(&text[cursor..span.start]);
        let body = span.body(text);
        match resolved.get(body).and_then(|d| d.as_ref()) {
            Some(decrypted) => {
                result.push_str(&decrypted.plaintext);
                result.push_str(" decrypted with ");
                result.push_str(&decrypted.key_label);
                result.push_str(" private key");
                decrypted_count += 1;
            }
            None => result.push_str(body),
        }
        cursor = span.end;
    }
    result.push_str(&text[cursor..]);

    ScanOutcome {
        text: result,
        decrypted_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_marker_no_spans() {
        assert!(find_ciphertext_spans("nothing encrypted here").is_empty());
    }

    #[test]
    fn test_span_byte_offsets() {
        let text = "x wV4Dabc y";
        let spans = find_ciphertext_spans(text);
        assert_eq!(spans, vec![CipherSpan { start: 2, end: 9 }]);
    }

    #[test]
    fn test_span_runs_to_end_of_text() {
        let text = "tail: wV4Dabc";
        let spans = find_ciphertext_spans(text);
        assert_eq!(spans[0].body(text), "wV4Dabc");
        assert_eq!(spans[0].end, text.len());
    }

    #[test]
    fn test_each_delimiter_terminates() {
        for delimiter in ['"', '<', '>', '\n', ' '] {
            let text = format!("wV4Dabc{}rest", delimiter);
            let spans = find_ciphertext_spans(&text);
            assert_eq!(spans[0].body(&text), "wV4Dabc", "delimiter {:?}", delimiter);
        }
    }

    #[test]
    fn test_marker_inside_span_is_not_a_new_span() {
        let text = "wV4DabcwV4Ddef end";
        let spans = find_ciphertext_spans(text);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].body(text), "wV4DabcwV4Ddef");
    }

    #[test]
    fn test_multibyte_text_around_spans() {
        let text = "héllo wV4Dabc wörld wV4Ddef";
        let spans = find_ciphertext_spans(text);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].body(text), "wV4Dabc");
        assert_eq!(spans[1].body(text), "wV4Ddef");
    }

    #[test]
    fn test_substitute_without_spans_is_identity() {
        let outcome = decrypt_and_substitute("plain text only", &[]);
        assert_eq!(outcome.text, "plain text only");
        assert_eq!(outcome.decrypted_count, 0);
    }

    #[test]
    fn test_undecryptable_span_left_in_place() {
        // Not valid base64 past the marker, so decryption cannot succeed.
        let text = "a wV4D!!! b";
        let outcome = decrypt_and_substitute(text, &[]);
        assert_eq!(outcome.text, text);
        assert_eq!(outcome.decrypted_count, 0);
    }
}
