//! HTML escaping.
//!
//! [`escape`] is the only function that turns untrusted values into markup.
//! Every slot serializer calls it exactly once on the final string of a slot,
//! never on something that was already escaped.

use std::borrow::Cow;

/// Escape `& < > " '` so the result is safe in text and in quoted attribute values.
///
/// Returns the input unchanged (borrowed) when there is nothing to escape.
///
/// ```
/// assert_eq!(hyperweave::escape("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
/// assert_eq!(hyperweave::escape("plain"), "plain");
/// ```
pub fn escape(text: &str) -> Cow<'_, str> {
    escape_with(text, |b| {
        Some(match b {
            b'&' => "&amp;",
            b'<' => "&lt;",
            b'>' => "&gt;",
            b'"' => "&quot;",
            b'\'' => "&#39;",
            _ => return None,
        })
    })
}

/// Re-encode literal template text after the tokenizer decoded its entities.
///
/// Only `& < >` are significant in a text node, so quotes are left alone and
/// literal skeleton text keeps its original look.
pub(crate) fn escape_text(text: &str) -> Cow<'_, str> {
    escape_with(text, |b| {
        Some(match b {
            b'&' => "&amp;",
            b'<' => "&lt;",
            b'>' => "&gt;",
            _ => return None,
        })
    })
}

fn escape_with(text: &str, entity: impl Fn(u8) -> Option<&'static str>) -> Cow<'_, str> {
    let bytes = text.as_bytes();
    let Some(first) = bytes.iter().position(|&b| entity(b).is_some()) else {
        return Cow::Borrowed(text);
    };

    let mut out = String::with_capacity(text.len() + 16);
    out.push_str(&text[..first]);
    let mut start = first;
    for (i, &b) in bytes.iter().enumerate().skip(first) {
        if let Some(replacement) = entity(b) {
            // Only ASCII bytes are replaced, so `start..i` is always on a char boundary.
            out.push_str(&text[start..i]);
            out.push_str(replacement);
            start = i + 1;
        }
    }
    out.push_str(&text[start..]);
    Cow::Owned(out)
}
