//! Helpers for interpreting stream-level string values.
//!
//! Character set transcoding is out of the scope of this crate: values are
//! interpreted as ASCII and only trailing padding is dealt with here. String
//! values of even length may be padded with a trailing space, and unique
//! identifiers with a single trailing NUL byte when the text has odd length.

use std::borrow::Cow;

/// Interpret the raw bytes of a UI (Unique Identifier) value.
///
/// Trailing spaces and the NUL pad byte are trimmed, unless the value is
/// made entirely of whitespace, in which case it is preserved verbatim.
pub fn parse_uid(data: &[u8]) -> Cow<str> {
    let text = String::from_utf8_lossy(data);

    if text.chars().all(char::is_whitespace) {
        return text;
    }

    match text {
        Cow::Borrowed(text) => Cow::Borrowed(text.trim_end_matches([' ', '\0'])),
        Cow::Owned(text) => Cow::Owned(text.trim_end_matches([' ', '\0']).to_string()),
    }
}

/// Trim the trailing whitespace and NUL padding from a string value.
pub fn trim_trailing_padding(text: &str) -> &str {
    text.trim_end_matches(|c: char| c.is_whitespace() || c == '\0')
}
