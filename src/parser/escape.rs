//! Backslash escape decoding for bodies that carry literal `\uXXXX` text.
//!
//! Some mail clients double-encode Unicode and ship the escape sequences
//! themselves as body text. The decoder understands the usual backslash
//! escapes; everything that is not an escape keeps its code points.

use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

/// Reasons an escape sequence could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EscapeError {
    /// The text ends with a lone backslash.
    #[error("backslash at end of text")]
    TrailingBackslash,

    /// An escape is missing some of its hex digits.
    #[error("truncated \\{0} escape")]
    Truncated(char),

    /// The escape names a surrogate or a value above U+10FFFF.
    #[error("invalid code point U+{0:X}")]
    InvalidCodePoint(u32),

    /// `\N{...}` escapes need a Unicode name table.
    #[error("named escapes are not supported")]
    NamedEscape,
}

/// Return `true` if `text` contains a `\uXXXX` or `\UXXXXXXXX` sequence.
pub fn contains_unicode_escape(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.iter().enumerate().any(|(i, &b)| {
        if b != b'\\' {
            return false;
        }
        let width = match bytes.get(i + 1) {
            Some(b'u') => 4,
            Some(b'U') => 8,
            _ => return false,
        };
        bytes
            .get(i + 2..i + 2 + width)
            .is_some_and(|digits| digits.iter().all(u8::is_ascii_hexdigit))
    })
}

/// Decode every backslash escape in `text`.
///
/// Unknown escapes such as `\d` are kept verbatim. A backslash followed by a
/// newline is a line continuation and disappears.
pub fn decode_escapes(text: &str) -> Result<String, EscapeError> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }

        let Some(kind) = chars.next() else {
            return Err(EscapeError::TrailingBackslash);
        };

        match kind {
            '\n' => {}
            '\\' | '\'' | '"' => out.push(kind),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0C}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\u{0B}'),
            '0'..='7' => out.push(take_octal(kind, &mut chars)),
            'x' => {
                let value = take_hex(&mut chars, 2).ok_or(EscapeError::Truncated('x'))?;
                out.push(to_char(value)?);
            }
            'u' => {
                let value = take_hex(&mut chars, 4).ok_or(EscapeError::Truncated('u'))?;
                out.push(utf16_unit(value, &mut chars)?);
            }
            'U' => {
                let value = take_hex(&mut chars, 8).ok_or(EscapeError::Truncated('U'))?;
                out.push(to_char(value)?);
            }
            'N' => return Err(EscapeError::NamedEscape),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }

    Ok(out)
}

/// Read exactly `width` hex digits.
fn take_hex(chars: &mut Peekable<Chars<'_>>, width: usize) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..width {
        let digit = chars.peek()?.to_digit(16)?;
        chars.next();
        value = value * 16 + digit;
    }
    Some(value)
}

/// Read up to two more octal digits after `first`.
fn take_octal(first: char, chars: &mut Peekable<Chars<'_>>) -> char {
    let mut value = first.to_digit(8).unwrap_or(0);
    for _ in 0..2 {
        match chars.peek().and_then(|c| c.to_digit(8)) {
            Some(digit) => {
                value = value * 8 + digit;
                chars.next();
            }
            None => break,
        }
    }
    // At most 0o777, always a valid scalar value.
    char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER)
}

/// Resolve a `\uXXXX` unit, joining a high surrogate with a following `\uXXXX` low one.
fn utf16_unit(value: u32, chars: &mut Peekable<Chars<'_>>) -> Result<char, EscapeError> {
    if !(0xD800..=0xDBFF).contains(&value) {
        return to_char(value);
    }

    let mut lookahead = chars.clone();
    if lookahead.next() == Some('\\') && lookahead.next() == Some('u') {
        if let Some(low) = take_hex(&mut lookahead, 4) {
            if (0xDC00..=0xDFFF).contains(&low) {
                *chars = lookahead;
                let combined = 0x10000 + ((value - 0xD800) << 10) + (low - 0xDC00);
                return to_char(combined);
            }
        }
    }
    Err(EscapeError::InvalidCodePoint(value))
}

fn to_char(value: u32) -> Result<char, EscapeError> {
    char::from_u32(value).ok_or(EscapeError::InvalidCodePoint(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_unicode_escapes() {
        assert!(contains_unicode_escape(r"caf\u00e9"));
        assert!(contains_unicode_escape(r"smile \U0001F600"));
        assert!(!contains_unicode_escape(r"path C:\users\me"));
        assert!(!contains_unicode_escape(r"short \u00e"));
        assert!(!contains_unicode_escape("no escapes at all"));
    }

    #[test]
    fn test_decodes_basic_escapes() {
        assert_eq!(decode_escapes(r"caf\u00e9").unwrap(), "café");
        assert_eq!(decode_escapes(r"a\tb\nc").unwrap(), "a\tb\nc");
        assert_eq!(decode_escapes(r"\x41\101").unwrap(), "AA");
        assert_eq!(decode_escapes(r"\U0001F600").unwrap(), "😀");
    }

    #[test]
    fn test_joins_surrogate_pairs() {
        assert_eq!(decode_escapes(r"\ud83d\ude00").unwrap(), "😀");
    }

    #[test]
    fn test_keeps_non_ascii_text() {
        assert_eq!(decode_escapes(r"héllo \u0041").unwrap(), "héllo A");
    }

    #[test]
    fn test_unknown_escape_is_kept() {
        assert_eq!(decode_escapes(r"\d \u0041").unwrap(), r"\d A");
    }

    #[test]
    fn test_line_continuation() {
        assert_eq!(decode_escapes("one\\\ntwo").unwrap(), "onetwo");
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            decode_escapes(r"\u0041 trailing \"),
            Err(EscapeError::TrailingBackslash)
        );
        assert_eq!(decode_escapes(r"\x4"), Err(EscapeError::Truncated('x')));
        assert_eq!(
            decode_escapes(r"\ud83d alone"),
            Err(EscapeError::InvalidCodePoint(0xD83D))
        );
        assert_eq!(
            decode_escapes(r"\U00110000"),
            Err(EscapeError::InvalidCodePoint(0x110000))
        );
        assert_eq!(
            decode_escapes(r"\N{BULLET}"),
            Err(EscapeError::NamedEscape)
        );
    }
}
