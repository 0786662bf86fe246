//! Header decoding: RFC 2047 encoded-words, HTML escaping, and date parsing.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use encoding_rs::Encoding;
use mailparse::{MailHeaderMap, ParsedMail};
use thiserror::Error;
use tracing::warn;

use crate::model::message::{Header, PLACEHOLDER};

/// Encoded-words in the wild often drop their `=` padding.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Why a header field could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderDecodeError {
    /// The encoded-word names a charset we do not know.
    #[error("unknown charset '{0}'")]
    UnknownCharset(String),

    /// The bytes are not valid in the declared charset.
    #[error("invalid byte sequence for charset '{0}'")]
    Malformed(String),

    /// A segment without a charset contains 8-bit bytes.
    #[error("non-ASCII bytes in an unlabelled segment")]
    NotAscii,

    /// A `B` encoded-word is not valid base64.
    #[error("invalid base64 in encoded-word: {0}")]
    InvalidBase64(String),
}

/// One piece of a header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Plain text, used verbatim.
    Text(String),
    /// Payload of an encoded-word. `None` charset means 7-bit ASCII.
    Encoded {
        charset: Option<String>,
        bytes: Vec<u8>,
    },
}

/// Build the display [`Header`] of a parsed message.
///
/// A field that fails to decode becomes [`PLACEHOLDER`]; the failure is
/// logged and the rest of the header is still built.
pub fn parse_header(mail: &ParsedMail<'_>) -> Header {
    let headers = mail.get_headers();
    let raw_value = |name: &str| {
        headers
            .get_first_header(name)
            .map(|h| decode_header_bytes(h.get_value_raw()))
    };

    let from = raw_value("From")
        .map(|v| decode_field_or_placeholder(&v, "from"))
        .unwrap_or_else(|| "No sender".to_string());
    let to = raw_value("To")
        .map(|v| decode_field_or_placeholder(&v, "to"))
        .unwrap_or_else(|| "No recipient".to_string());

    let subject_text = match raw_value("Subject") {
        Some(v) => decode_text(&v).unwrap_or_else(|e| {
            warn!(field = "subject", error = %e, "Failed to decode header field");
            PLACEHOLDER.to_string()
        }),
        None => "No subject".to_string(),
    };
    let subject = escape_html(&subject_text);

    let date = headers
        .get_first_value("Date")
        .and_then(|d| parse_date(&d));

    Header::new(from, to, subject, subject_text, date)
}

/// Decode a raw header value into an HTML-safe string.
pub fn decode_field(raw: &str) -> Result<String, HeaderDecodeError> {
    decode_text(raw).map(|text| escape_html(&text))
}

/// Like [`decode_field`], but degrade to [`PLACEHOLDER`] on failure.
pub fn decode_field_or_placeholder(raw: &str, field: &str) -> String {
    decode_field(raw).unwrap_or_else(|e| {
        warn!(field, error = %e, "Failed to decode header field");
        PLACEHOLDER.to_string()
    })
}

/// Decode a raw header value into plain (unescaped) text.
pub fn decode_text(raw: &str) -> Result<String, HeaderDecodeError> {
    let unfolded = unfold(raw);
    let mut out = String::with_capacity(unfolded.len());
    for segment in split_encoded_words(&unfolded)? {
        match segment {
            Segment::Text(text) => out.push_str(&text),
            Segment::Encoded { charset, bytes } => {
                out.push_str(&decode_segment(charset.as_deref(), &bytes)?);
            }
        }
    }
    Ok(out)
}

/// Escape `& < > " '` (and `/`) for safe inclusion in HTML.
pub fn escape_html(text: &str) -> String {
    html_escape::encode_safe(text).into_owned()
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to windows-1252 (which accepts every byte).
pub fn decode_header_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Remove folding line breaks (RFC 5322 §2.2.3).
fn unfold(raw: &str) -> String {
    raw.chars().filter(|&c| c != '\r' && c != '\n').collect()
}

/// Split a header value into plain text and encoded-word segments.
///
/// Example: `"Re: =?UTF-8?B?SG9sYQ==?="` → `[Text("Re: "), Encoded { utf-8, b"Hola" }]`
///
/// Whitespace between two adjacent encoded-words is dropped (RFC 2047 §6.2).
/// A `=?` that does not start a well-formed encoded-word is kept as text.
pub fn split_encoded_words(input: &str) -> Result<Vec<Segment>, HeaderDecodeError> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        if !last_was_encoded || !before.trim().is_empty() {
            text.push_str(before);
        }

        let after_start = &remaining[start + 2..];
        match parse_one_word(after_start)? {
            Some(word) => {
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(Segment::Encoded {
                    charset: word.charset,
                    bytes: word.bytes,
                });
                remaining = &after_start[word.consumed..];
                last_was_encoded = true;
            }
            None => {
                text.push_str("=?");
                remaining = after_start;
                last_was_encoded = false;
            }
        }
    }

    text.push_str(remaining);
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(segments)
}

struct EncodedWord {
    charset: Option<String>,
    bytes: Vec<u8>,
    consumed: usize, // bytes consumed from the string *after* the initial "=?"
}

/// Parse `charset?encoding?text?=`. `Ok(None)` when the syntax does not match.
fn parse_one_word(s: &str) -> Result<Option<EncodedWord>, HeaderDecodeError> {
    let Some(first_q) = s.find('?') else {
        return Ok(None);
    };
    let charset = &s[..first_q];

    let rest = &s[first_q + 1..];
    let Some(second_q) = rest.find('?') else {
        return Ok(None);
    };
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let Some(end) = rest2.find("?=") else {
        return Ok(None);
    };
    let encoded_text = &rest2[..end];

    if charset.contains(char::is_whitespace) {
        return Ok(None);
    }

    let bytes = match encoding {
        "B" | "b" => LENIENT_BASE64
            .decode(encoded_text)
            .map_err(|e| HeaderDecodeError::InvalidBase64(e.to_string()))?,
        "Q" | "q" => decode_q_encoding(encoded_text),
        _ => return Ok(None),
    };

    // RFC 2231 language suffix: "utf-8*en"
    let charset = charset.split('*').next().unwrap_or_default().trim();

    Ok(Some(EncodedWord {
        charset: (!charset.is_empty()).then(|| charset.to_string()),
        bytes,
        consumed: first_q + 1 + second_q + 1 + end + 2,
    }))
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                match hex_pair(bytes[i + 1], bytes[i + 2]) {
                    Some(byte) => {
                        result.push(byte);
                        i += 3;
                    }
                    None => {
                        result.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

fn hex_pair(hi: u8, lo: u8) -> Option<u8> {
    let hi = (hi as char).to_digit(16)?;
    let lo = (lo as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}

/// Strictly decode one encoded-word payload.
fn decode_segment(charset: Option<&str>, bytes: &[u8]) -> Result<String, HeaderDecodeError> {
    let Some(label) = charset else {
        if !bytes.is_ascii() {
            return Err(HeaderDecodeError::NotAscii);
        }
        return Ok(bytes.iter().map(|&b| b as char).collect());
    };

    let encoding = Encoding::for_label(label.as_bytes())
        .ok_or_else(|| HeaderDecodeError::UnknownCharset(label.to_string()))?;
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
        .ok_or_else(|| HeaderDecodeError::Malformed(label.to_string()))
}

/// Parse an email date string in various common formats.
///
/// Supports RFC 2822, ISO 8601, and many broken real-world variants. The
/// sender's UTC offset is kept; zone-less dates are taken as UTC.
pub fn parse_date(date_str: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Try chrono's RFC 2822
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt);
    }

    // Try ISO 8601 / RFC 3339
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt);
    }

    // Remove leading day-of-week: "Thu, " or "Thu "
    let no_dow = strip_day_of_week(trimmed);

    // IMAP-style: "16-JUL-2025 03:01:03" → normalize to "16 Jul 2025 03:01:03"
    let no_dow_normalized = normalize_imap_date(&no_dow);

    let formats = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S",
        "%d %b %Y %H:%M %z",
        "%b %d %H:%M:%S %Y",
        "%Y-%m-%dT%H:%M:%S%z",
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
    ];

    // Try both the original (stripped DOW) and the IMAP-normalized variant
    for candidate in [&no_dow, &no_dow_normalized] {
        for fmt in &formats {
            if let Ok(dt) = DateTime::parse_from_str(candidate, fmt) {
                return Some(dt);
            }
            if let Ok(ndt) = NaiveDateTime::parse_from_str(candidate, fmt) {
                return Some(Utc.from_utc_datetime(&ndt).fixed_offset());
            }
        }
    }

    // Replace named timezones with offsets and try again
    for candidate in [&no_dow, &no_dow_normalized] {
        let replaced = replace_named_tz(candidate);
        for fmt in &formats {
            if let Ok(dt) = DateTime::parse_from_str(&replaced, fmt) {
                return Some(dt);
            }
        }
    }

    // mailparse's lenient parser as last resort
    if let Some(dt) = mailparse::dateparse(trimmed)
        .ok()
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
    {
        return Some(dt.fixed_offset());
    }

    warn!(date = trimmed, "Could not parse date");
    None
}

/// Normalize IMAP-style dates: `"16-JUL-2025 03:01:03"` → `"16 Jul 2025 03:01:03"`.
fn normalize_imap_date(s: &str) -> String {
    if !s.contains('-') {
        return s.to_string();
    }

    let months = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];

    for month in months {
        for variant in [month.to_uppercase(), month.to_lowercase(), month.to_string()] {
            let pattern = format!("-{variant}-");
            if s.contains(&pattern) {
                return s.replacen(&pattern, &format!(" {month} "), 1);
            }
        }
    }

    s.to_string()
}

/// Strip leading day-of-week prefix (e.g. "Thu, " or "Thu ").
fn strip_day_of_week(s: &str) -> String {
    let days = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    for day in days {
        if let Some(rest) = s.strip_prefix(day) {
            if rest.starts_with(',') || rest.starts_with(' ') {
                return rest.trim_start_matches(',').trim().to_string();
            }
        }
    }
    s.to_string()
}

/// Replace well-known timezone abbreviations with numeric offsets.
fn replace_named_tz(s: &str) -> String {
    let tzs = [
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("CEST", "+0200"),
        ("CET", "+0100"),
        ("JST", "+0900"),
    ];
    let mut result = s.to_string();
    for (name, offset) in &tzs {
        if result.ends_with(name) {
            let pos = result.len() - name.len();
            result.replace_range(pos.., offset);
            return result;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_base64_encoded_word() {
        assert_eq!(decode_text("=?UTF-8?B?SG9sYSBtdW5kbw==?=").unwrap(), "Hola mundo");
    }

    #[test]
    fn test_decode_unpadded_base64() {
        assert_eq!(decode_text("=?UTF-8?B?SG9sYQ?=").unwrap(), "Hola");
    }

    #[test]
    fn test_decode_q_encoded_word() {
        assert_eq!(decode_text("=?ISO-8859-1?Q?caf=E9?=").unwrap(), "café");
        assert_eq!(
            decode_text("=?ISO-8859-1?Q?R=E9sum=E9_du_projet?=").unwrap(),
            "Résumé du projet"
        );
    }

    #[test]
    fn test_decode_multiple_encoded_words() {
        let input = "=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?=";
        assert_eq!(decode_text(input).unwrap(), "Hola mundo");
    }

    #[test]
    fn test_decode_mixed_plain_and_encoded() {
        let input = "Re: =?UTF-8?B?SG9sYQ==?= there";
        assert_eq!(decode_text(input).unwrap(), "Re: Hola there");
    }

    #[test]
    fn test_decode_folded_value() {
        let input = "=?UTF-8?Q?Caf=C3=A9?=\r\n =?UTF-8?Q?_con_le=C3=B1a?=";
        assert_eq!(decode_text(input).unwrap(), "Café con leña");
    }

    #[test]
    fn test_decode_utf8_base64_japanese() {
        // 山田太郎
        assert_eq!(decode_text("=?UTF-8?B?5bGx55Sw5aSq6YOO?=").unwrap(), "山田太郎");
    }

    #[test]
    fn test_decode_language_suffix() {
        assert_eq!(decode_text("=?utf-8*en?Q?hello?=").unwrap(), "hello");
    }

    #[test]
    fn test_plain_text_is_verbatim() {
        let segments = split_encoded_words("First Last <first.last@example.com>").unwrap();
        assert_eq!(
            segments,
            vec![Segment::Text("First Last <first.last@example.com>".into())]
        );
    }

    #[test]
    fn test_malformed_word_is_literal_text() {
        assert_eq!(decode_text("50% =?off").unwrap(), "50% =?off");
    }

    #[test]
    fn test_empty_charset_means_ascii() {
        assert_eq!(decode_text("=??Q?plain?=").unwrap(), "plain");
        assert_eq!(
            decode_text("=??Q?caf=E9?="),
            Err(HeaderDecodeError::NotAscii)
        );
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(
            decode_text("=?x-unknown?Q?abc?="),
            Err(HeaderDecodeError::UnknownCharset("x-unknown".into()))
        );
        assert_eq!(
            decode_text("=?UTF-8?Q?=FF=FE?="),
            Err(HeaderDecodeError::Malformed("UTF-8".into()))
        );
        assert!(matches!(
            decode_text("=?UTF-8?B?!!!!?="),
            Err(HeaderDecodeError::InvalidBase64(_))
        ));
    }

    #[test]
    fn test_decode_field_escapes_html() {
        assert_eq!(decode_field("Test <tag> & co").unwrap(), "Test &lt;tag&gt; &amp; co");
        assert_eq!(
            decode_field("=?UTF-8?B?PGI+Ym9sZDwvYj4=?=").unwrap(),
            "&lt;b&gt;bold&lt;&#x2F;b&gt;"
        );
    }

    #[test]
    fn test_placeholder_on_failure() {
        assert_eq!(
            decode_field_or_placeholder("=?x-unknown?Q?abc?=", "subject"),
            PLACEHOLDER
        );
    }

    #[test]
    fn test_decode_header_bytes_latin1_fallback() {
        assert_eq!(decode_header_bytes(b"M\xfcller"), "Müller");
        assert_eq!(decode_header_bytes("Grüße".as_bytes()), "Grüße");
    }

    #[test]
    fn test_parse_date_rfc2822_keeps_offset() {
        let dt = parse_date("Fri, 15 Mar 2024 23:30:00 -0500").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2024-03-15 23:30");
        assert_eq!(dt.offset().local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn test_parse_date_named_tz() {
        assert!(parse_date("Thu, 04 Jan 2024 10:00:00 EST").is_some());
    }

    #[test]
    fn test_parse_date_iso8601() {
        assert!(parse_date("2024-01-04T10:00:00Z").is_some());
    }

    #[test]
    fn test_parse_date_imap_style() {
        let dt = parse_date("16-JUL-2025 03:01:03").expect("IMAP date");
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2025-07-16");
    }

    #[test]
    fn test_parse_date_garbage() {
        assert!(parse_date("").is_none());
        assert!(parse_date("not a date at all").is_none());
    }

    #[test]
    fn test_normalize_imap_date() {
        assert_eq!(
            normalize_imap_date("16-JUL-2025 03:01:03"),
            "16 Jul 2025 03:01:03"
        );
        assert_eq!(
            normalize_imap_date("04 Jan 2024 10:00:00"),
            "04 Jan 2024 10:00:00"
        );
    }
}
