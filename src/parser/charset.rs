//! Body text decoding with a layered charset fallback.
//!
//! Real-world mail mislabels charsets and double-encodes Unicode, so decoding
//! never fails: strict decode, then replacement decode, then an optional pass
//! that resolves literal `\uXXXX` escapes.

use std::borrow::Cow;

use encoding_rs::Encoding;
use tracing::{debug, warn};

use super::escape;

/// Charset assumed when a part does not declare one.
pub const DEFAULT_CHARSET: &str = "utf-8";

/// Decode a part payload into text.
///
/// `declared_charset` is the `charset` parameter of the part, if any. Labels
/// are resolved with the WHATWG rules used by browsers (`iso-8859-1` maps to
/// windows-1252, `latin1` and `utf8` are accepted, and so on).
pub fn decode(bytes: &[u8], declared_charset: Option<&str>) -> String {
    let label = declared_charset
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .unwrap_or(DEFAULT_CHARSET);

    let decoded = decode_strict(bytes, label).unwrap_or_else(|| {
        warn!(charset = label, "Strict decode failed, using replacement mode");
        decode_lossy(bytes, label)
    });

    resolve_escapes(decoded)
}

/// Decode without replacement. `None` for unknown labels and malformed input.
pub fn decode_strict(bytes: &[u8], label: &str) -> Option<String> {
    let encoding = Encoding::for_label(label.as_bytes())?;
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(Cow::into_owned)
}

/// Decode with U+FFFD for every malformed sequence.
///
/// Unknown labels fall back to UTF-8.
pub fn decode_lossy(bytes: &[u8], label: &str) -> String {
    let encoding = Encoding::for_label(label.as_bytes()).unwrap_or_else(|| {
        debug!(charset = label, "Unknown charset, decoding as UTF-8");
        encoding_rs::UTF_8
    });
    let (text, _had_errors) = encoding.decode_without_bom_handling(bytes);
    text.into_owned()
}

/// Replace literal Unicode escapes, keeping the input if they do not decode.
fn resolve_escapes(decoded: String) -> String {
    if !escape::contains_unicode_escape(&decoded) {
        return decoded;
    }
    match escape::decode_escapes(&decoded) {
        Ok(unescaped) => {
            debug!(
                preview = %unescaped.chars().take(100).collect::<String>(),
                "Resolved unicode escapes"
            );
            unescaped
        }
        Err(e) => {
            debug!(error = %e, "Unicode escape decoding skipped");
            decoded
        }
    }
}
