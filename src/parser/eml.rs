//! Parser for individual `.eml` files (RFC 5322 messages without MBOX framing).

use std::path::Path;

use crate::error::{ConvertError, Result};
use crate::model::message::Message;
use crate::parser::{header, mime};

impl Message {
    /// Parse a raw message held in memory.
    pub fn parse(raw: &[u8]) -> Result<Message> {
        parse_message(raw, Path::new("<memory>"))
    }
}

/// Parse a single `.eml` file into a [`Message`].
pub fn parse_eml(path: impl AsRef<Path>) -> Result<Message> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConvertError::FileNotFound(path.to_path_buf())
        } else {
            ConvertError::io(path, e)
        }
    })?;
    parse_message(&data, path)
}

/// Parse raw message bytes. `path` is only used in error reports.
pub fn parse_message(raw: &[u8], path: &Path) -> Result<Message> {
    let bytes = strip_envelope(raw);
    let mail = mailparse::parse_mail(bytes).map_err(|e| ConvertError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Ok(Message {
        header: header::parse_header(&mail),
        content: mime::walk(&mail),
    })
}

/// Skip a UTF-8 BOM and a leading mbox `From ` line, both common in exported `.eml` files.
fn strip_envelope(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::Body;

    #[test]
    fn test_strip_envelope() {
        let data = b"From user@example.com Thu Jan 01 00:00:00 2024\nSubject: Test\n\nBody\n";
        assert!(strip_envelope(data).starts_with(b"Subject:"));
    }

    #[test]
    fn test_strip_envelope_with_bom() {
        let data = b"\xEF\xBB\xBFSubject: Test\n\nBody\n";
        assert!(strip_envelope(data).starts_with(b"Subject:"));
    }

    #[test]
    fn test_strip_envelope_no_from() {
        let data = b"Subject: Test\n\nBody\n";
        assert_eq!(strip_envelope(data), data);
    }

    #[test]
    fn test_parse_in_memory() {
        let raw = b"From: Alice <alice@example.com>\nTo: bob@example.com\nSubject: Lunch?\nDate: Fri, 15 Mar 2024 12:05:00 +0100\n\nSee you at noon.\n";
        let message = Message::parse(raw).unwrap();
        assert_eq!(message.header.from, "Alice &lt;alice@example.com&gt;");
        assert_eq!(message.header.subject_text, "Lunch?");
        assert_eq!(message.header.formatted_date, "2024-03-15, 12:05");
        assert!(matches!(message.content.body, Some(Body::PlainText(_))));
    }

    #[test]
    fn test_missing_headers_use_defaults() {
        let message = Message::parse(b"\nbody only\n").unwrap();
        assert_eq!(message.header.from, "No sender");
        assert_eq!(message.header.to, "No recipient");
        assert_eq!(message.header.subject, "No subject");
        assert_eq!(message.header.formatted_date, "No date");
    }

    #[test]
    fn test_parse_eml_missing_file() {
        let err = parse_eml("/definitely/not/here.eml").unwrap_err();
        assert!(matches!(err, ConvertError::FileNotFound(_)));
    }
}
