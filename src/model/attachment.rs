//! Attachment and inline-image records collected while walking a message.

use md5::{Digest, Md5};

/// Metadata about one attached file, listed in the rendered document.
///
/// Records keep encounter order. Duplicate filenames are legal and listed
/// separately.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AttachmentRecord {
    /// Decoded, HTML-escaped filename.
    pub filename: String,

    /// MIME content type (e.g. `"application/pdf"`).
    pub content_type: String,

    /// Size of the decoded payload in bytes.
    pub size: u64,

    /// MD5 digest of the decoded payload, lowercase hex.
    pub md5: String,
}

impl AttachmentRecord {
    /// Build a record from the decoded payload of an attachment part.
    pub fn from_payload(filename: String, content_type: &str, payload: &[u8]) -> Self {
        Self {
            filename,
            content_type: content_type.to_string(),
            size: payload.len() as u64,
            md5: format!("{:x}", Md5::digest(payload)),
        }
    }
}

/// An image referenced from the HTML body through a `cid:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImageRecord {
    /// Filename from the part headers, if any.
    pub filename: Option<String>,

    /// Raw (transfer-decoded) image bytes.
    pub data: Vec<u8>,

    /// Declared MIME type, used as the `data:` URI media type.
    pub content_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_digest_and_size() {
        let record = AttachmentRecord::from_payload("notes.txt".into(), "text/plain", b"hello");
        assert_eq!(record.size, 5);
        assert_eq!(record.md5, "5d41402abc4b2a76b9719d911017c592");
        assert_eq!(record.content_type, "text/plain");
    }

    #[test]
    fn test_empty_payload_digest() {
        let record = AttachmentRecord::from_payload("empty".into(), "application/octet-stream", b"");
        assert_eq!(record.size, 0);
        assert_eq!(record.md5, "d41d8cd98f00b204e9800998ecf8427e");
    }
}
