//! Core message, header and body types.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};

use super::attachment::{AttachmentRecord, InlineImageRecord};

/// Value shown for a header field that could not be decoded.
pub const PLACEHOLDER: &str = "Not decoded.";

/// Value shown when the message has no usable `Date:` header.
pub const NO_DATE: &str = "No date";

/// Decoded message header, ready for display.
///
/// Decoding failures degrade single fields to [`PLACEHOLDER`]; the header
/// itself is always built.
#[derive(Debug, Clone)]
pub struct Header {
    /// Sender, HTML-escaped.
    pub from: String,

    /// Recipients, HTML-escaped.
    pub to: String,

    /// Subject, HTML-escaped.
    pub subject: String,

    /// Subject as plain decoded text, used to name the output file.
    pub subject_text: String,

    /// Parsed `Date:` header, keeping the sender's UTC offset.
    pub date: Option<DateTime<FixedOffset>>,

    /// `"YYYY-MM-DD, HH:MM"` or [`NO_DATE`].
    pub formatted_date: String,

    /// Pre-rendered HTML table with the fields above.
    pub html: String,
}

impl Header {
    /// Build a header from already-decoded fields.
    ///
    /// `from`, `to` and `subject` must be HTML-safe.
    pub fn new(
        from: String,
        to: String,
        subject: String,
        subject_text: String,
        date: Option<DateTime<FixedOffset>>,
    ) -> Self {
        let formatted_date = date
            .map(|d| d.format("%Y-%m-%d, %H:%M").to_string())
            .unwrap_or_else(|| NO_DATE.to_string());

        let html = format!(
            r#"
<table style="font-family: serif;
              margin-bottom: 20px;
              border-spacing: 1rem 0;
              text-align: left">
<tr><th scope="row">From:</th><td>{from}</td></tr>
<tr><th scope="row">To:</th><td>{to}</td></tr>
<tr><th scope="row">Date:</th><td>{formatted_date}</td></tr>
<tr><th scope="row">Subject:</th><td>{subject}</td></tr>
</table>
"#
        );

        Self {
            from,
            to,
            subject,
            subject_text,
            date,
            formatted_date,
            html,
        }
    }
}

/// The single body that feeds the rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Concatenated `text/html` parts; inline images are embedded later.
    Html(String),
    /// Concatenated `text/plain` parts, converted from Markdown later.
    PlainText(String),
}

/// Everything collected by walking the MIME parts of a message.
#[derive(Debug, Clone, Default)]
pub struct WalkResult {
    /// HTML takes precedence over plain text; `None` when neither exists.
    pub body: Option<Body>,

    /// Attachments in encounter order.
    pub attachments: Vec<AttachmentRecord>,

    /// Inline images keyed by Content-ID.
    pub inline_images: BTreeMap<String, InlineImageRecord>,
}

/// One parsed `.eml` file. Immutable once built.
#[derive(Debug, Clone)]
pub struct Message {
    pub header: Header,
    pub content: WalkResult,
}
