//! MIME part classification and the message walk.
//!
//! The walk visits every part depth-first in document order and folds it into
//! an accumulator. Classification is a pure function of the part's
//! disposition, content type and payload, so both halves are testable without
//! a parsed message.

use std::collections::BTreeMap;

use mailparse::{DispositionType, MailHeaderMap, ParsedMail};
use tracing::{debug, trace, warn};

use crate::model::attachment::{AttachmentRecord, InlineImageRecord};
use crate::model::message::{Body, WalkResult};
use crate::parser::charset::{self, DEFAULT_CHARSET};
use crate::parser::header;

/// Value of a part's `Content-Disposition` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
    Other(String),
}

/// What a part contributes to the rendered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// A `text/plain` or `text/html` body fragment.
    InlineText,
    /// Listed in the attachment table.
    Attachment,
    /// Embedded into the HTML body through its Content-ID.
    InlineImage,
    /// Contributes nothing.
    Ignored,
}

/// Decide the role of a part.
///
/// `content_type` must be lowercase. A missing disposition (`None`) behaves
/// like `inline` for text bodies only.
pub fn classify(disposition: Option<&Disposition>, content_type: &str, has_payload: bool) -> Role {
    if !has_payload {
        return Role::Ignored;
    }

    let is_text_body = content_type == "text/plain" || content_type == "text/html";
    let is_image = content_type.starts_with("image/");

    match disposition {
        None | Some(Disposition::Inline) if is_text_body => Role::InlineText,
        Some(Disposition::Attachment) => Role::Attachment,
        Some(Disposition::Inline) if is_image => Role::InlineImage,
        Some(Disposition::Inline) => Role::Attachment,
        None | Some(Disposition::Other(_)) => Role::Ignored,
    }
}

/// Transient view over one MIME part. Never outlives the walk.
#[derive(Debug, Clone)]
pub struct PartView {
    pub disposition: Option<Disposition>,
    /// Lowercased `type/subtype`.
    pub content_type: String,
    /// Declared charset, or [`DEFAULT_CHARSET`].
    pub charset: String,
    /// Content-ID with angle brackets stripped.
    pub content_id: Option<String>,
    /// Raw filename from Content-Disposition `filename` or Content-Type `name`.
    pub filename: Option<String>,
    /// Transfer-decoded payload. Empty for containers.
    pub payload: Vec<u8>,
}

impl PartView {
    /// Build a view over a single part (its children are not visited).
    pub fn from_part(part: &ParsedMail<'_>) -> Self {
        let content_type = part.ctype.mimetype.to_ascii_lowercase();

        // mailparse reports a missing header as `inline`; keep the distinction.
        let content_disposition = part.get_content_disposition();
        let disposition = part
            .headers
            .get_first_header("Content-Disposition")
            .map(|_| match &content_disposition.disposition {
                DispositionType::Inline => Disposition::Inline,
                DispositionType::Attachment => Disposition::Attachment,
                DispositionType::FormData => Disposition::Other("form-data".to_string()),
                DispositionType::Extension(other) => Disposition::Other(other.to_ascii_lowercase()),
            });

        let charset = param(&part.ctype.params, "charset")
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CHARSET)
            .to_string();

        let content_id = part
            .headers
            .get_first_value("Content-ID")
            .map(|id| id.trim().trim_start_matches('<').trim_end_matches('>').trim().to_string())
            .filter(|id| !id.is_empty());

        let filename = param(&content_disposition.params, "filename")
            .or_else(|| param(&part.ctype.params, "name"))
            .map(str::to_string);

        let is_container = !part.subparts.is_empty() || content_type.starts_with("multipart/");
        let payload = if is_container {
            Vec::new()
        } else {
            part.get_body_raw().unwrap_or_else(|e| {
                warn!(content_type = %content_type, error = %e, "Could not decode part payload");
                Vec::new()
            })
        };

        Self {
            disposition,
            content_type,
            charset,
            content_id,
            filename,
            payload,
        }
    }

    pub fn role(&self) -> Role {
        classify(
            self.disposition.as_ref(),
            &self.content_type,
            !self.payload.is_empty(),
        )
    }
}

/// Case-insensitive lookup in a MIME parameter map.
fn param<'a>(params: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// All parts of `mail` (the root included), depth-first in document order.
pub fn flatten(mail: &ParsedMail<'_>) -> Vec<PartView> {
    let mut parts = Vec::new();
    let mut stack = vec![mail];
    while let Some(part) = stack.pop() {
        parts.push(PartView::from_part(part));
        stack.extend(part.subparts.iter().rev());
    }
    parts
}

/// Walk every part of `mail` and collect body text, attachments and inline images.
pub fn walk(mail: &ParsedMail<'_>) -> WalkResult {
    flatten(mail)
        .into_iter()
        .fold(Accumulator::default(), Accumulator::absorb)
        .finish()
}

#[derive(Default)]
struct Accumulator {
    plain: String,
    html: String,
    attachments: Vec<AttachmentRecord>,
    inline_images: BTreeMap<String, InlineImageRecord>,
}

impl Accumulator {
    fn absorb(mut self, part: PartView) -> Self {
        let role = part.role();
        trace!(content_type = %part.content_type, ?role, "Visiting part");

        match role {
            Role::InlineText => {
                let text = charset::decode(&part.payload, Some(&part.charset));
                if part.content_type == "text/html" {
                    self.html.push_str(&text);
                } else {
                    self.plain.push_str(&text);
                }
            }
            Role::Attachment => {
                let raw_name = part
                    .filename
                    .clone()
                    .unwrap_or_else(|| format!("attachment_{}", self.attachments.len() + 1));
                let filename = header::decode_field_or_placeholder(&raw_name, "filename");
                self.attachments.push(AttachmentRecord::from_payload(
                    filename,
                    &part.content_type,
                    &part.payload,
                ));

                // Outlook marks CID images as attachments.
                if part.content_type.starts_with("image/") && part.content_id.is_some() {
                    self.register_image(part);
                }
            }
            Role::InlineImage => self.register_image(part),
            Role::Ignored => {}
        }
        self
    }

    fn register_image(&mut self, part: PartView) {
        let Some(cid) = part.content_id else {
            debug!(content_type = %part.content_type, "Dropping inline image without Content-ID");
            return;
        };
        self.inline_images.insert(
            cid,
            InlineImageRecord {
                filename: part.filename,
                data: part.payload,
                content_type: part.content_type,
            },
        );
    }

    fn finish(self) -> WalkResult {
        let body = if !self.html.is_empty() {
            Some(Body::Html(self.html))
        } else if !self.plain.is_empty() {
            Some(Body::PlainText(self.plain))
        } else {
            None
        };
        WalkResult {
            body,
            attachments: self.attachments,
            inline_images: self.inline_images,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> WalkResult {
        let mail = mailparse::parse_mail(raw.as_bytes()).unwrap();
        walk(&mail)
    }

    #[test]
    fn test_classify_table() {
        let inline = Some(&Disposition::Inline);
        let attachment = Some(&Disposition::Attachment);
        let other = Disposition::Other("form-data".into());

        assert_eq!(classify(None, "text/plain", true), Role::InlineText);
        assert_eq!(classify(inline, "text/html", true), Role::InlineText);
        assert_eq!(classify(attachment, "text/plain", true), Role::Attachment);
        assert_eq!(classify(attachment, "image/png", true), Role::Attachment);
        assert_eq!(classify(inline, "image/png", true), Role::InlineImage);
        assert_eq!(classify(inline, "application/pdf", true), Role::Attachment);
        assert_eq!(classify(None, "image/png", true), Role::Ignored);
        assert_eq!(classify(Some(&other), "text/plain", true), Role::Ignored);
        assert_eq!(classify(attachment, "application/pdf", false), Role::Ignored);
        assert_eq!(classify(None, "text/plain", false), Role::Ignored);
    }

    #[test]
    fn test_single_part_plain() {
        let result = parse("Subject: Hi\r\nContent-Type: text/plain\r\n\r\nHello *world*\r\n");
        match result.body {
            Some(Body::PlainText(text)) => assert_eq!(text.trim_end(), "Hello *world*"),
            other => panic!("expected plain body, got {other:?}"),
        }
        assert!(result.attachments.is_empty());
    }

    #[test]
    fn test_html_wins_over_plain() {
        let raw = concat!(
            "Content-Type: multipart/alternative; boundary=\"b\"\r\n\r\n",
            "--b\r\nContent-Type: text/plain\r\n\r\nplain\r\n",
            "--b\r\nContent-Type: text/html\r\n\r\n<p>html</p>\r\n",
            "--b--\r\n"
        );
        match parse(raw).body {
            Some(Body::Html(html)) => assert!(html.contains("<p>html</p>")),
            other => panic!("expected html body, got {other:?}"),
        }
    }

    #[test]
    fn test_declared_charset_is_used() {
        let raw = b"Content-Type: text/plain; charset=iso-8859-1\r\n\r\ncaf\xe9";
        let mail = mailparse::parse_mail(raw).unwrap();
        assert_eq!(walk(&mail).body, Some(Body::PlainText("café".into())));
    }

    #[test]
    fn test_attachment_and_inline_image() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=\"b\"\r\n\r\n",
            "--b\r\nContent-Type: text/html\r\n\r\n<img src=\"cid:logo@x\">\r\n",
            "--b\r\nContent-Type: image/png\r\nContent-Disposition: inline\r\n",
            "Content-ID: <logo@x>\r\nContent-Transfer-Encoding: base64\r\n\r\niVBORw0K\r\n",
            "--b\r\nContent-Type: application/pdf; name=\"report.pdf\"\r\n",
            "Content-Disposition: attachment\r\n\r\n%PDF-1.4\r\n",
            "--b--\r\n"
        );
        let result = parse(raw);

        assert_eq!(result.attachments.len(), 1);
        assert_eq!(result.attachments[0].filename, "report.pdf");
        assert_eq!(result.attachments[0].content_type, "application/pdf");

        let image = result.inline_images.get("logo@x").expect("inline image");
        assert_eq!(image.content_type, "image/png");
        assert_eq!(image.data, b"\x89PNG\r\n");
    }

    #[test]
    fn test_attached_cid_image_is_also_inline() {
        let raw = concat!(
            "Content-Type: multipart/related; boundary=\"b\"\r\n\r\n",
            "--b\r\nContent-Type: text/html\r\n\r\n<img src=\"cid:pic\">\r\n",
            "--b\r\nContent-Type: image/gif\r\nContent-Disposition: attachment; filename=\"pic.gif\"\r\n",
            "Content-ID: <pic>\r\n\r\nGIF89a\r\n",
            "--b--\r\n"
        );
        let result = parse(raw);
        assert_eq!(result.attachments.len(), 1);
        assert!(result.inline_images.contains_key("pic"));
    }

    #[test]
    fn test_unnamed_attachment_gets_ordinal_name() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=\"b\"\r\n\r\n",
            "--b\r\nContent-Type: text/plain\r\n\r\nbody\r\n",
            "--b\r\nContent-Type: application/octet-stream\r\nContent-Disposition: attachment\r\n\r\nxyz\r\n",
            "--b--\r\n"
        );
        let result = parse(raw);
        assert_eq!(result.attachments[0].filename, "attachment_1");
    }

    #[test]
    fn test_inline_image_without_cid_is_dropped() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=\"b\"\r\n\r\n",
            "--b\r\nContent-Type: text/html\r\n\r\n<p>x</p>\r\n",
            "--b\r\nContent-Type: image/png\r\nContent-Disposition: inline\r\n\r\nPNG\r\n",
            "--b--\r\n"
        );
        let result = parse(raw);
        assert!(result.inline_images.is_empty());
        assert!(result.attachments.is_empty());
    }

    #[test]
    fn test_no_text_parts() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=\"b\"\r\n\r\n",
            "--b\r\nContent-Type: application/zip\r\nContent-Disposition: attachment; filename=a.zip\r\n\r\nPK\r\n",
            "--b--\r\n"
        );
        let result = parse(raw);
        assert!(result.body.is_none());
        assert_eq!(result.attachments.len(), 1);
    }

    #[test]
    fn test_flatten_preserves_document_order() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=\"outer\"\r\n\r\n",
            "--outer\r\nContent-Type: multipart/alternative; boundary=\"inner\"\r\n\r\n",
            "--inner\r\nContent-Type: text/plain\r\n\r\na\r\n",
            "--inner\r\nContent-Type: text/html\r\n\r\nb\r\n",
            "--inner--\r\n",
            "--outer\r\nContent-Type: image/png\r\n\r\nc\r\n",
            "--outer--\r\n"
        );
        let mail = mailparse::parse_mail(raw.as_bytes()).unwrap();
        let types: Vec<String> = flatten(&mail).into_iter().map(|p| p.content_type).collect();
        assert_eq!(
            types,
            vec![
                "multipart/mixed",
                "multipart/alternative",
                "text/plain",
                "text/html",
                "image/png"
            ]
        );
    }
}
