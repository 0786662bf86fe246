//! Assembly of the final HTML document for one message.

use pulldown_cmark::{html, Options, Parser};

use crate::model::message::{Body, Message};
use crate::render::{attachments, embed};

/// Convert a plain-text body to HTML, reading it as Markdown.
pub fn markdown_to_html(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, Parser::new_ext(text, options));
    out
}

/// Render the message body to HTML.
///
/// HTML bodies get their `cid:` images embedded; plain text goes through
/// Markdown. `None` when there is no body or it renders to whitespace only.
pub fn body_html(message: &Message) -> Option<String> {
    let rendered = match message.content.body.as_ref()? {
        Body::Html(html) => embed::embed(html, &message.content.inline_images),
        Body::PlainText(text) => markdown_to_html(text),
    };
    (!rendered.trim().is_empty()).then_some(rendered)
}

/// Build the complete, unsanitized document: header table, attachment
/// table, a separator and the body.
pub fn assemble(message: &Message) -> Option<String> {
    let body = body_html(message)?;
    let attachment_list = attachments::summarize(&message.content.attachments).unwrap_or_default();

    Some(format!(
        r#"
<meta charset="UTF-8">
<meta http-equiv="Content-Type" content="text/html; charset=UTF-8">
{header}
{attachment_list}
<hr>
{body}
"#,
        header = message.header.html,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_conversion() {
        let html = markdown_to_html("# Title\n\nSome *emphasis* here.\n");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<em>emphasis</em>"));
    }

    #[test]
    fn test_plain_lines_become_one_paragraph() {
        assert_eq!(markdown_to_html("Hello\nWorld"), "<p>Hello\nWorld</p>\n");
    }

    #[test]
    fn test_assemble_plain_message() {
        let message = Message::parse(b"Subject: Notes\n\nHello **there**\n").unwrap();
        let doc = assemble(&message).unwrap();
        assert!(doc.contains("<td>Notes</td>"));
        assert!(doc.contains("<strong>there</strong>"));
        assert!(doc.contains("<hr>"));
        assert!(!doc.contains("Attachments:"));
    }

    #[test]
    fn test_whitespace_body_is_skipped() {
        let message = Message::parse(b"Subject: Empty\n\n   \n\n").unwrap();
        assert!(assemble(&message).is_none());
    }

    #[test]
    fn test_no_body_is_skipped() {
        let raw = concat!(
            "Subject: Files\r\nContent-Type: multipart/mixed; boundary=\"b\"\r\n\r\n",
            "--b\r\nContent-Type: application/zip\r\nContent-Disposition: attachment; filename=a.zip\r\n\r\nPK\r\n",
            "--b--\r\n"
        );
        let message = Message::parse(raw.as_bytes()).unwrap();
        assert!(assemble(&message).is_none());
    }
}
