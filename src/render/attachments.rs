//! Attachment summary table.

use humansize::{format_size, FormatSizeOptions, WINDOWS};

use crate::model::attachment::AttachmentRecord;

/// Render the attachment table, or `None` when there are no attachments.
///
/// Filenames are already HTML-escaped by the header decoder.
pub fn summarize(attachments: &[AttachmentRecord]) -> Option<String> {
    if attachments.is_empty() {
        return None;
    }

    let mut html = String::from(
        r#"<table style="font-family: serif; margin-bottom: 20px;border-spacing: 1rem 0;text-align: left;">"#,
    );
    html.push_str(concat!(
        r#"<thead><tr><th colspan="3">Attachments:</th></tr>"#,
        r#"<tr><th scope="col">Name</th><th scope="col">Size</th><th scope="col">MD5sum</th></tr></thead>"#,
    ));
    for attachment in attachments {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            attachment.filename,
            human_size(attachment.size),
            attachment.md5
        ));
    }
    html.push_str("</table>");
    Some(html)
}

/// Format a byte count with 1024-based units and one decimal, e.g. `"1.5 KB"`.
pub fn human_size(bytes: u64) -> String {
    format_size(bytes, FormatSizeOptions::from(WINDOWS).decimal_places(1))
}
