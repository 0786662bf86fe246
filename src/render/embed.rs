//! Inline image embedding: `cid:` references become `data:` URIs.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::debug;

use crate::model::attachment::InlineImageRecord;

/// Replace every `cid:{id}` occurrence in `html` with a base64 `data:` URI.
///
/// References with no matching record are left untouched.
pub fn embed(html: &str, inline_images: &BTreeMap<String, InlineImageRecord>) -> String {
    let mut out = html.to_string();
    for (cid, image) in inline_images {
        let needle = format!("cid:{cid}");
        if !out.contains(&needle) {
            debug!(cid = %cid, "Inline image is never referenced");
            continue;
        }
        out = out.replace(&needle, &data_uri(image));
    }
    out
}

/// `data:{content_type};base64,{payload}` for one image.
pub fn data_uri(image: &InlineImageRecord) -> String {
    format!(
        "data:{};base64,{}",
        image.content_type,
        STANDARD.encode(&image.data)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn images() -> BTreeMap<String, InlineImageRecord> {
        let mut map = BTreeMap::new();
        map.insert(
            "logo@x".to_string(),
            InlineImageRecord {
                filename: Some("logo.png".into()),
                data: b"hi".to_vec(),
                content_type: "image/png".into(),
            },
        );
        map
    }

    #[test]
    fn test_replaces_every_reference() {
        let html = r#"<img src="cid:logo@x"><img src="cid:logo@x">"#;
        let out = embed(html, &images());
        assert_eq!(
            out,
            r#"<img src="data:image/png;base64,aGk="><img src="data:image/png;base64,aGk=">"#
        );
    }

    #[test]
    fn test_unknown_reference_is_kept() {
        let html = r#"<img src="cid:missing">"#;
        assert_eq!(embed(html, &images()), html);
    }

    #[test]
    fn test_no_images() {
        assert_eq!(embed("<p>x</p>", &BTreeMap::new()), "<p>x</p>");
    }
}
